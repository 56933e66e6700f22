//! Catalog Index - lookup structures derived from one catalog snapshot
//!
//! Built in one go from a list of entries and never mutated afterwards;
//! a catalog reload builds a new index and swaps it in whole.

use crate::catalog::CatalogEntry;
use crate::synonyms::{SynonymTable, SYNONYM_TABLES};
use crate::units::MeasurementUnit;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

/// What the index knows about one canonical material.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialInfo {
    /// Canonical key, as spelled by the catalog
    pub en: String,
    pub ar: String,
    pub unit: MeasurementUnit,
}

#[derive(Debug, Clone)]
pub struct CatalogIndex {
    /// Entries in catalog order, one per English key
    entries: Vec<CatalogEntry>,
    /// lowercase English name -> info
    by_english: HashMap<String, MaterialInfo>,
    /// Arabic name -> lowercase English name
    arabic_to_english: HashMap<String, String>,
    /// Every English and Arabic name; the fuzzy search universe
    names: Vec<String>,
    /// lowercase synonym -> lowercase English name
    synonyms: HashMap<String, String>,
    /// Synonym keys in activation order, for deterministic scanning
    synonym_order: Vec<String>,
    built_at: DateTime<Utc>,
}

impl CatalogIndex {
    /// Build with the compiled-in synonym tables.
    pub fn build(entries: &[CatalogEntry]) -> Self {
        Self::build_with_tables(entries, SYNONYM_TABLES)
    }

    pub fn build_with_tables(entries: &[CatalogEntry], tables: &[SynonymTable]) -> Self {
        let mut index = Self::empty();

        for entry in entries {
            let en = entry.name_en.trim();
            if en.is_empty() {
                continue;
            }
            let key = en.to_lowercase();
            let ar = entry.name_ar.trim();

            let info = MaterialInfo {
                en: en.to_string(),
                ar: ar.to_string(),
                unit: entry.unit,
            };
            let normalized = CatalogEntry::new(en, ar, entry.unit);
            if index.by_english.insert(key.clone(), info).is_some() {
                if let Some(existing) = index
                    .entries
                    .iter_mut()
                    .find(|e| e.name_en.to_lowercase() == key)
                {
                    *existing = normalized;
                }
            } else {
                index.entries.push(normalized);
            }

            if !ar.is_empty() {
                // Shared Arabic names: last writer wins.
                index.arabic_to_english.insert(ar.to_string(), key.clone());
                index.names.push(ar.to_string());
            }
            index.names.push(en.to_string());
        }

        for table in tables {
            let mut activated = 0usize;
            for (synonym, target) in table.entries {
                let key = synonym.trim().to_lowercase();
                let target = target.trim().to_lowercase();
                if key.is_empty() || !index.by_english.contains_key(&target) {
                    continue;
                }
                if index.synonyms.contains_key(&key) {
                    continue;
                }
                index.synonyms.insert(key.clone(), target);
                index.synonym_order.push(key);
                activated += 1;
            }
            debug!("Synonym table '{}': {} entries active", table.name, activated);
        }

        index
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            by_english: HashMap::new(),
            arabic_to_english: HashMap::new(),
            names: Vec::new(),
            synonyms: HashMap::new(),
            synonym_order: Vec::new(),
            built_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Lookup by English name, case-insensitive.
    pub fn get(&self, english: &str) -> Option<&MaterialInfo> {
        self.by_english.get(&english.trim().to_lowercase())
    }

    /// Lookup by exact Arabic name.
    pub fn get_by_arabic(&self, arabic: &str) -> Option<&MaterialInfo> {
        self.arabic_to_english
            .get(arabic.trim())
            .and_then(|key| self.by_english.get(key))
    }

    /// Resolve a name from the fuzzy universe back to its material.
    pub fn lookup_name(&self, name: &str) -> Option<&MaterialInfo> {
        self.get(name).or_else(|| self.get_by_arabic(name))
    }

    /// Target of a synonym, if the synonym is active.
    pub fn synonym_target(&self, synonym: &str) -> Option<&MaterialInfo> {
        self.synonyms
            .get(&synonym.trim().to_lowercase())
            .and_then(|key| self.by_english.get(key))
    }

    /// Active synonyms with their lowercase target keys, in activation order.
    pub fn synonyms(&self) -> impl Iterator<Item = (&str, &str)> {
        self.synonym_order.iter().filter_map(move |syn| {
            self.synonyms
                .get(syn)
                .map(|target| (syn.as_str(), target.as_str()))
        })
    }

    pub fn synonym_count(&self) -> usize {
        self.synonym_order.len()
    }

    /// Catalog listing for the extractor prompt, one `name (arabic) [unit]` per line.
    pub fn render_for_prompt(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                if e.name_ar.is_empty() {
                    format!("- {} [{}]", e.name_en, e.unit)
                } else {
                    format!("- {} ({}) [{}]", e.name_en, e.name_ar, e.unit)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
