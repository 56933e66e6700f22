//! Canonical Resolver - maps one candidate material string to a catalog key
//!
//! Cascade, first success wins:
//! 1. synonym table
//! 2. exact English name
//! 3. token-set fuzzy match against every English and Arabic name,
//!    accepted only at or above the threshold
//!
//! Precision over recall: a wrong match corrupts quantity accounting
//! downstream, a missed one only loses an item.

use crate::catalog_index::CatalogIndex;
use crate::fuzzy_matcher::FuzzyMatcher;
use crate::units::MeasurementUnit;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "method", content = "score", rename_all = "snake_case")]
pub enum MatchMethod {
    Synonym,
    Exact,
    Fuzzy(u8),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    /// Canonical English key as spelled by the catalog
    pub material: String,
    pub unit: MeasurementUnit,
    pub method: MatchMethod,
}

pub struct CanonicalResolver<'a> {
    index: &'a CatalogIndex,
    matcher: FuzzyMatcher,
}

impl<'a> CanonicalResolver<'a> {
    pub fn new(index: &'a CatalogIndex, fuzzy_threshold: u8) -> Self {
        Self {
            index,
            matcher: FuzzyMatcher::new(fuzzy_threshold),
        }
    }

    /// `None` means not found; callers drop the candidate.
    pub fn resolve(&self, candidate: &str) -> Option<Resolution> {
        let text = candidate.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }

        if let Some(info) = self.index.synonym_target(&text) {
            return Some(Resolution {
                material: info.en.clone(),
                unit: info.unit,
                method: MatchMethod::Synonym,
            });
        }

        if let Some(info) = self.index.get(&text) {
            return Some(Resolution {
                material: info.en.clone(),
                unit: info.unit,
                method: MatchMethod::Exact,
            });
        }

        let names = self.index.names().iter().map(String::as_str);
        match self.matcher.best_candidate(&text, names) {
            Some((name, score)) if score >= self.matcher.score_threshold => {
                let info = self.index.lookup_name(name)?;
                debug!("Fuzzy matched '{}' -> '{}' (score {})", candidate, info.en, score);
                Some(Resolution {
                    material: info.en.clone(),
                    unit: info.unit,
                    method: MatchMethod::Fuzzy(score),
                })
            }
            Some((name, score)) => {
                debug!(
                    "No match for '{}': best was '{}' at {} (< {})",
                    candidate, name, score, self.matcher.score_threshold
                );
                None
            }
            None => None,
        }
    }
}
