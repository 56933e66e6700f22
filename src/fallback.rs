//! Negation-Aware Fallback Scanner
//!
//! The extractor under-reports, so the raw text is scanned directly for
//! catalog names and known synonyms it missed. Two things are guarded
//! against:
//!
//! - terms listed only as things the user does not have
//!   ("no other items like plastic bottles, cardboard boxes")
//! - a generic raw material ("aluminium") winning over the specific item
//!   a synonym reveals ("faucet" -> "basin mixer")
//!
//! Negation detection and quantity capture are narrow regex heuristics,
//! not a parser.

use crate::catalog_index::CatalogIndex;
use crate::error::{EngineError, Result};
use crate::extraction::ExtractedMaterial;
use crate::synonyms::is_generic;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashSet;
use tracing::{debug, info};

pub struct FallbackScanner<'a> {
    index: &'a CatalogIndex,
    negation_window: usize,
    negation: Cow<'a, Regex>,
}

impl<'a> FallbackScanner<'a> {
    pub fn new(index: &'a CatalogIndex, negation_window: usize) -> Result<Self> {
        Ok(Self {
            index,
            negation_window,
            negation: Cow::Owned(negation_regex(negation_window)?),
        })
    }

    /// Scanner over a negation pattern compiled once by the caller with
    /// [`negation_regex`] for the same `negation_window`.
    pub fn with_negation(index: &'a CatalogIndex, negation_window: usize, negation: &'a Regex) -> Self {
        Self {
            index,
            negation_window,
            negation: Cow::Borrowed(negation),
        }
    }

    /// Append materials recovered from `raw_text` to the extractor's
    /// result, applying specific-over-generic arbitration.
    pub fn recover(&self, raw_text: &str, extracted: Vec<ExtractedMaterial>) -> Vec<ExtractedMaterial> {
        let mut added: HashSet<String> = extracted
            .iter()
            .map(|m| m.material.to_lowercase())
            .collect();

        let catalog_hits = self.scan_catalog_names(raw_text, &mut added);

        let has_specific = extracted
            .iter()
            .chain(catalog_hits.iter())
            .any(|m| !is_generic(&m.material));

        let mut synonym_hits = if has_specific {
            Vec::new()
        } else {
            self.scan_synonyms(raw_text, &mut added)
        };

        let mut extracted = extracted;
        if synonym_hits.iter().any(|m| !is_generic(&m.material)) {
            synonym_hits.retain(|m| !is_generic(&m.material));
            if !extracted.is_empty() && extracted.iter().all(|m| is_generic(&m.material)) {
                info!(
                    "Specific synonym match supersedes generic extraction: {:?}",
                    extracted.iter().map(|m| m.material.as_str()).collect::<Vec<_>>()
                );
                extracted.clear();
            }
        }

        if !catalog_hits.is_empty() || !synonym_hits.is_empty() {
            debug!(
                "Fallback recovered {} catalog-name and {} synonym matches",
                catalog_hits.len(),
                synonym_hits.len()
            );
        }

        extracted.extend(catalog_hits);
        extracted.extend(synonym_hits);
        extracted
    }

    /// Catalog entries whose English or Arabic name appears in the text
    /// outside a negated list. Entries already in `added` are skipped.
    pub fn scan_catalog_names(&self, raw_text: &str, added: &mut HashSet<String>) -> Vec<ExtractedMaterial> {
        let lower = raw_text.to_lowercase();
        let mut hits = Vec::new();

        for entry in self.index.entries() {
            let key = entry.name_en.to_lowercase();
            if added.contains(&key) {
                continue;
            }

            let label = [key.as_str(), entry.name_ar.as_str()]
                .into_iter()
                .filter(|name| !name.is_empty() && lower.contains(*name))
                .find(|name| !self.is_negated_example(name, raw_text));
            let Some(label) = label else {
                continue;
            };

            let quantity = extract_quantity(label, raw_text);
            hits.push(ExtractedMaterial::new(&entry.name_en, quantity, entry.unit));
            added.insert(key);
        }
        hits
    }

    /// Active synonyms that appear in the text outside a negated list,
    /// resolved to their catalog targets.
    pub fn scan_synonyms(&self, raw_text: &str, added: &mut HashSet<String>) -> Vec<ExtractedMaterial> {
        let lower = raw_text.to_lowercase();
        let mut hits = Vec::new();

        for (synonym, target) in self.index.synonyms() {
            if added.contains(target) || !lower.contains(synonym) {
                continue;
            }
            if self.is_negated_example(synonym, raw_text) {
                continue;
            }
            let Some(info) = self.index.get(target) else {
                continue;
            };
            let quantity = extract_quantity(synonym, raw_text);
            hits.push(ExtractedMaterial::new(&info.en, quantity, info.unit));
            added.insert(target.to_string());
        }
        hits
    }

    /// True when `label` occurs in `raw_text` and the window of text
    /// ending at its first occurrence reads like "no ... like" /
    /// "no ... such as".
    pub fn is_negated_example(&self, label: &str, raw_text: &str) -> bool {
        let lower = raw_text.to_lowercase();
        let label = label.to_lowercase();
        let Some(pos) = lower.find(&label) else {
            return false;
        };
        let window = trailing_chars(&lower[..pos], self.negation_window);
        self.negation.is_match(window)
    }
}

pub fn negation_regex(window: usize) -> Result<Regex> {
    let pattern = format!(
        r"\bno\b[\s\S]{{0,{w}}}\b(?:like|such as)\b|\b(?:لا|مفيش|مافيش|بدون)\b[\s\S]{{0,{w}}}\b(?:مثل|زي)\b",
        w = window
    );
    Regex::new(&pattern)
        .map_err(|e| EngineError::Config(format!("Invalid negation window {}: {}", window, e)))
}

/// The last `n` characters of `s`.
fn trailing_chars(s: &str, n: usize) -> &str {
    match s.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) if n > 0 => &s[idx..],
        _ if n == 0 => "",
        _ => s,
    }
}

/// Count written directly before `label` ("3 chairs"), else 1.
pub fn extract_quantity(label: &str, raw_text: &str) -> f64 {
    let pattern = format!(r"(?i)(\d+)\s+{}", regex::escape(label));
    let Ok(re) = Regex::new(&pattern) else {
        return 1.0;
    };
    re.captures(raw_text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_digits(m.as_str()))
        .unwrap_or(1.0)
}

/// Parse ASCII, Arabic-Indic or Persian digits.
fn parse_digits(digits: &str) -> Option<f64> {
    let mut value: f64 = 0.0;
    for c in digits.chars() {
        let d = match c {
            '0'..='9' => c as u32 - '0' as u32,
            '\u{0660}'..='\u{0669}' => c as u32 - 0x0660,
            '\u{06F0}'..='\u{06F9}' => c as u32 - 0x06F0,
            _ => return None,
        };
        value = value * 10.0 + d as f64;
    }
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::units::MeasurementUnit::{Count, Mass};

    fn index() -> CatalogIndex {
        CatalogIndex::build(&[
            CatalogEntry::new("Plastic", "", Mass),
            CatalogEntry::new("Cardboard", "كرتون", Mass),
            CatalogEntry::new("Aluminium", "ألومنيوم", Mass),
            CatalogEntry::new("Basin Mixer", "", Count),
            CatalogEntry::new("Chair", "كرسي", Count),
            CatalogEntry::new("Laptop", "لابتوب", Count),
        ])
    }

    #[test]
    fn test_negated_list_is_suppressed() {
        let index = index();
        let scanner = FallbackScanner::new(&index, 120).unwrap();
        let text = "there are no other items like plastic bottles, cardboard boxes";
        assert!(scanner.is_negated_example("plastic", text));
        assert!(scanner.is_negated_example("cardboard", text));
        assert!(scanner.recover(text, Vec::new()).is_empty());
    }

    #[test]
    fn test_plain_mention_is_not_negated() {
        let index = index();
        let scanner = FallbackScanner::new(&index, 120).unwrap();
        assert!(!scanner.is_negated_example("chair", "I have 2 chairs, no laptop"));
        assert!(!scanner.is_negated_example("sofa", "no items like a table"));
    }

    #[test]
    fn test_negation_outside_window() {
        let index = index();
        let scanner = FallbackScanner::new(&index, 120).unwrap();
        let filler = "x".repeat(130);
        let text = format!("no {} like chair", filler);
        assert!(!scanner.is_negated_example("chair", &text));
    }

    #[test]
    fn test_arabic_negation() {
        let index = index();
        let scanner = FallbackScanner::new(&index, 120).unwrap();
        assert!(scanner.is_negated_example("كرسي", "مفيش حاجة تانية زي كرسي"));
    }

    #[test]
    fn test_catalog_scan_with_quantity() {
        let index = index();
        let scanner = FallbackScanner::new(&index, 120).unwrap();
        let result = scanner.recover("I have 3 chair and a laptop", Vec::new());
        assert_eq!(
            result,
            vec![
                ExtractedMaterial::new("Chair", 3.0, Count),
                ExtractedMaterial::new("Laptop", 1.0, Count),
            ]
        );
    }

    #[test]
    fn test_catalog_scan_skips_already_extracted() {
        let index = index();
        let scanner = FallbackScanner::new(&index, 120).unwrap();
        let extracted = vec![ExtractedMaterial::new("Chair", 2.0, Count)];
        let result = scanner.recover("2 chair", extracted.clone());
        assert_eq!(result, extracted);
    }

    #[test]
    fn test_specific_synonym_supersedes_generic_extraction() {
        let index = index();
        let scanner = FallbackScanner::new(&index, 120).unwrap();
        let extracted = vec![ExtractedMaterial::new("Aluminium", 1.0, Mass)];
        let result = scanner.recover("an old faucet made of aluminium", extracted);
        assert_eq!(result, vec![ExtractedMaterial::new("Basin Mixer", 1.0, Count)]);
    }

    #[test]
    fn test_synonym_scan_skipped_when_specific_present() {
        let index = index();
        let scanner = FallbackScanner::new(&index, 120).unwrap();
        let extracted = vec![ExtractedMaterial::new("Laptop", 1.0, Count)];
        let result = scanner.recover("a laptop and a faucet", extracted.clone());
        assert_eq!(result, extracted);
    }

    #[test]
    fn test_generic_synonym_kept_without_specific() {
        let index = index();
        let scanner = FallbackScanner::new(&index, 120).unwrap();
        let result = scanner.recover("5 cartons", Vec::new());
        assert_eq!(result, vec![ExtractedMaterial::new("Cardboard", 5.0, Mass)]);
    }

    #[test]
    fn test_extract_quantity() {
        assert_eq!(extract_quantity("chair", "I have 4   Chair"), 4.0);
        assert_eq!(extract_quantity("chair", "a chair"), 1.0);
        assert_eq!(extract_quantity("كرسي", "٣ كرسي"), 3.0);
        assert_eq!(extract_quantity("c++ (x)", "2 c++ (x)"), 2.0);
    }

    #[test]
    fn test_overlong_digit_run_defaults_to_one() {
        let text = format!("{} chair", "9".repeat(400));
        assert_eq!(extract_quantity("chair", &text), 1.0);

        let index = index();
        let scanner = FallbackScanner::new(&index, 120).unwrap();
        let result = scanner.recover(&text, Vec::new());
        assert_eq!(result, vec![ExtractedMaterial::new("Chair", 1.0, Count)]);
        assert!(result.iter().all(|m| m.quantity.is_finite()));
    }

    #[test]
    fn test_shared_negation_pattern() {
        let index = index();
        let negation = negation_regex(120).unwrap();
        let scanner = FallbackScanner::with_negation(&index, 120, &negation);
        let text = "there are no other items like plastic bottles, cardboard boxes";
        assert!(scanner.is_negated_example("cardboard", text));
        assert!(scanner.recover(text, Vec::new()).is_empty());
        assert_eq!(
            scanner.recover("2 chair", Vec::new()),
            vec![ExtractedMaterial::new("Chair", 2.0, Count)]
        );
    }

    #[test]
    fn test_trailing_chars() {
        assert_eq!(trailing_chars("abcdef", 3), "def");
        assert_eq!(trailing_chars("ab", 5), "ab");
        assert_eq!(trailing_chars("كرسي", 2), "سي");
        assert_eq!(trailing_chars("abc", 0), "");
    }

    #[test]
    fn test_tiny_window_sees_nothing() {
        let index = index();
        let scanner = FallbackScanner::new(&index, 1).unwrap();
        assert!(!scanner.is_negated_example("plastic", "no items like plastic"));
    }
}
