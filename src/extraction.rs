//! Extraction Pipeline
//!
//! One extractor call per request, a tolerant decode of whatever comes
//! back, then every candidate goes through the canonical resolver and
//! duplicates are summed.

use crate::catalog_index::CatalogIndex;
use crate::error::Result;
use crate::llm::MaterialExtractor;
use crate::resolver::CanonicalResolver;
use crate::units::{normalize_unit, MeasurementUnit};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// One resolved material with its total quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMaterial {
    /// Canonical catalog key
    pub material: String,
    pub quantity: f64,
    pub unit: MeasurementUnit,
}

impl ExtractedMaterial {
    pub fn new(material: &str, quantity: f64, unit: MeasurementUnit) -> Self {
        Self {
            material: material.to_string(),
            quantity,
            unit,
        }
    }
}

/// Unvalidated guess from the extractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCandidate {
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: Option<String>,
}

impl RawCandidate {
    pub fn quantity_or_default(&self) -> f64 {
        self.quantity.unwrap_or(1.0)
    }
}

/// Numbers and numeric strings are kept; anything else (including negative
/// or non-finite values) reads as absent.
fn lenient_quantity<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|q| q.is_finite() && *q >= 0.0))
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

/// Response shapes the extractor is known to produce, tried in order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExtractorResponse {
    Bare(Vec<serde_json::Value>),
    Items { items: Vec<serde_json::Value> },
    Material { material: Vec<serde_json::Value> },
}

/// Decode extractor output into candidates. Unknown shapes and
/// unparsable text yield an empty list; individual malformed items are
/// skipped.
pub fn parse_candidates(response: &str) -> Vec<RawCandidate> {
    let body = strip_code_fences(response);
    let items = match serde_json::from_str::<ExtractorResponse>(body) {
        Ok(ExtractorResponse::Bare(items))
        | Ok(ExtractorResponse::Items { items })
        | Ok(ExtractorResponse::Material { material: items }) => items,
        Err(e) => {
            warn!("Extractor response is not a recognized JSON shape: {}", e);
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawCandidate>(item) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                debug!("Skipping malformed extractor item: {}", e);
                None
            }
        })
        .collect()
}

fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Insertion-ordered accumulator that sums quantities per canonical key.
#[derive(Debug, Default)]
pub struct MaterialMerger {
    order: Vec<ExtractedMaterial>,
    positions: HashMap<String, usize>,
}

impl MaterialMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, material: ExtractedMaterial) {
        let key = material.material.to_lowercase();
        match self.positions.get(&key) {
            Some(&pos) => {
                let merged = &mut self.order[pos];
                if merged.unit != material.unit {
                    debug!(
                        "Merging {} {} into {} with unit {}; keeping {}",
                        material.quantity, material.unit, merged.material, merged.unit, merged.unit
                    );
                }
                merged.quantity += material.quantity;
            }
            None => {
                self.positions.insert(key, self.order.len());
                self.order.push(material);
            }
        }
    }

    pub fn into_materials(self) -> Vec<ExtractedMaterial> {
        self.order
    }
}

const EXTRACTION_INSTRUCTIONS: &str = r#"You extract recyclable items from a user's message. The message may be a voice transcript or an image description, in Arabic, English or a mix of both, and may contain spelling mistakes.

Rules:
1. Only use materials from the catalog below. Write the material exactly as its English catalog name.
2. If the same material is mentioned more than once, merge the mentions into one item and add up the quantities.
3. If no quantity is given, use 1.
4. Use "KG" for weights and "pieces" for counted items. If the unit is missing or unclear, use the unit listed for that material in the catalog.
5. Ignore anything the user says they do NOT have.
6. Do not invent items that are not mentioned.

Return ONLY valid JSON, no other text, in this exact format:
{
  "items": [
    {"material": "Plastics", "quantity": 3, "unit": "KG"},
    {"material": "Chair", "quantity": 2, "unit": "pieces"}
  ]
}

If nothing matches, return {"items": []}."#;

/// Full system prompt: fixed instructions plus the current catalog.
pub fn build_prompt(index: &CatalogIndex) -> String {
    format!(
        "{}\n\nCatalog (name (arabic name) [unit]):\n{}",
        EXTRACTION_INSTRUCTIONS,
        index.render_for_prompt()
    )
}

/// Resolve candidates against the catalog and merge by canonical key.
pub fn resolve_candidates(
    candidates: &[RawCandidate],
    index: &CatalogIndex,
    fuzzy_threshold: u8,
) -> Vec<ExtractedMaterial> {
    let resolver = CanonicalResolver::new(index, fuzzy_threshold);
    let mut merger = MaterialMerger::new();
    let mut unresolved: Vec<&str> = Vec::new();

    for candidate in candidates {
        let Some(name) = candidate.material.as_deref().filter(|m| !m.trim().is_empty()) else {
            continue;
        };
        let Some(resolution) = resolver.resolve(name) else {
            unresolved.push(name);
            continue;
        };
        let unit = match candidate.unit.as_deref() {
            Some(u) => normalize_unit(u),
            None => resolution.unit,
        };
        merger.add(ExtractedMaterial::new(
            &resolution.material,
            candidate.quantity_or_default(),
            unit,
        ));
    }

    if !unresolved.is_empty() {
        debug!(
            "Dropped {} unresolved candidates: {:?}",
            unresolved.len(),
            unresolved
        );
    }
    merger.into_materials()
}

pub struct ExtractionPipeline<'a> {
    extractor: &'a dyn MaterialExtractor,
    fuzzy_threshold: u8,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(extractor: &'a dyn MaterialExtractor, fuzzy_threshold: u8) -> Self {
        Self {
            extractor,
            fuzzy_threshold,
        }
    }

    /// Only configuration errors escape; any other extractor failure is
    /// logged and treated as zero candidates.
    pub async fn run(&self, raw_text: &str, index: &CatalogIndex) -> Result<Vec<ExtractedMaterial>> {
        let prompt = build_prompt(index);

        let response = match self.extractor.extract(&prompt, raw_text).await {
            Ok(response) => response,
            Err(e) if e.is_config() => return Err(e),
            Err(e) => {
                warn!("Extractor call failed, continuing with no candidates: {}", e);
                return Ok(Vec::new());
            }
        };

        let candidates = parse_candidates(&response);
        let materials = resolve_candidates(&candidates, index, self.fuzzy_threshold);
        info!(
            "Extractor returned {} candidates, {} resolved materials",
            candidates.len(),
            materials.len()
        );
        Ok(materials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::units::MeasurementUnit::{Count, Mass};

    fn index() -> CatalogIndex {
        CatalogIndex::build(&[
            CatalogEntry::new("Plastics", "بلاستيك", Mass),
            CatalogEntry::new("Chair", "كرسي", Count),
            CatalogEntry::new("Laptop", "لابتوب", Count),
        ])
    }

    #[test]
    fn test_parse_bare_array() {
        let c = parse_candidates(r#"[{"material": "Chair", "quantity": 2, "unit": "pieces"}]"#);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].material.as_deref(), Some("Chair"));
        assert_eq!(c[0].quantity, Some(2.0));
    }

    #[test]
    fn test_parse_items_and_material_wrappers() {
        let items = parse_candidates(r#"{"items": [{"material": "Chair"}, {"material": "Laptop"}]}"#);
        assert_eq!(items.len(), 2);
        let material = parse_candidates(r#"{"material": [{"material": "Chair", "quantity": "3"}]}"#);
        assert_eq!(material.len(), 1);
        assert_eq!(material[0].quantity, Some(3.0));
    }

    #[test]
    fn test_parse_fenced_response() {
        let c = parse_candidates("```json\n{\"items\": [{\"material\": \"Chair\"}]}\n```");
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        assert!(parse_candidates("I could not find anything").is_empty());
        assert!(parse_candidates(r#"{"result": []}"#).is_empty());
        assert!(parse_candidates(r#"{"items": "none"}"#).is_empty());
        assert!(parse_candidates("").is_empty());
    }

    #[test]
    fn test_parse_skips_malformed_items() {
        let c = parse_candidates(r#"[{"material": 5}, "chair", {"material": "Chair", "quantity": -2}]"#);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].quantity, None);
        assert_eq!(c[0].quantity_or_default(), 1.0);
    }

    #[test]
    fn test_resolve_merges_duplicates() {
        let candidates = parse_candidates(
            r#"[{"material": "laptop", "quantity": 2}, {"material": "Chair"}, {"material": "LAPTOP", "quantity": 2}]"#,
        );
        let materials = resolve_candidates(&candidates, &index(), 85);
        assert_eq!(
            materials,
            vec![
                ExtractedMaterial::new("Laptop", 4.0, Count),
                ExtractedMaterial::new("Chair", 1.0, Count),
            ]
        );
    }

    #[test]
    fn test_merger_keeps_first_unit_on_conflict() {
        let mut merger = MaterialMerger::new();
        merger.add(ExtractedMaterial::new("Chair", 2.0, Count));
        merger.add(ExtractedMaterial::new("chair", 3.0, Mass));
        assert_eq!(
            merger.into_materials(),
            vec![ExtractedMaterial::new("Chair", 5.0, Count)]
        );
    }

    #[test]
    fn test_resolve_unit_defaults() {
        let candidates = parse_candidates(
            r#"[{"material": "Plastics", "quantity": 3}, {"material": "Chair", "unit": "boxes"}, {"material": "بلاستيك", "unit": "كيلو"}]"#,
        );
        let materials = resolve_candidates(&candidates, &index(), 85);
        assert_eq!(
            materials,
            vec![
                ExtractedMaterial::new("Plastics", 4.0, Mass),
                ExtractedMaterial::new("Chair", 1.0, Count),
            ]
        );
    }

    #[test]
    fn test_resolve_drops_unknown_and_empty() {
        let candidates = parse_candidates(r#"[{"material": "sofa"}, {"material": "  "}, {"quantity": 3}]"#);
        assert!(resolve_candidates(&candidates, &index(), 85).is_empty());
    }

    #[test]
    fn test_prompt_embeds_catalog() {
        let prompt = build_prompt(&index());
        assert!(prompt.contains("- Plastics (بلاستيك) [KG]"));
        assert!(prompt.contains("- Chair (كرسي) [pieces]"));
        assert!(prompt.contains("\"items\""));
    }
}
