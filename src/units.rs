//! Measurement units.
//!
//! Every quantity the engine emits is either a mass in kilograms or a
//! piece count. Unit spellings coming from the extractor or the catalog
//! source vary wildly ("KG", "kilos", "كيلو", "pieces", "قطعة"), so
//! everything funnels through [`normalize_unit`].

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementUnit {
    #[serde(rename = "KG")]
    Mass,
    #[serde(rename = "pieces")]
    Count,
}

impl MeasurementUnit {
    /// Label used in prompts and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            MeasurementUnit::Mass => "KG",
            MeasurementUnit::Count => "pieces",
        }
    }
}

impl fmt::Display for MeasurementUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mass spellings, compared after trimming and lowercasing.
const MASS_SPELLINGS: &[&str] = &[
    "kg",
    "kgs",
    "kg.",
    "kilo",
    "kilos",
    "kilogram",
    "kilograms",
    "kilogramme",
    "kilogrammes",
    "كيلو",
    "كيلوجرام",
    "كيلوغرام",
    "كجم",
    "كغ",
    "كيلوات",
];

/// Maps any unit spelling to `Mass` or `Count`. Total: unknown or empty
/// input is a count.
pub fn normalize_unit(unit: &str) -> MeasurementUnit {
    let unit = unit.trim().to_lowercase();
    if MASS_SPELLINGS.contains(&unit.as_str()) {
        MeasurementUnit::Mass
    } else {
        MeasurementUnit::Count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mass_spellings() {
        assert_eq!(normalize_unit("KG"), MeasurementUnit::Mass);
        assert_eq!(normalize_unit(" Kilograms "), MeasurementUnit::Mass);
        assert_eq!(normalize_unit("كيلو"), MeasurementUnit::Mass);
        assert_eq!(normalize_unit("كجم"), MeasurementUnit::Mass);
    }

    #[test]
    fn test_everything_else_is_count() {
        assert_eq!(normalize_unit("pieces"), MeasurementUnit::Count);
        assert_eq!(normalize_unit("قطعة"), MeasurementUnit::Count);
        assert_eq!(normalize_unit("tons of stuff"), MeasurementUnit::Count);
        assert_eq!(normalize_unit(""), MeasurementUnit::Count);
    }

    #[test]
    fn test_serde_labels() {
        assert_eq!(serde_json::to_string(&MeasurementUnit::Mass).unwrap(), "\"KG\"");
        assert_eq!(serde_json::to_string(&MeasurementUnit::Count).unwrap(), "\"pieces\"");
    }
}
