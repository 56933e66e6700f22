//! Natural-language recyclable-material resolution.
//!
//! Turns noisy Arabic/English text (voice transcripts, image captions)
//! into a deduplicated list of catalog materials with quantities and units.

pub mod catalog;
pub mod catalog_index;
pub mod config;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod fallback;
pub mod fuzzy_matcher;
pub mod llm;
pub mod resolver;
pub mod synonyms;
pub mod units;

pub use catalog::{CatalogEntry, CatalogFilter, CatalogSource};
pub use config::{EngineConfig, MatchSettings};
pub use engine::MaterialEngine;
pub use error::{EngineError, Result};
pub use extraction::ExtractedMaterial;
pub use units::MeasurementUnit;
