//! Engine configuration.
//!
//! Defaults, then an optional JSON file, then environment variables
//! (a `.env` file is honoured by the binary via `dotenv`).

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Heuristic constants for matching. The defaults are the empirically
/// tuned values; they are exposed so deployments can adjust them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchSettings {
    /// Minimum token-set score (0-100) for a fuzzy match to count.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: u8,

    /// Characters scanned before a label when looking for "no ... like".
    #[serde(default = "default_negation_window")]
    pub negation_window: usize,
}

fn default_fuzzy_threshold() -> u8 {
    85
}

fn default_negation_window() -> usize {
    120
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            negation_window: default_negation_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for image captioning; falls back to `model`.
    #[serde(default)]
    pub vision_model: Option<String>,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub catalog_url: Option<String>,

    #[serde(default)]
    pub catalog_file: Option<PathBuf>,

    #[serde(default)]
    pub matching: MatchSettings,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            vision_model: None,
            temperature: 0.0,
            request_timeout_secs: default_timeout(),
            catalog_url: None,
            catalog_file: None,
            matching: MatchSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides from a key lookup. Takes a closure so tests don't
    /// have to touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = non_empty("MATERIAL_RESOLVER_MODEL") {
            self.model = model;
        }
        if let Some(model) = non_empty("MATERIAL_RESOLVER_VISION_MODEL") {
            self.vision_model = Some(model);
        }
        if let Some(url) = non_empty("MATERIAL_RESOLVER_CATALOG_URL") {
            self.catalog_url = Some(url);
        }
        if let Some(file) = non_empty("MATERIAL_RESOLVER_CATALOG_FILE") {
            self.catalog_file = Some(PathBuf::from(file));
        }
        if let Some(threshold) = non_empty("MATERIAL_RESOLVER_FUZZY_THRESHOLD") {
            match threshold.trim().parse::<u8>() {
                Ok(t) => self.matching.fuzzy_threshold = t,
                Err(_) => tracing::warn!(
                    "Ignoring non-numeric MATERIAL_RESOLVER_FUZZY_THRESHOLD: {}",
                    threshold
                ),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.matching.fuzzy_threshold > 100 {
            return Err(EngineError::Config(format!(
                "fuzzy_threshold must be within 0-100, got {}",
                self.matching.fuzzy_threshold
            )));
        }
        if self.matching.negation_window == 0 {
            return Err(EngineError::Config(
                "negation_window must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn vision_model(&self) -> &str {
        self.vision_model.as_deref().unwrap_or(&self.model)
    }
}
