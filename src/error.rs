use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The feature cannot run at all (e.g. no extractor credentials).
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EngineError {
    pub fn is_config(&self) -> bool {
        matches!(self, EngineError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
