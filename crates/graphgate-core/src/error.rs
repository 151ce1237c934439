use thiserror::Error;

/// Top-level error type for the graphgate platform.
#[derive(Error, Debug)]
pub enum GraphgateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for GraphgateError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
