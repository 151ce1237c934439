//! Error types for the graphgate-gateway crate.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use graphgate_query::{QueryError, SchemaError};

use crate::grounding::GroundingCandidate;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Invalid JSON: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    InvalidDetailLevel(#[from] SchemaError),

    #[error("Invalid disclosure_level '{0}'. Must be one of: minimal, standard, detailed, exploratory")]
    InvalidDisclosureLevel(String),

    #[error("Could not detect entity types from IDs. Use CURIE format (e.g., HGNC:6407)")]
    UnknownEntityTypes,

    #[error(transparent)]
    Grounding(#[from] GroundingError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Failures raised by a registered endpoint.
#[derive(Error, Debug, Clone)]
pub enum EndpointError {
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("{0}")]
    Query(#[from] QueryError),

    #[error("Endpoint catalog unavailable: {0}")]
    Catalog(String),
}

/// Reasons a free-text term could not be bound to a single identifier.
#[derive(Error, Debug, Clone)]
pub enum GroundingError {
    #[error("Grounding service failed: {0}")]
    Oracle(String),

    #[error("No grounding found for '{term}'")]
    NoMatch {
        term: String,
        namespaces: Option<Vec<String>>,
    },

    #[error("Low confidence grounding for '{term}' (score: {top_score:.2})")]
    LowConfidence {
        term: String,
        top_score: f64,
        options: Vec<GroundingCandidate>,
    },

    #[error("Ambiguous grounding for '{term}': {reason}")]
    Ambiguous {
        term: String,
        reason: String,
        options: Vec<GroundingCandidate>,
    },
}

impl GroundingError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Oracle(_) => "oracle_error",
            Self::NoMatch { .. } => "no_match",
            Self::LowConfidence { .. } => "low_confidence",
            Self::Ambiguous { .. } => "ambiguous",
        }
    }
}

// ── Tool Error Payloads ──────────────────────────────────────────

/// The structured error body every tool returns instead of raising:
/// `{"error": ..., "hint": ..., <extra fields>}`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            hint: None,
            extra: Map::new(),
        }
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| Value::String(e.to_string()))
    }
}

impl From<ToolError> for Value {
    fn from(err: ToolError) -> Self {
        err.into_value()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_error_flattens_extra_fields() {
        let v = ToolError::new("Unknown endpoint: nope")
            .hint("Use suggest_endpoints to find available functions")
            .with("available", json!(["a", "b"]))
            .into_value();
        assert_eq!(v["error"], "Unknown endpoint: nope");
        assert_eq!(v["hint"], "Use suggest_endpoints to find available functions");
        assert_eq!(v["available"], json!(["a", "b"]));
    }

    #[test]
    fn test_tool_error_omits_missing_hint() {
        let v = ToolError::new("boom").into_value();
        assert!(v.get("hint").is_none());
    }

    #[test]
    fn test_grounding_error_messages() {
        let e = GroundingError::LowConfidence {
            term: "xyz".into(),
            top_score: 0.42,
            options: vec![],
        };
        assert_eq!(e.to_string(), "Low confidence grounding for 'xyz' (score: 0.42)");
        assert_eq!(e.kind(), "low_confidence");
    }
}
