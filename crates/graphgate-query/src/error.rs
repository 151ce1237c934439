//! Error types for the graphgate-query crate.

use thiserror::Error;

use graphgate_graph::BackendError;

use crate::validate::ValidationIssue;

#[derive(Error, Debug, Clone)]
pub enum QueryError {
    /// Static checks failed; the query never reached the database.
    #[error("Query validation failed: {message}")]
    Validation {
        message: String,
        issues: Vec<ValidationIssue>,
    },

    #[error("Cypher syntax error: {0}")]
    Syntax(String),

    #[error("Query exceeded timeout ({timeout_ms}ms). Try simplifying query or adding LIMIT clause.")]
    Timeout { timeout_ms: u64, detail: String },

    #[error("Query execution failed: {0}")]
    Execution(String),
}

impl QueryError {
    /// Stable machine-readable kind for error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Syntax(_) => "syntax_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Execution(_) => "execution_error",
        }
    }

    /// A short suggestion for the caller on how to recover.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Validation { .. } => {
                "Remove write operations and bind every $parameter the query references"
            }
            Self::Syntax(_) => "Check the Cypher grammar; use get_graph_schema for valid labels",
            Self::Timeout { .. } => "Narrow the MATCH pattern or add a LIMIT clause",
            Self::Execution(_) => "Retry later or simplify the query",
        }
    }

    /// Map a classified backend failure, treating any failure that
    /// outlasted the timeout as a timeout.
    pub(crate) fn from_backend(err: BackendError, timeout_ms: u64, elapsed_ms: u64) -> Self {
        match err {
            BackendError::Syntax(msg) => Self::Syntax(msg),
            BackendError::Timeout(msg) => Self::Timeout {
                timeout_ms,
                detail: msg,
            },
            BackendError::Unavailable(msg) => {
                Self::Execution(format!("Database unavailable: {msg}"))
            }
            BackendError::Other(msg) if elapsed_ms > timeout_ms => Self::Timeout {
                timeout_ms,
                detail: msg,
            },
            BackendError::Other(msg) => Self::Execution(msg),
        }
    }
}

/// Errors from schema discovery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error(
        "Invalid detail_level: {0}. Must be one of: summary, entity_types, relationship_types, patterns, full"
    )]
    InvalidDetailLevel(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_mapping() {
        let e = QueryError::from_backend(BackendError::Syntax("bad".into()), 1000, 5);
        assert!(matches!(e, QueryError::Syntax(ref m) if m == "bad"));

        let e = QueryError::from_backend(BackendError::Unavailable("down".into()), 1000, 5);
        assert_eq!(e.to_string(), "Query execution failed: Database unavailable: down");

        let e = QueryError::from_backend(BackendError::Other("slow".into()), 1000, 1500);
        assert_eq!(e.kind(), "timeout_error");

        let e = QueryError::from_backend(BackendError::Other("boom".into()), 1000, 10);
        assert_eq!(e.kind(), "execution_error");
    }
}
