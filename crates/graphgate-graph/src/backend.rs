//! The read-only query seam between the gateway and the database.

use async_trait::async_trait;
use serde_json::{Map, Value};

/// A JSON-safe result row keyed by column name.
pub type Row = Map<String, Value>;

/// Rows returned by a read query, in backend order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryOutput {
    pub fn new(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        Self { columns, rows }
    }

    /// Values of a single column, skipping rows where it is missing or null.
    pub fn column(&self, name: &str) -> Vec<Value> {
        self.rows
            .iter()
            .filter_map(|r| r.get(name))
            .filter(|v| !v.is_null())
            .cloned()
            .collect()
    }

    /// String values of a single column.
    pub fn strings(&self, name: &str) -> Vec<String> {
        self.column(name)
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

/// Failures reported by a backend, already classified.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Cypher syntax error: {0}")]
    Syntax(String),

    #[error("Query timed out: {0}")]
    Timeout(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Classify a raw driver message. Neo4j status codes
    /// (`Neo.ClientError.Statement.SyntaxError`, `...TransactionTimedOut`)
    /// appear verbatim in driver errors.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("syntaxerror") || lower.contains("syntax error") || lower.contains("invalid input") {
            Self::Syntax(message)
        } else if lower.contains("timeout") || lower.contains("timed out") || lower.contains("timedout") {
            Self::Timeout(message)
        } else if lower.contains("unavailable")
            || lower.contains("connection")
            || lower.contains("broken pipe")
            || lower.contains("io error")
        {
            Self::Unavailable(message)
        } else {
            Self::Other(message)
        }
    }
}

/// Read-only, parameterised query execution.
///
/// Implementations must never commit a write: `GraphClient` rolls back
/// every transaction it opens. Each call is a single attempt; failures are
/// reported, not retried. Parameters arrive as JSON and rows leave as JSON,
/// so callers never see driver types.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    async fn run_read(&self, cypher: &str, params: &Row) -> Result<QueryOutput, BackendError>;
}

#[async_trait]
impl<B: GraphBackend + ?Sized> GraphBackend for std::sync::Arc<B> {
    async fn run_read(&self, cypher: &str, params: &Row) -> Result<QueryOutput, BackendError> {
        (**self).run_read(cypher, params).await
    }
}
