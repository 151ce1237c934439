//! Request and response types for query execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::budget::PageInfo;

pub const MAX_TIMEOUT_MS: u64 = 120_000;
pub const MAX_RESULTS_CEILING: usize = 10_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// A read query submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub query: String,

    #[serde(default)]
    pub parameters: Map<String, Value>,

    /// Run static validation before touching the database.
    #[serde(default = "default_validate")]
    pub validate: bool,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Return the query plan instead of executing.
    #[serde(default)]
    pub explain: bool,

    #[serde(default)]
    pub offset: usize,

    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_validate() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl ExecuteRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters: Map::new(),
            validate: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_results: DEFAULT_MAX_RESULTS,
            explain: false,
            offset: 0,
            limit: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_page(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Rows in this page.
    pub result_count: usize,
    pub execution_time_ms: u64,
    /// The backend cap (`max_results`) dropped rows.
    pub truncated: bool,
    /// Rows the backend returned before the cap.
    pub original_count: usize,
    pub query_hash: String,
    pub timestamp: DateTime<Utc>,
}

/// A paginated, annotated result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub query: String,
    /// Parameters after CURIE normalization.
    pub parameters: Map<String, Value>,
    pub results: Vec<Value>,
    pub metadata: ExecutionMetadata,
    pub pagination: PageInfo,
    pub token_estimate: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_hint: Option<String>,
}

/// Best-effort plan description returned by explain mode. Failures are
/// reported in `error` rather than raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResult {
    pub query: String,
    pub execution_plan: Value,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
