//! Safe read-query execution: normalize, validate, run with a timeout,
//! cap, paginate, and annotate.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Map, Value};

use graphgate_core::hash::query_hash;
use graphgate_graph::{BackendError, GraphBackend};

use crate::budget::{continuation_hint, Budgeter};
use crate::error::{QueryError, Result};
use crate::normalize::normalize_parameters;
use crate::types::{
    ExecuteRequest, ExecutionMetadata, ExecutionResult, ExplainResult, MAX_RESULTS_CEILING,
    MAX_TIMEOUT_MS,
};
use crate::validate::validate;

const SLOW_QUERY_MS: u64 = 1_000;

/// Runs caller-supplied read queries under the gateway's limits.
///
/// Timeouts are detect-and-report: the awaiting future is dropped when the
/// limit passes, but the server may keep working on the abandoned query.
#[derive(Debug, Clone, Default)]
pub struct QueryExecutor {
    budgeter: Budgeter,
}

impl QueryExecutor {
    pub fn new(budgeter: Budgeter) -> Self {
        Self { budgeter }
    }

    pub fn budgeter(&self) -> &Budgeter {
        &self.budgeter
    }

    /// Execute a read query and return one paginated page of results.
    ///
    /// `request.explain` is ignored here; see [`QueryExecutor::explain`].
    pub async fn execute(
        &self,
        backend: &dyn GraphBackend,
        request: ExecuteRequest,
    ) -> Result<ExecutionResult> {
        let timeout_ms = clamp_timeout(request.timeout_ms);
        let max_results = clamp_max_results(request.max_results);
        let parameters = normalize_parameters(&request.parameters);

        if request.validate {
            let outcome = validate(&request.query, &parameters);
            if !outcome.safe_to_execute {
                tracing::info!(issues = outcome.issues.len(), "Query rejected by validation");
                return Err(QueryError::Validation {
                    message: outcome.summary(),
                    issues: outcome.issues,
                });
            }
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            backend.run_read(&request.query, &parameters),
        )
        .await;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        let output = match outcome {
            Err(_) => {
                tracing::error!(timeout_ms, "Query timed out waiting for the database");
                return Err(QueryError::Timeout {
                    timeout_ms,
                    detail: format!("no response within {timeout_ms}ms"),
                });
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, execution_time_ms, "Query execution failed");
                return Err(QueryError::from_backend(e, timeout_ms, execution_time_ms));
            }
            Ok(Ok(output)) => output,
        };

        if execution_time_ms > timeout_ms {
            tracing::warn!(execution_time_ms, timeout_ms, "Query exceeded timeout threshold");
            return Err(QueryError::from_backend(
                BackendError::Timeout(format!("completed after {execution_time_ms}ms")),
                timeout_ms,
                execution_time_ms,
            ));
        }

        let original_count = output.rows.len();
        let truncated = original_count > max_results;
        if truncated {
            tracing::info!(
                total = original_count,
                max_results,
                "Results truncated to backend cap"
            );
        }
        let rows: Vec<Value> = output
            .rows
            .into_iter()
            .take(max_results)
            .map(Value::Object)
            .collect();

        let (results, mut pagination) =
            self.budgeter
                .paginate(rows, request.offset, request.limit);
        if truncated {
            pagination.db_truncated = Some(true);
            pagination.db_max_results = Some(max_results);
        }

        if execution_time_ms > SLOW_QUERY_MS {
            let preview: String = request.query.chars().take(100).collect();
            tracing::warn!(
                execution_time_ms,
                rows = original_count,
                query = %preview,
                "Slow query"
            );
        }

        Ok(ExecutionResult {
            metadata: ExecutionMetadata {
                result_count: results.len(),
                execution_time_ms,
                truncated,
                original_count,
                query_hash: query_hash(&request.query, &parameters),
                timestamp: Utc::now(),
            },
            token_estimate: pagination.token_estimate,
            continuation_hint: continuation_hint(&pagination),
            query: request.query,
            parameters,
            results,
            pagination,
        })
    }

    /// Ask the database to plan `query` without running it.
    pub async fn explain(
        &self,
        backend: &dyn GraphBackend,
        query: &str,
        parameters: &Map<String, Value>,
    ) -> ExplainResult {
        let parameters = normalize_parameters(parameters);
        let mut warnings = Vec::new();
        let mut recommendations = plan_recommendations(query);

        let outcome = validate(query, &parameters);
        if !outcome.safe_to_execute {
            warnings.extend(outcome.issues.iter().map(|i| i.message.clone()));
            return ExplainResult {
                query: query.to_string(),
                execution_plan: json!({}),
                warnings,
                recommendations,
                error: Some(format!("Query validation failed: {}", outcome.summary())),
            };
        }

        let explain = format!("EXPLAIN {query}");
        let run = tokio::time::timeout(
            Duration::from_millis(MAX_TIMEOUT_MS),
            backend.run_read(&explain, &parameters),
        )
        .await;

        match run {
            Ok(Ok(output)) => {
                warnings.push(
                    "Operator-level plan details are not exposed by the driver".to_string(),
                );
                recommendations.push("Use PROFILE for actual execution statistics".to_string());
                ExplainResult {
                    query: query.to_string(),
                    execution_plan: json!({
                        "accepted": true,
                        "columns": output.columns,
                        "estimated_rows": Value::Null,
                        "operators": [],
                        "estimated_cost": "unknown",
                    }),
                    warnings,
                    recommendations,
                    error: None,
                }
            }
            Ok(Err(BackendError::Syntax(msg))) => {
                tracing::error!(error = %msg, "Syntax error in EXPLAIN query");
                recommendations.push("Fix syntax errors before analyzing query plan".to_string());
                warnings.push(msg.clone());
                ExplainResult {
                    query: query.to_string(),
                    execution_plan: json!({}),
                    warnings,
                    recommendations,
                    error: Some(format!("Cypher syntax error: {msg}")),
                }
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Error explaining query");
                warnings.push(e.to_string());
                ExplainResult {
                    query: query.to_string(),
                    execution_plan: json!({}),
                    warnings,
                    recommendations,
                    error: Some(format!("Failed to explain query: {e}")),
                }
            }
            Err(_) => ExplainResult {
                query: query.to_string(),
                execution_plan: json!({}),
                warnings: vec!["Planning did not finish in time".to_string()],
                recommendations,
                error: Some(format!("Failed to explain query: timed out after {MAX_TIMEOUT_MS}ms")),
            },
        }
    }
}

fn clamp_timeout(timeout_ms: u64) -> u64 {
    if timeout_ms > MAX_TIMEOUT_MS {
        tracing::warn!(
            requested = timeout_ms,
            max = MAX_TIMEOUT_MS,
            "Timeout exceeds maximum, capping"
        );
        MAX_TIMEOUT_MS
    } else {
        timeout_ms
    }
}

fn clamp_max_results(max_results: usize) -> usize {
    if max_results > MAX_RESULTS_CEILING {
        tracing::warn!(
            requested = max_results,
            max = MAX_RESULTS_CEILING,
            "max_results exceeds maximum, capping"
        );
        MAX_RESULTS_CEILING
    } else {
        max_results
    }
}

/// Cheap textual hints about a query's likely cost.
fn plan_recommendations(query: &str) -> Vec<String> {
    let upper = query.to_ascii_uppercase();
    let mut out = Vec::new();
    if !upper.contains("LIMIT") {
        out.push("Add a LIMIT clause to bound the result size".to_string());
    }
    if query.contains("*]") || query.contains("*..]") {
        out.push("Bound variable-length patterns with an upper hop count (e.g. *1..3)".to_string());
    }
    if upper.contains("MATCH (N)") || upper.contains("MATCH ()") {
        out.push("Anchor MATCH on a label so the planner can use an index".to_string());
    }
    out
}
