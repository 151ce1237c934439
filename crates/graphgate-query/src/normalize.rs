//! CURIE normalization for query parameters.
//!
//! The graph stores identifiers as `prefix:local` with a lower-cased prefix
//! (`hgnc:6407`), while callers often send registry casing (`HGNC:6407`).

use graphgate_core::Curie;
use serde_json::{Map, Value};

/// Rewrite a single string into canonical CURIE form, or return it as-is
/// when it does not look like a CURIE.
pub fn normalize_str(raw: &str) -> String {
    match Curie::parse(raw) {
        Some(curie) => {
            let normalized = curie.canonical().to_string();
            if normalized != raw {
                tracing::debug!(from = raw, to = %normalized, "Normalized CURIE parameter");
            }
            normalized
        }
        None => raw.to_string(),
    }
}

/// Recursively normalize every CURIE-shaped string inside `value`.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(normalize_str(s)),
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        Value::Object(map) => Value::Object(normalize_parameters(map)),
        other => other.clone(),
    }
}

/// Normalize a parameter map. Keys are untouched.
pub fn normalize_parameters(parameters: &Map<String, Value>) -> Map<String, Value> {
    parameters
        .iter()
        .map(|(k, v)| (k.clone(), normalize_value(v)))
        .collect()
}
