//! BLAKE3 content hashing for query deduplication.
//!
//! The hash covers the normalized query text and its parameters, so clients
//! can cache or deduplicate responses across calls.

use serde::Serialize;

/// Hashable representation of a query and its bindings.
#[derive(Serialize)]
struct HashableQuery<'a, P: Serialize> {
    query: &'a str,
    parameters: &'a P,
}

/// Compute a stable 16-hex-character hash of `(query, parameters)`.
///
/// The query is trimmed and lower-cased. Parameters serialize with sorted
/// keys (`serde_json::Map` is ordered), so logically equal bindings always
/// hash the same.
pub fn query_hash<P: Serialize>(query: &str, parameters: &P) -> String {
    let normalized = query.trim().to_lowercase();
    let hashable = HashableQuery {
        query: &normalized,
        parameters,
    };

    let bytes = match serde_json::to_vec(&hashable) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Parameter serialization failed, hashing query text only");
            normalized.into_bytes()
        }
    };
    let mut hex = blake3::hash(&bytes).to_hex().to_string();
    hex.truncate(16);
    hex
}
