//! Conversion between JSON parameter values and Bolt values.

use std::collections::HashMap;

use neo4rs::{BoltNull, BoltType, Query};
use serde_json::Value;

use crate::backend::Row;

/// Convert a JSON value into the Bolt value sent to the server.
pub fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or_default().into(),
        },
        Value::String(s) => s.clone().into(),
        Value::Array(items) => items.iter().map(json_to_bolt).collect::<Vec<_>>().into(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), json_to_bolt(v)))
            .collect::<HashMap<String, BoltType>>()
            .into(),
    }
}

/// Build a `neo4rs::Query` with every JSON parameter bound.
pub fn bind_params(cypher: &str, params: &Row) -> Query {
    params
        .iter()
        .fold(neo4rs::query(cypher), |q, (key, value)| {
            q.param(key, json_to_bolt(value))
        })
}

/// Convert a driver row into a JSON row. Nodes and relationships
/// deserialize to their property maps.
pub fn row_to_json(row: &neo4rs::Row) -> Result<Row, String> {
    row.to::<Row>()
        .map_err(|e| format!("Failed to deserialize row: {e}"))
}
