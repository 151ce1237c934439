//! Canned read queries used by schema discovery, grounding, and the
//! gateway tools.
//!
//! Every function takes a `&dyn GraphBackend`, so the same queries run
//! against a live server or a test stub.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::backend::{BackendError, GraphBackend, Row};

/// One `(source)-[:rel_type]->(target)` triple from the schema graph.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SchemaTriple {
    pub source: String,
    pub rel_type: String,
    pub target: String,
}

/// A full-text or exact-name hit on an entity node.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NameHit {
    pub id: String,
    pub name: String,
    pub score: f64,
}

/// Backtick-quote a label or relationship type for interpolation.
pub fn escape_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn params(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn first_i64(rows: &[Row], column: &str) -> i64 {
    rows.first()
        .and_then(|r| r.get(column))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

fn first_string_list(rows: &[Row], column: &str) -> Vec<String> {
    let mut keys: Vec<String> = rows
        .first()
        .and_then(|r| r.get(column))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    keys.sort();
    keys
}

// ── Schema Introspection ─────────────────────────────────────────

/// All node labels, sorted.
pub async fn labels(backend: &dyn GraphBackend) -> Result<Vec<String>, BackendError> {
    let out = backend
        .run_read("CALL db.labels() YIELD label RETURN label", &Row::new())
        .await?;
    let mut labels = out.strings("label");
    labels.sort();
    Ok(labels)
}

/// All relationship types, sorted.
pub async fn relationship_types(backend: &dyn GraphBackend) -> Result<Vec<String>, BackendError> {
    let out = backend
        .run_read(
            "CALL db.relationshipTypes() YIELD relationshipType RETURN relationshipType",
            &Row::new(),
        )
        .await?;
    let mut types = out.strings("relationshipType");
    types.sort();
    Ok(types)
}

/// Total node count.
pub async fn count_nodes(backend: &dyn GraphBackend) -> Result<i64, BackendError> {
    let out = backend
        .run_read("MATCH (n) RETURN count(n) AS cnt", &Row::new())
        .await?;
    Ok(first_i64(&out.rows, "cnt"))
}

/// Total relationship count.
pub async fn count_relationships(backend: &dyn GraphBackend) -> Result<i64, BackendError> {
    let out = backend
        .run_read("MATCH ()-[r]->() RETURN count(r) AS cnt", &Row::new())
        .await?;
    Ok(first_i64(&out.rows, "cnt"))
}

/// Node count for one label (served from the count store).
pub async fn count_label(backend: &dyn GraphBackend, label: &str) -> Result<i64, BackendError> {
    let cypher = format!(
        "MATCH (n:{}) RETURN count(n) AS cnt",
        escape_identifier(label)
    );
    let out = backend.run_read(&cypher, &Row::new()).await?;
    Ok(first_i64(&out.rows, "cnt"))
}

/// Relationship count for one type (served from the count store).
pub async fn count_relationship(
    backend: &dyn GraphBackend,
    rel_type: &str,
) -> Result<i64, BackendError> {
    let cypher = format!(
        "MATCH ()-[r:{}]->() RETURN count(r) AS cnt",
        escape_identifier(rel_type)
    );
    let out = backend.run_read(&cypher, &Row::new()).await?;
    Ok(first_i64(&out.rows, "cnt"))
}

/// Property keys of one sampled node with the label, sorted.
pub async fn node_property_keys(
    backend: &dyn GraphBackend,
    label: &str,
) -> Result<Vec<String>, BackendError> {
    let cypher = format!(
        "MATCH (n:{}) RETURN keys(n) AS props LIMIT 1",
        escape_identifier(label)
    );
    let out = backend.run_read(&cypher, &Row::new()).await?;
    Ok(first_string_list(&out.rows, "props"))
}

/// Property keys of one sampled relationship of the type, sorted.
pub async fn relationship_property_keys(
    backend: &dyn GraphBackend,
    rel_type: &str,
) -> Result<Vec<String>, BackendError> {
    let cypher = format!(
        "MATCH ()-[r:{}]->() RETURN keys(r) AS props LIMIT 1",
        escape_identifier(rel_type)
    );
    let out = backend.run_read(&cypher, &Row::new()).await?;
    Ok(first_string_list(&out.rows, "props"))
}

/// Up to `limit` non-null `id` values for nodes with the label.
pub async fn sample_ids(
    backend: &dyn GraphBackend,
    label: &str,
    limit: usize,
) -> Result<Vec<String>, BackendError> {
    let cypher = format!(
        "MATCH (n:{}) WHERE n.id IS NOT NULL RETURN n.id AS id LIMIT $limit",
        escape_identifier(label)
    );
    let out = backend
        .run_read(&cypher, &params(json!({ "limit": limit })))
        .await?;
    Ok(out.strings("id"))
}

/// Label-level triples from `db.schema.visualization()`.
pub async fn schema_triples(backend: &dyn GraphBackend) -> Result<Vec<SchemaTriple>, BackendError> {
    let cypher = "CALL db.schema.visualization() YIELD relationships \
                  UNWIND relationships AS r \
                  RETURN startNode(r).name AS source, type(r) AS rel_type, endNode(r).name AS target";
    let out = backend.run_read(cypher, &Row::new()).await?;
    let mut triples: Vec<SchemaTriple> = out
        .rows
        .iter()
        .filter_map(|row| {
            Some(SchemaTriple {
                source: row.get("source")?.as_str()?.to_string(),
                rel_type: row.get("rel_type")?.as_str()?.to_string(),
                target: row.get("target")?.as_str()?.to_string(),
            })
        })
        .collect();
    triples.sort_by(|a, b| {
        (&a.rel_type, &a.source, &a.target).cmp(&(&b.rel_type, &b.source, &b.target))
    });
    triples.dedup();
    Ok(triples)
}

// ── Entity Lookups ───────────────────────────────────────────────

/// Identifiers linked to `source_id` by an `xref` edge in either direction.
pub async fn xrefs(
    backend: &dyn GraphBackend,
    source_id: &str,
    limit: usize,
) -> Result<Vec<String>, BackendError> {
    let cypher = "MATCH (source:BioEntity {id: $source_id})-[:xref]-(target:BioEntity) \
                  RETURN target.id AS target_id LIMIT $limit";
    let out = backend
        .run_read(
            cypher,
            &params(json!({ "source_id": source_id, "limit": limit })),
        )
        .await?;
    Ok(out.strings("target_id"))
}

/// Batch-resolve display names for entity ids. Ids without a node or a
/// name are absent from the map.
pub async fn entity_names(
    backend: &dyn GraphBackend,
    ids: &[String],
) -> Result<HashMap<String, String>, BackendError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let cypher = "MATCH (n:BioEntity) WHERE n.id IN $ids AND n.name IS NOT NULL \
                  RETURN n.id AS id, n.name AS name";
    let out = backend
        .run_read(cypher, &params(json!({ "ids": ids })))
        .await?;
    Ok(out
        .rows
        .iter()
        .filter_map(|row| {
            let id = row.get("id")?.as_str()?;
            let name = row.get("name")?.as_str()?;
            Some((id.to_string(), name.to_string()))
        })
        .collect())
}

fn name_hits(rows: &[Row]) -> Vec<NameHit> {
    rows.iter()
        .filter_map(|row| {
            Some(NameHit {
                id: row.get("id")?.as_str()?.to_string(),
                name: row
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                score: row.get("score").and_then(Value::as_f64).unwrap_or(0.0),
            })
        })
        .collect()
}

/// Full-text search over entity names. Scores are the raw Lucene scores.
pub async fn fulltext_names(
    backend: &dyn GraphBackend,
    index: &str,
    term: &str,
    limit: usize,
) -> Result<Vec<NameHit>, BackendError> {
    let cypher = "CALL db.index.fulltext.queryNodes($index, $term) YIELD node, score \
                  WHERE node.id IS NOT NULL \
                  RETURN node.id AS id, node.name AS name, score \
                  ORDER BY score DESC LIMIT $limit";
    let out = backend
        .run_read(
            cypher,
            &params(json!({ "index": index, "term": term, "limit": limit })),
        )
        .await?;
    Ok(name_hits(&out.rows))
}

/// Case-insensitive exact name match, each hit scored 1.0.
pub async fn exact_names(
    backend: &dyn GraphBackend,
    term: &str,
    limit: usize,
) -> Result<Vec<NameHit>, BackendError> {
    let cypher = "MATCH (n:BioEntity) WHERE toLower(n.name) = toLower($term) \
                  RETURN n.id AS id, n.name AS name, 1.0 AS score LIMIT $limit";
    let out = backend
        .run_read(cypher, &params(json!({ "term": term, "limit": limit })))
        .await?;
    Ok(name_hits(&out.rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::QueryOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned rows and records every query it receives.
    struct Replay {
        rows: Vec<Row>,
        seen: Mutex<Vec<(String, Row)>>,
    }

    impl Replay {
        fn new(rows: Vec<Value>) -> Self {
            Self {
                rows: rows
                    .into_iter()
                    .filter_map(|v| v.as_object().cloned())
                    .collect(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GraphBackend for Replay {
        async fn run_read(&self, cypher: &str, params: &Row) -> Result<QueryOutput, BackendError> {
            self.seen
                .lock()
                .unwrap()
                .push((cypher.to_string(), params.clone()));
            Ok(QueryOutput::new(self.rows.clone()))
        }
    }

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("BioEntity"), "`BioEntity`");
        assert_eq!(escape_identifier("odd`name"), "`odd``name`");
    }

    #[tokio::test]
    async fn test_labels_sorted() {
        let backend = Replay::new(vec![json!({"label": "Publication"}), json!({"label": "BioEntity"})]);
        let labels = labels(&backend).await.unwrap();
        assert_eq!(labels, vec!["BioEntity", "Publication"]);
    }

    #[tokio::test]
    async fn test_count_uses_escaped_label() {
        let backend = Replay::new(vec![json!({"cnt": 42})]);
        assert_eq!(count_label(&backend, "BioEntity").await.unwrap(), 42);
        let seen = backend.seen.lock().unwrap();
        assert!(seen[0].0.contains("(n:`BioEntity`)"));
    }

    #[tokio::test]
    async fn test_property_keys_sorted() {
        let backend = Replay::new(vec![json!({"props": ["name", "id", "obsolete"]})]);
        let keys = node_property_keys(&backend, "BioEntity").await.unwrap();
        assert_eq!(keys, vec!["id", "name", "obsolete"]);
    }

    #[tokio::test]
    async fn test_schema_triples_dedup() {
        let row = json!({"source": "BioEntity", "rel_type": "xref", "target": "BioEntity"});
        let backend = Replay::new(vec![row.clone(), row]);
        let triples = schema_triples(&backend).await.unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].rel_type, "xref");
    }

    #[tokio::test]
    async fn test_xrefs_binds_source_id() {
        let backend = Replay::new(vec![json!({"target_id": "doid:14330"})]);
        let ids = xrefs(&backend, "mesh:D010300", 20).await.unwrap();
        assert_eq!(ids, vec!["doid:14330"]);
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].1["source_id"], json!("mesh:D010300"));
        assert_eq!(seen[0].1["limit"], json!(20));
    }

    #[tokio::test]
    async fn test_entity_names_skips_empty_batch() {
        let backend = Replay::new(vec![]);
        assert!(entity_names(&backend, &[]).await.unwrap().is_empty());
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fulltext_hits() {
        let backend = Replay::new(vec![
            json!({"id": "hgnc:6407", "name": "LRRK2", "score": 7.5}),
            json!({"id": null, "name": "orphan", "score": 1.0}),
        ]);
        let hits = fulltext_names(&backend, "entity_names", "LRRK2", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "hgnc:6407");
        assert!((hits[0].score - 7.5).abs() < f64::EPSILON);
    }
}
