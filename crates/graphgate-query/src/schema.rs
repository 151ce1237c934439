//! Progressive schema discovery.
//!
//! Five nested detail levels let a caller start with type names and ask
//! for properties, samples, endpoints, and traversal patterns only when it
//! needs them. Every response reports its own cost as `token_estimate`.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use graphgate_graph::queries::{self, SchemaTriple};
use graphgate_graph::GraphBackend;

use crate::budget::{HeuristicEstimator, TokenEstimator};
use crate::error::SchemaError;

const MAX_LABEL_DETAILS: usize = 30;
const MAX_REL_DETAILS: usize = 20;
const SAMPLE_IDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Summary,
    EntityTypes,
    RelationshipTypes,
    Patterns,
    Full,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::EntityTypes => "entity_types",
            Self::RelationshipTypes => "relationship_types",
            Self::Patterns => "patterns",
            Self::Full => "full",
        }
    }

    fn wants_entities(self) -> bool {
        matches!(self, Self::EntityTypes | Self::Full)
    }

    fn wants_relationships(self) -> bool {
        matches!(self, Self::RelationshipTypes | Self::Patterns | Self::Full)
    }

    fn wants_patterns(self) -> bool {
        matches!(self, Self::Patterns | Self::Full)
    }
}

impl FromStr for DetailLevel {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(Self::Summary),
            "entity_types" => Ok(Self::EntityTypes),
            "relationship_types" => Ok(Self::RelationshipTypes),
            "patterns" => Ok(Self::Patterns),
            "full" => Ok(Self::Full),
            other => Err(SchemaError::InvalidDetailLevel(other.to_string())),
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDetail {
    pub label: String,
    /// Exact count, only when a single label was requested.
    pub count: Option<i64>,
    pub properties: Vec<String>,
    pub sample_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDetail {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub count: Option<i64>,
    pub properties: Vec<String>,
    pub source_types: Vec<String>,
    pub target_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipPattern {
    pub pattern: String,
    pub description: String,
    pub example_query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub detail_level: DetailLevel,
    pub entity_types: Vec<String>,
    pub relationship_types: Vec<String>,
    pub total_entities: Option<i64>,
    pub total_relationships: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_details: Option<Vec<EntityDetail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_details: Option<Vec<RelationshipDetail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_patterns: Option<Vec<RelationshipPattern>>,
    pub execution_time_ms: u64,
    pub token_estimate: usize,
}

/// Describe the graph at `level`. Sub-query failures are logged and
/// degrade to empty data; a missing type yields a zero-count record.
pub async fn describe(
    backend: &dyn GraphBackend,
    level: DetailLevel,
    entity_type: Option<&str>,
    relationship_type: Option<&str>,
) -> SchemaDescription {
    let started = Instant::now();

    let entity_types = queries::labels(backend).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to list labels");
        Vec::new()
    });
    let relationship_types = queries::relationship_types(backend)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to list relationship types");
            Vec::new()
        });
    let total_entities = queries::count_nodes(backend)
        .await
        .map_err(|e| tracing::warn!(error = %e, "Failed to count nodes"))
        .ok();
    let total_relationships = queries::count_relationships(backend)
        .await
        .map_err(|e| tracing::warn!(error = %e, "Failed to count relationships"))
        .ok();

    let mut description = SchemaDescription {
        detail_level: level,
        entity_types,
        relationship_types,
        total_entities,
        total_relationships,
        entity_details: None,
        relationship_details: None,
        relationship_patterns: None,
        execution_time_ms: 0,
        token_estimate: 0,
    };

    if level.wants_entities() {
        let labels = selected(&description.entity_types, entity_type, MAX_LABEL_DETAILS);
        let mut details = Vec::with_capacity(labels.len());
        for label in labels {
            details.push(entity_detail(backend, &label, entity_type.is_some()).await);
        }
        description.entity_details = Some(details);
    }

    if level.wants_relationships() {
        let triples = queries::schema_triples(backend).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read schema visualization");
            Vec::new()
        });
        let rel_types = selected(
            &description.relationship_types,
            relationship_type,
            MAX_REL_DETAILS,
        );

        let mut details = Vec::with_capacity(rel_types.len());
        for rel_type in &rel_types {
            details.push(
                relationship_detail(backend, rel_type, &triples, relationship_type.is_some())
                    .await,
            );
        }
        description.relationship_details = Some(details);

        if level.wants_patterns() {
            description.relationship_patterns = Some(
                rel_types
                    .iter()
                    .flat_map(|rel_type| patterns_for(rel_type, &triples))
                    .collect(),
            );
        }
    }

    description.execution_time_ms = started.elapsed().as_millis() as u64;
    description.token_estimate = match serde_json::to_value(&description) {
        Ok(v) => HeuristicEstimator::default().estimate(&v),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to estimate schema tokens");
            0
        }
    };
    tracing::debug!(
        level = %level,
        tokens = description.token_estimate,
        ms = description.execution_time_ms,
        "Described schema"
    );
    description
}

fn selected(all: &[String], filter: Option<&str>, cap: usize) -> Vec<String> {
    match filter {
        Some(name) => vec![name.to_string()],
        None => all.iter().take(cap).cloned().collect(),
    }
}

async fn entity_detail(backend: &dyn GraphBackend, label: &str, with_count: bool) -> EntityDetail {
    let count = if with_count {
        Some(queries::count_label(backend, label).await.unwrap_or_else(|e| {
            tracing::warn!(label, error = %e, "Failed to count label");
            0
        }))
    } else {
        None
    };
    let properties = queries::node_property_keys(backend, label)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(label, error = %e, "Failed to read node properties");
            Vec::new()
        });
    let sample_ids = queries::sample_ids(backend, label, SAMPLE_IDS)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(label, error = %e, "Failed to sample entity ids");
            Vec::new()
        });
    EntityDetail {
        label: label.to_string(),
        count,
        properties,
        sample_ids,
    }
}

async fn relationship_detail(
    backend: &dyn GraphBackend,
    rel_type: &str,
    triples: &[SchemaTriple],
    with_count: bool,
) -> RelationshipDetail {
    let count = if with_count {
        Some(
            queries::count_relationship(backend, rel_type)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(rel_type, error = %e, "Failed to count relationship type");
                    0
                }),
        )
    } else {
        None
    };
    let properties = queries::relationship_property_keys(backend, rel_type)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(rel_type, error = %e, "Failed to read relationship properties");
            Vec::new()
        });

    let mut source_types: Vec<String> = Vec::new();
    let mut target_types: Vec<String> = Vec::new();
    for t in triples.iter().filter(|t| t.rel_type == rel_type) {
        if !source_types.contains(&t.source) {
            source_types.push(t.source.clone());
        }
        if !target_types.contains(&t.target) {
            target_types.push(t.target.clone());
        }
    }
    source_types.sort();
    target_types.sort();

    RelationshipDetail {
        rel_type: rel_type.to_string(),
        count,
        properties,
        source_types,
        target_types,
    }
}

fn patterns_for(rel_type: &str, triples: &[SchemaTriple]) -> Vec<RelationshipPattern> {
    triples
        .iter()
        .filter(|t| t.rel_type == rel_type)
        .map(|t| {
            let (example_query, description) = example_query(&t.source, &t.rel_type, &t.target);
            RelationshipPattern {
                pattern: format!("({})-[:{}]->({})", t.source, t.rel_type, t.target),
                description,
                example_query,
            }
        })
        .collect()
}

/// A ready-to-run query and a one-line description for a pattern.
fn example_query(source: &str, rel_type: &str, target: &str) -> (String, String) {
    let s = queries::escape_identifier(source);
    let r = queries::escape_identifier(rel_type);
    let t = queries::escape_identifier(target);

    if rel_type == "gene_disease_association" {
        (
            format!(
                "MATCH (g:{s})-[r:{r}]->(d:{t})\n\
                 WHERE g.id STARTS WITH 'hgnc:' AND d.id STARTS WITH 'mesh:'\n\
                 RETURN g.id AS gene_id, g.name AS gene_name,\n       \
                 d.id AS disease_id, d.name AS disease_name\n\
                 LIMIT 10"
            ),
            "Genes associated with diseases".to_string(),
        )
    } else if rel_type.to_lowercase().contains("pathway") {
        (
            format!(
                "MATCH (g:{s})-[r:{r}]->(p:{t})\n\
                 RETURN g.id AS gene_id, g.name AS gene_name,\n       \
                 p.id AS pathway_id, p.name AS pathway_name\n\
                 LIMIT 10"
            ),
            "Genes in pathways".to_string(),
        )
    } else if source.to_lowercase().contains("drug") || target.to_lowercase().contains("drug") {
        (
            format!(
                "MATCH (d:{s})-[r:{r}]->(t:{t})\n\
                 RETURN d.id AS drug_id, d.name AS drug_name,\n       \
                 t.id AS target_id, t.name AS target_name\n\
                 LIMIT 10"
            ),
            "Drug-target relationships".to_string(),
        )
    } else {
        (
            format!(
                "MATCH (a:{s})-[r:{r}]->(b:{t})\n\
                 RETURN a.id AS source_id, a.name AS source_name,\n       \
                 b.id AS target_id, b.name AS target_name\n\
                 LIMIT 10"
            ),
            format!("{source} connected to {target} via {rel_type}"),
        )
    }
}
