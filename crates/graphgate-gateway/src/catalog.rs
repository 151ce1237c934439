//! Cypher-backed endpoints and the catalog that registers them.
//!
//! The built-in catalog covers the core gene, disease, pathway and drug
//! traversals; `[[endpoints]]` tables from the config file are appended.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use graphgate_core::config::EndpointSettings;
use graphgate_core::{Curie, EntityType};
use graphgate_query::budget::MAX_PAGE_SIZE;
use graphgate_query::normalize::normalize_str;
use graphgate_query::types::MAX_RESULTS_CEILING;
use graphgate_query::validate::forbidden_keywords;
use graphgate_query::ExecuteRequest;

use crate::endpoint::{
    DeclaredEdge, Endpoint, EndpointCatalog, EndpointContext, EndpointProvider,
    FunctionDescriptor, ParamKind, ParamSpec,
};
use crate::error::EndpointError;

// ── Cypher Endpoint ──────────────────────────────────────────────

/// An endpoint whose body is a parameterised read query run through the
/// query executor, so it gets the same validation and ceilings as caller
/// queries.
pub struct CypherEndpoint {
    descriptor: FunctionDescriptor,
    cypher: String,
}

impl CypherEndpoint {
    pub fn new(descriptor: FunctionDescriptor, cypher: impl Into<String>) -> Self {
        Self {
            descriptor,
            cypher: cypher.into(),
        }
    }

    pub fn cypher(&self) -> &str {
        &self.cypher
    }

    /// Build from a config `[[endpoints]]` table.
    pub fn from_settings(settings: &EndpointSettings) -> Result<Self, EndpointError> {
        let mut descriptor =
            FunctionDescriptor::new(&settings.name, &settings.category, &settings.description);
        for param in &settings.params {
            let kind = ParamKind::from_config(&param.kind).ok_or_else(|| {
                EndpointError::InvalidArgument {
                    name: param.name.clone(),
                    reason: format!("unknown parameter kind '{}'", param.kind),
                }
            })?;
            let mut spec = match kind {
                ParamKind::EntityPair => ParamSpec::entity(&param.name),
                ParamKind::Scalar => ParamSpec::scalar("Any"),
                ParamKind::List => ParamSpec::list("Any"),
            };
            spec.required = param.required;
            spec.example = param.example.clone();
            descriptor = descriptor.param(&param.name, spec);
        }
        Ok(Self::new(descriptor, settings.cypher.clone()))
    }

    fn bind(&self, args: &Map<String, Value>) -> Result<Map<String, Value>, EndpointError> {
        let mut bound = Map::new();
        for (name, spec) in &self.descriptor.parameters {
            let value = match args.get(name) {
                Some(v) if !v.is_null() => v,
                _ => match &spec.default {
                    Some(default) => default,
                    None if spec.required => {
                        return Err(EndpointError::MissingArgument(name.clone()))
                    }
                    None => continue,
                },
            };
            let value = match spec.kind {
                ParamKind::EntityPair => Value::String(entity_curie(name, value)?),
                ParamKind::List => match value {
                    Value::Array(items) => Value::Array(
                        items
                            .iter()
                            .map(|item| match item {
                                Value::Array(_) => entity_curie(name, item).map(Value::String),
                                other => Ok(other.clone()),
                            })
                            .collect::<Result<_, _>>()?,
                    ),
                    _ => {
                        return Err(EndpointError::InvalidArgument {
                            name: name.clone(),
                            reason: "expected a list".to_string(),
                        })
                    }
                },
                ParamKind::Scalar => value.clone(),
            };
            bound.insert(name.clone(), value);
        }
        Ok(bound)
    }
}

/// Bind an entity argument as the graph's canonical `prefix:id` string.
fn entity_curie(name: &str, value: &Value) -> Result<String, EndpointError> {
    let invalid = |reason: &str| EndpointError::InvalidArgument {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    match value {
        Value::Array(pair) if pair.len() == 2 => {
            let ns = pair[0].as_str().ok_or_else(|| invalid("namespace must be a string"))?;
            let id = match &pair[1] {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return Err(invalid("identifier must be a string")),
            };
            Ok(Curie::from_pair(ns, &id).canonical().to_string())
        }
        Value::String(s) if Curie::parse(s).is_some() => Ok(normalize_str(s)),
        _ => Err(invalid("expected [namespace, identifier]")),
    }
}

#[async_trait]
impl Endpoint for CypherEndpoint {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    async fn invoke(
        &self,
        ctx: &EndpointContext,
        args: &Map<String, Value>,
    ) -> Result<Value, EndpointError> {
        let mut request = ExecuteRequest::new(self.cypher.clone()).with_parameters(self.bind(args)?);
        request.max_results = MAX_RESULTS_CEILING;
        request.limit = Some(MAX_PAGE_SIZE);
        let result = ctx.executor.execute(ctx.backend.as_ref(), request).await?;
        if result.metadata.truncated {
            tracing::warn!(
                endpoint = %self.descriptor.name,
                cap = MAX_RESULTS_CEILING,
                "Endpoint result truncated at the backend ceiling"
            );
        }
        Ok(Value::Array(result.results))
    }

    fn is_callable(&self) -> bool {
        !self.cypher.trim().is_empty()
    }
}

// ── Built-in Catalog ─────────────────────────────────────────────

fn limit_param() -> ParamSpec {
    ParamSpec::scalar("int").optional(json!(1000))
}

fn builtin_endpoints() -> Vec<CypherEndpoint> {
    let gene = || ParamSpec::entity("gene").example(json!(["HGNC", "6407"]));
    let disease = || ParamSpec::entity("disease").example(json!(["MESH", "D010300"]));
    let pathway = || ParamSpec::entity("pathway").example(json!(["REACTOME", "R-HSA-1643685"]));
    let drug = || ParamSpec::entity("drug").example(json!(["CHEBI", "45783"]));
    let target = || ParamSpec::entity("target").example(json!(["HGNC", "6407"]));

    vec![
        CypherEndpoint::new(
            FunctionDescriptor::new(
                "get_diseases_for_gene",
                "gene-disease",
                "Diseases associated with a gene.",
            )
            .param("gene", gene())
            .param("limit", limit_param()),
            "MATCH (g:BioEntity {id: $gene})-[:gene_disease_association]->(d:BioEntity) \
             RETURN DISTINCT d.id AS id, d.name AS name LIMIT $limit",
        ),
        CypherEndpoint::new(
            FunctionDescriptor::new(
                "get_genes_for_disease",
                "gene-disease",
                "Genes associated with a disease.",
            )
            .param("disease", disease())
            .param("limit", limit_param()),
            "MATCH (g:BioEntity)-[:gene_disease_association]->(d:BioEntity {id: $disease}) \
             RETURN DISTINCT g.id AS id, g.name AS name LIMIT $limit",
        ),
        CypherEndpoint::new(
            FunctionDescriptor::new(
                "get_pathways_for_gene",
                "pathway",
                "Pathways that contain a gene.",
            )
            .param("gene", gene())
            .param("limit", limit_param()),
            "MATCH (p:BioEntity)-[:haspart]->(g:BioEntity {id: $gene}) \
             RETURN DISTINCT p.id AS id, p.name AS name LIMIT $limit",
        ),
        CypherEndpoint::new(
            FunctionDescriptor::new(
                "get_genes_in_pathway",
                "pathway",
                "Member genes of a pathway.",
            )
            .param("pathway", pathway())
            .param("limit", limit_param()),
            "MATCH (p:BioEntity {id: $pathway})-[:haspart]->(g:BioEntity) \
             RETURN DISTINCT g.id AS id, g.name AS name LIMIT $limit",
        ),
        CypherEndpoint::new(
            FunctionDescriptor::new(
                "get_drugs_for_target",
                "drug",
                "Drugs with a recorded interaction targeting a gene product.",
            )
            .param("target", target())
            .param("limit", limit_param()),
            "MATCH (d:BioEntity)-[:indra_rel]->(t:BioEntity {id: $target}) \
             WHERE d.id STARTS WITH 'chebi:' \
             RETURN DISTINCT d.id AS id, d.name AS name LIMIT $limit",
        ),
        CypherEndpoint::new(
            FunctionDescriptor::new(
                "get_targets_for_drug",
                "drug",
                "Gene targets of a drug.",
            )
            .param("drug", drug())
            .param("limit", limit_param()),
            "MATCH (d:BioEntity {id: $drug})-[:indra_rel]->(t:BioEntity) \
             WHERE t.id STARTS WITH 'hgnc:' \
             WITH DISTINCT t.id AS target_id \
             RETURN split(target_id, ':')[0] AS db_ns, split(target_id, ':')[1] AS db_id \
             LIMIT $limit",
        ),
        CypherEndpoint::new(
            FunctionDescriptor::new(
                "is_gene_in_pathway",
                "pathway",
                "Whether a gene is a member of a pathway.",
            )
            .param("gene", gene())
            .param("pathway", pathway()),
            "OPTIONAL MATCH (p:BioEntity {id: $pathway})-[r:haspart]->(g:BioEntity {id: $gene}) \
             RETURN count(r) > 0 AS result",
        ),
        CypherEndpoint::new(
            FunctionDescriptor::new(
                "has_gene_disease_association",
                "gene-disease",
                "Whether a gene and a disease are associated.",
            )
            .param("gene", gene())
            .param("disease", disease()),
            "OPTIONAL MATCH (g:BioEntity {id: $gene})-[r:gene_disease_association]->(d:BioEntity {id: $disease}) \
             RETURN count(r) > 0 AS result",
        ),
    ]
}

/// Edges whose functions do not follow the naming patterns, or whose
/// inferred types differ from the identifiers they actually accept.
fn builtin_edges() -> Vec<DeclaredEdge> {
    vec![
        DeclaredEdge::new(EntityType::Pathway, EntityType::Gene, "get_genes_in_pathway"),
        DeclaredEdge::new(EntityType::Gene, EntityType::Drug, "get_drugs_for_target"),
        DeclaredEdge::new(EntityType::Drug, EntityType::Gene, "get_targets_for_drug"),
    ]
}

/// Built-in endpoints plus any configured ones.
pub struct CatalogProvider {
    extra: Vec<EndpointSettings>,
}

impl CatalogProvider {
    pub fn new(extra: Vec<EndpointSettings>) -> Self {
        Self { extra }
    }

    pub fn builtin() -> Self {
        Self::new(Vec::new())
    }
}

impl EndpointProvider for CatalogProvider {
    fn catalog(&self) -> Result<EndpointCatalog, EndpointError> {
        let mut endpoints: Vec<Arc<dyn Endpoint>> = builtin_endpoints()
            .into_iter()
            .map(|e| Arc::new(e) as Arc<dyn Endpoint>)
            .collect();

        for settings in &self.extra {
            let forbidden = forbidden_keywords(&settings.cypher);
            if !forbidden.is_empty() {
                tracing::warn!(
                    endpoint = %settings.name,
                    keywords = %forbidden.join(", "),
                    "Skipping configured endpoint with write operations"
                );
                continue;
            }
            match CypherEndpoint::from_settings(settings) {
                Ok(endpoint) => endpoints.push(Arc::new(endpoint)),
                Err(e) => {
                    tracing::warn!(endpoint = %settings.name, error = %e, "Skipping configured endpoint");
                }
            }
        }

        Ok(EndpointCatalog {
            endpoints,
            declared_edges: builtin_edges(),
        })
    }
}
