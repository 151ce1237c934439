//! The tool surface: every operation returns a JSON payload, with failures
//! reported as `{"error": ..., "hint": ...}` bodies rather than raised.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use graphgate_core::config::{GatewayConfig, GatewaySettings};
use graphgate_core::{Curie, EntityType};
use graphgate_graph::{queries, GraphBackend, GraphConfig, LazyGraph};
use graphgate_query::normalize::normalize_parameters;
use graphgate_query::{
    describe, validate, Budgeter, DetailLevel, ExecuteRequest, PageInfo, PaginationConfig,
    QueryError, QueryExecutor,
};

use crate::catalog::CatalogProvider;
use crate::edges::EdgeOrigin;
use crate::endpoint::{Endpoint, EndpointContext, EndpointProvider, ParamKind, ParamSpec};
use crate::enrich::{self, infer_result_type, DisclosureLevel};
use crate::error::{EndpointError, GatewayError, GroundingError, ToolError};
use crate::grounding::{
    lookup_xrefs, GraphNameOracle, GroundingCandidate, GroundingOracle, GroundingService,
    MIN_CONFIDENCE,
};
use crate::registry::{RegistryCache, RegistrySnapshot};

/// Upper bound on a single schema discovery call.
pub const SCHEMA_TIMEOUT: Duration = Duration::from_secs(60);

const GROUNDING_LIMIT: usize = 10;
const SUGGESTION_SAMPLE: usize = 10;
const FUNCTIONS_PER_TARGET: usize = 3;
const AVAILABLE_LISTED: usize = 20;

const HINT_EXPLICIT: &str = "Provide explicit CURIE: [namespace, id]";
const HINT_CHOOSE: &str = "Choose one and provide as [namespace, id]";

// ── Requests ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct GroundRequest {
    pub term: String,
    #[serde(default)]
    pub param_type: Option<String>,
    #[serde(default)]
    pub organism: Option<String>,
    #[serde(default = "default_ground_limit")]
    pub limit: usize,
}

fn default_ground_limit() -> usize {
    GROUNDING_LIMIT
}

impl GroundRequest {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            param_type: None,
            organism: None,
            limit: GROUNDING_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallRequest {
    pub endpoint: String,
    /// A JSON object, or a string holding one.
    #[serde(default)]
    pub kwargs: Value,
    #[serde(default = "default_true")]
    pub auto_ground: bool,
    #[serde(default)]
    pub disclosure_level: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl CallRequest {
    pub fn new(endpoint: impl Into<String>, kwargs: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            kwargs,
            auto_ground: true,
            disclosure_level: None,
            offset: 0,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichRequest {
    pub results: Vec<Value>,
    #[serde(default = "default_disclosure")]
    pub disclosure_level: String,
    #[serde(default)]
    pub result_type: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_disclosure() -> String {
    DisclosureLevel::Standard.as_str().to_string()
}

// ── Responses ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FunctionHint {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    pub origin: EdgeOrigin,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reach {
    pub target: EntityType,
    pub functions: Vec<FunctionHint>,
    pub total_functions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigationOption {
    pub from: EntityType,
    pub can_reach: Vec<Reach>,
}

#[derive(Debug, Clone, Serialize)]
struct Suggestions<'a> {
    source_entities: Vec<EntityType>,
    navigation_options: Vec<NavigationOption>,
    total_sources: usize,
    intent: Option<&'a str>,
    hint: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct NavigationEdge {
    from: EntityType,
    to: EntityType,
    functions: Vec<FunctionHint>,
    count: usize,
}

#[derive(Debug, Clone, Serialize)]
struct NavigationSchema {
    entity_types: Vec<EntityType>,
    edges: Vec<NavigationEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct XrefAttempt {
    pub namespace: String,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct XrefUsed {
    pub namespace: String,
    pub identifier: String,
    pub original_namespace: String,
    pub original_identifier: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroundingApplied {
    pub input: String,
    pub grounded_to: GroundingCandidate,
    pub method: &'static str,
    pub param_filter: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub xrefs_tried: Vec<XrefAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xref_used: Option<XrefUsed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestedNext {
    pub from: EntityType,
    pub to: EntityType,
    pub functions: Vec<FunctionHint>,
}

#[derive(Debug, Clone, Serialize)]
struct EnrichmentInfo {
    disclosure_level: DisclosureLevel,
    token_estimate: usize,
}

#[derive(Debug, Clone, Serialize)]
struct CallResponse {
    endpoint: String,
    parameters: Map<String, Value>,
    results: Value,
    result_count: usize,
    pagination: PageInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    continuation_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggested_next: Option<Vec<SuggestedNext>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    grounding_applied: BTreeMap<String, GroundingApplied>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enrichment: Option<EnrichmentInfo>,
}

fn payload<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| ToolError::new(format!("Serialization failed: {e}")).into_value())
}

// ── Gateway ──────────────────────────────────────────────────────

pub struct Gateway {
    backend: Arc<dyn GraphBackend>,
    registry: RegistryCache,
    grounding: GroundingService,
    executor: QueryExecutor,
    endpoint_ctx: EndpointContext,
    settings: GatewaySettings,
}

impl Gateway {
    pub fn new(
        backend: Arc<dyn GraphBackend>,
        provider: Arc<dyn EndpointProvider>,
        oracle: Arc<dyn GroundingOracle>,
        settings: GatewaySettings,
    ) -> Self {
        let budgeter = Budgeter::new(PaginationConfig {
            max_tokens: settings.max_tokens,
            default_page_size: settings.default_page_size,
            ..PaginationConfig::default()
        });
        Self {
            endpoint_ctx: EndpointContext::new(Arc::clone(&backend)),
            backend,
            registry: RegistryCache::new(provider),
            grounding: GroundingService::new(oracle),
            executor: QueryExecutor::new(budgeter),
            settings,
        }
    }

    /// Wire up the production collaborators: a lazily connected Neo4j
    /// backend, the graph's name index as grounding oracle, and the
    /// built-in plus configured endpoints.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let backend: Arc<dyn GraphBackend> =
            Arc::new(LazyGraph::new(GraphConfig::from(&config.neo4j)));
        let oracle = Arc::new(GraphNameOracle::new(
            Arc::clone(&backend),
            config.gateway.fulltext_index.clone(),
        ));
        let provider = Arc::new(CatalogProvider::new(config.endpoints.clone()));
        Self::new(backend, provider, oracle, config.gateway.clone())
    }

    pub fn registry(&self) -> &RegistryCache {
        &self.registry
    }

    // ── Schema and Queries ───────────────────────────────────────

    /// Progressive schema discovery, bounded by [`SCHEMA_TIMEOUT`].
    pub async fn get_graph_schema(
        &self,
        detail_level: &str,
        entity_type: Option<&str>,
        relationship_type: Option<&str>,
    ) -> Value {
        let level: DetailLevel = match detail_level.parse() {
            Ok(level) => level,
            Err(e) => {
                return ToolError::new(GatewayError::InvalidDetailLevel(e).to_string())
                    .hint("Start with detail_level=summary and drill down")
                    .into_value()
            }
        };
        let discovery = describe(self.backend.as_ref(), level, entity_type, relationship_type);
        match tokio::time::timeout(SCHEMA_TIMEOUT, discovery).await {
            Ok(description) => payload(&description),
            Err(_) => {
                tracing::warn!(detail_level = %level, "Schema discovery timed out");
                ToolError::new(format!(
                    "Schema discovery exceeded {}s",
                    SCHEMA_TIMEOUT.as_secs()
                ))
                .hint("Use a lower detail_level or filter by entity_type")
                .into_value()
            }
        }
    }

    /// Build an execution request from caller JSON, filling unset ceilings
    /// from the gateway settings.
    pub fn parse_execute_request(&self, raw: Value) -> Result<ExecuteRequest, GatewayError> {
        let Value::Object(mut map) = raw else {
            return Err(GatewayError::InvalidArguments(
                "expected a JSON object".to_string(),
            ));
        };
        map.entry("timeout_ms")
            .or_insert_with(|| json!(self.settings.default_timeout_ms));
        map.entry("max_results")
            .or_insert_with(|| json!(self.settings.default_max_results));
        serde_json::from_value(Value::Object(map))
            .map_err(|e| GatewayError::InvalidArguments(e.to_string()))
    }

    pub async fn execute_cypher(&self, request: ExecuteRequest) -> Value {
        if request.explain {
            let plan = self
                .executor
                .explain(self.backend.as_ref(), &request.query, &request.parameters)
                .await;
            return payload(&plan);
        }

        let query = request.query.clone();
        match self.executor.execute(self.backend.as_ref(), request).await {
            Ok(result) => payload(&result),
            Err(QueryError::Validation { message, issues }) => {
                ToolError::new("Query validation failed")
                    .hint("Use validate_cypher to check queries before executing")
                    .with(
                        "validation",
                        json!({ "valid": false, "issues": issues, "summary": message }),
                    )
                    .with("error_type", "validation_error")
                    .into_value()
            }
            Err(e) => ToolError::new(e.to_string())
                .hint(e.hint())
                .with("error_type", e.kind())
                .with("query", query)
                .into_value(),
        }
    }

    pub fn validate_cypher(&self, query: &str, parameters: &Map<String, Value>) -> Value {
        payload(&validate(query, &normalize_parameters(parameters)))
    }

    pub fn enrich_results(&self, request: EnrichRequest) -> Value {
        let level: DisclosureLevel = match request.disclosure_level.parse() {
            Ok(level) => level,
            Err(e) => return invalid_disclosure(e),
        };
        payload(&enrich::enrich_results(
            self.executor.budgeter(),
            request.results,
            level,
            request.result_type.as_deref(),
            request.offset,
            request.limit,
        ))
    }

    // ── Registry ─────────────────────────────────────────────────

    pub fn registry_status(&self) -> Value {
        payload(&self.registry.status())
    }

    pub fn invalidate_registry(&self) -> Value {
        payload(&self.registry.invalidate())
    }

    pub fn get_navigation_schema(&self) -> Value {
        let snapshot = self.registry.get();
        let edges = snapshot
            .edge_map
            .iter()
            .map(|(from, to, functions)| NavigationEdge {
                from,
                to,
                functions: functions
                    .iter()
                    .map(|f| function_hint(&snapshot, &f.name, f.origin))
                    .collect(),
                count: functions.len(),
            })
            .collect();
        payload(&NavigationSchema {
            entity_types: snapshot.edge_map.entity_types().into_iter().collect(),
            edges,
        })
    }

    // ── Discovery ────────────────────────────────────────────────

    /// Ground a free-text term. Only oracle failures produce an `error`
    /// payload: ambiguous, low-confidence and unmatched terms come back as
    /// a normal outcome with `status` set and `top_match: null`, so callers
    /// must check `status` before using `top_match`.
    pub async fn ground_entity(&self, request: GroundRequest) -> Value {
        match self
            .grounding
            .ground(
                &request.term,
                request.param_type.as_deref(),
                request.organism.as_deref(),
                request.limit,
            )
            .await
        {
            Ok(outcome) => payload(&outcome),
            Err(e) => ToolError::new(format!("Grounding failed: {e}"))
                .with("query", request.term)
                .into_value(),
        }
    }

    /// Which functions lead from the given entities to other entity types.
    pub fn suggest_endpoints(
        &self,
        entity_ids: &[String],
        intent: Option<&str>,
        top_k: usize,
    ) -> Value {
        let snapshot = self.registry.get();
        if snapshot.is_empty() {
            return ToolError::new("Function registry not available")
                .with("navigation_options", json!([]))
                .into_value();
        }

        let sources = detect_types(entity_ids);
        if sources.is_empty() {
            return ToolError::new(GatewayError::UnknownEntityTypes.to_string())
                .hint("Ground natural language terms first using ground_entity")
                .with(
                    "entity_ids_received",
                    json!(entity_ids.iter().take(5).collect::<Vec<_>>()),
                )
                .into_value();
        }

        payload(&Suggestions {
            navigation_options: navigation_options(&snapshot, &sources, intent, top_k),
            total_sources: sources.len(),
            source_entities: sources.into_iter().collect(),
            intent,
            hint: "Use call_endpoint with one of the suggested functions. \
                   Pass entity as [namespace, id] tuple, e.g., gene=[\"HGNC\", \"6407\"]",
        })
    }

    // ── Invocation ───────────────────────────────────────────────

    /// Invoke a registered endpoint, grounding free-text entity arguments
    /// and retrying through cross-references when nothing comes back.
    pub async fn call_endpoint(&self, request: CallRequest) -> Value {
        let snapshot = self.registry.get();
        let Some(endpoint) = snapshot.endpoint(&request.endpoint).cloned() else {
            return ToolError::new(GatewayError::UnknownEndpoint(request.endpoint.clone()).to_string())
                .hint("Use suggest_endpoints to find available functions")
                .with(
                    "available",
                    json!(snapshot
                        .functions
                        .keys()
                        .take(AVAILABLE_LISTED)
                        .collect::<Vec<_>>()),
                )
                .into_value();
        };

        let mut kwargs = match parse_kwargs(&request.kwargs) {
            Ok(kwargs) => kwargs,
            Err(e) => {
                return ToolError::new(e.to_string())
                    .with("kwargs_received", request.kwargs.clone())
                    .into_value()
            }
        };

        let level = match request
            .disclosure_level
            .as_deref()
            .map(str::parse::<DisclosureLevel>)
            .transpose()
        {
            Ok(level) => level,
            Err(e) => return invalid_disclosure(e),
        };

        let descriptor = endpoint.descriptor().clone();
        let mut grounding_info: BTreeMap<String, GroundingApplied> = BTreeMap::new();

        for (name, spec) in &descriptor.parameters {
            if spec.kind != ParamKind::EntityPair {
                continue;
            }
            match kwargs.get(name).cloned() {
                Some(Value::Array(pair)) if pair.len() == 2 => {
                    if let Some(ns) = pair[0].as_str() {
                        kwargs.insert(name.clone(), json!([ns.to_lowercase(), pair[1]]));
                    }
                }
                Some(Value::String(text)) => {
                    if let Some(curie) = Curie::parse(&text).filter(|c| accepts(spec, c)) {
                        kwargs.insert(
                            name.clone(),
                            json!([curie.prefix.to_lowercase(), curie.local]),
                        );
                        continue;
                    }
                    if !request.auto_ground {
                        continue;
                    }
                    let param_type = spec.entity_type.as_deref().unwrap_or(name);
                    let resolved = match self
                        .grounding
                        .ground(&text, Some(param_type), None, GROUNDING_LIMIT)
                        .await
                    {
                        Ok(outcome) => outcome.resolve(),
                        Err(e) => Err(e),
                    };
                    let top = match resolved {
                        Ok(top) => top,
                        Err(e) => return grounding_failure(name, &text, e),
                    };
                    let (ns, id) = top.pair();
                    kwargs.insert(name.clone(), json!([ns, id]));
                    tracing::info!(parameter = %name, input = %text, grounded_to = %top.curie, "Auto-grounded argument");
                    grounding_info.insert(
                        name.clone(),
                        GroundingApplied {
                            input: text,
                            grounded_to: top,
                            method: "auto_ground",
                            param_filter: param_type.to_string(),
                            xrefs_tried: Vec::new(),
                            xref_used: None,
                        },
                    );
                }
                _ => {}
            }
        }

        let ctx = &self.endpoint_ctx;
        let mut processed = match endpoint.invoke(ctx, &kwargs).await {
            Ok(value) => value,
            Err(e) => return endpoint_failure(&request.endpoint, &e, &kwargs),
        };
        if let Value::Array(items) = &mut processed {
            resolve_names(self.backend.as_ref(), items).await;
        }

        // Cross-reference fallback, one candidate at a time.
        let empty = processed.as_array().is_some_and(Vec::is_empty);
        if empty && !grounding_info.is_empty() {
            'params: for (param, info) in grounding_info.iter_mut() {
                let Some((namespace, identifier)) = kwargs.get(param).and_then(as_pair) else {
                    continue;
                };
                let equivalents = lookup_xrefs(
                    self.backend.as_ref(),
                    &namespace,
                    &identifier,
                    Some(info.param_filter.as_str()),
                )
                .await;

                for (eq_ns, eq_id) in equivalents.into_iter().skip(1) {
                    let mut trial = kwargs.clone();
                    trial.insert(param.clone(), json!([eq_ns, eq_id]));
                    match endpoint.invoke(ctx, &trial).await {
                        Ok(mut result) => {
                            let count = result.as_array().map_or(1, Vec::len);
                            info.xrefs_tried.push(XrefAttempt {
                                namespace: eq_ns.clone(),
                                identifier: eq_id.clone(),
                                result_count: Some(count),
                                error: None,
                            });
                            if let Some(items) = result.as_array_mut().filter(|r| !r.is_empty()) {
                                tracing::info!(
                                    parameter = %param,
                                    xref = %format!("{eq_ns}:{eq_id}"),
                                    results = items.len(),
                                    "Found results through cross-reference"
                                );
                                resolve_names(self.backend.as_ref(), items).await;
                                processed = result;
                                kwargs = trial;
                                info.xref_used = Some(XrefUsed {
                                    namespace: eq_ns,
                                    identifier: eq_id,
                                    original_namespace: namespace,
                                    original_identifier: identifier,
                                });
                                break 'params;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(xref = %format!("{eq_ns}:{eq_id}"), error = %e, "Cross-reference attempt failed");
                            info.xrefs_tried.push(XrefAttempt {
                                namespace: eq_ns,
                                identifier: eq_id,
                                result_count: None,
                                error: Some(e.to_string()),
                            });
                        }
                    }
                }
            }
        }

        let budgeter = self.executor.budgeter();

        let mut enrichment = None;
        if let (Some(level), Value::Array(items)) = (level, &mut processed) {
            if level != DisclosureLevel::Minimal && !items.is_empty() {
                let result_type = infer_result_type(items);
                *items = enrich::enrich(std::mem::take(items), level, result_type);
                enrichment = Some(level);
            }
        }
        let enrichment = enrichment.map(|level| EnrichmentInfo {
            disclosure_level: level,
            token_estimate: budgeter.estimate(&processed),
        });

        let suggested_next = match &processed {
            Value::Array(items) => suggested_next(&snapshot, items),
            _ => None,
        };

        let (results, pagination) = match processed {
            Value::Array(items) => {
                let (page, info) = budgeter.paginate(items, request.offset, request.limit);
                (Value::Array(page), info)
            }
            other => {
                let estimate = budgeter.estimate(&other);
                (other, PageInfo::single(estimate))
            }
        };

        let continuation_hint = pagination
            .next_offset
            .filter(|_| pagination.has_more)
            .map(|next| {
                format!(
                    "Showing {} of {} results. To get more, call {} with offset={}",
                    pagination.returned, pagination.total, request.endpoint, next
                )
            });

        payload(&CallResponse {
            endpoint: request.endpoint,
            parameters: kwargs,
            results,
            result_count: pagination.returned,
            pagination,
            continuation_hint,
            suggested_next,
            grounding_applied: grounding_info,
            enrichment,
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn parse_kwargs(raw: &Value) -> Result<Map<String, Value>, GatewayError> {
    match raw {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map.clone()),
        Value::String(s) if s.trim().is_empty() => Ok(Map::new()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(GatewayError::InvalidArguments(
                "kwargs must be a JSON object".to_string(),
            )),
            Err(e) => Err(GatewayError::InvalidArguments(e.to_string())),
        },
        _ => Err(GatewayError::InvalidArguments(
            "kwargs must be a JSON object".to_string(),
        )),
    }
}

/// Whether a CURIE passed as a plain string is acceptable for `spec`
/// without grounding.
fn accepts(spec: &ParamSpec, curie: &Curie) -> bool {
    let prefix = curie.prefix.to_lowercase();
    match spec.namespace_filter() {
        Some(allowed) => allowed.contains(&prefix.as_str()),
        None => EntityType::from_prefix(&prefix).is_some(),
    }
}

fn as_pair(value: &Value) -> Option<(String, String)> {
    let pair = value.as_array().filter(|p| p.len() == 2)?;
    let ns = pair[0].as_str()?.to_string();
    let id = match &pair[1] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some((ns, id))
}

fn invalid_disclosure(err: GatewayError) -> Value {
    ToolError::new(err.to_string())
        .with(
            "valid_levels",
            json!(DisclosureLevel::ALL.iter().map(|l| l.as_str()).collect::<Vec<_>>()),
        )
        .into_value()
}

fn grounding_failure(param: &str, term: &str, err: GroundingError) -> Value {
    let failure = match err {
        GroundingError::Oracle(msg) => ToolError::new(format!("Could not ground '{term}': {msg}"))
            .hint(HINT_EXPLICIT)
            .with("parameter", param),
        GroundingError::NoMatch { namespaces, .. } => {
            ToolError::new(format!("No grounding found for '{term}' as {param}"))
                .hint(HINT_EXPLICIT)
                .with("parameter", param)
                .with("namespaces_searched", json!(namespaces))
        }
        GroundingError::LowConfidence {
            top_score, options, ..
        } => ToolError::new(format!("Low confidence grounding for '{term}'"))
            .hint(HINT_CHOOSE)
            .with("parameter", param)
            .with("top_score", top_score)
            .with("threshold", MIN_CONFIDENCE)
            .with("grounding_options", json!(options)),
        GroundingError::Ambiguous {
            reason, options, ..
        } => ToolError::new(format!("Ambiguous term '{term}' for {param}"))
            .hint(HINT_CHOOSE)
            .with("parameter", param)
            .with("reason", reason)
            .with("grounding_options", json!(options)),
    };
    failure.into_value()
}

fn endpoint_failure(endpoint: &str, err: &EndpointError, kwargs: &Map<String, Value>) -> Value {
    tracing::error!(endpoint, error = %err, "Endpoint call failed");
    let mut failure = ToolError::new(err.to_string())
        .with("endpoint", endpoint)
        .with("parameters", Value::Object(kwargs.clone()));
    if let EndpointError::Query(q) = err {
        failure = failure.hint(q.hint()).with("error_type", q.kind());
    }
    failure.into_value()
}

/// Entity types of the given ids; unknown prefixes are skipped.
fn detect_types(entity_ids: &[String]) -> BTreeSet<EntityType> {
    entity_ids
        .iter()
        .filter_map(|id| EntityType::detect(id))
        .collect()
}

fn function_hint(snapshot: &RegistrySnapshot, name: &str, origin: EdgeOrigin) -> FunctionHint {
    FunctionHint {
        name: name.to_string(),
        params: snapshot.descriptor(name).map(|d| d.param_types()),
        origin,
    }
}

fn navigation_options(
    snapshot: &RegistrySnapshot,
    sources: &BTreeSet<EntityType>,
    intent: Option<&str>,
    top_k: usize,
) -> Vec<NavigationOption> {
    let keywords: Vec<String> = intent
        .map(|i| i.to_lowercase().split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    sources
        .iter()
        .filter_map(|&source| {
            let targets = snapshot.edge_map.targets(source)?;
            let can_reach: Vec<Reach> = targets
                .iter()
                .take(top_k)
                .map(|(&target, functions)| {
                    let mut ranked: Vec<_> = functions.iter().collect();
                    if !keywords.is_empty() {
                        // Stable: ties keep their registry order.
                        ranked.sort_by_key(|f| {
                            let name = f.name.to_lowercase();
                            std::cmp::Reverse(keywords.iter().any(|k| name.contains(k.as_str())))
                        });
                    }
                    Reach {
                        target,
                        functions: ranked
                            .into_iter()
                            .take(FUNCTIONS_PER_TARGET)
                            .map(|f| function_hint(snapshot, &f.name, f.origin))
                            .collect(),
                        total_functions: functions.len(),
                    }
                })
                .collect();
            (!can_reach.is_empty()).then_some(NavigationOption {
                from: source,
                can_reach,
            })
        })
        .collect()
}

/// `ns:id` for a result row: `db_ns`/`db_id` fields first, then `id` as a
/// string or a pair.
fn result_entity_id(item: &Value) -> Option<String> {
    let obj = item.as_object()?;
    if let Some(curie) = db_curie(obj) {
        return Some(curie);
    }
    match obj.get("id")? {
        Value::String(s) => Some(s.clone()),
        pair @ Value::Array(_) => as_pair(pair).map(|(ns, id)| format!("{ns}:{id}")),
        _ => None,
    }
}

fn db_curie(obj: &Map<String, Value>) -> Option<String> {
    let ns = obj.get("db_ns")?.as_str()?;
    let id = match obj.get("db_id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(format!("{}:{}", ns.to_lowercase(), id))
}

fn suggested_next(snapshot: &RegistrySnapshot, items: &[Value]) -> Option<Vec<SuggestedNext>> {
    let ids: Vec<String> = items
        .iter()
        .take(SUGGESTION_SAMPLE)
        .filter_map(result_entity_id)
        .collect();
    let sources = detect_types(&ids);
    if sources.is_empty() {
        return None;
    }
    let next: Vec<SuggestedNext> = navigation_options(snapshot, &sources, None, 3)
        .into_iter()
        .flat_map(|nav| {
            let from = nav.from;
            nav.can_reach.into_iter().take(3).map(move |reach| SuggestedNext {
                from,
                to: reach.target,
                functions: reach.functions.into_iter().take(2).collect(),
            })
        })
        .collect();
    (!next.is_empty()).then_some(next)
}

fn name_missing(obj: &Map<String, Value>) -> bool {
    obj.get("name").map_or(true, Value::is_null)
}

/// Fill in missing `name` fields for `db_ns`/`db_id` rows with one batch
/// lookup. Lookup failures leave the rows as they are.
async fn resolve_names(backend: &dyn GraphBackend, items: &mut [Value]) {
    let ids: BTreeSet<String> = items
        .iter()
        .filter_map(Value::as_object)
        .filter(|obj| name_missing(obj))
        .filter_map(db_curie)
        .collect();
    if ids.is_empty() {
        return;
    }

    let ids: Vec<String> = ids.into_iter().collect();
    let names = match queries::entity_names(backend, &ids).await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to resolve entity names");
            return;
        }
    };
    tracing::debug!(resolved = names.len(), requested = ids.len(), "Resolved entity names");

    for obj in items.iter_mut().filter_map(Value::as_object_mut) {
        if !name_missing(obj) {
            continue;
        }
        if let Some(name) = db_curie(obj).and_then(|id| names.get(&id)) {
            obj.insert("name".to_string(), Value::String(name.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use graphgate_graph::{BackendError, QueryOutput, Row};

    use crate::endpoint::{DeclaredEdge, EndpointCatalog, FunctionDescriptor};
    use crate::grounding::RawGrounding;

    /// Endpoint answering from a table keyed by the `disease` argument.
    struct Table {
        descriptor: FunctionDescriptor,
        answers: HashMap<String, Value>,
        calls: Mutex<Vec<Map<String, Value>>>,
    }

    impl Table {
        fn new(answers: &[(&str, Value)]) -> Self {
            Self {
                descriptor: FunctionDescriptor::new(
                    "get_genes_for_disease",
                    "gene_disease",
                    "Genes associated with a disease.",
                )
                .param("disease", ParamSpec::entity("disease"))
                .param("limit", ParamSpec::scalar("int").optional(json!(10))),
                answers: answers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Endpoint for Table {
        fn descriptor(&self) -> &FunctionDescriptor {
            &self.descriptor
        }

        async fn invoke(
            &self,
            _ctx: &EndpointContext,
            args: &Map<String, Value>,
        ) -> Result<Value, EndpointError> {
            self.calls.lock().unwrap().push(args.clone());
            let (ns, id) = args
                .get("disease")
                .and_then(as_pair)
                .ok_or_else(|| EndpointError::MissingArgument("disease".into()))?;
            Ok(self
                .answers
                .get(&format!("{ns}:{id}"))
                .cloned()
                .unwrap_or_else(|| json!([])))
        }
    }

    /// Endpoint returning a single object rather than a list.
    struct Count(FunctionDescriptor);

    #[async_trait]
    impl Endpoint for Count {
        fn descriptor(&self) -> &FunctionDescriptor {
            &self.0
        }

        async fn invoke(
            &self,
            _ctx: &EndpointContext,
            _args: &Map<String, Value>,
        ) -> Result<Value, EndpointError> {
            Ok(json!({"count": 3}))
        }
    }

    struct Provider(Arc<Table>);

    impl EndpointProvider for Provider {
        fn catalog(&self) -> Result<EndpointCatalog, EndpointError> {
            let reverse = FunctionDescriptor::new("get_diseases_for_gene", "gene_disease", "")
                .param("gene", ParamSpec::entity("gene"));
            Ok(EndpointCatalog {
                endpoints: vec![
                    self.0.clone(),
                    Arc::new(Count(reverse)),
                    Arc::new(Count(FunctionDescriptor::new("count_genes", "stats", ""))),
                ],
                declared_edges: vec![DeclaredEdge::new(
                    EntityType::Gene,
                    EntityType::Disease,
                    "find_gene_links",
                )],
            })
        }
    }

    struct Oracle(Vec<RawGrounding>);

    #[async_trait]
    impl GroundingOracle for Oracle {
        async fn ground(
            &self,
            _term: &str,
            _organism: Option<&str>,
            limit: usize,
        ) -> Result<Vec<RawGrounding>, GroundingError> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    /// Backend answering cross-reference and name lookups.
    #[derive(Default)]
    struct Graph {
        xrefs: HashMap<String, Vec<String>>,
        names: HashMap<String, String>,
    }

    #[async_trait]
    impl GraphBackend for Graph {
        async fn run_read(&self, cypher: &str, params: &Row) -> Result<QueryOutput, BackendError> {
            let rows: Vec<Row> = if cypher.contains("xref") {
                let source = params["source_id"].as_str().unwrap_or_default();
                self.xrefs
                    .get(source)
                    .into_iter()
                    .flatten()
                    .map(|t| row(json!({ "target_id": t })))
                    .collect()
            } else if cypher.contains("$ids") {
                params["ids"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .filter_map(|id| self.names.get(id).map(|n| (id, n)))
                    .map(|(id, name)| row(json!({ "id": id, "name": name })))
                    .collect()
            } else {
                Vec::new()
            };
            Ok(QueryOutput::new(rows))
        }
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    fn raw(ns: &str, id: &str, name: &str, score: f64) -> RawGrounding {
        RawGrounding {
            namespace: ns.into(),
            identifier: id.into(),
            name: name.into(),
            score,
            source: "test".into(),
        }
    }

    fn gateway(table: Table, oracle: Vec<RawGrounding>, graph: Graph) -> (Gateway, Arc<Table>) {
        let table = Arc::new(table);
        let gw = Gateway::new(
            Arc::new(graph),
            Arc::new(Provider(table.clone())),
            Arc::new(Oracle(oracle)),
            GatewaySettings::default(),
        );
        (gw, table)
    }

    fn call(kwargs: Value) -> CallRequest {
        CallRequest::new("get_genes_for_disease", kwargs)
    }

    #[tokio::test]
    async fn test_unknown_endpoint_lists_available() {
        let (gw, _) = gateway(Table::new(&[]), vec![], Graph::default());
        let out = gw.call_endpoint(CallRequest::new("get_nothing", json!({}))).await;
        assert_eq!(out["error"], "Unknown endpoint: get_nothing");
        assert_eq!(out["hint"], "Use suggest_endpoints to find available functions");
        let available = out["available"].as_array().unwrap();
        assert!(available.contains(&json!("get_genes_for_disease")));
    }

    #[tokio::test]
    async fn test_malformed_kwargs_string() {
        let (gw, table) = gateway(Table::new(&[]), vec![], Graph::default());
        let out = gw.call_endpoint(call(json!("{not json"))).await;
        assert!(out["error"].as_str().unwrap().starts_with("Invalid JSON"));
        assert_eq!(out["kwargs_received"], "{not json");
        assert!(table.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auto_ground_resolves_names_and_suggests_next() {
        let table = Table::new(&[("mesh:D010300", json!([{"db_ns": "HGNC", "db_id": "6407"}]))]);
        let graph = Graph {
            names: HashMap::from([("hgnc:6407".to_string(), "LRRK2".to_string())]),
            ..Default::default()
        };
        let oracle = vec![raw("MESH", "D010300", "Parkinson Disease", 0.95)];
        let (gw, _) = gateway(table, oracle, graph);

        let out = gw
            .call_endpoint(call(json!({"disease": "Parkinson's disease"})))
            .await;
        assert!(out.get("error").is_none(), "{out}");
        assert_eq!(out["parameters"]["disease"], json!(["mesh", "D010300"]));
        assert_eq!(out["results"][0]["name"], "LRRK2");
        assert_eq!(out["result_count"], 1);

        let applied = &out["grounding_applied"]["disease"];
        assert_eq!(applied["input"], "Parkinson's disease");
        assert_eq!(applied["grounded_to"]["curie"], "MESH:D010300");
        assert_eq!(applied["method"], "auto_ground");
        assert_eq!(applied["param_filter"], "disease");

        let next = out["suggested_next"].as_array().unwrap();
        assert_eq!(next[0]["from"], "Gene");
        assert_eq!(next[0]["to"], "Disease");
    }

    #[tokio::test]
    async fn test_ambiguous_term_is_not_invoked() {
        let oracle = vec![
            raw("MESH", "D010300", "Parkinson Disease", 0.9),
            raw("DOID", "14330", "Parkinson's disease", 0.8),
        ];
        let (gw, table) = gateway(Table::new(&[]), oracle, Graph::default());
        let out = gw.call_endpoint(call(json!({"disease": "parkinson"}))).await;
        assert_eq!(out["error"], "Ambiguous term 'parkinson' for disease");
        assert_eq!(out["hint"], HINT_CHOOSE);
        assert_eq!(out["grounding_options"].as_array().unwrap().len(), 2);
        assert!(table.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_low_confidence_term() {
        let oracle = vec![raw("MESH", "D000001", "Something", 0.3)];
        let (gw, _) = gateway(Table::new(&[]), oracle, Graph::default());
        let out = gw.call_endpoint(call(json!({"disease": "smth"}))).await;
        assert_eq!(out["error"], "Low confidence grounding for 'smth'");
        assert_eq!(out["threshold"], 0.5);
        assert_eq!(out["parameter"], "disease");
    }

    #[tokio::test]
    async fn test_empty_result_retries_through_xrefs() {
        let table = Table::new(&[("doid:14330", json!([{"id": "hgnc:6407", "name": "LRRK2"}]))]);
        let graph = Graph {
            xrefs: HashMap::from([(
                "mesh:D1".to_string(),
                vec!["hgnc:6407".to_string(), "DOID:14330".to_string()],
            )]),
            ..Default::default()
        };
        let (gw, table) = gateway(table, vec![raw("MESH", "D1", "Example", 0.9)], graph);

        let out = gw.call_endpoint(call(json!({"disease": "example"}))).await;
        assert_eq!(out["result_count"], 1);
        assert_eq!(out["parameters"]["disease"], json!(["doid", "14330"]));

        let applied = &out["grounding_applied"]["disease"];
        assert_eq!(applied["xref_used"]["namespace"], "doid");
        assert_eq!(applied["xref_used"]["original_namespace"], "mesh");
        assert_eq!(applied["xref_used"]["original_identifier"], "D1");
        let tried = applied["xrefs_tried"].as_array().unwrap();
        assert_eq!(tried.len(), 1);
        assert_eq!(tried[0]["result_count"], 1);
        // original call plus the one disease-namespace equivalent
        assert_eq!(table.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_explicit_pair_namespace_lowercased() {
        let table = Table::new(&[("mesh:D010300", json!([{"id": "hgnc:6407"}]))]);
        let (gw, table) = gateway(table, vec![], Graph::default());
        let out = gw
            .call_endpoint(call(json!({"disease": ["MESH", "D010300"]})))
            .await;
        assert_eq!(out["result_count"], 1);
        assert!(out.get("grounding_applied").is_none());
        assert_eq!(table.calls.lock().unwrap()[0]["disease"], json!(["mesh", "D010300"]));
    }

    #[tokio::test]
    async fn test_string_curie_skips_grounding() {
        let table = Table::new(&[("mesh:D010300", json!([{"id": "hgnc:6407"}]))]);
        let (gw, _) = gateway(table, vec![], Graph::default());
        let out = gw.call_endpoint(call(json!({"disease": "MESH:D010300"}))).await;
        assert!(out.get("error").is_none(), "{out}");
        assert_eq!(out["parameters"]["disease"], json!(["mesh", "D010300"]));
    }

    #[tokio::test]
    async fn test_continuation_hint_names_endpoint() {
        let rows: Vec<Value> = (0..5).map(|i| json!({"id": format!("hgnc:{i}")})).collect();
        let table = Table::new(&[("mesh:D1", Value::Array(rows))]);
        let (gw, _) = gateway(table, vec![], Graph::default());
        let mut request = call(json!({"disease": ["mesh", "D1"]}));
        request.limit = Some(2);

        let out = gw.call_endpoint(request).await;
        assert_eq!(out["result_count"], 2);
        assert_eq!(out["pagination"]["has_more"], true);
        assert_eq!(
            out["continuation_hint"],
            "Showing 2 of 5 results. To get more, call get_genes_for_disease with offset=2"
        );
    }

    #[tokio::test]
    async fn test_non_list_result_is_a_single_page() {
        let (gw, _) = gateway(Table::new(&[]), vec![], Graph::default());
        let out = gw.call_endpoint(CallRequest::new("count_genes", json!({}))).await;
        assert_eq!(out["results"]["count"], 3);
        assert_eq!(out["pagination"]["total"], 1);
        assert_eq!(out["pagination"]["has_more"], false);
        assert!(out.get("suggested_next").is_none());
    }

    #[tokio::test]
    async fn test_call_with_disclosure_level_enriches() {
        let table = Table::new(&[("mesh:D1", json!([{"id": "hgnc:6407", "name": "LRRK2"}]))]);
        let (gw, _) = gateway(table, vec![], Graph::default());
        let mut request = call(json!({"disease": ["mesh", "D1"]}));
        request.disclosure_level = Some("standard".into());

        let out = gw.call_endpoint(request).await;
        assert_eq!(out["enrichment"]["disclosure_level"], "standard");
        assert!(out["results"][0].get("_next_steps").is_some());
    }

    #[tokio::test]
    async fn test_call_with_bad_disclosure_level() {
        let (gw, table) = gateway(Table::new(&[]), vec![], Graph::default());
        let mut request = call(json!({"disease": ["mesh", "D1"]}));
        request.disclosure_level = Some("verbose".into());

        let out = gw.call_endpoint(request).await;
        assert!(out["error"].as_str().unwrap().contains("Invalid disclosure_level"));
        assert_eq!(out["valid_levels"].as_array().unwrap().len(), 4);
        assert!(table.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_suggest_endpoints_ranks_by_intent() {
        let (gw, _) = gateway(Table::new(&[]), vec![], Graph::default());
        let ids = vec!["HGNC:6407".to_string()];

        let out = gw.suggest_endpoints(&ids, None, 5);
        assert_eq!(out["source_entities"], json!(["Gene"]));
        let reach = &out["navigation_options"][0]["can_reach"][0];
        assert_eq!(reach["target"], "Disease");
        assert_eq!(reach["total_functions"], 2);
        assert_eq!(reach["functions"][0]["name"], "find_gene_links");
        assert_eq!(reach["functions"][0]["origin"], "declared");

        let out = gw.suggest_endpoints(&ids, Some("diseases"), 5);
        let reach = &out["navigation_options"][0]["can_reach"][0];
        assert_eq!(reach["functions"][0]["name"], "get_diseases_for_gene");
        assert_eq!(reach["functions"][0]["params"]["gene"], "Tuple[str, str]");
    }

    #[test]
    fn test_suggest_endpoints_unknown_prefix() {
        let (gw, _) = gateway(Table::new(&[]), vec![], Graph::default());
        let out = gw.suggest_endpoints(&["foo:1".to_string()], None, 5);
        assert_eq!(
            out["error"],
            "Could not detect entity types from IDs. Use CURIE format (e.g., HGNC:6407)"
        );
        assert_eq!(out["entity_ids_received"], json!(["foo:1"]));
    }

    #[test]
    fn test_navigation_schema_lists_edges() {
        let (gw, _) = gateway(Table::new(&[]), vec![], Graph::default());
        let out = gw.get_navigation_schema();
        assert_eq!(out["entity_types"], json!(["Disease", "Gene"]));
        let edges = out["edges"].as_array().unwrap();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0]["from"], "Disease");
        assert_eq!(edges[0]["functions"][0]["name"], "get_genes_for_disease");
        assert_eq!(edges[1]["count"], 2);
    }

    #[tokio::test]
    async fn test_ground_entity_reports_outcome() {
        let oracle = vec![raw("HGNC", "6407", "LRRK2", 0.98)];
        let (gw, _) = gateway(Table::new(&[]), oracle, Graph::default());
        let mut request = GroundRequest::new("LRRK2");
        request.param_type = Some("gene".into());

        let out = gw.ground_entity(request).await;
        assert_eq!(out["status"], "resolved");
        assert_eq!(out["top_match"]["curie"], "HGNC:6407");
        assert_eq!(out["param_filter"], "gene");
    }

    #[tokio::test]
    async fn test_ground_entity_ambiguous_is_a_status_not_an_error() {
        let oracle = vec![
            raw("MESH", "D010300", "Parkinson Disease", 0.9),
            raw("DOID", "14330", "Parkinson's disease", 0.85),
        ];
        let (gw, _) = gateway(Table::new(&[]), oracle, Graph::default());
        let mut request = GroundRequest::new("parkinson");
        request.param_type = Some("disease".into());

        let out = gw.ground_entity(request).await;
        assert!(out.get("error").is_none(), "{out}");
        assert_eq!(out["status"], "ambiguous");
        assert!(out["top_match"].is_null());
        assert_eq!(out["groundings"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_enrich_results_rejects_unknown_level() {
        let (gw, _) = gateway(Table::new(&[]), vec![], Graph::default());
        let out = gw.enrich_results(EnrichRequest {
            results: vec![json!({"id": "hgnc:6407"})],
            disclosure_level: "everything".into(),
            result_type: None,
            offset: 0,
            limit: None,
        });
        assert!(out["error"].as_str().unwrap().contains("everything"));
        assert_eq!(
            out["valid_levels"],
            json!(["minimal", "standard", "detailed", "exploratory"])
        );
    }

    #[tokio::test]
    async fn test_execute_cypher_reports_validation_failure() {
        let (gw, _) = gateway(Table::new(&[]), vec![], Graph::default());
        let request = gw
            .parse_execute_request(json!({"query": "CREATE (n:Gene) RETURN n"}))
            .unwrap();
        assert_eq!(request.timeout_ms, GatewaySettings::default().default_timeout_ms);

        let out = gw.execute_cypher(request).await;
        assert_eq!(out["error"], "Query validation failed");
        assert_eq!(out["error_type"], "validation_error");
        assert_eq!(out["validation"]["valid"], false);
    }

    #[test]
    fn test_parse_execute_request_rejects_non_object() {
        let (gw, _) = gateway(Table::new(&[]), vec![], Graph::default());
        let err = gw.parse_execute_request(json!(["MATCH (n) RETURN n"])).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_schema_rejects_unknown_detail_level() {
        let (gw, _) = gateway(Table::new(&[]), vec![], Graph::default());
        let out = gw.get_graph_schema("everything", None, None).await;
        assert!(out["error"].as_str().unwrap().contains("everything"));
        assert_eq!(out["hint"], "Start with detail_level=summary and drill down");
    }
}
