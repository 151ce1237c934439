//! Registered endpoints: named, typed callables the gateway can invoke on
//! behalf of a caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use graphgate_core::types::namespace_filter;
use graphgate_core::EntityType;
use graphgate_graph::GraphBackend;
use graphgate_query::budget::MAX_PAGE_SIZE;
use graphgate_query::{Budgeter, PaginationConfig, QueryExecutor};

use crate::error::EndpointError;

// ── Parameters ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// A `[namespace, identifier]` pair; free text is grounded first.
    EntityPair,
    Scalar,
    List,
}

impl ParamKind {
    /// Parse the config spelling (`entity`, `scalar`, `list`).
    pub fn from_config(kind: &str) -> Option<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "entity" | "entity_pair" | "curie" => Some(Self::EntityPair),
            "scalar" => Some(Self::Scalar),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

/// Declared shape of one endpoint parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub kind: ParamKind,

    /// Display type shown to callers (`Tuple[str, str]`, `int`, ...).
    #[serde(rename = "type")]
    pub type_name: String,

    /// Semantic type used to pick grounding namespaces (`gene`, `disease`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    #[serde(default = "default_required")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

fn default_required() -> bool {
    true
}

impl ParamSpec {
    pub fn entity(entity_type: &str) -> Self {
        Self {
            kind: ParamKind::EntityPair,
            type_name: "Tuple[str, str]".to_string(),
            entity_type: Some(entity_type.to_string()),
            required: true,
            default: None,
            example: None,
        }
    }

    pub fn scalar(type_name: &str) -> Self {
        Self {
            kind: ParamKind::Scalar,
            type_name: type_name.to_string(),
            entity_type: None,
            required: true,
            default: None,
            example: None,
        }
    }

    pub fn list(type_name: &str) -> Self {
        Self {
            kind: ParamKind::List,
            type_name: format!("List[{type_name}]"),
            entity_type: None,
            required: true,
            default: None,
            example: None,
        }
    }

    pub fn optional(mut self, default: Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    pub fn example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    /// Grounding namespaces this parameter accepts, if it is restricted.
    pub fn namespace_filter(&self) -> Option<&'static [&'static str]> {
        self.entity_type.as_deref().and_then(namespace_filter)
    }
}

// ── Descriptors ──────────────────────────────────────────────────

/// Public description of a registered function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub parameters: BTreeMap<String, ParamSpec>,
    pub category: String,
    pub docstring: String,
    #[serde(default)]
    pub examples: Map<String, Value>,
}

impl FunctionDescriptor {
    pub fn new(name: &str, category: &str, docstring: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: BTreeMap::new(),
            category: category.to_string(),
            docstring: docstring.to_string(),
            examples: Map::new(),
        }
    }

    pub fn param(mut self, name: &str, spec: ParamSpec) -> Self {
        if let Some(example) = &spec.example {
            self.examples.insert(name.to_string(), example.clone());
        }
        self.parameters.insert(name.to_string(), spec);
        self
    }

    /// `{param: type}` summary used in navigation hints.
    pub fn param_types(&self) -> Map<String, Value> {
        self.parameters
            .iter()
            .map(|(name, spec)| (name.clone(), Value::String(spec.type_name.clone())))
            .collect()
    }
}

// ── Invocation ───────────────────────────────────────────────────

/// What an endpoint can reach while it runs.
#[derive(Clone)]
pub struct EndpointContext {
    pub backend: Arc<dyn GraphBackend>,
    pub executor: QueryExecutor,
}

impl EndpointContext {
    /// Endpoints hand back their complete result list; the gateway pages it
    /// afterwards, so the executor here is given an unbounded token budget.
    pub fn new(backend: Arc<dyn GraphBackend>) -> Self {
        let config = PaginationConfig {
            max_tokens: usize::MAX,
            default_page_size: MAX_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            ..PaginationConfig::default()
        };
        Self {
            backend,
            executor: QueryExecutor::new(Budgeter::new(config)),
        }
    }
}

/// A named callable exposed through `call_endpoint`.
#[async_trait]
pub trait Endpoint: Send + Sync {
    fn descriptor(&self) -> &FunctionDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Arguments arrive with entity pairs already grounded to
    /// `[namespace, identifier]`.
    async fn invoke(
        &self,
        ctx: &EndpointContext,
        args: &Map<String, Value>,
    ) -> Result<Value, EndpointError>;

    /// Cheap liveness probe used by the registry's corruption check.
    fn is_callable(&self) -> bool {
        true
    }
}

// ── Providers ────────────────────────────────────────────────────

/// An explicitly declared navigation edge, for functions whose names do
/// not follow the inference patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredEdge {
    pub source: EntityType,
    pub target: EntityType,
    pub function: String,
}

impl DeclaredEdge {
    pub fn new(source: EntityType, target: EntityType, function: &str) -> Self {
        Self {
            source,
            target,
            function: function.to_string(),
        }
    }
}

/// Everything a provider contributes to the registry.
#[derive(Default)]
pub struct EndpointCatalog {
    pub endpoints: Vec<Arc<dyn Endpoint>>,
    pub declared_edges: Vec<DeclaredEdge>,
}

/// Source of registered endpoints, consulted on every registry rebuild.
pub trait EndpointProvider: Send + Sync {
    fn catalog(&self) -> Result<EndpointCatalog, EndpointError>;
}
