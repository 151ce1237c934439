//! Configuration management for graphgate.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (GRAPHGATE__ prefix, `__` separator)
//! 2. Config file (graphgate.toml)
//! 3. Defaults

use serde::Deserialize;

use crate::error::GraphgateError;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub neo4j: Neo4jSettings,

    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Extra Cypher-backed endpoints appended to the built-in catalog.
    #[serde(default)]
    pub endpoints: Vec<EndpointSettings>,
}

/// Connection settings for the backing Neo4j database.
#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jSettings {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Target database name; the server default when unset.
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

/// Limits and defaults applied by the gateway tools.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    #[serde(default = "default_max_results")]
    pub default_max_results: usize,

    /// Token budget for a single response page.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Full-text index used by the graph-backed grounding oracle.
    #[serde(default = "default_fulltext_index")]
    pub fulltext_index: String,
}

/// A registered endpoint whose body is a parameterised read query.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSettings {
    pub name: String,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub description: String,

    pub cypher: String,

    /// Parameter name → kind (`entity`, `scalar`, or `list`).
    #[serde(default)]
    pub params: Vec<EndpointParamSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointParamSettings {
    pub name: String,

    #[serde(default = "default_param_kind")]
    pub kind: String,

    #[serde(default = "default_true")]
    pub required: bool,

    #[serde(default)]
    pub example: Option<serde_json::Value>,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "graphgate-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_results() -> usize {
    100
}

fn default_max_tokens() -> usize {
    20_000
}

fn default_page_size() -> usize {
    50
}

fn default_fulltext_index() -> String {
    "entity_names".to_string()
}

fn default_category() -> String {
    "uncategorized".to_string()
}

fn default_param_kind() -> String {
    "scalar".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            database: None,
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            default_max_results: default_max_results(),
            max_tokens: default_max_tokens(),
            default_page_size: default_page_size(),
            fulltext_index: default_fulltext_index(),
        }
    }
}

/// Load configuration from `{file_prefix}.toml` (optional) and
/// `GRAPHGATE__`-prefixed environment variables.
pub fn load(file_prefix: &str) -> Result<GatewayConfig, GraphgateError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("GRAPHGATE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let loaded: GatewayConfig = cfg.try_deserialize()?;
    tracing::debug!(
        uri = %loaded.neo4j.uri,
        endpoints = loaded.endpoints.len(),
        "Loaded gateway configuration"
    );
    Ok(loaded)
}
