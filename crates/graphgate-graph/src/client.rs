//! Neo4j connection management and the shared read-only graph client.

use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query, Txn};
use tokio::sync::OnceCell;

use graphgate_core::config::Neo4jSettings;

use crate::backend::{BackendError, GraphBackend, QueryOutput, Row};
use crate::convert;

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<GraphError> for BackendError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::Connection(msg) => BackendError::Unavailable(msg),
            GraphError::Query(err) => BackendError::classify(err.to_string()),
            GraphError::Serialization(msg) => BackendError::Other(msg),
        }
    }
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub max_connections: u32,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::from(&Neo4jSettings::default())
    }
}

impl From<&Neo4jSettings> for GraphConfig {
    fn from(settings: &Neo4jSettings) -> Self {
        Self {
            uri: settings.uri.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            database: settings.database.clone(),
            max_connections: settings.max_connections,
            fetch_size: settings.fetch_size,
        }
    }
}

/// Thread-safe Neo4j graph client with connection pooling.
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let mut builder = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let neo_config = builder
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Execute a read query and collect all rows as JSON.
    ///
    /// The statement runs inside an explicit transaction that is always
    /// rolled back, so nothing it does is ever committed. Failures are
    /// returned as-is, without the driver's retry loop.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<Row>, GraphError> {
        let mut txn = self.graph.start_txn().await?;
        let collected = collect_rows(&mut txn, query).await;
        if let Err(e) = txn.rollback().await {
            tracing::debug!(error = %e, "Read transaction rollback failed");
        }
        collected
    }
}

async fn collect_rows(txn: &mut Txn, query: Query) -> Result<Vec<Row>, GraphError> {
    let mut stream = txn.execute(query).await?;
    let mut rows = Vec::new();
    while let Some(row) = stream.next(txn.handle()).await? {
        rows.push(convert::row_to_json(&row).map_err(GraphError::Serialization)?);
    }
    Ok(rows)
}

#[async_trait]
impl GraphBackend for GraphClient {
    async fn run_read(&self, cypher: &str, params: &Row) -> Result<QueryOutput, BackendError> {
        let query = convert::bind_params(cypher, params);
        let rows = self.query_rows(query).await?;
        Ok(QueryOutput::new(rows))
    }
}

/// Lazily connected client: the connection is opened on first use and
/// shared afterwards. Construction is guarded by its own lock, independent
/// of any other gateway state.
pub struct LazyGraph {
    config: GraphConfig,
    client: OnceCell<GraphClient>,
}

impl LazyGraph {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// Return the shared client, connecting on first call.
    pub async fn client(&self) -> Result<&GraphClient, GraphError> {
        self.client
            .get_or_try_init(|| async {
                tracing::info!(uri = %self.config.uri, "Initializing shared Neo4j client");
                GraphClient::connect(&self.config).await
            })
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }
}

#[async_trait]
impl GraphBackend for LazyGraph {
    async fn run_read(&self, cypher: &str, params: &Row) -> Result<QueryOutput, BackendError> {
        let client = self.client().await?;
        client.run_read(cypher, params).await
    }
}
