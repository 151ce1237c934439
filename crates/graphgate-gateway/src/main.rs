//! CLI entry point for the graphgate gateway.
//!
//! Each subcommand runs one tool and writes its JSON payload to stdout.
//! Tool failures are payloads too; only configuration and I/O problems
//! exit non-zero.

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::{fmt, EnvFilter};

use graphgate_gateway::{CallRequest, EnrichRequest, Gateway, GroundRequest};

#[derive(Parser)]
#[command(name = "graphgate")]
#[command(about = "Read-only, safety-mediated gateway to a biomedical knowledge graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: graphgate).
    #[arg(short, long, default_value = "graphgate", global = true)]
    config: String,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Describe the graph schema at the requested detail level.
    Schema {
        #[arg(long, default_value = "summary")]
        level: String,
        #[arg(long)]
        entity_type: Option<String>,
        #[arg(long)]
        relationship_type: Option<String>,
    },
    /// Execute a read query (reads a JSON request from stdin).
    Execute,
    /// Validate a query without running it.
    Validate {
        #[arg(long)]
        query: String,
        /// Query parameters as a JSON object.
        #[arg(long)]
        params: Option<String>,
    },
    /// Ground a free-text term to identifiers.
    Ground {
        term: String,
        #[arg(long)]
        param_type: Option<String>,
        #[arg(long)]
        organism: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Suggest functions reachable from the given identifiers.
    Suggest {
        /// Comma-separated CURIEs, e.g. HGNC:6407,MESH:D010300.
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
        #[arg(long)]
        intent: Option<String>,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
    /// Call a registered endpoint.
    Call {
        endpoint: String,
        /// Keyword arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        kwargs: String,
        #[arg(long)]
        no_auto_ground: bool,
        #[arg(long)]
        disclosure_level: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Enrich a result list (reads a JSON request from stdin).
    Enrich,
    /// Print the full navigation map.
    NavSchema,
    /// Report registry cache health.
    RegistryStatus,
    /// Drop the registry cache.
    InvalidateRegistry,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if cli.log_json {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    let config = graphgate_core::config::load(&cli.config)?;
    let gateway = Gateway::from_config(&config);

    let output = match cli.command {
        Command::Schema {
            ref level,
            ref entity_type,
            ref relationship_type,
        } => {
            gateway
                .get_graph_schema(level, entity_type.as_deref(), relationship_type.as_deref())
                .await
        }
        Command::Execute => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let request = gateway.parse_execute_request(serde_json::from_str(&input)?)?;
            gateway.execute_cypher(request).await
        }
        Command::Validate { ref query, ref params } => {
            let params = parse_object(params.as_deref())?;
            gateway.validate_cypher(query, &params)
        }
        Command::Ground {
            term,
            param_type,
            organism,
            limit,
        } => {
            gateway
                .ground_entity(GroundRequest {
                    term,
                    param_type,
                    organism,
                    limit,
                })
                .await
        }
        Command::Suggest {
            ref ids,
            ref intent,
            top_k,
        } => gateway.suggest_endpoints(ids, intent.as_deref(), top_k),
        Command::Call {
            endpoint,
            kwargs,
            no_auto_ground,
            disclosure_level,
            offset,
            limit,
        } => {
            gateway
                .call_endpoint(CallRequest {
                    endpoint,
                    kwargs: Value::String(kwargs),
                    auto_ground: !no_auto_ground,
                    disclosure_level,
                    offset,
                    limit,
                })
                .await
        }
        Command::Enrich => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let request: EnrichRequest = serde_json::from_str(&input)?;
            gateway.enrich_results(request)
        }
        Command::NavSchema => gateway.get_navigation_schema(),
        Command::RegistryStatus => gateway.registry_status(),
        Command::InvalidateRegistry => gateway.invalidate_registry(),
    };

    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn parse_object(raw: Option<&str>) -> anyhow::Result<Map<String, Value>> {
    match raw {
        None => Ok(Map::new()),
        Some(s) => match serde_json::from_str(s)? {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!("--params must be a JSON object"),
        },
    }
}
