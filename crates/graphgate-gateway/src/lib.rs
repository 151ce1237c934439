//! graphgate-gateway: the tool surface of the graph gateway.
//!
//! A registry of callable endpoints with an inferred navigation map,
//! free-text grounding with ambiguity checks, cross-reference fallback,
//! and progressive result enrichment, all exposed through [`Gateway`].

pub mod catalog;
pub mod edges;
pub mod endpoint;
pub mod enrich;
pub mod error;
pub mod grounding;
pub mod registry;
pub mod tools;

pub use catalog::{CatalogProvider, CypherEndpoint};
pub use edges::{EdgeMap, EdgeOrigin};
pub use endpoint::{
    DeclaredEdge, Endpoint, EndpointCatalog, EndpointContext, EndpointProvider,
    FunctionDescriptor, ParamKind, ParamSpec,
};
pub use enrich::DisclosureLevel;
pub use error::{EndpointError, GatewayError, GroundingError, ToolError};
pub use grounding::{
    GraphNameOracle, GroundingCandidate, GroundingOracle, GroundingOutcome, GroundingService,
    RawGrounding,
};
pub use registry::{RegistryCache, RegistrySnapshot};
pub use tools::{CallRequest, EnrichRequest, Gateway, GroundRequest};
