//! graphgate-graph: read-only Neo4j access for the query gateway.
//!
//! Everything above this crate talks to the database through the
//! [`GraphBackend`] trait, so the executor, schema discovery, and gateway
//! tools can run against a live server or an in-memory stub alike.

pub mod backend;
pub mod client;
pub mod convert;
pub mod queries;

pub use backend::{BackendError, GraphBackend, QueryOutput, Row};
pub use client::{GraphClient, GraphConfig, GraphError, LazyGraph};
