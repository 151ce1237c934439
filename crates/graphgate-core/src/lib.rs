//! graphgate-core: Shared types, configuration, and error handling for the graphgate gateway.
//!
//! This crate provides the foundational types used across all graphgate components:
//! - Compact identifiers (CURIEs) and entity-type classification tables
//! - Gateway and Neo4j configuration
//! - Stable content hashing for query deduplication
//! - Common error types

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use error::GraphgateError;
pub use types::{Curie, EntityType};
