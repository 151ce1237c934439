//! graphgate-query: the safety core of the gateway.
//!
//! Caller queries pass through CURIE normalization and static validation,
//! run under timeout and result ceilings, and come back as token-budgeted
//! pages. Schema discovery builds on the same backend seam.

pub mod budget;
pub mod error;
pub mod execute;
pub mod normalize;
pub mod schema;
pub mod types;
pub mod validate;

pub use budget::{Budgeter, HeuristicEstimator, PageInfo, PaginationConfig, TokenEstimator};
pub use error::{QueryError, SchemaError};
pub use execute::QueryExecutor;
pub use schema::{describe, DetailLevel, SchemaDescription};
pub use types::{ExecuteRequest, ExecutionResult, ExplainResult};
pub use validate::{validate, ValidationOutcome};
