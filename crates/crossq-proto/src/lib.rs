//! Shared types for cross-target query equivalence.
//!
//! This crate defines the plain data exchanged between the plan builders,
//! the executors, and the validator.
//!
//! # Modules
//!
//! - [`value`] - Tagged document value used by every builder and normalizer
//! - [`params`] - Named, typed query parameters
//! - [`query`] - The nine logical queries
//! - [`target`] - Schema models and database targets
//! - [`result`] - Canonical comparison forms
//! - [`error`] - Protocol error types

pub mod error;
pub mod params;
pub mod query;
pub mod result;
pub mod target;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use params::{ParamName, ParamValue, ParameterSet};
pub use query::{Entity, LogicalQuery, QueryId, Shape, RANKED_LIMIT};
pub use result::{format_amount, CanonicalResult, RankedRow};
pub use target::{DatabaseTarget, DriverFamily, SchemaModel};
pub use value::Value;
