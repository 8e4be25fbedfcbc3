//! CrossQ Core - query translation and cross-target equivalence.
//!
//! This crate turns the nine logical queries into native plans for every
//! database target and proves the targets agree:
//!
//! - [`resolve`] maps logical field roles to physical paths and columns
//! - [`query`] binds parameters into a target-independent predicate plan
//! - [`plan`] compiles that plan into document filters, pipelines, and SQL
//! - [`normalize`] turns raw driver output into canonical results
//! - [`validate`] compares canonical results across targets
//! - [`metrics`] measures latency
//! - [`sampler`] derives parameter sets from live data

pub mod batch;
pub mod catalog;
pub mod config;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod plan;
pub mod query;
pub mod resolve;
pub mod sampler;
pub mod validate;

pub use batch::partition;
pub use catalog::{EntityDef, ScalarKind};
pub use config::{BenchConfig, Scale, TargetConfig};
pub use error::{Error, Result};
pub use metrics::{LatencyEngine, LatencyRecorder, LatencyStatistics};
pub use normalize::{RawResult, ResultNormalizer, TargetExecutor};
pub use plan::{Dialect, PlanRegistry, QueryPlan, QueryPlanBuilder};
pub use query::{LogicalPlan, Predicate};
pub use resolve::{FieldPath, FieldRole, PhysicalField, SchemaPathResolver};
pub use sampler::{CandidateSource, ParameterSampler, ReferencePool, SamplerContext};
pub use validate::{Divergence, EquivalenceValidator, ValidationOutcome};

/// Re-export protocol types.
pub use crossq_proto as proto;
