//! CrossQ Bench - executors, fixtures, and the run matrix.
//!
//! This crate loads one synthetic dataset into every database target and
//! runs the nine logical queries against all of them.
//!
//! # Components
//!
//! - **Fixtures**: Seeded dataset generation and small hand-built datasets
//! - **Backends**: In-process document engine, SQLite, and PostgreSQL executors
//! - **Pool**: Bounded blocking connection pool
//! - **Harness**: Validation, latency measurement, and plan dumps over the
//!   (query × model × target) matrix
//!
//! Criterion benchmarks live under `benches/`.

pub mod backends;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod pool;

pub use backends::{DocumentEngine, DocumentExecutor, SqlBackend, SqlExecutor, SqliteBackend};
#[cfg(feature = "postgres")]
pub use backends::PostgresBackend;
pub use error::{Error, Result};
pub use fixtures::{Dataset, DatasetGenerator};
pub use harness::{
    BenchmarkRecord, BenchmarkReport, LoadSummary, PlanDump, SkippedUnit, ValidationReport,
    Workbench,
};
pub use pool::{ConnectionPool, PoolConfig};
