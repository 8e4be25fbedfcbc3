//! Execution backends for the five targets.
//!
//! The two document targets run on the in-process [`DocumentEngine`]; the
//! three SQL targets share one [`SqlBackend`] (SQLite, or PostgreSQL with
//! the `postgres` feature) holding JSON tables, relational tables, and
//! duality views side by side.

pub mod document;
pub mod schema;
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

use std::sync::Arc;

use crossq_core::plan::SqlPlan;
use crossq_core::{Dialect, QueryPlan, RawResult, TargetExecutor};
use crossq_proto::{DatabaseTarget, SchemaModel};

use crate::error::{Error, Result};
use crate::fixtures::Dataset;

pub use document::{DocumentEngine, DocumentExecutor, Filter};
pub use sqlite::SqliteBackend;

#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;

/// A relational database holding the SQL targets' structures.
pub trait SqlBackend: Send + Sync {
    /// Dialect plans must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Drop and recreate every table and view of the given models.
    fn provision(&self, models: &[SchemaModel]) -> Result<()>;

    /// Insert a dataset under each model. Returns the number of rows written.
    fn load(&self, dataset: &Dataset, models: &[SchemaModel]) -> Result<usize>;

    /// Run a statement whose single output column is a JSON document.
    fn query(&self, plan: &SqlPlan) -> Result<RawResult>;
}

/// Runs SQL plans for one SQL target.
#[derive(Clone)]
pub struct SqlExecutor {
    backend: Arc<dyn SqlBackend>,
    target: DatabaseTarget,
}

impl SqlExecutor {
    pub fn new(backend: Arc<dyn SqlBackend>, target: DatabaseTarget) -> Self {
        Self { backend, target }
    }

    fn run(&self, plan: &QueryPlan) -> Result<RawResult> {
        let unsupported = |what: String| Error::Core(crossq_core::Error::Unsupported(what));
        let plan = plan
            .as_sql()
            .ok_or_else(|| unsupported(format!("{} cannot run document plans", self.target)))?;
        if plan.dialect != self.backend.dialect() {
            return Err(unsupported(format!(
                "{} plan on a {} backend",
                plan.dialect,
                self.backend.dialect()
            )));
        }
        self.backend.query(plan)
    }
}

impl TargetExecutor for SqlExecutor {
    fn target(&self) -> DatabaseTarget {
        self.target
    }

    fn execute(&self, plan: &QueryPlan, _model: SchemaModel) -> crossq_core::Result<RawResult> {
        self.run(plan).map_err(|e| e.into_core(self.target))
    }
}
