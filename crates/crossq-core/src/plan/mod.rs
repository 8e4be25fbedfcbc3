//! Target-native query plans and the builders that produce them.
//!
//! Each [`DatabaseTarget`] has its own [`QueryPlanBuilder`], registered in a
//! [`PlanRegistry`]. Builders share the [`LogicalPlan`] and the
//! [`SchemaPathResolver`]; they never share path constants.

mod document;
pub mod sql;

use std::collections::HashMap;
use std::fmt;

use crossq_proto::{DatabaseTarget, LogicalQuery, ParameterSet, SchemaModel, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::query::LogicalPlan;

pub use document::{DocumentOperation, DocumentPlan, DocumentPlanBuilder, SortOrder, Stage};
pub use sql::{Dialect, DualityViewBuilder, RelationalBuilder, SqlJsonBuilder, SqlPlan};

/// An executable plan in a target's native form.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    /// Filter or aggregation pipeline for the document driver family.
    Document(DocumentPlan),
    /// Parameterized statement for the SQL driver family.
    Sql(SqlPlan),
}

impl QueryPlan {
    pub fn as_document(&self) -> Option<&DocumentPlan> {
        match self {
            QueryPlan::Document(plan) => Some(plan),
            QueryPlan::Sql(_) => None,
        }
    }

    pub fn as_sql(&self) -> Option<&SqlPlan> {
        match self {
            QueryPlan::Sql(plan) => Some(plan),
            QueryPlan::Document(_) => None,
        }
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPlan::Document(plan) => plan.fmt(f),
            QueryPlan::Sql(plan) => plan.fmt(f),
        }
    }
}

/// Compiles logical queries into one target's native plans.
pub trait QueryPlanBuilder: Send + Sync {
    /// The target this builder compiles for.
    fn target(&self) -> DatabaseTarget;

    /// Compile a bound logical plan under a schema model.
    fn compile(&self, plan: &LogicalPlan, model: SchemaModel) -> Result<QueryPlan>;

    /// Bind parameters and compile.
    fn build(
        &self,
        query: &'static LogicalQuery,
        model: SchemaModel,
        params: &ParameterSet,
    ) -> Result<QueryPlan> {
        let logical = LogicalPlan::for_query(query, params)?;
        self.compile(&logical, model)
    }
}

/// Builders keyed by target.
pub struct PlanRegistry {
    builders: HashMap<DatabaseTarget, Box<dyn QueryPlanBuilder>>,
}

impl PlanRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Registry with a builder for every target, rendering SQL in `dialect`.
    pub fn with_defaults(dialect: Dialect) -> Self {
        let mut registry = Self::new();
        registry.register(DocumentPlanBuilder::new(DatabaseTarget::DocumentStore));
        registry.register(DocumentPlanBuilder::new(DatabaseTarget::DocumentApi));
        registry.register(SqlJsonBuilder::new(dialect));
        registry.register(RelationalBuilder::new(dialect));
        registry.register(DualityViewBuilder::new(dialect));
        registry
    }

    /// Register a builder, replacing any builder for the same target.
    pub fn register<B: QueryPlanBuilder + 'static>(&mut self, builder: B) {
        self.builders.insert(builder.target(), Box::new(builder));
    }

    /// Look up the builder for a target.
    pub fn get(&self, target: DatabaseTarget) -> Result<&dyn QueryPlanBuilder> {
        self.builders
            .get(&target)
            .map(|b| b.as_ref())
            .ok_or(Error::NoBuilder(target))
    }

    /// Registered targets, in declaration order.
    pub fn targets(&self) -> Vec<DatabaseTarget> {
        DatabaseTarget::ALL
            .into_iter()
            .filter(|t| self.builders.contains_key(t))
            .collect()
    }

    /// Build the plan for one (target, query, model, parameters).
    pub fn build(
        &self,
        target: DatabaseTarget,
        query: &'static LogicalQuery,
        model: SchemaModel,
        params: &ParameterSet,
    ) -> Result<QueryPlan> {
        let plan = self.get(target)?.build(query, model, params)?;
        debug!(query = %query.id, %model, %target, plan = %plan, "built plan");
        Ok(plan)
    }
}

impl Default for PlanRegistry {
    fn default() -> Self {
        Self::with_defaults(Dialect::Sqlite)
    }
}

/// Render a bind list as `[v1, v2, ...]` for plan dumps.
pub(crate) fn format_binds(binds: &[Value]) -> String {
    let items: Vec<String> = binds.iter().map(Value::to_json_string).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossq_proto::{ParamName, QueryId};

    #[test]
    fn test_defaults_cover_every_target() {
        let registry = PlanRegistry::default();
        assert_eq!(registry.targets(), DatabaseTarget::ALL.to_vec());
    }

    #[test]
    fn test_missing_builder_is_fatal() {
        let registry = PlanRegistry::new();
        let err = registry.get(DatabaseTarget::Relational).err().unwrap();
        assert!(matches!(err, Error::NoBuilder(DatabaseTarget::Relational)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_driver_family_decides_plan_kind() {
        let registry = PlanRegistry::default();
        let params = ParameterSet::new().with(ParamName::AdvisorId, "ADV001");
        let query = QueryId::InvestorsByAdvisor.definition();
        for target in DatabaseTarget::ALL {
            let plan = registry
                .build(target, query, SchemaModel::Embedded, &params)
                .unwrap();
            match target.driver_family() {
                crossq_proto::DriverFamily::Document => assert!(plan.as_document().is_some()),
                crossq_proto::DriverFamily::Sql => assert!(plan.as_sql().is_some()),
            }
        }
    }
}
