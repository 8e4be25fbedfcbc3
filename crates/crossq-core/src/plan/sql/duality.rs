//! JSON-path SQL over relational-to-document projection views.
//!
//! The statement structure matches the JSON-table builder, but every path
//! comes from the duality mapping: arrays sit at the top level under plural
//! names instead of inside `entitlements`.

use crossq_proto::{DatabaseTarget, SchemaModel};

use super::json::JsonPathCompiler;
use super::Dialect;
use crate::catalog::EntityDef;
use crate::error::Result;
use crate::plan::{QueryPlan, QueryPlanBuilder};
use crate::query::LogicalPlan;

/// Builder for statements against duality views.
#[derive(Debug, Clone, Copy)]
pub struct DualityViewBuilder {
    compiler: JsonPathCompiler,
}

impl DualityViewBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            compiler: JsonPathCompiler::new(DatabaseTarget::DualityView, dialect),
        }
    }
}

impl QueryPlanBuilder for DualityViewBuilder {
    fn target(&self) -> DatabaseTarget {
        DatabaseTarget::DualityView
    }

    fn compile(&self, plan: &LogicalPlan, model: SchemaModel) -> Result<QueryPlan> {
        let view = EntityDef::of(plan.query.entity).duality_view(model);
        Ok(QueryPlan::Sql(self.compiler.compile(plan, model, &view)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::SqlJsonBuilder;
    use crossq_proto::{ParamName, ParameterSet, QueryId, Value};

    fn entitlements() -> ParameterSet {
        ParameterSet::new()
            .with(ParamName::PxPartyRoleId, 77i64)
            .with(ParamName::AdvisoryContext, "CTX03")
            .with(ParamName::AdvisorId, "ADV002")
    }

    #[test]
    fn test_flattened_paths_differ_from_json_tables() {
        let query = QueryId::InvestorEntitlements.definition();
        let view = DualityViewBuilder::new(Dialect::Sqlite)
            .build(query, SchemaModel::Embedded, &entitlements())
            .unwrap();
        let table = SqlJsonBuilder::new(Dialect::Sqlite)
            .build(query, SchemaModel::Embedded, &entitlements())
            .unwrap();
        let view = view.as_sql().unwrap();
        let table = table.as_sql().unwrap();

        assert!(view.statement.contains("FROM investor_dv d"));
        assert!(view.statement.contains("json_each(d.doc, '$.pxPartyRoleIds') e"));
        assert!(view.statement.contains("json_each(d.doc, '$.advisoryContexts') e"));
        assert!(table
            .statement
            .contains("json_each(d.doc, '$.entitlements.pxPartyRoleIdList') e"));
        assert_eq!(view.binds, table.binds);
        assert_eq!(
            view.binds,
            vec![Value::Int64(77), Value::from("CTX03"), Value::from("ADV002")]
        );
    }

    #[test]
    fn test_normalized_views_share_one_name() {
        let params = ParameterSet::new()
            .with(ParamName::PartyNodePathValue, "N1/N2")
            .with(ParamName::PersonaNm, "Planner");
        let plan = DualityViewBuilder::new(Dialect::Sqlite)
            .build(
                QueryId::AdvisorsByHierarchyPersona.definition(),
                SchemaModel::Normalized,
                &params,
            )
            .unwrap();
        let plan = plan.as_sql().unwrap();
        assert!(plan.statement.contains("FROM book_role_dv d"));
        assert!(plan.statement.contains("'$.partyNodePaths'"));
        assert_eq!(plan.binds[0], Value::from("Advisor"));
    }
}
