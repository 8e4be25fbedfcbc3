//! JSON-path SQL over stored documents.

use crossq_proto::{DatabaseTarget, LogicalQuery, SchemaModel, Value};

use super::ast::{FromItem, OrderItem, Select, SqlExpr, SqlPredicate};
use super::{
    Dialect, SqlPlan, DOCUMENT_ALIAS, DOC_ID_COLUMN, ELEMENT_ALIAS, RANKED_ALIAS,
    SORT_VALUE_COLUMN, UNWIND_ALIAS,
};
use crate::catalog::{EntityDef, ScalarKind, DOC_COLUMN};
use crate::error::Result;
use crate::plan::{QueryPlan, QueryPlanBuilder};
use crate::query::{CompareOp, Comparison, LogicalPlan, Predicate, UnwindSpec, PROJECTED_ELEMENT};
use crate::resolve::{FieldPath, FieldRole, SchemaPathResolver};

/// Compiles logical plans into JSON-path SQL against a document column.
///
/// Shared by the JSON-table and duality-view builders; the target decides
/// which paths the resolver hands out.
#[derive(Debug, Clone, Copy)]
pub(super) struct JsonPathCompiler {
    pub target: DatabaseTarget,
    pub dialect: Dialect,
    resolver: SchemaPathResolver,
}

impl JsonPathCompiler {
    pub fn new(target: DatabaseTarget, dialect: Dialect) -> Self {
        Self {
            target,
            dialect,
            resolver: SchemaPathResolver::new(),
        }
    }

    fn document() -> SqlExpr {
        SqlExpr::column(DOCUMENT_ALIAS, DOC_COLUMN)
    }

    fn element(alias: &str) -> SqlExpr {
        SqlExpr::column(alias, "value")
    }

    fn scalar(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        base: SqlExpr,
        role: FieldRole,
    ) -> Result<SqlExpr> {
        let field = self.resolver.resolve(query, model, self.target, role)?;
        let kind = field.kind().unwrap_or(ScalarKind::Text);
        let path = self.resolver.resolve_path(query, model, self.target, role)?;
        Ok(SqlExpr::json(base, path, kind))
    }

    fn array_path(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        role: FieldRole,
    ) -> Result<FieldPath> {
        self.resolver.resolve_path(query, model, self.target, role)
    }

    fn comparison(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        base: SqlExpr,
        c: &Comparison,
    ) -> Result<SqlPredicate> {
        Ok(SqlPredicate::compare(
            self.scalar(query, model, base, c.role)?,
            c.op,
            SqlExpr::Bind(c.value.clone()),
        ))
    }

    /// Filter clauses: discriminator first, then each predicate.
    pub fn filter(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        predicates: &[Predicate],
    ) -> Result<Vec<SqlPredicate>> {
        let mut filter = Vec::with_capacity(predicates.len() + 1);
        if let Some(disc) = self.resolver.discriminator(query, model, self.target) {
            if let Some(path) = disc.field.path() {
                filter.push(SqlPredicate::compare(
                    SqlExpr::json(Self::document(), path.clone(), ScalarKind::Text),
                    CompareOp::Eq,
                    SqlExpr::Bind(Value::from(disc.value)),
                ));
            }
        }

        for predicate in predicates {
            let clause = match predicate {
                Predicate::Compare(c) => self.comparison(query, model, Self::document(), c)?,
                Predicate::Range { role, min, max } => SqlPredicate::Between {
                    expr: self.scalar(query, model, Self::document(), *role)?,
                    low: SqlExpr::Bind(min.clone()),
                    high: SqlExpr::Bind(max.clone()),
                },
                Predicate::ContainsText { role, term } => SqlPredicate::ContainsInsensitive {
                    expr: self.scalar(query, model, Self::document(), *role)?,
                    term: SqlExpr::Bind(Value::from(term.as_str())),
                },
                Predicate::ArrayContains { array, value } => {
                    let field = self.resolver.resolve(query, model, self.target, *array)?;
                    let kind = field.kind().unwrap_or(ScalarKind::Text);
                    SqlPredicate::Exists(Box::new(Select {
                        from: vec![FromItem::JsonArray {
                            base: Self::document(),
                            path: self.array_path(query, model, *array)?,
                            alias: ELEMENT_ALIAS.to_string(),
                        }],
                        filter: vec![SqlPredicate::compare(
                            SqlExpr::json(Self::element(ELEMENT_ALIAS), FieldPath::root(), kind),
                            CompareOp::Eq,
                            SqlExpr::Bind(value.clone()),
                        )],
                        ..Select::default()
                    }))
                }
                Predicate::AnyElement { array, conditions } => {
                    let mut inner = Vec::with_capacity(conditions.len());
                    for c in conditions {
                        inner.push(self.comparison(
                            query,
                            model,
                            Self::element(ELEMENT_ALIAS),
                            c,
                        )?);
                    }
                    SqlPredicate::Exists(Box::new(Select {
                        from: vec![FromItem::JsonArray {
                            base: Self::document(),
                            path: self.array_path(query, model, *array)?,
                            alias: ELEMENT_ALIAS.to_string(),
                        }],
                        filter: inner,
                        ..Select::default()
                    }))
                }
            };
            filter.push(clause);
        }
        Ok(filter)
    }

    /// Statement over `source`, one row per matching document or ranked element.
    pub fn compile(&self, plan: &LogicalPlan, model: SchemaModel, source: &str) -> Result<SqlPlan> {
        let query = plan.query;
        let filter = self.filter(query, model, &plan.predicates)?;
        let select = match &plan.unwind {
            None => Select {
                columns: vec![(Self::document(), None)],
                from: vec![FromItem::table(source, DOCUMENT_ALIAS)],
                filter,
                ..Select::default()
            },
            Some(unwind) => self.ranked(plan, model, unwind, source, filter)?,
        };
        Ok(SqlPlan::render(self.dialect, &select))
    }

    fn ranked(
        &self,
        plan: &LogicalPlan,
        model: SchemaModel,
        unwind: &UnwindSpec,
        source: &str,
        mut filter: Vec<SqlPredicate>,
    ) -> Result<Select> {
        let query = plan.query;
        let unwound = || Self::element(UNWIND_ALIAS);

        for c in &plan.post_unwind {
            filter.push(self.comparison(query, model, unwound(), c)?);
        }

        let mut projection = Vec::new();
        for role in unwind.document_fields {
            projection.push((
                self.resolver.output_name(query, *role)?,
                self.scalar(query, model, Self::document(), *role)?,
            ));
        }
        let mut element = Vec::new();
        for role in unwind.element_fields {
            element.push((
                self.resolver.output_name(query, *role)?,
                self.scalar(query, model, unwound(), *role)?,
            ));
        }
        projection.push((PROJECTED_ELEMENT.to_string(), SqlExpr::JsonObject(element)));

        let inner = Select {
            columns: vec![
                (
                    self.scalar(query, model, Self::document(), FieldRole::DocumentId)?,
                    Some(DOC_ID_COLUMN.to_string()),
                ),
                (
                    self.scalar(query, model, unwound(), unwind.sort)?,
                    Some(SORT_VALUE_COLUMN.to_string()),
                ),
                (
                    SqlExpr::JsonObject(projection),
                    Some(DOC_COLUMN.to_string()),
                ),
            ],
            from: vec![
                FromItem::table(source, DOCUMENT_ALIAS),
                FromItem::JsonArray {
                    base: Self::document(),
                    path: self.array_path(query, model, unwind.array)?,
                    alias: UNWIND_ALIAS.to_string(),
                },
            ],
            filter,
            ..Select::default()
        };

        Ok(ranked_outer(inner, unwind.limit))
    }
}

/// Wrap a ranked inner select: order by sort value, then document id.
pub(super) fn ranked_outer(inner: Select, limit: usize) -> Select {
    Select {
        columns: vec![(SqlExpr::column(RANKED_ALIAS, DOC_COLUMN), None)],
        from: vec![FromItem::Derived {
            select: Box::new(inner),
            alias: RANKED_ALIAS.to_string(),
        }],
        filter: Vec::new(),
        order_by: vec![
            OrderItem::desc(SqlExpr::column(RANKED_ALIAS, SORT_VALUE_COLUMN)),
            OrderItem::asc_binary(SqlExpr::column(RANKED_ALIAS, DOC_ID_COLUMN)),
        ],
        limit: Some(limit),
    }
}

/// Builder for JSON-path SQL over tables of stored documents.
#[derive(Debug, Clone, Copy)]
pub struct SqlJsonBuilder {
    compiler: JsonPathCompiler,
}

impl SqlJsonBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            compiler: JsonPathCompiler::new(DatabaseTarget::SqlJson, dialect),
        }
    }
}

impl QueryPlanBuilder for SqlJsonBuilder {
    fn target(&self) -> DatabaseTarget {
        DatabaseTarget::SqlJson
    }

    fn compile(&self, plan: &LogicalPlan, model: SchemaModel) -> Result<QueryPlan> {
        let source = EntityDef::of(plan.query.entity).json_table(model);
        Ok(QueryPlan::Sql(self.compiler.compile(plan, model, &source)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossq_proto::{ParamName, ParameterSet, QueryId};

    fn build(query: QueryId, model: SchemaModel, params: &ParameterSet) -> SqlPlan {
        SqlJsonBuilder::new(Dialect::Sqlite)
            .build(query.definition(), model, params)
            .unwrap()
            .as_sql()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_ranked_statement() {
        let params = ParameterSet::new().with(ParamName::AdvisorId, "ADV001");
        let plan = build(QueryId::InvestorsByAdvisor, SchemaModel::Embedded, &params);

        assert!(plan.statement.starts_with(
            "SELECT r.doc FROM (SELECT json_extract(d.doc, '$._id') AS doc_id, \
             CAST(json_extract(a.value, '$.viewableMarketValue') AS REAL) AS sort_value, \
             json_object('_id', json_extract(d.doc, '$._id'), 'investorId'"
        ));
        assert!(plan
            .statement
            .contains("FROM investor_doc d, json_each(d.doc, '$.advisors') a WHERE"));
        assert!(plan.statement.ends_with(
            "ORDER BY r.sort_value DESC, r.doc_id COLLATE BINARY ASC LIMIT 50"
        ));
        assert_eq!(
            plan.binds,
            vec![
                Value::from("Client"),
                Value::from("ADV001"),
                Value::Int64(1),
                Value::from("ADV001"),
                Value::Int64(1),
            ]
        );
        assert_eq!(plan.placeholder_count(), plan.binds.len());
    }

    #[test]
    fn test_normalized_filter_adds_discriminator() {
        let params = ParameterSet::new()
            .with(ParamName::FundTicker, "VTI")
            .with(ParamName::AdvisoryContext, "CTX01");
        let plan = build(QueryId::AccountsByFundTicker, SchemaModel::Normalized, &params);

        assert!(plan.statement.starts_with(
            "SELECT d.doc FROM book_role_doc d WHERE json_extract(d.doc, '$.type') = ?"
        ));
        assert!(plan
            .statement
            .contains("json_each(d.doc, '$.holdingsMetadata') e"));
        assert!(plan
            .statement
            .contains("json_each(d.doc, '$.entitlementsMetadata.advisoryContext') e WHERE e.value = ?"));
        assert_eq!(
            plan.binds,
            vec![Value::from("Account"), Value::from("VTI"), Value::from("CTX01")]
        );
    }

    #[test]
    fn test_range_and_search_typing() {
        let params = ParameterSet::new()
            .with(ParamName::MinMarketValue, 0.0)
            .with(ParamName::MaxMarketValue, 100.0);
        let plan = build(QueryId::InvestorMarketValueRange, SchemaModel::Embedded, &params);
        assert!(plan.statement.contains(
            "CAST(json_extract(d.doc, '$.totalViewableAccountsMarketValue') AS REAL) BETWEEN ? AND ?"
        ));

        let params = ParameterSet::new()
            .with(ParamName::SearchTerm, "SMI")
            .with(ParamName::PartyRoleId, 5i64);
        let plan = build(QueryId::InvestorNameSearch, SchemaModel::Embedded, &params);
        assert!(plan
            .statement
            .contains("instr(lower(json_extract(d.doc, '$.investorFullName')), lower(?)) > 0"));
        assert!(plan
            .statement
            .contains("CAST(json_extract(d.doc, '$.partyRoleId') AS INTEGER) = ?"));
    }

    #[test]
    fn test_postgres_ranked_statement() {
        let params = ParameterSet::new().with(ParamName::AdvisorId, "ADV001");
        let plan = SqlJsonBuilder::new(Dialect::Postgres)
            .build(
                QueryId::GroupsByAdvisor.definition(),
                SchemaModel::Embedded,
                &params,
            )
            .unwrap();
        let plan = plan.as_sql().unwrap();
        assert!(plan.statement.contains("jsonb_array_elements(d.doc #> '{advisors}') AS a(value)"));
        assert!(plan.statement.contains("(d.doc #>> '{status}') <> $1"));
        assert!(plan
            .statement
            .ends_with("r.doc_id COLLATE \"C\" ASC FETCH FIRST 50 ROWS ONLY"));
        assert_eq!(plan.placeholder_count(), 5);
    }
}
