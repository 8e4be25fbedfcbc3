//! JOIN/EXISTS SQL over parent and child tables.

use crossq_proto::{DatabaseTarget, LogicalQuery, SchemaModel, Value};

use super::ast::{FromItem, Select, SqlExpr, SqlPredicate};
use super::json::ranked_outer;
use super::reconstruct::{document_expression, DocumentLayout};
use super::{Dialect, SqlPlan, DOC_ID_COLUMN, ELEMENT_ALIAS, PARENT_ALIAS, SORT_VALUE_COLUMN, UNWIND_ALIAS};
use crate::catalog::{EntityDef, DOC_COLUMN, ID_COLUMN, PARENT_COLUMN};
use crate::error::{Error, Result};
use crate::plan::{QueryPlan, QueryPlanBuilder};
use crate::query::{CompareOp, Comparison, LogicalPlan, Predicate, UnwindSpec, PROJECTED_ELEMENT};
use crate::resolve::{FieldRole, PhysicalField, SchemaPathResolver};

/// Builder for relational statements.
///
/// Filters on sub-entities use correlated `EXISTS` so parent rows are never
/// multiplied; ranked queries join the child table once, matching the unwind.
#[derive(Debug, Clone, Copy)]
pub struct RelationalBuilder {
    dialect: Dialect,
    resolver: SchemaPathResolver,
}

impl RelationalBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            resolver: SchemaPathResolver::new(),
        }
    }

    fn resolve(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        role: FieldRole,
    ) -> Result<PhysicalField> {
        self.resolver
            .resolve(query, model, DatabaseTarget::Relational, role)
    }

    fn unmapped(query: &LogicalQuery, model: SchemaModel, role: FieldRole) -> Error {
        Error::Unmapped {
            query: query.id,
            model,
            target: DatabaseTarget::Relational,
            role,
        }
    }

    /// Column expression of a scalar role, read through `alias`.
    fn column(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        alias: &str,
        role: FieldRole,
    ) -> Result<SqlExpr> {
        match self.resolve(query, model, role)? {
            PhysicalField::Column { column, .. } => Ok(SqlExpr::column(alias, column)),
            _ => Err(Self::unmapped(query, model, role)),
        }
    }

    fn child_table(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        array: FieldRole,
    ) -> Result<(String, Option<&'static str>)> {
        match self.resolve(query, model, array)? {
            PhysicalField::ChildTable {
                table,
                value_column,
            } => Ok((table, value_column.map(|(column, _)| column))),
            _ => Err(Self::unmapped(query, model, array)),
        }
    }

    fn comparison(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        alias: &str,
        c: &Comparison,
    ) -> Result<SqlPredicate> {
        Ok(SqlPredicate::compare(
            self.column(query, model, alias, c.role)?,
            c.op,
            SqlExpr::Bind(c.value.clone()),
        ))
    }

    fn correlated(alias: &str) -> SqlPredicate {
        SqlPredicate::compare(
            SqlExpr::column(alias, PARENT_COLUMN),
            CompareOp::Eq,
            SqlExpr::column(PARENT_ALIAS, ID_COLUMN),
        )
    }

    fn exists(table: String, mut filter: Vec<SqlPredicate>) -> SqlPredicate {
        filter.insert(0, Self::correlated(ELEMENT_ALIAS));
        SqlPredicate::Exists(Box::new(Select {
            from: vec![FromItem::Table {
                name: table,
                alias: ELEMENT_ALIAS.to_string(),
            }],
            filter,
            ..Select::default()
        }))
    }

    fn filter(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        predicates: &[Predicate],
    ) -> Result<Vec<SqlPredicate>> {
        let mut filter = Vec::with_capacity(predicates.len() + 1);
        if let Some(disc) = self
            .resolver
            .discriminator(query, model, DatabaseTarget::Relational)
        {
            if let PhysicalField::Column { column, .. } = disc.field {
                filter.push(SqlPredicate::compare(
                    SqlExpr::column(PARENT_ALIAS, column),
                    CompareOp::Eq,
                    SqlExpr::Bind(Value::from(disc.value)),
                ));
            }
        }

        for predicate in predicates {
            let clause = match predicate {
                Predicate::Compare(c) => self.comparison(query, model, PARENT_ALIAS, c)?,
                Predicate::Range { role, min, max } => SqlPredicate::Between {
                    expr: self.column(query, model, PARENT_ALIAS, *role)?,
                    low: SqlExpr::Bind(min.clone()),
                    high: SqlExpr::Bind(max.clone()),
                },
                Predicate::ContainsText { role, term } => SqlPredicate::ContainsInsensitive {
                    expr: self.column(query, model, PARENT_ALIAS, *role)?,
                    term: SqlExpr::Bind(Value::from(term.as_str())),
                },
                Predicate::ArrayContains { array, value } => {
                    let (table, column) = self.child_table(query, model, *array)?;
                    let column = column.ok_or_else(|| Self::unmapped(query, model, *array))?;
                    Self::exists(
                        table,
                        vec![SqlPredicate::compare(
                            SqlExpr::column(ELEMENT_ALIAS, column),
                            CompareOp::Eq,
                            SqlExpr::Bind(value.clone()),
                        )],
                    )
                }
                Predicate::AnyElement { array, conditions } => {
                    let (table, _) = self.child_table(query, model, *array)?;
                    let mut inner = Vec::with_capacity(conditions.len());
                    for c in conditions {
                        inner.push(self.comparison(query, model, ELEMENT_ALIAS, c)?);
                    }
                    Self::exists(table, inner)
                }
            };
            filter.push(clause);
        }
        Ok(filter)
    }

    fn ranked(
        &self,
        plan: &LogicalPlan,
        model: SchemaModel,
        unwind: &UnwindSpec,
        parent: &str,
        mut filter: Vec<SqlPredicate>,
    ) -> Result<Select> {
        let query = plan.query;
        let (child, _) = self.child_table(query, model, unwind.array)?;

        for c in &plan.post_unwind {
            filter.push(self.comparison(query, model, UNWIND_ALIAS, c)?);
        }

        let mut projection = Vec::new();
        for role in unwind.document_fields {
            projection.push((
                self.resolver.output_name(query, *role)?,
                self.column(query, model, PARENT_ALIAS, *role)?,
            ));
        }
        let mut element = Vec::new();
        for role in unwind.element_fields {
            element.push((
                self.resolver.output_name(query, *role)?,
                self.column(query, model, UNWIND_ALIAS, *role)?,
            ));
        }
        projection.push((PROJECTED_ELEMENT.to_string(), SqlExpr::JsonObject(element)));

        let inner = Select {
            columns: vec![
                (
                    self.column(query, model, PARENT_ALIAS, FieldRole::DocumentId)?,
                    Some(DOC_ID_COLUMN.to_string()),
                ),
                (
                    self.column(query, model, UNWIND_ALIAS, unwind.sort)?,
                    Some(SORT_VALUE_COLUMN.to_string()),
                ),
                (
                    SqlExpr::JsonObject(projection),
                    Some(DOC_COLUMN.to_string()),
                ),
            ],
            from: vec![
                FromItem::table(parent, PARENT_ALIAS),
                FromItem::Join {
                    name: child,
                    alias: UNWIND_ALIAS.to_string(),
                    on: Self::correlated(UNWIND_ALIAS),
                },
            ],
            filter,
            ..Select::default()
        };
        Ok(ranked_outer(inner, unwind.limit))
    }

    fn statement(&self, plan: &LogicalPlan, model: SchemaModel) -> Result<SqlPlan> {
        let query = plan.query;
        let def = EntityDef::of(query.entity);
        let parent = def.parent_table(model);
        let filter = self.filter(query, model, &plan.predicates)?;

        let select = match &plan.unwind {
            None => Select {
                columns: vec![(
                    document_expression(def, model, DocumentLayout::Nested, PARENT_ALIAS),
                    Some(DOC_COLUMN.to_string()),
                )],
                from: vec![FromItem::table(parent, PARENT_ALIAS)],
                filter,
                ..Select::default()
            },
            Some(unwind) => self.ranked(plan, model, unwind, parent, filter)?,
        };
        Ok(SqlPlan::render(self.dialect, &select))
    }
}

impl QueryPlanBuilder for RelationalBuilder {
    fn target(&self) -> DatabaseTarget {
        DatabaseTarget::Relational
    }

    fn compile(&self, plan: &LogicalPlan, model: SchemaModel) -> Result<QueryPlan> {
        Ok(QueryPlan::Sql(self.statement(plan, model)?))
    }
}
