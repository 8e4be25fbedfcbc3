//! Document-driver plans: filters and aggregation pipelines.

use std::collections::BTreeMap;
use std::fmt;

use crossq_proto::{DatabaseTarget, LogicalQuery, SchemaModel, Value};

use super::{QueryPlan, QueryPlanBuilder};
use crate::catalog::{EntityDef, DOCUMENT_ID};
use crate::error::Result;
use crate::query::{CompareOp, Comparison, LogicalPlan, Predicate, UnwindSpec, PROJECTED_ELEMENT};
use crate::resolve::{FieldPath, FieldRole, SchemaPathResolver};

/// Output field of the window-count stage.
pub const WINDOW_COUNT_FIELD: &str = "totalCount";

/// Sort direction of a pipeline sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_i64(&self) -> i64 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// One aggregation pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// `$match` with a filter document.
    Match(Value),
    /// `$unwind` of an array path (without the `$` prefix).
    Unwind(String),
    /// `$project` with a projection document.
    Project(Value),
    /// `$setWindowFields` adding the total row count to every row.
    WindowCount { output: String },
    /// `$sort` with ordered keys.
    Sort(Vec<(String, SortOrder)>),
    /// `$limit`.
    Limit(usize),
}

impl Stage {
    /// Stage operator name.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "$match",
            Stage::Unwind(_) => "$unwind",
            Stage::Project(_) => "$project",
            Stage::WindowCount { .. } => "$setWindowFields",
            Stage::Sort(_) => "$sort",
            Stage::Limit(_) => "$limit",
        }
    }

    /// Stage body as native JSON text.
    ///
    /// Sort keys are written by hand since their order is significant.
    pub fn body(&self) -> String {
        match self {
            Stage::Match(filter) => filter.to_json_string(),
            Stage::Unwind(path) => Value::from(format!("${path}")).to_json_string(),
            Stage::Project(projection) => projection.to_json_string(),
            Stage::WindowCount { output } => Value::object([(
                "output",
                Value::object([(
                    output.as_str(),
                    Value::object([("$count", Value::object(Vec::<(String, Value)>::new()))]),
                )]),
            )])
            .to_json_string(),
            Stage::Sort(keys) => {
                let items: Vec<String> = keys
                    .iter()
                    .map(|(path, order)| {
                        format!("{}:{}", Value::from(path.as_str()).to_json_string(), order.as_i64())
                    })
                    .collect();
                format!("{{{}}}", items.join(","))
            }
            Stage::Limit(n) => n.to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{\"{}\":{}}}", self.name(), self.body())
    }
}

/// What a document plan runs.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOperation {
    /// Return every document matching the filter.
    Find { filter: Value },
    /// Run an aggregation pipeline.
    Aggregate { pipeline: Vec<Stage> },
}

/// A plan for the document driver family.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPlan {
    pub collection: String,
    pub operation: DocumentOperation,
}

impl DocumentPlan {
    /// Pipeline stages, empty for a find.
    pub fn stages(&self) -> &[Stage] {
        match &self.operation {
            DocumentOperation::Aggregate { pipeline } => pipeline,
            DocumentOperation::Find { .. } => &[],
        }
    }
}

impl fmt::Display for DocumentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operation {
            DocumentOperation::Find { filter } => {
                write!(f, "db.{}.find({})", self.collection, filter.to_json_string())
            }
            DocumentOperation::Aggregate { pipeline } => {
                writeln!(f, "db.{}.aggregate([", self.collection)?;
                for stage in pipeline {
                    writeln!(f, "  {stage},")?;
                }
                f.write_str("])")
            }
        }
    }
}

/// Builds filters and pipelines for a document target.
#[derive(Debug, Clone, Copy)]
pub struct DocumentPlanBuilder {
    target: DatabaseTarget,
    resolver: SchemaPathResolver,
}

impl DocumentPlanBuilder {
    pub fn new(target: DatabaseTarget) -> Self {
        Self {
            target,
            resolver: SchemaPathResolver::new(),
        }
    }

    /// Conjunctive filter document for a set of predicates.
    ///
    /// Under the normalized model the discriminator is always the first clause.
    pub fn filter_for(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        predicates: &[Predicate],
    ) -> Result<Value> {
        let mut clauses = Vec::with_capacity(predicates.len() + 1);
        if let Some(disc) = self.resolver.discriminator(query, model, self.target) {
            if let Some(path) = disc.field.path() {
                clauses.push(Value::object([(path.dotted(), Value::from(disc.value))]));
            }
        }
        for predicate in predicates {
            clauses.push(self.predicate(query, model, predicate)?);
        }
        Ok(Value::object([("$and", Value::Array(clauses))]))
    }

    fn path(&self, query: &LogicalQuery, model: SchemaModel, role: FieldRole) -> Result<FieldPath> {
        self.resolver.resolve_path(query, model, self.target, role)
    }

    fn predicate(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        predicate: &Predicate,
    ) -> Result<Value> {
        let clause = match predicate {
            Predicate::Compare(c) => {
                let path = self.path(query, model, c.role)?;
                Value::object([(path.dotted(), condition(c))])
            }
            Predicate::Range { role, min, max } => {
                let path = self.path(query, model, *role)?;
                Value::object([(
                    path.dotted(),
                    Value::object([("$gte", min.clone()), ("$lte", max.clone())]),
                )])
            }
            Predicate::ContainsText { role, term } => {
                let path = self.path(query, model, *role)?;
                Value::object([(
                    path.dotted(),
                    Value::object([
                        ("$regex", Value::from(regex::escape(term))),
                        ("$options", Value::from("i")),
                    ]),
                )])
            }
            Predicate::ArrayContains { array, value } => {
                let path = self.path(query, model, *array)?;
                Value::object([(path.dotted(), value.clone())])
            }
            Predicate::AnyElement { array, conditions } => {
                let path = self.path(query, model, *array)?;
                let mut element = BTreeMap::new();
                for c in conditions {
                    let field = self.path(query, model, c.role)?;
                    element.insert(field.dotted(), condition(c));
                }
                Value::object([(
                    path.dotted(),
                    Value::object([("$elemMatch", Value::Object(element))]),
                )])
            }
        };
        Ok(clause)
    }

    fn pipeline(
        &self,
        plan: &LogicalPlan,
        model: SchemaModel,
        unwind: &UnwindSpec,
    ) -> Result<Vec<Stage>> {
        let query = plan.query;
        let array = self.path(query, model, unwind.array)?;

        let mut pipeline = vec![
            Stage::Match(self.filter_for(query, model, &plan.predicates)?),
            Stage::Unwind(array.dotted()),
        ];

        let mut post = Vec::with_capacity(plan.post_unwind.len());
        for c in &plan.post_unwind {
            let field = array.join(&self.path(query, model, c.role)?);
            post.push(Value::object([(field.dotted(), condition(c))]));
        }
        pipeline.push(Stage::Match(Value::object([("$and", Value::Array(post))])));

        let mut projection = BTreeMap::new();
        for role in unwind.document_fields {
            let name = self.resolver.output_name(query, *role)?;
            let path = self.path(query, model, *role)?;
            let include = if path.dotted() == name {
                Value::Int64(1)
            } else {
                Value::from(format!("${path}"))
            };
            projection.insert(name, include);
        }
        let mut element = BTreeMap::new();
        for role in unwind.element_fields {
            let name = self.resolver.output_name(query, *role)?;
            let path = array.join(&self.path(query, model, *role)?);
            element.insert(name, Value::from(format!("${path}")));
        }
        projection.insert(PROJECTED_ELEMENT.to_string(), Value::Object(element));
        pipeline.push(Stage::Project(Value::Object(projection)));

        if self.target.supports_window_stage() {
            pipeline.push(Stage::WindowCount {
                output: WINDOW_COUNT_FIELD.to_string(),
            });
        }

        let sort_field = format!(
            "{PROJECTED_ELEMENT}.{}",
            self.resolver.output_name(query, unwind.sort)?
        );
        pipeline.push(Stage::Sort(vec![
            (sort_field, SortOrder::Descending),
            (DOCUMENT_ID.to_string(), SortOrder::Ascending),
        ]));
        pipeline.push(Stage::Limit(unwind.limit));
        Ok(pipeline)
    }
}

/// Condition value for a comparison: a bare value for equality, an operator
/// document otherwise.
fn condition(c: &Comparison) -> Value {
    match c.op {
        CompareOp::Eq => c.value.clone(),
        op => Value::object([(op.document(), c.value.clone())]),
    }
}

impl QueryPlanBuilder for DocumentPlanBuilder {
    fn target(&self) -> DatabaseTarget {
        self.target
    }

    fn compile(&self, plan: &LogicalPlan, model: SchemaModel) -> Result<QueryPlan> {
        let collection = EntityDef::of(plan.query.entity)
            .collection(model)
            .to_string();
        let operation = match &plan.unwind {
            Some(unwind) => DocumentOperation::Aggregate {
                pipeline: self.pipeline(plan, model, unwind)?,
            },
            None => DocumentOperation::Find {
                filter: self.filter_for(plan.query, model, &plan.predicates)?,
            },
        };
        Ok(QueryPlan::Document(DocumentPlan {
            collection,
            operation,
        }))
    }
}
