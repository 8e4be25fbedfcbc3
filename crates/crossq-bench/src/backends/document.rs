//! In-process document engine.
//!
//! Holds collections of [`Value`] documents and evaluates the filter and
//! pipeline subset the document builders emit: `$and`, implicit equality
//! with array membership, `$eq`/`$ne`/`$gt`/`$gte`/`$lt`/`$lte`/`$in`,
//! `$regex` with `$options`, `$elemMatch`, and the `$match`, `$unwind`,
//! `$project`, `$setWindowFields` count, `$sort`, and `$limit` stages.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crossq_core::catalog::EntityDef;
use crossq_core::plan::{DocumentOperation, DocumentPlanBuilder, SortOrder, Stage};
use crossq_core::{CandidateSource, Predicate, QueryPlan, RawResult, TargetExecutor};
use crossq_proto::{DatabaseTarget, LogicalQuery, SchemaModel, Value};
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::fixtures::Dataset;

/// A compiled document filter.
#[derive(Debug)]
pub struct Filter {
    clauses: Vec<Clause>,
}

#[derive(Debug)]
enum Clause {
    And(Vec<Filter>),
    Field {
        path: Vec<String>,
        conditions: Vec<Condition>,
    },
}

#[derive(Debug)]
enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Regex(Regex),
    ElemMatch(Filter),
}

fn unsupported(what: impl std::fmt::Display) -> Error {
    Error::Core(crossq_core::Error::Unsupported(what.to_string()))
}

impl Filter {
    /// Compile a filter document.
    pub fn compile(doc: &Value) -> Result<Filter> {
        let map = doc
            .as_object()
            .ok_or_else(|| unsupported(format!("filter must be an object: {doc}")))?;
        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            if key == "$and" {
                let items = value
                    .as_array()
                    .ok_or_else(|| unsupported("$and requires an array"))?;
                let filters = items.iter().map(Filter::compile).collect::<Result<_>>()?;
                clauses.push(Clause::And(filters));
            } else if key.starts_with('$') {
                return Err(unsupported(format!("filter operator {key}")));
            } else {
                clauses.push(Clause::Field {
                    path: key.split('.').map(str::to_string).collect(),
                    conditions: compile_conditions(value)?,
                });
            }
        }
        Ok(Filter { clauses })
    }

    /// Whether a document satisfies every clause.
    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Clause::Field { path, conditions } => {
                let mut values = Vec::new();
                collect(doc, path, &mut values);
                conditions.iter().all(|c| c.holds(&values))
            }
        })
    }
}

fn is_operator_document(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| !map.is_empty() && map.keys().all(|k| k.starts_with('$')))
}

fn compile_conditions(value: &Value) -> Result<Vec<Condition>> {
    if !is_operator_document(value) {
        return Ok(vec![Condition::Eq(value.clone())]);
    }
    let Some(ops) = value.as_object() else {
        return Ok(Vec::new());
    };
    let mut conditions = Vec::with_capacity(ops.len());
    for (op, operand) in ops {
        let condition = match op.as_str() {
            "$eq" => Condition::Eq(operand.clone()),
            "$ne" => Condition::Ne(operand.clone()),
            "$gt" => Condition::Gt(operand.clone()),
            "$gte" => Condition::Gte(operand.clone()),
            "$lt" => Condition::Lt(operand.clone()),
            "$lte" => Condition::Lte(operand.clone()),
            "$in" => Condition::In(
                operand
                    .as_array()
                    .ok_or_else(|| unsupported("$in requires an array"))?
                    .to_vec(),
            ),
            "$regex" => {
                let pattern = operand
                    .as_str()
                    .ok_or_else(|| unsupported("$regex requires a string"))?;
                let options = ops.get("$options").and_then(Value::as_str).unwrap_or("");
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(options.contains('i'))
                    .build()?;
                Condition::Regex(regex)
            }
            "$options" => continue,
            "$elemMatch" => Condition::ElemMatch(Filter::compile(operand)?),
            other => return Err(unsupported(format!("filter operator {other}"))),
        };
        conditions.push(condition);
    }
    Ok(conditions)
}

/// Collect every value reached by `path`, descending through arrays of objects.
fn collect<'a>(value: &'a Value, path: &[String], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = path.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(head) {
                collect(child, rest, out);
            }
        }
        Value::Array(items) => {
            for item in items.iter().filter(|i| matches!(i, Value::Object(_))) {
                collect(item, path, out);
            }
        }
        _ => {}
    }
}

/// Values a scalar condition is tested against: each reached value, plus the
/// elements of reached arrays.
fn scalars<'a>(values: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        out.push(*value);
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
    }
    out
}

impl Condition {
    fn holds(&self, values: &[&Value]) -> bool {
        use std::cmp::Ordering::*;

        let ordered = |operand: &Value, accept: &[std::cmp::Ordering]| {
            scalars(values)
                .iter()
                .any(|v| v.compare(operand).is_some_and(|o| accept.contains(&o)))
        };
        match self {
            Condition::Eq(operand) => equals(values, operand),
            Condition::Ne(operand) => !equals(values, operand),
            Condition::Gt(operand) => ordered(operand, &[Greater]),
            Condition::Gte(operand) => ordered(operand, &[Greater, Equal]),
            Condition::Lt(operand) => ordered(operand, &[Less]),
            Condition::Lte(operand) => ordered(operand, &[Less, Equal]),
            Condition::In(options) => options.iter().any(|o| equals(values, o)),
            Condition::Regex(regex) => scalars(values)
                .iter()
                .any(|v| v.as_str().is_some_and(|s| regex.is_match(s))),
            Condition::ElemMatch(filter) => values.iter().any(|v| {
                v.as_array()
                    .is_some_and(|items| items.iter().any(|item| filter.matches(item)))
            }),
        }
    }
}

fn equals(values: &[&Value], operand: &Value) -> bool {
    if values.is_empty() {
        return operand.is_null();
    }
    scalars(values).iter().any(|v| v.loose_eq(operand))
}

/// Evaluate a `$`-prefixed field reference against a document.
fn reference<'a>(doc: &'a Value, expr: &str) -> Option<&'a Value> {
    let path = expr.strip_prefix('$')?;
    doc.get_path(path.split('.'))
}

fn project(doc: &Value, projection: &Value) -> Result<Value> {
    let spec = projection
        .as_object()
        .ok_or_else(|| unsupported("$project requires an object"))?;
    let mut out = BTreeMap::new();
    for (name, include) in spec {
        let value = match include {
            Value::Int64(1) | Value::Bool(true) => doc.get_path(name.split('.')).cloned(),
            Value::String(expr) if expr.starts_with('$') => reference(doc, expr).cloned(),
            Value::Object(_) => Some(project(doc, include)?),
            other => return Err(unsupported(format!("projection {name}: {other}"))),
        };
        if let Some(value) = value {
            out.insert(name.clone(), value);
        }
    }
    Ok(Value::Object(out))
}

fn unwind(docs: Vec<Value>, path: &str) -> Vec<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match doc.get_path(segments.iter().copied()) {
            Some(Value::Array(items)) => {
                for item in items.clone() {
                    let mut row = doc.clone();
                    row.set_path(&segments, item);
                    out.push(row);
                }
            }
            Some(Value::Null) | None => {}
            Some(_) => out.push(doc),
        }
    }
    out
}

fn sort(docs: &mut [Value], keys: &[(String, SortOrder)]) {
    let null = Value::Null;
    let keys: Vec<(Vec<&str>, SortOrder)> = keys
        .iter()
        .map(|(path, order)| (path.split('.').collect(), *order))
        .collect();
    docs.sort_by(|a, b| {
        for (path, order) in &keys {
            let x = a.get_path(path.iter().copied()).unwrap_or(&null);
            let y = b.get_path(path.iter().copied()).unwrap_or(&null);
            let ordering = match order {
                SortOrder::Ascending => x.sort_cmp(y),
                SortOrder::Descending => y.sort_cmp(x),
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// An in-memory document database.
#[derive(Debug)]
pub struct DocumentEngine {
    collections: RwLock<HashMap<String, Vec<Value>>>,
    batch_size: usize,
}

impl DocumentEngine {
    /// Create an empty engine inserting `batch_size` documents per write.
    pub fn new(batch_size: usize) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            batch_size: batch_size.max(1),
        }
    }

    /// Drop every collection.
    pub fn clear(&self) {
        self.collections.write().clear();
    }

    /// Append documents to a collection, one write per batch.
    pub fn insert_many(&self, collection: &str, docs: Vec<Value>) -> usize {
        let mut inserted = 0;
        for batch in crossq_core::partition(docs, self.batch_size) {
            inserted += batch.len();
            self.collections
                .write()
                .entry(collection.to_string())
                .or_default()
                .extend(batch);
        }
        trace!(collection, inserted, "inserted documents");
        inserted
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Load a dataset under each schema model.
    pub fn load(&self, dataset: &Dataset, models: &[SchemaModel]) -> usize {
        let mut total = 0;
        for &model in models {
            for def in EntityDef::all() {
                let docs = dataset.documents_for(def.entity, model);
                total += self.insert_many(def.collection(model), docs);
            }
        }
        debug!(documents = total, "document engine loaded");
        total
    }

    /// Documents matching a filter, in insertion order.
    pub fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Value>> {
        self.find_limited(collection, filter, usize::MAX)
    }

    fn find_limited(&self, collection: &str, filter: &Value, limit: usize) -> Result<Vec<Value>> {
        let filter = Filter::compile(filter)?;
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(doc))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Run an aggregation pipeline.
    pub fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> Result<Vec<Value>> {
        let mut stages = pipeline.iter();
        // A leading match filters under the read lock instead of cloning the collection.
        let mut docs = match pipeline.first() {
            Some(Stage::Match(filter)) => {
                stages.next();
                self.find(collection, filter)?
            }
            _ => self
                .collections
                .read()
                .get(collection)
                .cloned()
                .unwrap_or_default(),
        };

        for stage in stages {
            docs = match stage {
                Stage::Match(filter) => {
                    let filter = Filter::compile(filter)?;
                    docs.into_iter().filter(|d| filter.matches(d)).collect()
                }
                Stage::Unwind(path) => unwind(docs, path),
                Stage::Project(projection) => docs
                    .iter()
                    .map(|d| project(d, projection))
                    .collect::<Result<_>>()?,
                Stage::WindowCount { output } => {
                    let total = Value::Int64(docs.len() as i64);
                    for doc in &mut docs {
                        doc.set_path(&[output.as_str()], total.clone());
                    }
                    docs
                }
                Stage::Sort(keys) => {
                    sort(&mut docs, keys);
                    docs
                }
                Stage::Limit(n) => {
                    docs.truncate(*n);
                    docs
                }
            };
        }
        Ok(docs)
    }
}

impl Default for DocumentEngine {
    fn default() -> Self {
        Self::new(crossq_core::config::DEFAULT_BATCH_SIZE)
    }
}

impl CandidateSource for DocumentEngine {
    fn candidates(
        &self,
        query: &'static LogicalQuery,
        model: SchemaModel,
        predicates: &[Predicate],
        limit: usize,
    ) -> crossq_core::Result<Vec<Value>> {
        let target = DatabaseTarget::DocumentStore;
        let filter = DocumentPlanBuilder::new(target).filter_for(query, model, predicates)?;
        let collection = EntityDef::of(query.entity).collection(model);
        self.find_limited(collection, &filter, limit)
            .map_err(|e| e.into_core(target))
    }
}

/// Runs document plans against a [`DocumentEngine`] as one document target.
#[derive(Debug, Clone)]
pub struct DocumentExecutor {
    engine: Arc<DocumentEngine>,
    target: DatabaseTarget,
}

impl DocumentExecutor {
    pub fn new(engine: Arc<DocumentEngine>, target: DatabaseTarget) -> Self {
        Self { engine, target }
    }

    fn run(&self, plan: &QueryPlan) -> Result<Vec<Value>> {
        let plan = plan
            .as_document()
            .ok_or_else(|| unsupported(format!("{} cannot run SQL plans", self.target)))?;
        match &plan.operation {
            DocumentOperation::Find { filter } => self.engine.find(&plan.collection, filter),
            DocumentOperation::Aggregate { pipeline } => {
                if !self.target.supports_window_stage() {
                    if let Some(stage) = pipeline
                        .iter()
                        .find(|s| matches!(s, Stage::WindowCount { .. }))
                    {
                        return Err(unsupported(format!("{} on {}", stage.name(), self.target)));
                    }
                }
                self.engine.aggregate(&plan.collection, pipeline)
            }
        }
    }
}

impl TargetExecutor for DocumentExecutor {
    fn target(&self) -> DatabaseTarget {
        self.target
    }

    fn execute(&self, plan: &QueryPlan, _model: SchemaModel) -> crossq_core::Result<RawResult> {
        self.run(plan)
            .map(RawResult::Documents)
            .map_err(|e| e.into_core(self.target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Value {
        Value::parse(text).unwrap()
    }

    fn engine() -> DocumentEngine {
        let engine = DocumentEngine::new(2);
        engine.insert_many(
            "people",
            vec![
                doc(r#"{"_id": "A", "name": "Ada Lovelace", "n": 5, "tags": ["x", "y"],
                        "items": [{"k": "p", "v": 1}, {"k": "q", "v": 3}]}"#),
                doc(r#"{"_id": "B", "name": "Grace Hopper", "n": 7.5, "tags": ["y"],
                        "items": [{"k": "p", "v": 0}]}"#),
                doc(r#"{"_id": "C", "name": "Alan Turing", "n": 5, "tags": [],
                        "items": []}"#),
            ],
        );
        engine
    }

    fn ids(docs: &[Value]) -> Vec<&str> {
        docs.iter()
            .filter_map(|d| d.get("_id").and_then(Value::as_str))
            .collect()
    }

    #[test]
    fn test_insert_in_batches() {
        let engine = engine();
        assert_eq!(engine.count("people"), 3);
        assert_eq!(engine.count("missing"), 0);
    }

    #[test]
    fn test_equality_and_membership() {
        let engine = engine();
        let found = engine.find("people", &doc(r#"{"n": 5}"#)).unwrap();
        assert_eq!(ids(&found), vec!["A", "C"]);

        let found = engine.find("people", &doc(r#"{"tags": "y"}"#)).unwrap();
        assert_eq!(ids(&found), vec!["A", "B"]);

        let found = engine
            .find("people", &doc(r#"{"$and": [{"tags": "y"}, {"n": {"$ne": 5}}]}"#))
            .unwrap();
        assert_eq!(ids(&found), vec!["B"]);
    }

    #[test]
    fn test_inclusive_range() {
        let engine = engine();
        let found = engine
            .find("people", &doc(r#"{"n": {"$gte": 5.0, "$lte": 7.5}}"#))
            .unwrap();
        assert_eq!(ids(&found), vec!["A", "B", "C"]);
        let found = engine
            .find("people", &doc(r#"{"n": {"$gte": 5.01, "$lte": 7.5}}"#))
            .unwrap();
        assert_eq!(ids(&found), vec!["B"]);
    }

    #[test]
    fn test_case_insensitive_regex() {
        let engine = engine();
        let found = engine
            .find("people", &doc(r#"{"name": {"$regex": "LOVE", "$options": "i"}}"#))
            .unwrap();
        assert_eq!(ids(&found), vec!["A"]);
        let found = engine
            .find("people", &doc(r#"{"name": {"$regex": "LOVE"}}"#))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_elem_match_requires_one_element() {
        let engine = engine();
        let found = engine
            .find(
                "people",
                &doc(r#"{"items": {"$elemMatch": {"k": "p", "v": {"$gte": 1}}}}"#),
            )
            .unwrap();
        assert_eq!(ids(&found), vec!["A"]);
    }

    #[test]
    fn test_unknown_operator_is_unsupported() {
        let engine = engine();
        let err = engine
            .find("people", &doc(r#"{"n": {"$near": 1}}"#))
            .unwrap_err();
        assert!(matches!(err, Error::Core(crossq_core::Error::Unsupported(_))));
    }

    #[test]
    fn test_pipeline_unwind_project_sort_limit() {
        let engine = engine();
        let pipeline = vec![
            Stage::Match(doc(r#"{"$and": []}"#)),
            Stage::Unwind("items".to_string()),
            Stage::Match(doc(r#"{"$and": [{"items.v": {"$gte": 1}}]}"#)),
            Stage::Project(doc(r#"{"_id": 1, "item": {"key": "$items.k", "value": "$items.v"}}"#)),
            Stage::WindowCount {
                output: "totalCount".to_string(),
            },
            Stage::Sort(vec![
                ("item.value".to_string(), SortOrder::Descending),
                ("_id".to_string(), SortOrder::Ascending),
            ]),
            Stage::Limit(1),
        ];
        let rows = engine.aggregate("people", &pipeline).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0],
            doc(r#"{"_id": "A", "item": {"key": "q", "value": 3}, "totalCount": 2}"#)
        );
    }

    #[test]
    fn test_sort_breaks_ties_by_id() {
        let mut docs = vec![
            doc(r#"{"_id": "b", "v": 1.0}"#),
            doc(r#"{"_id": "a", "v": 1}"#),
            doc(r#"{"_id": "c", "v": 2}"#),
        ];
        sort(
            &mut docs,
            &[
                ("v".to_string(), SortOrder::Descending),
                ("_id".to_string(), SortOrder::Ascending),
            ],
        );
        assert_eq!(ids(&docs), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_api_executor_rejects_window_stage() {
        let executor = DocumentExecutor::new(Arc::new(engine()), DatabaseTarget::DocumentApi);
        let plan = QueryPlan::Document(crossq_core::plan::DocumentPlan {
            collection: "people".to_string(),
            operation: DocumentOperation::Aggregate {
                pipeline: vec![Stage::WindowCount {
                    output: "totalCount".to_string(),
                }],
            },
        });
        let err = executor.execute(&plan, SchemaModel::Embedded).unwrap_err();
        assert!(matches!(err, crossq_core::Error::Unsupported(_)));
        assert!(!err.is_fatal());
    }
}
