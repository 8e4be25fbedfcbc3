//! Result normalization.
//!
//! Executors hand back whatever their driver produced: decoded documents, or
//! JSON text read from a SQL column. The [`ResultNormalizer`] turns either
//! into a [`CanonicalResult`] that can be compared across targets.

use std::collections::BTreeSet;

use crossq_proto::{
    CanonicalResult, DatabaseTarget, LogicalQuery, RankedRow, SchemaModel, Value,
};
use tracing::trace;

use crate::catalog::DOCUMENT_ID;
use crate::error::{Error, Result};
use crate::plan::QueryPlan;
use crate::query::{UnwindSpec, PROJECTED_ELEMENT};
use crate::resolve::SchemaPathResolver;

/// Raw output of one plan execution.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    /// Documents decoded by a document driver.
    Documents(Vec<Value>),
    /// One JSON text per row, read from a SQL driver.
    JsonText(Vec<String>),
}

impl RawResult {
    /// Number of raw rows.
    pub fn len(&self) -> usize {
        match self {
            RawResult::Documents(docs) => docs.len(),
            RawResult::JsonText(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode into documents.
    pub fn into_documents(self) -> Result<Vec<Value>> {
        match self {
            RawResult::Documents(docs) => Ok(docs),
            RawResult::JsonText(rows) => rows
                .iter()
                .map(|text| {
                    Value::parse(text)
                        .map_err(|e| Error::InvalidResult(format!("row is not JSON: {e}")))
                })
                .collect(),
        }
    }
}

/// Executes plans against one target.
///
/// Implementations acquire a connection for the duration of one call and
/// release it before returning.
pub trait TargetExecutor {
    /// The target this executor runs against.
    fn target(&self) -> DatabaseTarget;

    /// Run a plan built for `model`.
    fn execute(&self, plan: &QueryPlan, model: SchemaModel) -> Result<RawResult>;
}

/// Converts raw results into canonical results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultNormalizer {
    resolver: SchemaPathResolver,
}

impl ResultNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize the raw output of `query` on `target`.
    pub fn normalize(
        &self,
        target: DatabaseTarget,
        query: &LogicalQuery,
        raw: RawResult,
    ) -> Result<CanonicalResult> {
        let documents = raw.into_documents()?;
        trace!(query = %query.id, %target, rows = documents.len(), "normalizing");

        match UnwindSpec::for_query(query) {
            Some(unwind) => {
                let key = self.resolver.output_name(query, unwind.key)?;
                let sort = self.resolver.output_name(query, unwind.sort)?;
                let rows = documents
                    .iter()
                    .map(|doc| ranked_row(target, doc, &key, &sort))
                    .collect::<Result<Vec<_>>>()?;
                Ok(CanonicalResult::RankedRows(rows))
            }
            None => {
                let ids = documents
                    .iter()
                    .map(|doc| document_id(target, doc))
                    .collect::<Result<BTreeSet<_>>>()?;
                Ok(CanonicalResult::IdSet(ids))
            }
        }
    }

    /// Execute a plan and normalize its output.
    pub fn execute(
        &self,
        executor: &dyn TargetExecutor,
        query: &LogicalQuery,
        model: SchemaModel,
        plan: &QueryPlan,
    ) -> Result<CanonicalResult> {
        let raw = executor.execute(plan, model)?;
        self.normalize(executor.target(), query, raw)
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Int64(i) => Some(i.to_string()),
        _ => None,
    }
}

fn document_id(target: DatabaseTarget, doc: &Value) -> Result<String> {
    doc.get(DOCUMENT_ID).and_then(text_of).ok_or_else(|| {
        Error::InvalidResult(format!("{target}: document without {DOCUMENT_ID}: {doc}"))
    })
}

fn ranked_row(target: DatabaseTarget, doc: &Value, key: &str, sort: &str) -> Result<RankedRow> {
    let id = document_id(target, doc)?;
    let element = doc.get(PROJECTED_ELEMENT);
    let key_value = element
        .and_then(|e| e.get(key))
        .and_then(text_of)
        .ok_or_else(|| {
            Error::InvalidResult(format!("{target}: row {id} without {PROJECTED_ELEMENT}.{key}"))
        })?;
    let numeric = element
        .and_then(|e| e.get(sort))
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            Error::InvalidResult(format!("{target}: row {id} without numeric {PROJECTED_ELEMENT}.{sort}"))
        })?;
    Ok(RankedRow::new(key_value, numeric, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossq_proto::QueryId;

    #[test]
    fn test_ranked_rows_keep_order_and_round() {
        let raw = RawResult::JsonText(vec![
            r#"{"_id":"INV2","advisor":{"advisorId":"ADV001","viewableMarketValue":2500.005}}"#
                .to_string(),
            r#"{"_id":"INV1","advisor":{"advisorId":"ADV001","viewableMarketValue":100}}"#
                .to_string(),
        ]);
        let result = ResultNormalizer::new()
            .normalize(
                DatabaseTarget::SqlJson,
                QueryId::InvestorsByAdvisor.definition(),
                raw,
            )
            .unwrap();
        let rows = result.as_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "INV2");
        assert_eq!(rows[1], RankedRow::new("ADV001", 100.0, "INV1"));
        assert_eq!(rows[1].value, "100.00");
    }

    #[test]
    fn test_filtered_ids_are_sorted_set() {
        let docs = vec![
            Value::object([("_id", Value::from("B"))]),
            Value::object([("_id", Value::from("A"))]),
            Value::object([("_id", Value::from("B"))]),
        ];
        let result = ResultNormalizer::new()
            .normalize(
                DatabaseTarget::DocumentStore,
                QueryId::InvestorNameSearch.definition(),
                RawResult::Documents(docs),
            )
            .unwrap();
        let ids: Vec<_> = result.as_ids().unwrap().iter().cloned().collect();
        assert_eq!(ids, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_missing_fields_are_invalid() {
        let raw = RawResult::Documents(vec![Value::object([("_id", Value::from("X"))])]);
        let err = ResultNormalizer::new()
            .normalize(
                DatabaseTarget::Relational,
                QueryId::GroupsByAdvisor.definition(),
                raw,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResult(_)));
        assert!(!err.is_fatal());

        let raw = RawResult::JsonText(vec!["not json".to_string()]);
        assert!(ResultNormalizer::new()
            .normalize(
                DatabaseTarget::Relational,
                QueryId::GroupsByDataOwner.definition(),
                raw,
            )
            .is_err());
    }
}
