//! Canonical, target-independent query results.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Format a numeric value with the fixed 2-decimal precision used for comparison.
pub fn format_amount(value: f64) -> String {
    format!("{value:.2}")
}

/// One row of a ranked projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RankedRow {
    /// Sub-entity key (e.g. the advisor id).
    pub key: String,
    /// Numeric sort value, already formatted with two decimals.
    pub value: String,
    /// Parent document id.
    pub id: String,
}

impl RankedRow {
    pub fn new(key: impl Into<String>, value: f64, id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: format_amount(value),
            id: id.into(),
        }
    }
}

impl fmt::Display for RankedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.key, self.value, self.id)
    }
}

/// Normalized output of one (query, target, parameter set) execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalResult {
    /// Ordered rows, in the order the target returned them.
    RankedRows(Vec<RankedRow>),
    /// Unordered document ids, held sorted for deterministic diffs.
    IdSet(BTreeSet<String>),
}

impl CanonicalResult {
    /// Number of rows or ids.
    pub fn len(&self) -> usize {
        match self {
            CanonicalResult::RankedRows(rows) => rows.len(),
            CanonicalResult::IdSet(ids) => ids.len(),
        }
    }

    /// Whether the result is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_rows(&self) -> Option<&[RankedRow]> {
        match self {
            CanonicalResult::RankedRows(rows) => Some(rows),
            CanonicalResult::IdSet(_) => None,
        }
    }

    pub fn as_ids(&self) -> Option<&BTreeSet<String>> {
        match self {
            CanonicalResult::IdSet(ids) => Some(ids),
            CanonicalResult::RankedRows(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_formatting_hides_representation_noise() {
        assert_eq!(format_amount(0.1 + 0.2), "0.30");
        assert_eq!(format_amount(100.0), "100.00");
        assert_eq!(format_amount(100.005_000_1), "100.01");
    }

    #[test]
    fn test_ranked_row_equality_uses_formatted_value() {
        let a = RankedRow::new("ADV001", 1500.0, "INV1");
        let b = RankedRow::new("ADV001", 1500.000_000_1, "INV1");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "(ADV001, 1500.00, INV1)");
    }

    #[test]
    fn test_len() {
        let ids: BTreeSet<String> = ["a", "b"].into_iter().map(String::from).collect();
        assert_eq!(CanonicalResult::IdSet(ids).len(), 2);
        assert!(CanonicalResult::RankedRows(vec![]).is_empty());
    }
}
