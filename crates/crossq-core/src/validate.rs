//! Cross-target equivalence checking.
//!
//! The first target's result is the baseline. Every other target must agree
//! on cardinality and then on content: row by row for ranked projections, as
//! a set of ids for filtered documents. Mismatches are data, not errors.

use std::fmt;

use crossq_proto::{CanonicalResult, DatabaseTarget, ParameterSet, QueryId, RankedRow, SchemaModel};
use serde::Serialize;

/// Default number of example rows or ids reported per divergence.
pub const DEFAULT_MAX_EXAMPLES: usize = 3;

/// Default cap on counted row mismatches.
pub const DEFAULT_MISMATCH_CAP: usize = 1000;

/// Row-level disagreement at one position of a ranked result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowMismatch {
    pub index: usize,
    /// The row at `index` from every target, `None` past a target's end.
    pub rows: Vec<(DatabaseTarget, Option<RankedRow>)>,
}

/// Id-level disagreement between the baseline and one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdDifference {
    pub target: DatabaseTarget,
    /// Number of ids only the baseline returned.
    pub baseline_only: usize,
    /// Number of ids only this target returned.
    pub target_only: usize,
    pub baseline_only_examples: Vec<String>,
    pub target_only_examples: Vec<String>,
}

/// How the results diverged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Divergence {
    /// Ranked rows differ.
    Rows {
        examples: Vec<RowMismatch>,
        /// Mismatching positions counted, up to the cap.
        counted: usize,
        /// Whether counting stopped at the cap.
        capped: bool,
    },
    /// Id sets differ.
    Ids { differences: Vec<IdDifference> },
    /// Targets returned different result kinds.
    Shape { targets: Vec<DatabaseTarget> },
}

/// Verdict for one (query, model, parameter set) across targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub query: QueryId,
    pub model: SchemaModel,
    pub params: ParameterSet,
    pub matched: bool,
    pub baseline: Option<DatabaseTarget>,
    /// Result size per target, in comparison order.
    pub counts: Vec<(DatabaseTarget, usize)>,
    /// Targets whose size differs from the baseline.
    pub count_mismatches: Vec<DatabaseTarget>,
    pub divergence: Option<Divergence>,
}

impl ValidationOutcome {
    /// Whether every target returned nothing.
    pub fn all_empty(&self) -> bool {
        self.counts.iter().all(|(_, n)| *n == 0)
    }

    pub fn verdict(&self) -> &'static str {
        if self.matched {
            "PASS"
        } else {
            "FAIL"
        }
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}] {}",
            self.verdict(),
            self.query,
            self.model,
            self.params
        )?;
        let counts: Vec<String> = self
            .counts
            .iter()
            .map(|(t, n)| format!("{t}={n}"))
            .collect();
        write!(f, " counts({})", counts.join(", "))?;
        if !self.count_mismatches.is_empty() {
            let targets: Vec<String> = self.count_mismatches.iter().map(|t| t.to_string()).collect();
            write!(f, "\n  count mismatch: {}", targets.join(", "))?;
        }
        match &self.divergence {
            None => {}
            Some(Divergence::Rows {
                examples,
                counted,
                capped,
            }) => {
                let plus = if *capped { "+" } else { "" };
                write!(f, "\n  {counted}{plus} mismatching rows")?;
                for example in examples {
                    write!(f, "\n  row {}:", example.index)?;
                    for (target, row) in &example.rows {
                        match row {
                            Some(row) => write!(f, " {target}={row}")?,
                            None => write!(f, " {target}=<none>")?,
                        }
                    }
                }
            }
            Some(Divergence::Ids { differences }) => {
                for d in differences {
                    write!(
                        f,
                        "\n  {}: {} only in baseline {:?}, {} only in target {:?}",
                        d.target,
                        d.baseline_only,
                        d.baseline_only_examples,
                        d.target_only,
                        d.target_only_examples
                    )?;
                }
            }
            Some(Divergence::Shape { targets }) => {
                let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
                write!(f, "\n  result shape differs on: {}", targets.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Compares canonical results across targets.
#[derive(Debug, Clone, Copy)]
pub struct EquivalenceValidator {
    max_examples: usize,
    mismatch_cap: usize,
}

impl Default for EquivalenceValidator {
    fn default() -> Self {
        Self {
            max_examples: DEFAULT_MAX_EXAMPLES,
            mismatch_cap: DEFAULT_MISMATCH_CAP,
        }
    }
}

impl EquivalenceValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of example rows or ids reported per divergence.
    pub fn with_max_examples(mut self, n: usize) -> Self {
        self.max_examples = n;
        self
    }

    /// Stop counting row mismatches past `cap`. A cap below one is raised to one.
    pub fn with_mismatch_cap(mut self, cap: usize) -> Self {
        self.mismatch_cap = cap.max(1);
        self
    }

    /// Compare per-target results; the first entry is the baseline.
    pub fn compare(
        &self,
        query: QueryId,
        model: SchemaModel,
        params: &ParameterSet,
        results: &[(DatabaseTarget, CanonicalResult)],
    ) -> ValidationOutcome {
        let counts: Vec<(DatabaseTarget, usize)> =
            results.iter().map(|(t, r)| (*t, r.len())).collect();
        let mut outcome = ValidationOutcome {
            query,
            model,
            params: params.clone(),
            matched: true,
            baseline: results.first().map(|(t, _)| *t),
            counts,
            count_mismatches: Vec::new(),
            divergence: None,
        };

        let Some(((_, baseline), others)) = results.split_first() else {
            return outcome;
        };

        outcome.count_mismatches = others
            .iter()
            .filter(|(_, r)| r.len() != baseline.len())
            .map(|(t, _)| *t)
            .collect();

        outcome.divergence = match baseline {
            CanonicalResult::RankedRows(_) => self.compare_rows(results),
            CanonicalResult::IdSet(_) => self.compare_ids(results),
        };
        outcome.matched = outcome.count_mismatches.is_empty() && outcome.divergence.is_none();
        outcome
    }

    fn shape_mismatch(results: &[(DatabaseTarget, CanonicalResult)]) -> Option<Divergence> {
        let ranked = matches!(results[0].1, CanonicalResult::RankedRows(_));
        let odd: Vec<DatabaseTarget> = results
            .iter()
            .filter(|(_, r)| matches!(r, CanonicalResult::RankedRows(_)) != ranked)
            .map(|(t, _)| *t)
            .collect();
        (!odd.is_empty()).then_some(Divergence::Shape { targets: odd })
    }

    fn compare_rows(&self, results: &[(DatabaseTarget, CanonicalResult)]) -> Option<Divergence> {
        if let Some(shape) = Self::shape_mismatch(results) {
            return Some(shape);
        }
        let tables: Vec<(DatabaseTarget, &[RankedRow])> = results
            .iter()
            .filter_map(|(t, r)| r.as_rows().map(|rows| (*t, rows)))
            .collect();
        let shortest = tables.iter().map(|(_, rows)| rows.len()).min().unwrap_or(0);
        let baseline = tables[0].1;

        let mut examples = Vec::new();
        let mut counted = 0;
        let mut capped = false;
        for index in 0..shortest {
            let agrees = tables[1..]
                .iter()
                .all(|(_, rows)| rows[index] == baseline[index]);
            if agrees {
                continue;
            }
            if counted == self.mismatch_cap {
                capped = true;
                break;
            }
            counted += 1;
            if examples.len() < self.max_examples {
                examples.push(RowMismatch {
                    index,
                    rows: tables
                        .iter()
                        .map(|(t, rows)| (*t, rows.get(index).cloned()))
                        .collect(),
                });
            }
        }

        (counted > 0 || capped).then_some(Divergence::Rows {
            examples,
            counted,
            capped,
        })
    }

    fn compare_ids(&self, results: &[(DatabaseTarget, CanonicalResult)]) -> Option<Divergence> {
        if let Some(shape) = Self::shape_mismatch(results) {
            return Some(shape);
        }
        let baseline = results[0].1.as_ids()?;
        let mut diffs = Vec::new();
        for (target, result) in &results[1..] {
            let Some(ids) = result.as_ids() else {
                continue;
            };
            let baseline_only: Vec<&String> = baseline.difference(ids).collect();
            let target_only: Vec<&String> = ids.difference(baseline).collect();
            if baseline_only.is_empty() && target_only.is_empty() {
                continue;
            }
            diffs.push(IdDifference {
                target: *target,
                baseline_only: baseline_only.len(),
                target_only: target_only.len(),
                baseline_only_examples: baseline_only
                    .iter()
                    .take(self.max_examples)
                    .map(|s| s.to_string())
                    .collect(),
                target_only_examples: target_only
                    .iter()
                    .take(self.max_examples)
                    .map(|s| s.to_string())
                    .collect(),
            });
        }
        (!diffs.is_empty()).then_some(Divergence::Ids { differences: diffs })
    }
}
