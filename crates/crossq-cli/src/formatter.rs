//! Output formatters for run reports.

use clap::ValueEnum;
use comfy_table::{Cell, Color, Table};
use crossq_bench::{BenchmarkReport, LoadSummary, PlanDump, SkippedUnit, ValidationReport};
use serde::Serialize;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    fn format_load(&self, summary: &LoadSummary) -> String;

    fn format_validation(&self, report: &ValidationReport) -> String;

    fn format_benchmark(&self, report: &BenchmarkReport) -> String;

    fn format_plans(&self, dumps: &[PlanDump]) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

fn skipped_table(skipped: &[SkippedUnit]) -> Option<String> {
    if skipped.is_empty() {
        return None;
    }
    let mut table = Table::new();
    table.set_header(vec!["Query", "Model", "Target", "Skipped because"]);
    for unit in skipped {
        table.add_row(vec![
            Cell::new(unit.query),
            Cell::new(unit.model),
            Cell::new(unit.target),
            Cell::new(&unit.reason).fg(Color::Yellow),
        ]);
    }
    Some(table.to_string())
}

impl Formatter for TableFormatter {
    fn format_load(&self, summary: &LoadSummary) -> String {
        format!(
            "Loaded {} document(s) and {} row(s) in {} ms",
            summary.documents, summary.rows, summary.elapsed_ms
        )
    }

    fn format_validation(&self, report: &ValidationReport) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Query", "Model", "Parameters", "Rows", "Verdict"]);
        for outcome in &report.outcomes {
            let rows = outcome
                .counts
                .iter()
                .map(|(target, n)| format!("{target}={n}"))
                .collect::<Vec<_>>()
                .join(" ");
            let verdict = Cell::new(outcome.verdict()).fg(if outcome.matched {
                Color::Green
            } else {
                Color::Red
            });
            table.add_row(vec![
                Cell::new(outcome.query),
                Cell::new(outcome.model),
                Cell::new(&outcome.params),
                Cell::new(rows),
                verdict,
            ]);
        }

        let mut output = table.to_string();
        for outcome in report.mismatches() {
            output.push_str(&format!("\n\n{outcome}"));
        }
        if let Some(skipped) = skipped_table(&report.skipped) {
            output.push_str("\n\n");
            output.push_str(&skipped);
        }
        let failed = report.mismatches().count();
        output.push_str(&format!(
            "\n\n{} outcome(s), {} mismatch(es), {} skipped",
            report.outcomes.len(),
            failed,
            report.skipped.len()
        ));
        output
    }

    fn format_benchmark(&self, report: &BenchmarkReport) -> String {
        let mut table = Table::new();
        table.set_header(vec![
            "Query", "Model", "Target", "p50 ms", "p95 ms", "p99 ms", "mean ms", "ops/s",
        ]);
        for record in &report.records {
            let stats = &record.stats;
            table.add_row(vec![
                Cell::new(record.query),
                Cell::new(record.model),
                Cell::new(record.target),
                Cell::new(format!("{:.3}", stats.p50_ms())),
                Cell::new(format!("{:.3}", stats.p95_ms())),
                Cell::new(format!("{:.3}", stats.p99_ms())),
                Cell::new(format!("{:.3}", stats.mean_ms())),
                Cell::new(format!("{:.1}", stats.throughput)),
            ]);
        }

        let mut output = table.to_string();
        if let Some(skipped) = skipped_table(&report.skipped) {
            output.push_str("\n\n");
            output.push_str(&skipped);
        }
        output
    }

    fn format_plans(&self, dumps: &[PlanDump]) -> String {
        let mut output = String::new();
        for dump in dumps {
            if !output.is_empty() {
                output.push_str("\n\n");
            }
            output.push_str(&format!(
                "-- {} [{} / {}] {}\n{}",
                dump.query, dump.model, dump.target, dump.params, dump.text
            ));
        }
        if output.is_empty() {
            output = "No plans".to_string();
        }
        output
    }
}

/// JSON formatter.
pub struct JsonFormatter;

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

impl Formatter for JsonFormatter {
    fn format_load(&self, summary: &LoadSummary) -> String {
        to_json(summary)
    }

    fn format_validation(&self, report: &ValidationReport) -> String {
        to_json(report)
    }

    fn format_benchmark(&self, report: &BenchmarkReport) -> String {
        to_json(report)
    }

    fn format_plans(&self, dumps: &[PlanDump]) -> String {
        to_json(dumps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_summary_table() {
        let summary = LoadSummary {
            documents: 10,
            rows: 42,
            elapsed_ms: 3,
        };
        let output = TableFormatter.format_load(&summary);
        assert!(output.contains("10 document(s)"));
        assert!(output.contains("42 row(s)"));
    }

    #[test]
    fn test_load_summary_json_is_camel_case() {
        let summary = LoadSummary {
            documents: 1,
            rows: 2,
            elapsed_ms: 3,
        };
        let json: serde_json::Value =
            serde_json::from_str(&JsonFormatter.format_load(&summary)).unwrap();
        assert_eq!(json["elapsedMs"], 3);
    }

    #[test]
    fn test_empty_reports() {
        let formatter = create_formatter(OutputFormat::Table);
        assert_eq!(formatter.format_plans(&[]), "No plans");
        let output = formatter.format_validation(&ValidationReport::default());
        assert!(output.contains("0 outcome(s), 0 mismatch(es), 0 skipped"));

        let json = create_formatter(OutputFormat::Json).format_benchmark(&BenchmarkReport::default());
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["records"], serde_json::json!([]));
    }
}
