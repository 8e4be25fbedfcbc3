//! CrossQ command-line runner
//!
//! Loads one dataset into every target and validates, benchmarks, or dumps
//! the nine logical queries.

mod args;
mod formatter;

use args::{Args, Command};
use clap::Parser;
use crossq_bench::Workbench;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crossq=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Run one mode. Returns whether every check passed.
fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let command = args.command.clone();
    let formatter = formatter::create_formatter(args.format);
    let config = args.into_config()?;

    tracing::info!(
        scale = ?config.scale,
        seed = config.seed,
        models = ?config.schema_models,
        "configuration loaded"
    );
    let mut bench = Workbench::open(config)?;

    match command {
        Command::Load => {
            let summary = bench.load_generated()?;
            println!("{}", formatter.format_load(&summary));
            Ok(true)
        }
        Command::Bench { .. } => {
            bench.load_generated()?;
            let report = bench.benchmark_matrix()?;
            println!("{}", formatter.format_benchmark(&report));
            Ok(true)
        }
        Command::Validate { .. } => {
            bench.load_generated()?;
            let report = bench.validate_matrix()?;
            println!("{}", formatter.format_validation(&report));
            Ok(report.passed())
        }
        Command::Dump { query } => {
            bench.load_generated()?;
            let mut dumps = bench.dump_plans()?;
            if let Some(id) = query {
                dumps.retain(|d| d.query == id);
            }
            tracing::debug!(plans = dumps.len(), "dumped plans");
            println!("{}", formatter.format_plans(&dumps));
            Ok(true)
        }
    }
}
