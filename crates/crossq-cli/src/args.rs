//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use crossq_core::config::{BenchConfig, Scale};
use crossq_proto::{QueryId, SchemaModel};

use crate::formatter::OutputFormat;

/// Cross-target query equivalence and latency runner
#[derive(Parser, Debug)]
#[command(name = "crossq")]
#[command(version, about = "Run the logical queries on every target and compare them")]
pub struct Args {
    /// JSON configuration file; flags override its values.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Dataset size.
    #[arg(long, global = true, value_enum)]
    pub scale: Option<ScaleArg>,

    /// Seed for data generation and sampling.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Schema models to run (repeatable).
    #[arg(short, long = "model", global = true)]
    pub models: Vec<SchemaModel>,

    /// SQLite database file (temporary when unset).
    #[arg(long, global = true)]
    pub sqlite_path: Option<String>,

    /// PostgreSQL URL; needs the `postgres` feature.
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub postgres_url: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "table", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Generate the dataset and load it into every target.
    Load,
    /// Measure latency of every query on every target.
    Bench {
        /// Warm-up iterations per combination.
        #[arg(long)]
        warm_up: Option<usize>,
        /// Measured iterations per combination.
        #[arg(long)]
        iterations: Option<usize>,
    },
    /// Check that every target returns the same result.
    Validate {
        /// Parameter sets drawn per query.
        #[arg(long)]
        sets: Option<usize>,
    },
    /// Print the native plan of every query for every target.
    Dump {
        /// Only this query.
        #[arg(short, long)]
        query: Option<QueryId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScaleArg {
    Tiny,
    Small,
    Medium,
    Large,
}

impl From<ScaleArg> for Scale {
    fn from(arg: ScaleArg) -> Self {
        match arg {
            ScaleArg::Tiny => Scale::Tiny,
            ScaleArg::Small => Scale::Small,
            ScaleArg::Medium => Scale::Medium,
            ScaleArg::Large => Scale::Large,
        }
    }
}

impl Args {
    /// Build the run configuration: file (or defaults), then flags.
    pub fn into_config(self) -> crossq_core::Result<BenchConfig> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_file(path)?,
            None => BenchConfig::default(),
        };
        if let Some(scale) = self.scale {
            config = config.with_scale(scale.into());
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if !self.models.is_empty() {
            let mut models = self.models.clone();
            models.sort();
            models.dedup();
            config = config.with_schema_models(models);
        }
        if let Some(path) = &self.sqlite_path {
            config = config.with_sqlite_path(path.clone());
        }
        if let Some(url) = &self.postgres_url {
            config = config.with_postgres_url(url.clone());
        }
        match &self.command {
            Command::Bench { warm_up, iterations } => {
                if let Some(n) = warm_up {
                    config = config.with_warm_up_iterations(*n);
                }
                if let Some(n) = iterations {
                    config = config.with_measurement_iterations(*n);
                }
            }
            Command::Validate { sets: Some(n) } => {
                config = config.with_parameter_sets_per_query(*n);
            }
            Command::Load | Command::Validate { sets: None } | Command::Dump { .. } => {}
        }
        config.validate()?;
        Ok(config)
    }
}
