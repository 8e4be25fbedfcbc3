//! Benchmark configuration.

use std::path::Path;

use crossq_proto::SchemaModel;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default warm-up iterations per (query, target).
pub const DEFAULT_WARM_UP_ITERATIONS: usize = 10;

/// Default measured iterations per (query, target).
pub const DEFAULT_MEASUREMENT_ITERATIONS: usize = 100;

/// Default documents per insert batch into the document engine.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default rows per SQL loading transaction.
pub const DEFAULT_JDBC_BATCH_SIZE: usize = 500;

/// Default reference pool sizes.
pub const DEFAULT_ADVISORY_CONTEXT_POOL_SIZE: usize = 20;
pub const DEFAULT_PARTY_ROLE_ID_POOL_SIZE: usize = 200;
pub const DEFAULT_FIN_INST_ID_POOL_SIZE: usize = 10;

/// Default candidate documents fetched per query by the sampler.
pub const DEFAULT_CANDIDATE_LIMIT: usize = 200;

/// Default parameter sets drawn per query.
pub const DEFAULT_PARAMETER_SETS_PER_QUERY: usize = 3;

/// Default connection pool capacity per SQL target.
pub const DEFAULT_POOL_CAPACITY: usize = 2;

/// Default random seed for data generation and sampling.
pub const DEFAULT_SEED: u64 = 42;

/// Dataset size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// A few dozen documents per entity, for tests.
    Tiny,
    /// Hundreds of documents per entity.
    #[default]
    Small,
    /// Thousands of documents per entity.
    Medium,
    /// Tens of thousands of documents per entity.
    Large,
}

impl Scale {
    /// Number of investors; the other entities are sized relative to it.
    pub fn investors(&self) -> usize {
        match self {
            Scale::Tiny => 40,
            Scale::Small => 500,
            Scale::Medium => 5_000,
            Scale::Large => 50_000,
        }
    }

    /// Number of advisors.
    pub fn advisors(&self) -> usize {
        (self.investors() / 10).max(5)
    }

    /// Number of investor groups.
    pub fn groups(&self) -> usize {
        (self.investors() / 4).max(5)
    }

    /// Number of accounts.
    pub fn accounts(&self) -> usize {
        self.investors() * 2
    }
}

/// Connection settings per target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetConfig {
    /// SQLite database file; in-memory when unset.
    pub sqlite_path: Option<String>,
    /// PostgreSQL connection URL.
    pub postgres_url: Option<String>,
    pub postgres_user: Option<String>,
    pub postgres_password: Option<String>,
    /// Connections per SQL target.
    pub pool_capacity: usize,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            sqlite_path: None,
            postgres_url: None,
            postgres_user: None,
            postgres_password: None,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

/// Options recognized by the benchmark and validation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BenchConfig {
    pub warm_up_iterations: usize,
    pub measurement_iterations: usize,
    pub batch_size: usize,
    pub jdbc_batch_size: usize,
    pub advisory_context_pool_size: usize,
    pub party_role_id_pool_size: usize,
    pub fin_inst_id_pool_size: usize,
    pub scale: Scale,
    pub seed: u64,
    pub candidate_limit: usize,
    pub parameter_sets_per_query: usize,
    pub schema_models: Vec<SchemaModel>,
    pub targets: TargetConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            warm_up_iterations: DEFAULT_WARM_UP_ITERATIONS,
            measurement_iterations: DEFAULT_MEASUREMENT_ITERATIONS,
            batch_size: DEFAULT_BATCH_SIZE,
            jdbc_batch_size: DEFAULT_JDBC_BATCH_SIZE,
            advisory_context_pool_size: DEFAULT_ADVISORY_CONTEXT_POOL_SIZE,
            party_role_id_pool_size: DEFAULT_PARTY_ROLE_ID_POOL_SIZE,
            fin_inst_id_pool_size: DEFAULT_FIN_INST_ID_POOL_SIZE,
            scale: Scale::default(),
            seed: DEFAULT_SEED,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            parameter_sets_per_query: DEFAULT_PARAMETER_SETS_PER_QUERY,
            schema_models: SchemaModel::ALL.to_vec(),
            targets: TargetConfig::default(),
        }
    }
}

impl BenchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing options take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: BenchConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_warm_up_iterations(mut self, n: usize) -> Self {
        self.warm_up_iterations = n;
        self
    }

    pub fn with_measurement_iterations(mut self, n: usize) -> Self {
        self.measurement_iterations = n;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_jdbc_batch_size(mut self, n: usize) -> Self {
        self.jdbc_batch_size = n;
        self
    }

    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_parameter_sets_per_query(mut self, n: usize) -> Self {
        self.parameter_sets_per_query = n;
        self
    }

    pub fn with_schema_models(mut self, models: Vec<SchemaModel>) -> Self {
        self.schema_models = models;
        self
    }

    pub fn with_sqlite_path(mut self, path: impl Into<String>) -> Self {
        self.targets.sqlite_path = Some(path.into());
        self
    }

    pub fn with_postgres_url(mut self, url: impl Into<String>) -> Self {
        self.targets.postgres_url = Some(url.into());
        self
    }

    /// Check option ranges.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("measurementIterations", self.measurement_iterations),
            ("batchSize", self.batch_size),
            ("jdbcBatchSize", self.jdbc_batch_size),
            ("advisoryContextPoolSize", self.advisory_context_pool_size),
            ("partyRoleIdPoolSize", self.party_role_id_pool_size),
            ("finInstIdPoolSize", self.fin_inst_id_pool_size),
            ("candidateLimit", self.candidate_limit),
            ("parameterSetsPerQuery", self.parameter_sets_per_query),
            ("targets.poolCapacity", self.targets.pool_capacity),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than 0")));
            }
        }
        if self.schema_models.is_empty() {
            return Err(Error::Config("schemaModels must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::default();
        assert_eq!(config.warm_up_iterations, 10);
        assert_eq!(config.measurement_iterations, 100);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.jdbc_batch_size, 500);
        assert_eq!(config.targets.pool_capacity, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: BenchConfig = serde_json::from_str(
            r#"{"measurementIterations": 5, "scale": "tiny", "targets": {"sqlitePath": "/tmp/x.db"}}"#,
        )
        .unwrap();
        assert_eq!(config.measurement_iterations, 5);
        assert_eq!(config.warm_up_iterations, 10);
        assert_eq!(config.scale, Scale::Tiny);
        assert_eq!(config.targets.sqlite_path.as_deref(), Some("/tmp/x.db"));
        assert_eq!(config.targets.pool_capacity, 2);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let err = BenchConfig::default()
            .with_measurement_iterations(0)
            .validate()
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("measurementIterations"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"seed": 7, "schemaModels": ["normalized"]}}"#).unwrap();
        let config = BenchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.schema_models, vec![SchemaModel::Normalized]);
    }
}
