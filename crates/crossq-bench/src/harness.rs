//! The run matrix.
//!
//! A [`Workbench`] owns one executor per target, loads the same dataset into
//! all of them, and drives the (query × schema model × parameter set) matrix
//! for validation and benchmarking. Fatal errors abort; recoverable errors
//! drop one (query, target, parameter set) unit and the run continues.

use std::sync::Arc;
use std::time::Instant;

use crossq_core::config::BenchConfig;
use crossq_core::{
    Dialect, EquivalenceValidator, LatencyEngine, LatencyStatistics, ParameterSampler,
    PlanRegistry, QueryPlan, ResultNormalizer, SamplerContext, TargetExecutor, ValidationOutcome,
};
use crossq_proto::{
    CanonicalResult, DatabaseTarget, LogicalQuery, ParameterSet, QueryId, SchemaModel,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::backends::{DocumentEngine, DocumentExecutor, SqlBackend, SqlExecutor, SqliteBackend};
use crate::error::Result;
use crate::fixtures::{self, Dataset};

/// Latency of one (query, model, target) combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRecord {
    pub query: QueryId,
    pub model: SchemaModel,
    pub target: DatabaseTarget,
    pub params: ParameterSet,
    pub stats: LatencyStatistics,
}

/// A unit dropped from a run after a recoverable error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedUnit {
    pub query: QueryId,
    pub model: SchemaModel,
    pub target: DatabaseTarget,
    pub reason: String,
}

/// Outcomes of a validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub outcomes: Vec<ValidationOutcome>,
    pub skipped: Vec<SkippedUnit>,
}

impl ValidationReport {
    /// Outcomes where targets disagreed.
    pub fn mismatches(&self) -> impl Iterator<Item = &ValidationOutcome> {
        self.outcomes.iter().filter(|o| !o.matched)
    }

    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.matched)
    }
}

/// Results of a benchmark run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    pub records: Vec<BenchmarkRecord>,
    pub skipped: Vec<SkippedUnit>,
}

/// Native text of one plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDump {
    pub query: QueryId,
    pub model: SchemaModel,
    pub target: DatabaseTarget,
    pub params: ParameterSet,
    pub text: String,
}

/// What a load wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub documents: usize,
    pub rows: usize,
    pub elapsed_ms: u64,
}

/// Executors, sampler, and reporting for one run.
pub struct Workbench {
    config: BenchConfig,
    context: Arc<SamplerContext>,
    sampler: ParameterSampler,
    registry: PlanRegistry,
    normalizer: ResultNormalizer,
    validator: EquivalenceValidator,
    document_store: Arc<DocumentEngine>,
    document_api: Arc<DocumentEngine>,
    sql: Arc<dyn SqlBackend>,
    executors: Vec<Box<dyn TargetExecutor>>,
}

fn open_sql_backend(config: &BenchConfig) -> Result<Arc<dyn SqlBackend>> {
    #[cfg(feature = "postgres")]
    if config.targets.postgres_url.is_some() {
        return Ok(Arc::new(crate::backends::PostgresBackend::open(config)?));
    }
    #[cfg(not(feature = "postgres"))]
    if config.targets.postgres_url.is_some() {
        warn!("built without the postgres feature, running SQL targets on sqlite");
    }
    Ok(Arc::new(SqliteBackend::open(config)?))
}

impl Workbench {
    /// Validate the configuration and open every backend.
    pub fn open(config: BenchConfig) -> Result<Self> {
        config.validate()?;
        let sql = open_sql_backend(&config)?;
        let document_store = Arc::new(DocumentEngine::new(config.batch_size));
        let document_api = Arc::new(DocumentEngine::new(config.batch_size));

        let executors: Vec<Box<dyn TargetExecutor>> = DatabaseTarget::ALL
            .into_iter()
            .map(|target| -> Box<dyn TargetExecutor> {
                match target {
                    DatabaseTarget::DocumentStore => {
                        Box::new(DocumentExecutor::new(Arc::clone(&document_store), target))
                    }
                    DatabaseTarget::DocumentApi => {
                        Box::new(DocumentExecutor::new(Arc::clone(&document_api), target))
                    }
                    DatabaseTarget::SqlJson
                    | DatabaseTarget::DualityView
                    | DatabaseTarget::Relational => {
                        Box::new(SqlExecutor::new(Arc::clone(&sql), target))
                    }
                }
            })
            .collect();

        let context = Arc::new(SamplerContext::new());
        let sampler = ParameterSampler::from_config(Arc::clone(&context), &config);
        let registry = PlanRegistry::with_defaults(sql.dialect());
        info!(dialect = %sql.dialect(), targets = executors.len(), "workbench ready");

        Ok(Self {
            config,
            context,
            sampler,
            registry,
            normalizer: ResultNormalizer::new(),
            validator: EquivalenceValidator::new(),
            document_store,
            document_api,
            sql,
            executors,
        })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn context(&self) -> &SamplerContext {
        &self.context
    }

    /// Dialect the SQL targets render in.
    pub fn dialect(&self) -> Dialect {
        self.sql.dialect()
    }

    /// Executor of a target.
    pub fn executor(&self, target: DatabaseTarget) -> Option<&dyn TargetExecutor> {
        self.executors
            .iter()
            .find(|e| e.target() == target)
            .map(Box::as_ref)
    }

    /// Generate the configured dataset and freeze the reference pools.
    pub fn generate(&self) -> Result<Dataset> {
        let dataset = fixtures::generate(&self.config, &self.context)?;
        self.context.freeze();
        Ok(dataset)
    }

    /// Provision every target and load `dataset` under each configured model.
    pub fn load(&self, dataset: &Dataset) -> Result<LoadSummary> {
        let models = &self.config.schema_models;
        let started = Instant::now();

        self.sql.provision(models)?;
        self.document_store.clear();
        self.document_api.clear();
        let documents = self.document_store.load(dataset, models);
        self.document_api.load(dataset, models);
        let rows = self.sql.load(dataset, models)?;

        let summary = LoadSummary {
            documents,
            rows,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            documents = summary.documents,
            rows = summary.rows,
            elapsed_ms = summary.elapsed_ms,
            "loaded every target"
        );
        Ok(summary)
    }

    /// Generate and load the configured dataset.
    pub fn load_generated(&self) -> Result<LoadSummary> {
        let dataset = self.generate()?;
        self.load(&dataset)
    }

    /// Build the plan of a query for one target.
    pub fn plan(
        &self,
        query: &'static LogicalQuery,
        model: SchemaModel,
        target: DatabaseTarget,
        params: &ParameterSet,
    ) -> Result<QueryPlan> {
        Ok(self.registry.build(target, query, model, params)?)
    }

    /// Execute a query on one target and normalize the result.
    pub fn run(
        &self,
        query: &'static LogicalQuery,
        model: SchemaModel,
        target: DatabaseTarget,
        params: &ParameterSet,
    ) -> Result<CanonicalResult> {
        let plan = self.plan(query, model, target, params)?;
        let executor = self
            .executor(target)
            .ok_or(crossq_core::Error::NoBuilder(target))?;
        debug!(query = %query.id, %model, %target, plan = %plan, "executing");
        Ok(self.normalizer.execute(executor, query, model, &plan)?)
    }

    /// Run one parameter set on every target and compare the results.
    ///
    /// Targets failing with a recoverable error are left out of the
    /// comparison and reported in `skipped`.
    pub fn validate(
        &self,
        query: &'static LogicalQuery,
        model: SchemaModel,
        params: &ParameterSet,
        skipped: &mut Vec<SkippedUnit>,
    ) -> Result<ValidationOutcome> {
        let mut results = Vec::with_capacity(self.executors.len());
        for executor in &self.executors {
            let target = executor.target();
            match self.run(query, model, target, params) {
                Ok(result) => results.push((target, result)),
                Err(e) if !e.is_fatal() => {
                    warn!(query = %query.id, %model, %target, error = %e, "skipping target");
                    skipped.push(SkippedUnit {
                        query: query.id,
                        model,
                        target,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let outcome = self.validator.compare(query.id, model, params, &results);
        if !outcome.matched {
            error!(query = %query.id, %model, %params, "{outcome}");
        } else if outcome.all_empty() {
            warn!(query = %query.id, %model, %params, "every target returned nothing");
        } else {
            info!(query = %query.id, %model, counts = ?outcome.counts, "targets agree");
        }
        Ok(outcome)
    }

    /// Draw up to `n` data-backed parameter sets for a query.
    pub fn sample_parameters(
        &mut self,
        query: &'static LogicalQuery,
        n: usize,
    ) -> Result<Vec<ParameterSet>> {
        Ok(self
            .sampler
            .sample_many(self.document_store.as_ref(), query, n)?)
    }

    /// Validate every query under every configured model.
    pub fn validate_matrix(&mut self) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        let models = self.config.schema_models.clone();
        for query in LogicalQuery::all() {
            let sets = self.sample_parameters(query, self.config.parameter_sets_per_query)?;
            for model in &models {
                for params in &sets {
                    let outcome = self.validate(query, *model, params, &mut report.skipped)?;
                    report.outcomes.push(outcome);
                }
            }
        }
        let failed = report.mismatches().count();
        info!(
            outcomes = report.outcomes.len(),
            mismatches = failed,
            skipped = report.skipped.len(),
            "validation finished"
        );
        Ok(report)
    }

    /// Time every query on every target under every configured model.
    pub fn benchmark_matrix(&mut self) -> Result<BenchmarkReport> {
        let engine = LatencyEngine::new(
            self.config.warm_up_iterations,
            self.config.measurement_iterations,
        );
        let mut report = BenchmarkReport::default();
        let models = self.config.schema_models.clone();

        for query in LogicalQuery::all() {
            let Some(params) = self.sample_parameters(query, 1)?.into_iter().next() else {
                continue;
            };
            for model in &models {
                for executor in &self.executors {
                    let target = executor.target();
                    let plan = self.plan(query, *model, target, &params)?;
                    let label = format!("{}/{model}/{target}", query.id);
                    let measured = engine.run(&label, || {
                        executor.execute(&plan, *model).map(|_| ())
                    });
                    match measured {
                        Ok(stats) => {
                            info!(
                                query = %query.id,
                                %model,
                                %target,
                                p50_ms = stats.p50_ms(),
                                p95_ms = stats.p95_ms(),
                                throughput = stats.throughput,
                                "benchmarked"
                            );
                            report.records.push(BenchmarkRecord {
                                query: query.id,
                                model: *model,
                                target,
                                params: params.clone(),
                                stats,
                            });
                        }
                        Err(e) if !e.is_fatal() => {
                            warn!(query = %query.id, %model, %target, error = %e, "skipping target");
                            report.skipped.push(SkippedUnit {
                                query: query.id,
                                model: *model,
                                target,
                                reason: e.to_string(),
                            });
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
        Ok(report)
    }

    /// Native plan text of every query for every target and model.
    pub fn dump_plans(&mut self) -> Result<Vec<PlanDump>> {
        let mut dumps = Vec::new();
        let models = self.config.schema_models.clone();
        for query in LogicalQuery::all() {
            let Some(params) = self.sample_parameters(query, 1)?.into_iter().next() else {
                continue;
            };
            for model in &models {
                for target in DatabaseTarget::ALL {
                    let plan = self.plan(query, *model, target, &params)?;
                    dumps.push(PlanDump {
                        query: query.id,
                        model: *model,
                        target,
                        params: params.clone(),
                        text: plan.to_string(),
                    });
                }
            }
        }
        Ok(dumps)
    }
}
