//! PostgreSQL backend for the SQL targets.
//!
//! Requires a running PostgreSQL instance reachable at `targets.postgresUrl`.
//! Enable with `--features postgres`.

use crossq_core::catalog::ScalarKind;
use crossq_core::config::BenchConfig;
use crossq_core::plan::SqlPlan;
use crossq_core::{partition, Dialect, RawResult};
use crossq_proto::{SchemaModel, Value};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::schema::{self, ColumnKind};
use super::SqlBackend;
use crate::error::{Error, Result};
use crate::fixtures::Dataset;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// PostgreSQL database shared by the JSON-table, duality-view, and relational targets.
pub struct PostgresBackend {
    pool: PgPool,
    rt: Runtime,
    jdbc_batch_size: usize,
}

impl PostgresBackend {
    /// Connect with the configured URL and credentials.
    pub fn open(config: &BenchConfig) -> Result<Self> {
        let targets = &config.targets;
        let url = targets.postgres_url.as_deref().ok_or_else(|| {
            Error::Core(crossq_core::Error::Config(
                "targets.postgresUrl is required for the postgres backend".to_string(),
            ))
        })?;
        let mut options: PgConnectOptions = url.parse()?;
        if let Some(user) = &targets.postgres_user {
            options = options.username(user);
        }
        if let Some(password) = &targets.postgres_password {
            options = options.password(password);
        }

        let rt = Runtime::new()?;
        let pool = rt.block_on(
            PgPoolOptions::new()
                .max_connections(targets.pool_capacity as u32)
                .connect_with(options),
        )?;
        debug!(connections = targets.pool_capacity, "connected to postgres");
        Ok(Self {
            pool,
            rt,
            jdbc_batch_size: config.jdbc_batch_size,
        })
    }
}

fn bind_column<'q>(query: PgQuery<'q>, value: &Value, kind: ColumnKind) -> PgQuery<'q> {
    match kind {
        ColumnKind::Scalar(ScalarKind::Text) => query.bind(value.as_str().map(str::to_string)),
        ColumnKind::Scalar(ScalarKind::Integer) => query.bind(value.as_i64()),
        ColumnKind::Scalar(ScalarKind::Real) => query.bind(value.as_f64()),
        ColumnKind::Document => query.bind(value.to_json_string()),
    }
}

fn bind_value<'q>(query: PgQuery<'q>, value: &Value) -> PgQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int64(i) => query.bind(*i),
        Value::Float64(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(value.to_json_string()),
    }
}

impl SqlBackend for PostgresBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn provision(&self, models: &[SchemaModel]) -> Result<()> {
        let statements = schema::create_statements(Dialect::Postgres, models);
        self.rt.block_on(async {
            for statement in &statements {
                sqlx::query(statement).execute(&self.pool).await?;
            }
            Ok::<_, Error>(())
        })?;
        info!(statements = statements.len(), "provisioned postgres schema");
        Ok(())
    }

    fn load(&self, dataset: &Dataset, models: &[SchemaModel]) -> Result<usize> {
        let mut written = 0;
        for &model in models {
            for table in schema::rows(dataset, model) {
                let insert = schema::insert_statement(Dialect::Postgres, &table.table);
                let columns = &table.table.columns;
                for batch in partition(table.rows, self.jdbc_batch_size) {
                    written += batch.len();
                    self.rt.block_on(async {
                        let mut tx = self.pool.begin().await?;
                        for row in &batch {
                            let mut query = sqlx::query(&insert);
                            for (value, column) in row.iter().zip(columns) {
                                query = bind_column(query, value, column.kind);
                            }
                            query.execute(&mut *tx).await?;
                        }
                        tx.commit().await?;
                        Ok::<_, Error>(())
                    })?;
                }
                debug!(table = %table.table.name, "loaded table");
            }
        }
        info!(rows = written, "loaded postgres");
        Ok(written)
    }

    fn query(&self, plan: &SqlPlan) -> Result<RawResult> {
        let rows = self.rt.block_on(async {
            let mut query = sqlx::query(&plan.statement);
            for value in &plan.binds {
                query = bind_value(query, value);
            }
            query.fetch_all(&self.pool).await
        })?;
        let docs = rows
            .iter()
            .map(|row| row.try_get::<serde_json::Value, _>(0).map(Value::from))
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;
        Ok(RawResult::Documents(docs))
    }
}
