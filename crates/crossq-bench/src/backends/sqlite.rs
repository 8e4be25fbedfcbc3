//! SQLite backend for the SQL targets.
//!
//! Uses a database file so every pooled connection sees the same data. When
//! no path is configured the file lives in a temporary directory owned by
//! the backend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crossq_core::config::BenchConfig;
use crossq_core::plan::SqlPlan;
use crossq_core::{partition, Dialect, RawResult};
use crossq_proto::{SchemaModel, Value};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use tempfile::TempDir;
use tracing::{debug, info};

use super::schema;
use super::SqlBackend;
use crate::error::Result;
use crate::fixtures::Dataset;
use crate::pool::{ConnectionPool, PoolConfig};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database shared by the JSON-table, duality-view, and relational targets.
pub struct SqliteBackend {
    pool: ConnectionPool<Connection>,
    path: PathBuf,
    jdbc_batch_size: usize,
    _dir: Option<TempDir>,
}

impl SqliteBackend {
    /// Open the configured database file, or a temporary one.
    pub fn open(config: &BenchConfig) -> Result<Self> {
        let (path, dir) = match &config.targets.sqlite_path {
            Some(path) => (PathBuf::from(path), None),
            None => {
                let dir = tempfile::tempdir()?;
                (dir.path().join("crossq.db"), Some(dir))
            }
        };
        let pool = ConnectionPool::open(PoolConfig::new(config.targets.pool_capacity), || {
            let conn = Connection::open(&path)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(conn)
        })?;
        debug!(path = %path.display(), connections = pool.capacity(), "opened sqlite");
        Ok(Self {
            pool,
            path,
            jdbc_batch_size: config.jdbc_batch_size,
            _dir: dir,
        })
    }

    /// Open a temporary database with default settings.
    pub fn temporary() -> Result<Self> {
        Self::open(&BenchConfig::default())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count the rows of a table or view.
    pub fn count(&self, table: &str) -> Result<usize> {
        self.pool.with_connection(|conn| {
            let n: i64 = conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
            Ok(n as usize)
        })
    }
}

/// Bind representation of a value.
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int64(i) => SqlValue::Integer(*i),
        Value::Float64(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_json_string()),
    }
}

impl SqlBackend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn provision(&self, models: &[SchemaModel]) -> Result<()> {
        let statements = schema::create_statements(Dialect::Sqlite, models);
        self.pool.with_connection(|conn| {
            conn.execute_batch(&statements.join(";\n"))?;
            Ok(())
        })?;
        info!(statements = statements.len(), "provisioned sqlite schema");
        Ok(())
    }

    fn load(&self, dataset: &Dataset, models: &[SchemaModel]) -> Result<usize> {
        let mut written = 0;
        for &model in models {
            for table in schema::rows(dataset, model) {
                let insert = schema::insert_statement(Dialect::Sqlite, &table.table);
                for batch in partition(table.rows, self.jdbc_batch_size) {
                    written += batch.len();
                    self.pool.with_connection(|conn| {
                        let tx = conn.transaction()?;
                        {
                            let mut stmt = tx.prepare_cached(&insert)?;
                            for row in &batch {
                                stmt.execute(params_from_iter(row.iter().map(sql_value)))?;
                            }
                        }
                        tx.commit()?;
                        Ok(())
                    })?;
                }
                debug!(table = %table.table.name, "loaded table");
            }
        }
        info!(rows = written, "loaded sqlite");
        Ok(written)
    }

    fn query(&self, plan: &SqlPlan) -> Result<RawResult> {
        self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(&plan.statement)?;
            let rows = stmt
                .query_map(params_from_iter(plan.binds.iter().map(sql_value)), |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(RawResult::JsonText(rows))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::advisor_ranking_fixture;

    fn loaded() -> SqliteBackend {
        let backend = SqliteBackend::temporary().unwrap();
        backend.provision(&SchemaModel::ALL).unwrap();
        backend
            .load(&advisor_ranking_fixture(), &SchemaModel::ALL)
            .unwrap();
        backend
    }

    #[test]
    fn test_provision_is_repeatable() {
        let backend = loaded();
        backend.provision(&SchemaModel::ALL).unwrap();
        assert_eq!(backend.count("investor").unwrap(), 0);
    }

    #[test]
    fn test_load_fills_every_structure() {
        let backend = loaded();
        assert_eq!(backend.count("investor").unwrap(), 3);
        assert_eq!(backend.count("investor_doc").unwrap(), 3);
        assert_eq!(backend.count("investor_advisor").unwrap(), 3);
        assert_eq!(backend.count("book_role").unwrap(), 3);
        assert_eq!(backend.count("book_role_dv").unwrap(), 3);
    }

    #[test]
    fn test_duality_view_rebuilds_documents() {
        let backend = loaded();
        let plan = SqlPlan {
            dialect: Dialect::Sqlite,
            statement: "SELECT d.doc FROM investor_dv d WHERE d.id = ?".to_string(),
            binds: vec![Value::from("INV1")],
        };
        let docs = backend.query(&plan).unwrap().into_documents().unwrap();
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.get("_id"), Some(&Value::from("INV1")));
        assert_eq!(
            doc.get_path(["advisors"]).and_then(Value::as_array).map(<[Value]>::len),
            Some(1)
        );
        assert_eq!(
            doc.get("advisoryContexts"),
            Some(&Value::Array(vec![Value::from("CTX001")]))
        );
        assert_eq!(
            doc.get("totalViewableAccountsMarketValue").and_then(Value::as_f64),
            Some(1500.0)
        );
    }

    #[test]
    fn test_bad_statement_is_recoverable() {
        let backend = loaded();
        let plan = SqlPlan {
            dialect: Dialect::Sqlite,
            statement: "SELECT d.doc FROM no_such_table d".to_string(),
            binds: vec![],
        };
        let err = backend.query(&plan).unwrap_err();
        assert!(!err.is_fatal());
    }
}
