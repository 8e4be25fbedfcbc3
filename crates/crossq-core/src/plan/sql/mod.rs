//! SQL-driver plans.
//!
//! Builders assemble a typed tree ([`Select`], [`SqlPredicate`], [`SqlExpr`])
//! and render it through a [`SqlWriter`] for one [`Dialect`]. The writer
//! records each bind value at the moment it emits the placeholder, so the
//! bind list always follows placeholder order in the statement text.

mod ast;
mod duality;
mod json;
mod reconstruct;
mod relational;

use std::fmt;

use crossq_proto::Value;
use serde::{Deserialize, Serialize};

use crate::catalog::ScalarKind;

pub use ast::{FromItem, OrderItem, Select, SqlExpr, SqlPredicate};
pub use duality::DualityViewBuilder;
pub use json::SqlJsonBuilder;
pub use reconstruct::{document_expression, DocumentLayout};
pub use relational::RelationalBuilder;

/// Alias of the parent row in every generated statement.
pub(crate) const PARENT_ALIAS: &str = "p";
/// Alias of the JSON document source.
pub(crate) const DOCUMENT_ALIAS: &str = "d";
/// Alias of the expanded sub-entity in ranked statements.
pub(crate) const UNWIND_ALIAS: &str = "a";
/// Alias of the sub-entity inside `EXISTS` subqueries.
pub(crate) const ELEMENT_ALIAS: &str = "e";
/// Alias of the ranked derived table.
pub(crate) const RANKED_ALIAS: &str = "r";

/// Derived-table columns of a ranked statement.
pub(crate) const DOC_ID_COLUMN: &str = "doc_id";
pub(crate) const SORT_VALUE_COLUMN: &str = "sort_value";

/// SQL dialect a plan is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// SQLite with the JSON1 functions.
    Sqlite,
    /// PostgreSQL with `jsonb`.
    Postgres,
}

impl Dialect {
    /// Placeholder for the `n`-th bind, 1-based.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${n}"),
        }
    }

    /// Column type for a scalar kind.
    pub fn column_type(&self, kind: ScalarKind) -> &'static str {
        match (self, kind) {
            (_, ScalarKind::Text) => "TEXT",
            (Dialect::Sqlite, ScalarKind::Integer) => "INTEGER",
            (Dialect::Sqlite, ScalarKind::Real) => "REAL",
            (Dialect::Postgres, ScalarKind::Integer) => "BIGINT",
            (Dialect::Postgres, ScalarKind::Real) => "DOUBLE PRECISION",
        }
    }

    /// Column type of stored JSON documents.
    pub fn document_type(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "TEXT",
            Dialect::Postgres => "JSONB",
        }
    }

    /// Row cap clause.
    pub fn limit(&self, n: usize) -> String {
        match self {
            Dialect::Sqlite => format!("LIMIT {n}"),
            Dialect::Postgres => format!("FETCH FIRST {n} ROWS ONLY"),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Sqlite => f.write_str("sqlite"),
            Dialect::Postgres => f.write_str("postgres"),
        }
    }
}

/// Accumulates statement text and bind values.
#[derive(Debug)]
pub struct SqlWriter {
    dialect: Dialect,
    sql: String,
    binds: Vec<Value>,
}

impl SqlWriter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            binds: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Append raw text.
    pub fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// Append a placeholder and record its value.
    pub fn bind(&mut self, value: Value) {
        self.binds.push(value);
        let placeholder = self.dialect.placeholder(self.binds.len());
        self.sql.push_str(&placeholder);
    }

    /// Append a quoted string literal.
    pub fn literal(&mut self, text: &str) {
        self.sql.push('\'');
        self.sql.push_str(&text.replace('\'', "''"));
        self.sql.push('\'');
    }

    /// Append `items` separated by `sep`, rendering each with `f`.
    pub fn join<T>(&mut self, items: &[T], sep: &str, mut f: impl FnMut(&mut Self, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(sep);
            }
            f(self, item);
        }
    }

    pub fn finish(self) -> SqlPlan {
        SqlPlan {
            dialect: self.dialect,
            statement: self.sql,
            binds: self.binds,
        }
    }
}

/// A SQL statement with positional binds.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPlan {
    pub dialect: Dialect,
    pub statement: String,
    /// Values in the order their placeholders occur in `statement`.
    pub binds: Vec<Value>,
}

impl SqlPlan {
    /// Render a select statement.
    pub fn render(dialect: Dialect, select: &Select) -> Self {
        let mut writer = SqlWriter::new(dialect);
        select.render(&mut writer);
        writer.finish()
    }

    /// Number of placeholders in the statement text.
    pub fn placeholder_count(&self) -> usize {
        match self.dialect {
            Dialect::Sqlite => self.statement.matches('?').count(),
            Dialect::Postgres => {
                let bytes = self.statement.as_bytes();
                bytes
                    .windows(2)
                    .filter(|w| w[0] == b'$' && w[1].is_ascii_digit())
                    .count()
            }
        }
    }
}

impl fmt::Display for SqlPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.statement)?;
        write!(f, "-- binds: {}", super::format_binds(&self.binds))
    }
}
