//! Typed SQL nodes and their per-dialect rendering.

use crossq_proto::Value;

use super::{Dialect, SqlWriter};
use crate::catalog::ScalarKind;
use crate::query::CompareOp;
use crate::resolve::FieldPath;

/// A scalar or JSON-valued expression.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    /// `alias.column`.
    Column { alias: String, column: String },
    /// Typed scalar read from a JSON value; the root path reads the value itself.
    JsonScalar {
        base: Box<SqlExpr>,
        path: FieldPath,
        kind: ScalarKind,
    },
    /// Positional bind.
    Bind(Value),
    /// Inline string literal.
    Text(String),
    /// JSON object built from named expressions, in order.
    JsonObject(Vec<(String, SqlExpr)>),
    /// JSON array aggregated from the child rows of a parent, in ordinal order.
    JsonArrayAgg {
        element: Box<SqlExpr>,
        table: String,
        alias: String,
        parent_key: Box<SqlExpr>,
        parent_column: &'static str,
        order_column: &'static str,
    },
}

impl SqlExpr {
    pub fn column(alias: &str, column: &str) -> Self {
        SqlExpr::Column {
            alias: alias.to_string(),
            column: column.to_string(),
        }
    }

    pub fn json(base: SqlExpr, path: FieldPath, kind: ScalarKind) -> Self {
        SqlExpr::JsonScalar {
            base: Box::new(base),
            path,
            kind,
        }
    }

    pub fn render(&self, w: &mut SqlWriter) {
        match self {
            SqlExpr::Column { alias, column } => {
                w.push(alias);
                w.push(".");
                w.push(column);
            }
            SqlExpr::JsonScalar { base, path, kind } => render_json_scalar(w, base, path, *kind),
            SqlExpr::Bind(value) => w.bind(value.clone()),
            SqlExpr::Text(text) => w.literal(text),
            SqlExpr::JsonObject(entries) => {
                w.push(match w.dialect() {
                    Dialect::Sqlite => "json_object(",
                    Dialect::Postgres => "jsonb_build_object(",
                });
                w.join(entries, ", ", |w, (key, value)| {
                    w.literal(key);
                    w.push(", ");
                    value.render(w);
                });
                w.push(")");
            }
            SqlExpr::JsonArrayAgg {
                element,
                table,
                alias,
                parent_key,
                parent_column,
                order_column,
            } => {
                let dialect = w.dialect();
                w.push(match dialect {
                    // Scalar subqueries drop the JSON subtype; json() restores it.
                    Dialect::Sqlite => "json((SELECT json_group_array(",
                    Dialect::Postgres => "COALESCE((SELECT jsonb_agg(",
                });
                element.render(w);
                w.push(&format!(" ORDER BY {alias}.{order_column}) FROM {table} {alias} WHERE {alias}.{parent_column} = "));
                parent_key.render(w);
                w.push(match dialect {
                    Dialect::Sqlite => "))",
                    Dialect::Postgres => "), '[]'::jsonb)",
                });
            }
        }
    }
}

fn render_json_scalar(w: &mut SqlWriter, base: &SqlExpr, path: &FieldPath, kind: ScalarKind) {
    match w.dialect() {
        Dialect::Sqlite => {
            let cast = match kind {
                ScalarKind::Text => None,
                ScalarKind::Integer => Some("INTEGER"),
                ScalarKind::Real => Some("REAL"),
            };
            if cast.is_some() {
                w.push("CAST(");
            }
            if path.is_root() {
                base.render(w);
            } else {
                w.push("json_extract(");
                base.render(w);
                w.push(", ");
                w.literal(&format!("$.{}", path.dotted()));
                w.push(")");
            }
            if let Some(cast) = cast {
                w.push(" AS ");
                w.push(cast);
                w.push(")");
            }
        }
        Dialect::Postgres => {
            w.push("(");
            base.render(w);
            w.push(" #>> ");
            w.literal(&format!("{{{}}}", path.segments().join(",")));
            w.push(")");
            match kind {
                ScalarKind::Text => {}
                ScalarKind::Integer => w.push("::bigint"),
                ScalarKind::Real => w.push("::double precision"),
            }
        }
    }
}

/// A boolean condition.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlPredicate {
    Compare {
        left: SqlExpr,
        op: CompareOp,
        right: SqlExpr,
    },
    /// Inclusive range.
    Between {
        expr: SqlExpr,
        low: SqlExpr,
        high: SqlExpr,
    },
    /// Case-insensitive substring match.
    ContainsInsensitive { expr: SqlExpr, term: SqlExpr },
    /// Correlated existence subquery.
    Exists(Box<Select>),
}

impl SqlPredicate {
    pub fn compare(left: SqlExpr, op: CompareOp, right: SqlExpr) -> Self {
        SqlPredicate::Compare { left, op, right }
    }

    pub fn render(&self, w: &mut SqlWriter) {
        match self {
            SqlPredicate::Compare { left, op, right } => {
                left.render(w);
                w.push(" ");
                w.push(op.sql());
                w.push(" ");
                right.render(w);
            }
            SqlPredicate::Between { expr, low, high } => {
                expr.render(w);
                w.push(" BETWEEN ");
                low.render(w);
                w.push(" AND ");
                high.render(w);
            }
            SqlPredicate::ContainsInsensitive { expr, term } => {
                w.push(match w.dialect() {
                    Dialect::Sqlite => "instr(lower(",
                    Dialect::Postgres => "strpos(lower(",
                });
                expr.render(w);
                w.push("), lower(");
                term.render(w);
                w.push(")) > 0");
            }
            SqlPredicate::Exists(select) => {
                w.push("EXISTS (");
                select.render(w);
                w.push(")");
            }
        }
    }
}

/// An item of a `FROM` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    Table { name: String, alias: String },
    /// Inner join against a table.
    Join {
        name: String,
        alias: String,
        on: SqlPredicate,
    },
    /// One row per element of a JSON array.
    JsonArray {
        base: SqlExpr,
        path: FieldPath,
        alias: String,
    },
    /// Derived table.
    Derived { select: Box<Select>, alias: String },
}

impl FromItem {
    pub fn table(name: &str, alias: &str) -> Self {
        FromItem::Table {
            name: name.to_string(),
            alias: alias.to_string(),
        }
    }

    fn render(&self, w: &mut SqlWriter) {
        match self {
            FromItem::Table { name, alias } => {
                w.push(name);
                w.push(" ");
                w.push(alias);
            }
            FromItem::Join { name, alias, on } => {
                w.push("JOIN ");
                w.push(name);
                w.push(" ");
                w.push(alias);
                w.push(" ON ");
                on.render(w);
            }
            FromItem::JsonArray { base, path, alias } => match w.dialect() {
                Dialect::Sqlite => {
                    w.push("json_each(");
                    base.render(w);
                    w.push(", ");
                    w.literal(&format!("$.{}", path.dotted()));
                    w.push(") ");
                    w.push(alias);
                }
                Dialect::Postgres => {
                    w.push("jsonb_array_elements(");
                    base.render(w);
                    w.push(" #> ");
                    w.literal(&format!("{{{}}}", path.segments().join(",")));
                    w.push(") AS ");
                    w.push(alias);
                    w.push("(value)");
                }
            },
            FromItem::Derived { select, alias } => {
                w.push("(");
                select.render(w);
                w.push(") ");
                w.push(alias);
            }
        }
    }
}

/// A sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: SqlExpr,
    pub descending: bool,
    /// Compare text bytewise regardless of the database collation.
    pub binary: bool,
}

impl OrderItem {
    pub fn desc(expr: SqlExpr) -> Self {
        Self {
            expr,
            descending: true,
            binary: false,
        }
    }

    pub fn asc_binary(expr: SqlExpr) -> Self {
        Self {
            expr,
            descending: false,
            binary: true,
        }
    }
}

/// A `SELECT` statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    /// Output columns with optional aliases; empty renders `SELECT 1`.
    pub columns: Vec<(SqlExpr, Option<String>)>,
    pub from: Vec<FromItem>,
    /// Conjunctive filter.
    pub filter: Vec<SqlPredicate>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn render(&self, w: &mut SqlWriter) {
        w.push("SELECT ");
        if self.columns.is_empty() {
            w.push("1");
        }
        w.join(&self.columns, ", ", |w, (expr, alias)| {
            expr.render(w);
            if let Some(alias) = alias {
                w.push(" AS ");
                w.push(alias);
            }
        });

        w.push(" FROM ");
        for (i, item) in self.from.iter().enumerate() {
            if i > 0 {
                w.push(if matches!(item, FromItem::Join { .. }) {
                    " "
                } else {
                    ", "
                });
            }
            item.render(w);
        }

        if !self.filter.is_empty() {
            w.push(" WHERE ");
            w.join(&self.filter, " AND ", |w, p| p.render(w));
        }

        if !self.order_by.is_empty() {
            w.push(" ORDER BY ");
            w.join(&self.order_by, ", ", |w, item| {
                item.expr.render(w);
                if item.binary {
                    w.push(match w.dialect() {
                        Dialect::Sqlite => " COLLATE BINARY",
                        Dialect::Postgres => " COLLATE \"C\"",
                    });
                }
                w.push(if item.descending { " DESC" } else { " ASC" });
            });
        }

        if let Some(n) = self.limit {
            let clause = w.dialect().limit(n);
            w.push(" ");
            w.push(&clause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::sql::SqlPlan;

    fn doc() -> SqlExpr {
        SqlExpr::column("d", "doc")
    }

    #[test]
    fn test_json_scalar_sqlite() {
        let mut w = SqlWriter::new(Dialect::Sqlite);
        SqlExpr::json(doc(), FieldPath::new(&["a", "b"]), ScalarKind::Real).render(&mut w);
        assert_eq!(w.finish().statement, "CAST(json_extract(d.doc, '$.a.b') AS REAL)");

        let mut w = SqlWriter::new(Dialect::Sqlite);
        SqlExpr::json(SqlExpr::column("e", "value"), FieldPath::root(), ScalarKind::Text)
            .render(&mut w);
        assert_eq!(w.finish().statement, "e.value");
    }

    #[test]
    fn test_json_scalar_postgres() {
        let mut w = SqlWriter::new(Dialect::Postgres);
        SqlExpr::json(doc(), FieldPath::new(&["a", "b"]), ScalarKind::Integer).render(&mut w);
        assert_eq!(w.finish().statement, "(d.doc #>> '{a,b}')::bigint");
    }

    #[test]
    fn test_exists_subquery_binds_in_order() {
        let select = Select {
            columns: vec![(doc(), None)],
            from: vec![FromItem::table("investor_doc", "d")],
            filter: vec![
                SqlPredicate::compare(
                    SqlExpr::json(doc(), FieldPath::new(&["investorType"]), ScalarKind::Text),
                    CompareOp::Eq,
                    SqlExpr::Bind(Value::from("Client")),
                ),
                SqlPredicate::Exists(Box::new(Select {
                    from: vec![FromItem::JsonArray {
                        base: doc(),
                        path: FieldPath::new(&["advisors"]),
                        alias: "e".into(),
                    }],
                    filter: vec![SqlPredicate::compare(
                        SqlExpr::json(
                            SqlExpr::column("e", "value"),
                            FieldPath::new(&["advisorId"]),
                            ScalarKind::Text,
                        ),
                        CompareOp::Eq,
                        SqlExpr::Bind(Value::from("ADV001")),
                    )],
                    ..Select::default()
                })),
            ],
            ..Select::default()
        };

        let plan = SqlPlan::render(Dialect::Sqlite, &select);
        assert_eq!(
            plan.statement,
            "SELECT d.doc FROM investor_doc d WHERE json_extract(d.doc, '$.investorType') = ? \
             AND EXISTS (SELECT 1 FROM json_each(d.doc, '$.advisors') e \
             WHERE json_extract(e.value, '$.advisorId') = ?)"
        );
        assert_eq!(plan.binds, vec![Value::from("Client"), Value::from("ADV001")]);

        let plan = SqlPlan::render(Dialect::Postgres, &select);
        assert!(plan
            .statement
            .contains("jsonb_array_elements(d.doc #> '{advisors}') AS e(value)"));
        assert!(plan.statement.contains("(e.value #>> '{advisorId}') = $2"));
    }

    #[test]
    fn test_array_agg_rendering() {
        let agg = SqlExpr::JsonArrayAgg {
            element: Box::new(SqlExpr::column("c", "advisory_context")),
            table: "investor_advisory_context".into(),
            alias: "c".into(),
            parent_key: Box::new(SqlExpr::column("p", "id")),
            parent_column: "parent_id",
            order_column: "ord",
        };
        let mut w = SqlWriter::new(Dialect::Sqlite);
        agg.render(&mut w);
        assert_eq!(
            w.finish().statement,
            "json((SELECT json_group_array(c.advisory_context ORDER BY c.ord) \
             FROM investor_advisory_context c WHERE c.parent_id = p.id))"
        );
    }
}
