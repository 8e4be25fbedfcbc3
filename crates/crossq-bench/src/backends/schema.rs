//! Physical SQL layout shared by the SQL backends.
//!
//! For each schema model the SQL targets read three structures:
//!
//! - a JSON table (`<parent>_doc`) with one stored document per row,
//! - relational parent and child tables (`<parent>`, `<parent>_<array>`),
//! - a duality view (`<parent>_dv`) rebuilding documents from those tables.
//!
//! Statements are generated per [`Dialect`] from the catalog, and the view
//! bodies come from the same document expression the relational builder
//! selects, so every target reads identical documents.

use std::collections::BTreeMap;

use crossq_core::catalog::{
    normalized_arrays, normalized_columns, ArrayDef, ElementDef, EntityDef, ScalarKind,
    DISCRIMINATOR, DOCUMENT_ID, DOC_COLUMN, ID_COLUMN, NORMALIZED_TABLE, ORDINAL_COLUMN,
    PARENT_COLUMN,
};
use crossq_core::plan::sql::{
    document_expression, DocumentLayout, FromItem, Select, SqlExpr, SqlPlan, SqlPredicate,
};
use crossq_core::query::CompareOp;
use crossq_core::Dialect;
use crossq_proto::{Entity, SchemaModel, Value};

use crate::fixtures::Dataset;

const VIEW_ALIAS: &str = "p";

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Scalar(ScalarKind),
    /// A whole JSON document.
    Document,
}

/// A table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    const fn scalar(name: &'static str, kind: ScalarKind) -> Self {
        Self {
            name,
            kind: ColumnKind::Scalar(kind),
        }
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Child tables carry a parent key instead of a primary key.
    pub child: bool,
}

/// Rows destined for one table, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRows {
    pub table: Table,
    pub rows: Vec<Vec<Value>>,
}

fn parent_table(def: &EntityDef, model: SchemaModel) -> Table {
    let mut columns = vec![Column::scalar(ID_COLUMN, ScalarKind::Text)];
    match model {
        SchemaModel::Embedded => {
            columns.extend(def.fields.iter().map(|f| Column::scalar(f.column, f.kind)));
        }
        SchemaModel::Normalized => {
            columns.push(Column::scalar(DISCRIMINATOR, ScalarKind::Text));
            columns.extend(
                normalized_columns()
                    .into_iter()
                    .map(|f| Column::scalar(f.column, f.kind)),
            );
        }
    }
    Table {
        name: def.parent_table(model).to_string(),
        columns,
        child: false,
    }
}

fn child_table(def: &EntityDef, array: &ArrayDef, model: SchemaModel) -> Table {
    let mut columns = vec![
        Column::scalar(PARENT_COLUMN, ScalarKind::Text),
        Column::scalar(ORDINAL_COLUMN, ScalarKind::Integer),
    ];
    match array.element {
        ElementDef::Scalar { column, kind } => columns.push(Column::scalar(column, kind)),
        ElementDef::Object(fields) => {
            columns.extend(fields.iter().map(|f| Column::scalar(f.column, f.kind)));
        }
    }
    Table {
        name: def.child_table(array, model),
        columns,
        child: true,
    }
}

fn json_table(def: &EntityDef, model: SchemaModel) -> Table {
    Table {
        name: def.json_table(model),
        columns: vec![
            Column::scalar(ID_COLUMN, ScalarKind::Text),
            Column {
                name: DOC_COLUMN,
                kind: ColumnKind::Document,
            },
        ],
        child: false,
    }
}

/// Every table of a schema model, parents before children.
pub fn tables(model: SchemaModel) -> Vec<Table> {
    let mut tables: Vec<Table> = Vec::new();
    let mut push = |table: Table| {
        if !tables.iter().any(|t| t.name == table.name) {
            tables.push(table);
        }
    };
    for def in EntityDef::all() {
        push(parent_table(def, model));
        push(json_table(def, model));
        let arrays: Vec<&ArrayDef> = match model {
            SchemaModel::Embedded => def.arrays.iter().collect(),
            SchemaModel::Normalized => normalized_arrays(),
        };
        for array in arrays {
            push(child_table(def, array, model));
        }
    }
    tables
}

/// Names of the duality views of a schema model.
pub fn views(model: SchemaModel) -> Vec<String> {
    let mut names: Vec<String> = EntityDef::all()
        .iter()
        .map(|def| def.duality_view(model))
        .collect();
    names.dedup();
    names
}

fn view_select(def: &EntityDef, model: SchemaModel) -> Select {
    let mut select = Select {
        columns: vec![
            (
                SqlExpr::column(VIEW_ALIAS, ID_COLUMN),
                Some(ID_COLUMN.to_string()),
            ),
            (
                document_expression(def, model, DocumentLayout::Flattened, VIEW_ALIAS),
                Some(DOC_COLUMN.to_string()),
            ),
        ],
        from: vec![FromItem::table(def.parent_table(model), VIEW_ALIAS)],
        ..Select::default()
    };
    if model == SchemaModel::Normalized {
        select.filter.push(SqlPredicate::compare(
            SqlExpr::column(VIEW_ALIAS, DISCRIMINATOR),
            CompareOp::Eq,
            SqlExpr::Text(def.entity.type_tag().to_string()),
        ));
    }
    select
}

/// `CREATE VIEW` statements of a schema model.
///
/// The normalized model has one view over all entities, a union of one
/// select per discriminator value.
pub fn view_statements(dialect: Dialect, model: SchemaModel) -> Vec<String> {
    let render = |def: &EntityDef| SqlPlan::render(dialect, &view_select(def, model)).statement;
    match model {
        SchemaModel::Embedded => EntityDef::all()
            .iter()
            .map(|def| {
                format!(
                    "CREATE VIEW {} AS {}",
                    def.duality_view(model),
                    render(def)
                )
            })
            .collect(),
        SchemaModel::Normalized => {
            let branches: Vec<String> = EntityDef::all().iter().map(|def| render(def)).collect();
            vec![format!(
                "CREATE VIEW {} AS {}",
                EntityDef::of(Entity::Advisor).duality_view(model),
                branches.join(" UNION ALL ")
            )]
        }
    }
}

fn create_table(dialect: Dialect, table: &Table) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let ty = match c.kind {
                ColumnKind::Scalar(kind) => dialect.column_type(kind),
                ColumnKind::Document => dialect.document_type(),
            };
            if !table.child && c.name == ID_COLUMN {
                format!("{} {ty} PRIMARY KEY", c.name)
            } else {
                format!("{} {ty}", c.name)
            }
        })
        .collect();
    format!("CREATE TABLE {} ({})", table.name, columns.join(", "))
}

/// Statements dropping and recreating every structure of the given models.
pub fn create_statements(dialect: Dialect, models: &[SchemaModel]) -> Vec<String> {
    let cascade = match dialect {
        Dialect::Sqlite => "",
        Dialect::Postgres => " CASCADE",
    };
    let mut statements = Vec::new();
    for &model in models {
        for view in views(model) {
            statements.push(format!("DROP VIEW IF EXISTS {view}{cascade}"));
        }
        for table in tables(model).iter().rev() {
            statements.push(format!("DROP TABLE IF EXISTS {}{cascade}", table.name));
        }
    }
    for &model in models {
        for table in tables(model) {
            statements.push(create_table(dialect, &table));
            if table.child {
                statements.push(format!(
                    "CREATE INDEX {0}_parent_idx ON {0} ({PARENT_COLUMN}, {ORDINAL_COLUMN})",
                    table.name
                ));
            }
        }
        if model == SchemaModel::Normalized {
            statements.push(format!(
                "CREATE INDEX {NORMALIZED_TABLE}_type_idx ON {NORMALIZED_TABLE} ({DISCRIMINATOR})"
            ));
        }
        statements.extend(view_statements(dialect, model));
    }
    statements
}

/// Parameterized `INSERT` for a table.
pub fn insert_statement(dialect: Dialect, table: &Table) -> String {
    let names: Vec<&str> = table.columns.iter().map(|c| c.name).collect();
    let placeholders: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let placeholder = dialect.placeholder(i + 1);
            match (dialect, c.kind) {
                (Dialect::Postgres, ColumnKind::Document) => format!("{placeholder}::jsonb"),
                _ => placeholder,
            }
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name,
        names.join(", "),
        placeholders.join(", ")
    )
}

fn coerce(kind: ScalarKind, value: Option<&Value>) -> Value {
    value
        .and_then(|v| kind.coerce(v))
        .unwrap_or(Value::Null)
}

fn parent_row(def: &EntityDef, table: &Table, doc: &Value, model: SchemaModel) -> Vec<Value> {
    table
        .columns
        .iter()
        .map(|c| match (c.name, c.kind) {
            (ID_COLUMN, _) => doc.get(DOCUMENT_ID).cloned().unwrap_or(Value::Null),
            (DISCRIMINATOR, _) if model == SchemaModel::Normalized => {
                Value::from(def.entity.type_tag())
            }
            (column, ColumnKind::Scalar(kind)) => {
                let field = def.fields.iter().find(|f| f.column == column);
                coerce(kind, field.and_then(|f| doc.get(f.name)))
            }
            (_, ColumnKind::Document) => Value::Null,
        })
        .collect()
}

fn child_rows(id: &Value, array: &ArrayDef, doc: &Value) -> Vec<Vec<Value>> {
    let elements = doc
        .get_path(array.embedded.iter().copied())
        .and_then(Value::as_array)
        .unwrap_or(&[]);
    elements
        .iter()
        .enumerate()
        .map(|(ord, element)| {
            let mut row = vec![id.clone(), Value::Int64(ord as i64)];
            match array.element {
                ElementDef::Scalar { kind, .. } => row.push(coerce(kind, Some(element))),
                ElementDef::Object(fields) => {
                    row.extend(fields.iter().map(|f| coerce(f.kind, element.get(f.name))));
                }
            }
            row
        })
        .collect()
}

/// Rows of every table of a schema model, from a dataset.
pub fn rows(dataset: &Dataset, model: SchemaModel) -> Vec<TableRows> {
    let mut out: BTreeMap<String, TableRows> = tables(model)
        .into_iter()
        .map(|table| {
            (
                table.name.clone(),
                TableRows {
                    table,
                    rows: Vec::new(),
                },
            )
        })
        .collect();
    let mut append = |name: String, mut rows: Vec<Vec<Value>>| {
        if let Some(target) = out.get_mut(&name) {
            target.rows.append(&mut rows);
        }
    };

    for def in EntityDef::all() {
        let parent = parent_table(def, model);
        let embedded = dataset.documents(def.entity);
        let stored = dataset.documents_for(def.entity, model);
        for (doc, stored) in embedded.iter().zip(stored) {
            let id = doc.get(DOCUMENT_ID).cloned().unwrap_or(Value::Null);
            append(parent.name.clone(), vec![parent_row(def, &parent, doc, model)]);
            append(def.json_table(model), vec![vec![id.clone(), stored]]);
            for array in def.arrays {
                append(def.child_table(array, model), child_rows(&id, array, doc));
            }
        }
    }
    out.into_values().filter(|t| !t.rows.is_empty()).collect()
}
