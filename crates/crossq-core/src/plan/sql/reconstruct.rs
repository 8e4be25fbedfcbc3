//! Rebuilding whole documents from relational rows.
//!
//! The relational builder selects this expression for filtered queries, and
//! the duality views are defined with it, so both produce documents with
//! the same fields as the stored ones.

use crossq_proto::SchemaModel;

use super::ast::SqlExpr;
use crate::catalog::{
    ArrayDef, ElementDef, EntityDef, DISCRIMINATOR, DOCUMENT_ID, ID_COLUMN, ORDINAL_COLUMN,
    PARENT_COLUMN,
};

/// Where arrays are placed in the rebuilt document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentLayout {
    /// At their stored path for the schema model (`entitlements.advisoryContext`).
    Nested,
    /// At the top level under their plural name (`advisoryContexts`).
    Flattened,
}

const CHILD_ALIAS: &str = "c";

/// JSON expression rebuilding one entity's document from parent row `alias`.
pub fn document_expression(
    def: &EntityDef,
    model: SchemaModel,
    layout: DocumentLayout,
    alias: &str,
) -> SqlExpr {
    let mut entries = vec![(
        DOCUMENT_ID.to_string(),
        SqlExpr::column(alias, ID_COLUMN),
    )];
    if model == SchemaModel::Normalized {
        entries.push((
            DISCRIMINATOR.to_string(),
            SqlExpr::column(alias, DISCRIMINATOR),
        ));
    }
    for field in def.fields {
        entries.push((field.name.to_string(), SqlExpr::column(alias, field.column)));
    }

    for array in def.arrays {
        let agg = SqlExpr::JsonArrayAgg {
            element: Box::new(element_expression(array)),
            table: def.child_table(array, model),
            alias: CHILD_ALIAS.to_string(),
            parent_key: Box::new(SqlExpr::column(alias, ID_COLUMN)),
            parent_column: PARENT_COLUMN,
            order_column: ORDINAL_COLUMN,
        };
        match layout {
            DocumentLayout::Flattened => entries.push((array.flattened.to_string(), agg)),
            DocumentLayout::Nested => insert_at(&mut entries, def.array_path(array, model), agg),
        }
    }

    SqlExpr::JsonObject(entries)
}

fn element_expression(array: &ArrayDef) -> SqlExpr {
    match array.element {
        ElementDef::Scalar { column, .. } => SqlExpr::column(CHILD_ALIAS, column),
        ElementDef::Object(fields) => SqlExpr::JsonObject(
            fields
                .iter()
                .map(|f| (f.name.to_string(), SqlExpr::column(CHILD_ALIAS, f.column)))
                .collect(),
        ),
    }
}

/// Place `value` at `path`, creating nested objects along the way.
fn insert_at(entries: &mut Vec<(String, SqlExpr)>, path: &[&str], value: SqlExpr) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        entries.push((first.to_string(), value));
        return;
    }
    let position = entries
        .iter()
        .position(|(key, expr)| key == first && matches!(expr, SqlExpr::JsonObject(_)));
    let index = match position {
        Some(index) => index,
        None => {
            entries.push((first.to_string(), SqlExpr::JsonObject(Vec::new())));
            entries.len() - 1
        }
    };
    if let SqlExpr::JsonObject(children) = &mut entries[index].1 {
        insert_at(children, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::sql::{Dialect, SqlWriter};
    use crossq_proto::Entity;

    fn render(expr: &SqlExpr) -> String {
        let mut w = SqlWriter::new(Dialect::Sqlite);
        expr.render(&mut w);
        w.finish().statement
    }

    #[test]
    fn test_nested_layout_groups_entitlements() {
        let def = EntityDef::of(Entity::BookRoleInvestor);
        let expr = document_expression(def, SchemaModel::Embedded, DocumentLayout::Nested, "p");
        let SqlExpr::JsonObject(entries) = &expr else {
            panic!("expected object");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "_id",
                "investorId",
                "investorType",
                "investorFullName",
                "partyRoleId",
                "totalViewableAccountsMarketValue",
                "advisors",
                "entitlements"
            ]
        );
        let sql = render(&expr);
        assert!(sql.contains(
            "'entitlements', json_object('pxPartyRoleIdList', json((SELECT json_group_array(c.px_party_role_id"
        ));
        assert!(sql.contains("FROM investor_advisor c WHERE c.parent_id = p.id"));
    }

    #[test]
    fn test_flattened_normalized_layout() {
        let def = EntityDef::of(Entity::Advisor);
        let expr =
            document_expression(def, SchemaModel::Normalized, DocumentLayout::Flattened, "p");
        let sql = render(&expr);
        assert!(sql.starts_with("json_object('_id', p.id, 'type', p.type, 'advisorId'"));
        assert!(sql.contains("'partyNodePaths', json((SELECT json_group_array(c.party_node_path_value ORDER BY c.ord) FROM book_role_party_node c"));
        assert!(sql.contains("'personas', json((SELECT json_group_array(json_object('personaNm', c.persona_nm"));
    }
}
