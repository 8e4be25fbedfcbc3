//! Entity definitions and their physical names per schema model.

use crossq_proto::{Entity, SchemaModel, Value};

use super::field::{ArrayDef, ElementDef, FieldDef};
use super::types::ScalarKind;

/// Collection holding every entity under the normalized model.
pub const NORMALIZED_COLLECTION: &str = "bookRole";

/// Relational parent table holding every entity under the normalized model.
pub const NORMALIZED_TABLE: &str = "book_role";

/// Discriminator field (and column) of the normalized model.
pub const DISCRIMINATOR: &str = "type";

/// Document id field.
pub const DOCUMENT_ID: &str = "_id";

/// Relational primary key column of every parent table.
pub const ID_COLUMN: &str = "id";

/// Foreign key column of every child table.
pub const PARENT_COLUMN: &str = "parent_id";

/// Element position column of every child table.
pub const ORDINAL_COLUMN: &str = "ord";

/// Column holding the JSON document in JSON tables and duality views.
pub const DOC_COLUMN: &str = "doc";

/// Static definition of one entity.
#[derive(Debug, PartialEq, Eq)]
pub struct EntityDef {
    pub entity: Entity,
    /// Collection name under the embedded model.
    pub collection: &'static str,
    /// Relational parent table under the embedded model.
    pub table: &'static str,
    /// Field whose value is also the document id.
    pub id_field: &'static str,
    /// Top-level scalar fields.
    pub fields: &'static [FieldDef],
    /// Repeated sub-entities.
    pub arrays: &'static [ArrayDef],
}

const ADVISOR_ELEMENT: &[FieldDef] = &[
    FieldDef::text("advisorId", "advisor_id"),
    FieldDef::text("advisorName", "advisor_name"),
    FieldDef::integer("noOfViewableAccts", "no_of_viewable_accts"),
    FieldDef::real("viewableMarketValue", "viewable_market_value"),
];

const HOLDING_ELEMENT: &[FieldDef] = &[
    FieldDef::text("fundTicker", "fund_ticker"),
    FieldDef::integer("quantity", "quantity"),
    FieldDef::real("marketValue", "market_value"),
];

const PERSONA_ELEMENT: &[FieldDef] = &[
    FieldDef::text("personaNm", "persona_nm"),
    FieldDef::integer("pxPartyRoleId", "px_party_role_id"),
];

const ADVISORS: ArrayDef = ArrayDef {
    name: "advisors",
    embedded: &["advisors"],
    normalized: &["advisorsMetadata"],
    flattened: "advisors",
    table: "advisor",
    element: ElementDef::Object(ADVISOR_ELEMENT),
};

const PX_PARTY_ROLE_IDS: ArrayDef = ArrayDef {
    name: "pxPartyRoleIdList",
    embedded: &["entitlements", "pxPartyRoleIdList"],
    normalized: &["entitlementsMetadata", "pxPartyRoleIdList"],
    flattened: "pxPartyRoleIds",
    table: "px_party_role",
    element: ElementDef::Scalar {
        column: "px_party_role_id",
        kind: ScalarKind::Integer,
    },
};

const ADVISORY_CONTEXTS: ArrayDef = ArrayDef {
    name: "advisoryContext",
    embedded: &["entitlements", "advisoryContext"],
    normalized: &["entitlementsMetadata", "advisoryContext"],
    flattened: "advisoryContexts",
    table: "advisory_context",
    element: ElementDef::Scalar {
        column: "advisory_context",
        kind: ScalarKind::Text,
    },
};

const HOLDINGS: ArrayDef = ArrayDef {
    name: "holdings",
    embedded: &["holdings"],
    normalized: &["holdingsMetadata"],
    flattened: "holdings",
    table: "holding",
    element: ElementDef::Object(HOLDING_ELEMENT),
};

const PARTY_NODE_PATH: ArrayDef = ArrayDef {
    name: "partyNodePath",
    embedded: &["partyNodePath"],
    normalized: &["hierarchyMetadata"],
    flattened: "partyNodePaths",
    table: "party_node",
    element: ElementDef::Scalar {
        column: "party_node_path_value",
        kind: ScalarKind::Text,
    },
};

const PERSONAS: ArrayDef = ArrayDef {
    name: "personas",
    embedded: &["personas"],
    normalized: &["personasMetadata"],
    flattened: "personas",
    table: "persona",
    element: ElementDef::Object(PERSONA_ELEMENT),
};

static INVESTOR: EntityDef = EntityDef {
    entity: Entity::BookRoleInvestor,
    collection: "bookRoleInvestor",
    table: "investor",
    id_field: "investorId",
    fields: &[
        FieldDef::text("investorId", "investor_id"),
        FieldDef::text("investorType", "investor_type"),
        FieldDef::text("investorFullName", "investor_full_name"),
        FieldDef::integer("partyRoleId", "party_role_id"),
        FieldDef::real(
            "totalViewableAccountsMarketValue",
            "total_viewable_accounts_market_value",
        ),
    ],
    arrays: &[ADVISORS, PX_PARTY_ROLE_IDS, ADVISORY_CONTEXTS],
};

static GROUP: EntityDef = EntityDef {
    entity: Entity::BookRoleGroup,
    collection: "bookRoleGroup",
    table: "investor_group",
    id_field: "groupId",
    fields: &[
        FieldDef::text("groupId", "group_id"),
        FieldDef::text("groupName", "group_name"),
        FieldDef::text("status", "status"),
        FieldDef::integer("dataOwnerPartyRoleId", "data_owner_party_role_id"),
        FieldDef::real(
            "totalViewableAccountsMarketValue",
            "total_viewable_accounts_market_value",
        ),
    ],
    arrays: &[ADVISORS, PX_PARTY_ROLE_IDS, ADVISORY_CONTEXTS],
};

static ACCOUNT: EntityDef = EntityDef {
    entity: Entity::Account,
    collection: "account",
    table: "account",
    id_field: "accountId",
    fields: &[
        FieldDef::text("accountId", "account_id"),
        FieldDef::text("accountName", "account_name"),
        FieldDef::text("status", "status"),
        FieldDef::integer("finInstId", "fin_inst_id"),
        FieldDef::real("marketValue", "market_value"),
    ],
    arrays: &[ADVISORS, HOLDINGS, ADVISORY_CONTEXTS],
};

static ADVISOR: EntityDef = EntityDef {
    entity: Entity::Advisor,
    collection: "advisor",
    table: "advisor",
    id_field: "advisorId",
    fields: &[
        FieldDef::text("advisorId", "advisor_id"),
        FieldDef::text("advisorName", "advisor_name"),
        FieldDef::real("bookMarketValue", "book_market_value"),
    ],
    arrays: &[PARTY_NODE_PATH, PERSONAS],
};

impl EntityDef {
    /// Look up the definition of an entity.
    pub fn of(entity: Entity) -> &'static EntityDef {
        match entity {
            Entity::BookRoleInvestor => &INVESTOR,
            Entity::BookRoleGroup => &GROUP,
            Entity::Account => &ACCOUNT,
            Entity::Advisor => &ADVISOR,
        }
    }

    /// Every entity definition.
    pub fn all() -> [&'static EntityDef; 4] {
        [&INVESTOR, &GROUP, &ACCOUNT, &ADVISOR]
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn array(&self, name: &str) -> Option<&'static ArrayDef> {
        self.arrays.iter().find(|a| a.name == name)
    }

    /// Document collection for a schema model.
    pub fn collection(&self, model: SchemaModel) -> &'static str {
        match model {
            SchemaModel::Embedded => self.collection,
            SchemaModel::Normalized => NORMALIZED_COLLECTION,
        }
    }

    /// Relational parent table for a schema model.
    pub fn parent_table(&self, model: SchemaModel) -> &'static str {
        match model {
            SchemaModel::Embedded => self.table,
            SchemaModel::Normalized => NORMALIZED_TABLE,
        }
    }

    /// Relational child table of an array for a schema model.
    pub fn child_table(&self, array: &ArrayDef, model: SchemaModel) -> String {
        format!("{}_{}", self.parent_table(model), array.table)
    }

    /// Table with one JSON document per row, for a schema model.
    pub fn json_table(&self, model: SchemaModel) -> String {
        format!("{}_doc", self.parent_table(model))
    }

    /// Duality view exposing relational rows as documents, for a schema model.
    pub fn duality_view(&self, model: SchemaModel) -> String {
        format!("{}_dv", self.parent_table(model))
    }

    /// Path of an array inside a JSON document of the given model.
    pub fn array_path(&self, array: &ArrayDef, model: SchemaModel) -> &'static [&'static str] {
        match model {
            SchemaModel::Embedded => array.embedded,
            SchemaModel::Normalized => array.normalized,
        }
    }

    /// Rewrite an embedded-model document into the normalized model.
    ///
    /// Adds the discriminator and moves every array to its normalized path.
    /// Objects left empty by the move are removed.
    pub fn to_normalized(&self, doc: &Value) -> Value {
        let mut out = doc.clone();
        let mut moved = Vec::new();
        for array in self.arrays {
            if let Some(items) = out.take_path(array.embedded) {
                moved.push((array.normalized, items));
            }
            if let [parent, _, ..] = array.embedded {
                let emptied = out
                    .get(parent)
                    .and_then(Value::as_object)
                    .is_some_and(|map| map.is_empty());
                if emptied {
                    out.take_path(&[*parent]);
                }
            }
        }
        for (path, items) in moved {
            out.set_path(path, items);
        }
        out.set_path(&[DISCRIMINATOR], Value::from(self.entity.type_tag()));
        out
    }
}

/// Scalar columns of the normalized parent table: the union over all entities.
pub fn normalized_columns() -> Vec<&'static FieldDef> {
    let mut columns: Vec<&'static FieldDef> = Vec::new();
    for def in EntityDef::all() {
        for field in def.fields {
            if !columns.iter().any(|c| c.column == field.column) {
                columns.push(field);
            }
        }
    }
    columns
}

/// Array definitions shared by the normalized child tables, one per table suffix.
pub fn normalized_arrays() -> Vec<&'static ArrayDef> {
    let mut arrays: Vec<&'static ArrayDef> = Vec::new();
    for def in EntityDef::all() {
        for array in def.arrays {
            if !arrays.iter().any(|a| a.table == array.table) {
                arrays.push(array);
            }
        }
    }
    arrays
}

#[cfg(test)]
mod tests {
    use super::*;

    fn investor_doc() -> Value {
        Value::parse(
            r#"{
                "_id": "INV1", "investorId": "INV1", "investorType": "Client",
                "advisors": [{"advisorId": "ADV001", "noOfViewableAccts": 2}],
                "entitlements": {"pxPartyRoleIdList": [7], "advisoryContext": ["CTX1"]}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_physical_names() {
        let def = EntityDef::of(Entity::BookRoleInvestor);
        let advisors = def.array("advisors").unwrap();
        assert_eq!(def.collection(SchemaModel::Embedded), "bookRoleInvestor");
        assert_eq!(def.collection(SchemaModel::Normalized), "bookRole");
        assert_eq!(def.child_table(advisors, SchemaModel::Embedded), "investor_advisor");
        assert_eq!(def.child_table(advisors, SchemaModel::Normalized), "book_role_advisor");
        assert_eq!(def.json_table(SchemaModel::Embedded), "investor_doc");
        assert_eq!(def.duality_view(SchemaModel::Normalized), "book_role_dv");
    }

    #[test]
    fn test_to_normalized_moves_arrays() {
        let def = EntityDef::of(Entity::BookRoleInvestor);
        let normalized = def.to_normalized(&investor_doc());

        assert_eq!(
            normalized.get(DISCRIMINATOR).and_then(Value::as_str),
            Some("BookRoleInvestor")
        );
        assert!(normalized.get("advisors").is_none());
        assert!(normalized.get("entitlements").is_none());
        assert_eq!(
            normalized
                .get_path(["advisorsMetadata"])
                .and_then(Value::as_array)
                .map(<[Value]>::len),
            Some(1)
        );
        assert_eq!(
            normalized.get_path(["entitlementsMetadata", "advisoryContext"]),
            Some(&Value::from(vec![Value::from("CTX1")]))
        );
        assert_eq!(normalized.get("investorId"), Some(&Value::from("INV1")));
    }

    #[test]
    fn test_normalized_union_is_consistent() {
        let columns = normalized_columns();
        for a in &columns {
            for b in &columns {
                if a.column == b.column {
                    assert_eq!(a.kind, b.kind, "column {} has two kinds", a.column);
                }
            }
        }
        assert!(columns.iter().any(|c| c.column == "fin_inst_id"));

        let arrays = normalized_arrays();
        assert_eq!(arrays.len(), 6);
    }
}
