//! Schema path resolution.
//!
//! Maps a logical field role of a query to the physical location it occupies
//! for a given schema model and target. The embedded and normalized models
//! rename arrays, duality views flatten them, and the relational layout moves
//! them into child tables; every builder goes through [`SchemaPathResolver`]
//! rather than spelling paths itself.

use std::fmt;

use crossq_proto::{DatabaseTarget, LogicalQuery, SchemaModel, Value};

use crate::catalog::{
    ArrayDef, ElementDef, EntityDef, FieldDef, ScalarKind, DISCRIMINATOR, DOCUMENT_ID, ID_COLUMN,
};
use crate::error::{Error, Result};

/// A dotted path inside a JSON document (or inside an array element).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<&'static str>,
}

impl FieldPath {
    pub fn new(segments: &[&'static str]) -> Self {
        Self {
            segments: segments.to_vec(),
        }
    }

    /// The empty path: the element itself.
    pub fn root() -> Self {
        Self { segments: vec![] }
    }

    pub fn segments(&self) -> &[&'static str] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Dotted form, e.g. `entitlements.advisoryContext`.
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }

    /// Child path.
    pub fn join(&self, other: &FieldPath) -> FieldPath {
        let mut segments = self.segments.clone();
        segments.extend_from_slice(&other.segments);
        FieldPath { segments }
    }

    /// Read the value at this path from a document.
    pub fn read<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        doc.get_path(self.segments.iter().copied())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// Logical field roles referenced by the nine queries.
///
/// Element roles (`AdvisorId`, `FundTicker`, ...) resolve relative to one
/// element of their array role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    /// Document id.
    DocumentId,
    /// Entity key (investorId, groupId, accountId, advisorId).
    EntityKey,
    /// Display name (full name, group or account name).
    DisplayName,
    InvestorType,
    PartyRoleId,
    /// Total market value of the document.
    MarketValue,
    Status,
    DataOwner,
    /// Repeated advisor sub-entity.
    Advisors,
    AdvisorId,
    AdvisorName,
    ViewableAccounts,
    ViewableMarketValue,
    /// Entitled party role ids.
    PxPartyRoleIds,
    /// Entitled advisory contexts.
    AdvisoryContexts,
    Holdings,
    FundTicker,
    /// Advisor hierarchy node path.
    PartyNodePath,
    Personas,
    PersonaName,
}

impl FieldRole {
    /// The array role an element role belongs to.
    pub fn parent_array(&self) -> Option<FieldRole> {
        match self {
            FieldRole::AdvisorId
            | FieldRole::AdvisorName
            | FieldRole::ViewableAccounts
            | FieldRole::ViewableMarketValue => Some(FieldRole::Advisors),
            FieldRole::FundTicker => Some(FieldRole::Holdings),
            FieldRole::PersonaName => Some(FieldRole::Personas),
            _ => None,
        }
    }
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Where a role lives for one (query, model, target).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalField {
    /// JSON path, relative to the document, or to the element for element roles.
    Path { path: FieldPath, kind: Option<ScalarKind> },
    /// Relational column of the parent table or of a child table.
    Column {
        table: String,
        column: &'static str,
        kind: ScalarKind,
    },
    /// Relational child table of an array role.
    ChildTable {
        table: String,
        /// Value column when the array holds scalars.
        value_column: Option<(&'static str, ScalarKind)>,
    },
}

impl PhysicalField {
    /// The JSON path, if this field lives in a document.
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            PhysicalField::Path { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Scalar kind of the value, when known.
    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            PhysicalField::Path { kind, .. } => *kind,
            PhysicalField::Column { kind, .. } => Some(*kind),
            PhysicalField::ChildTable { value_column, .. } => value_column.map(|(_, k)| k),
        }
    }
}

/// What a role denotes inside one entity.
enum Binding {
    Id,
    Field(&'static FieldDef),
    Array(&'static ArrayDef),
    Element(&'static ArrayDef, &'static FieldDef),
}

/// The discriminator predicate a normalized-model plan must carry.
#[derive(Debug, Clone, PartialEq)]
pub struct Discriminator {
    pub field: PhysicalField,
    pub value: &'static str,
}

/// Resolves logical field roles to physical fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaPathResolver;

impl SchemaPathResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a role for a query under a schema model and target.
    ///
    /// An unmapped combination is a missing mapping, reported as
    /// [`Error::Unmapped`] so plan construction fails loudly.
    pub fn resolve(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        target: DatabaseTarget,
        role: FieldRole,
    ) -> Result<PhysicalField> {
        let def = EntityDef::of(query.entity);
        let binding = bind(def, role).ok_or_else(|| Error::Unmapped {
            query: query.id,
            model,
            target,
            role,
        })?;

        let resolved = match target {
            DatabaseTarget::Relational => relational(def, model, binding),
            DatabaseTarget::DualityView => PhysicalField::Path {
                path: duality_path(&binding),
                kind: binding_kind(&binding),
            },
            DatabaseTarget::DocumentStore
            | DatabaseTarget::DocumentApi
            | DatabaseTarget::SqlJson => PhysicalField::Path {
                path: document_path(def, model, &binding),
                kind: binding_kind(&binding),
            },
        };
        Ok(resolved)
    }

    /// Shorthand for roles that must resolve to a JSON path.
    pub fn resolve_path(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        target: DatabaseTarget,
        role: FieldRole,
    ) -> Result<FieldPath> {
        match self.resolve(query, model, target, role)? {
            PhysicalField::Path { path, .. } => Ok(path),
            _ => Err(Error::Unmapped {
                query: query.id,
                model,
                target,
                role,
            }),
        }
    }

    /// Name a role carries in projected output: its embedded document name.
    pub fn output_name(&self, query: &LogicalQuery, role: FieldRole) -> Result<String> {
        let path = self.resolve_path(
            query,
            SchemaModel::Embedded,
            DatabaseTarget::DocumentStore,
            role,
        )?;
        Ok(path.dotted())
    }

    /// The discriminator predicate for a model, if it has one.
    ///
    /// Only the normalized model stores several entities together; its
    /// plans must restrict to the entity's `type`.
    pub fn discriminator(
        &self,
        query: &LogicalQuery,
        model: SchemaModel,
        target: DatabaseTarget,
    ) -> Option<Discriminator> {
        if model == SchemaModel::Embedded {
            return None;
        }
        let def = EntityDef::of(query.entity);
        let field = match target {
            DatabaseTarget::Relational => PhysicalField::Column {
                table: def.parent_table(model).to_string(),
                column: DISCRIMINATOR,
                kind: ScalarKind::Text,
            },
            _ => PhysicalField::Path {
                path: FieldPath::new(&[DISCRIMINATOR]),
                kind: Some(ScalarKind::Text),
            },
        };
        Some(Discriminator {
            field,
            value: query.entity.type_tag(),
        })
    }
}

fn bind(def: &'static EntityDef, role: FieldRole) -> Option<Binding> {
    use crossq_proto::Entity::*;

    let entity = def.entity;
    let field = |name: &str| def.field(name).map(Binding::Field);
    let array = |name: &str| def.array(name).map(Binding::Array);
    let element = |array: &str, name: &str| {
        def.array(array)
            .and_then(|a| a.element.field(name).map(|f| Binding::Element(a, f)))
    };

    match role {
        FieldRole::DocumentId => Some(Binding::Id),
        FieldRole::EntityKey => field(def.id_field),
        FieldRole::DisplayName => match entity {
            BookRoleInvestor => field("investorFullName"),
            BookRoleGroup => field("groupName"),
            Account => field("accountName"),
            Advisor => field("advisorName"),
        },
        FieldRole::InvestorType => field("investorType"),
        FieldRole::PartyRoleId => field("partyRoleId"),
        FieldRole::MarketValue => match entity {
            BookRoleInvestor | BookRoleGroup => field("totalViewableAccountsMarketValue"),
            Account => field("marketValue"),
            Advisor => field("bookMarketValue"),
        },
        FieldRole::Status => field("status"),
        FieldRole::DataOwner => field("dataOwnerPartyRoleId"),
        FieldRole::Advisors => array("advisors"),
        FieldRole::AdvisorId => element("advisors", "advisorId"),
        FieldRole::AdvisorName => element("advisors", "advisorName"),
        FieldRole::ViewableAccounts => element("advisors", "noOfViewableAccts"),
        FieldRole::ViewableMarketValue => element("advisors", "viewableMarketValue"),
        FieldRole::PxPartyRoleIds => array("pxPartyRoleIdList"),
        FieldRole::AdvisoryContexts => array("advisoryContext"),
        FieldRole::Holdings => array("holdings"),
        FieldRole::FundTicker => element("holdings", "fundTicker"),
        FieldRole::PartyNodePath => array("partyNodePath"),
        FieldRole::Personas => array("personas"),
        FieldRole::PersonaName => element("personas", "personaNm"),
    }
}

fn binding_kind(binding: &Binding) -> Option<ScalarKind> {
    match binding {
        Binding::Id => Some(ScalarKind::Text),
        Binding::Field(f) | Binding::Element(_, f) => Some(f.kind),
        Binding::Array(a) => match a.element {
            ElementDef::Scalar { kind, .. } => Some(kind),
            ElementDef::Object(_) => None,
        },
    }
}

fn document_path(def: &EntityDef, model: SchemaModel, binding: &Binding) -> FieldPath {
    match binding {
        Binding::Id => FieldPath::new(&[DOCUMENT_ID]),
        Binding::Field(f) => FieldPath::new(&[f.name]),
        Binding::Array(a) => FieldPath::new(def.array_path(a, model)),
        Binding::Element(_, f) => FieldPath::new(&[f.name]),
    }
}

fn duality_path(binding: &Binding) -> FieldPath {
    match binding {
        Binding::Id => FieldPath::new(&[DOCUMENT_ID]),
        Binding::Field(f) => FieldPath::new(&[f.name]),
        Binding::Array(a) => FieldPath::new(&[a.flattened]),
        Binding::Element(_, f) => FieldPath::new(&[f.name]),
    }
}

fn relational(def: &EntityDef, model: SchemaModel, binding: Binding) -> PhysicalField {
    match binding {
        Binding::Id => PhysicalField::Column {
            table: def.parent_table(model).to_string(),
            column: ID_COLUMN,
            kind: ScalarKind::Text,
        },
        Binding::Field(f) => PhysicalField::Column {
            table: def.parent_table(model).to_string(),
            column: f.column,
            kind: f.kind,
        },
        Binding::Array(a) => PhysicalField::ChildTable {
            table: def.child_table(a, model),
            value_column: match a.element {
                ElementDef::Scalar { column, kind } => Some((column, kind)),
                ElementDef::Object(_) => None,
            },
        },
        Binding::Element(a, f) => PhysicalField::Column {
            table: def.child_table(a, model),
            column: f.column,
            kind: f.kind,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossq_proto::QueryId;

    fn investors() -> &'static LogicalQuery {
        QueryId::InvestorsByAdvisor.definition()
    }

    #[test]
    fn test_embedded_and_normalized_array_paths_differ() {
        let resolver = SchemaPathResolver::new();
        let embedded = resolver
            .resolve_path(
                investors(),
                SchemaModel::Embedded,
                DatabaseTarget::DocumentStore,
                FieldRole::Advisors,
            )
            .unwrap();
        let normalized = resolver
            .resolve_path(
                investors(),
                SchemaModel::Normalized,
                DatabaseTarget::DocumentStore,
                FieldRole::Advisors,
            )
            .unwrap();
        assert_eq!(embedded.dotted(), "advisors");
        assert_eq!(normalized.dotted(), "advisorsMetadata");
    }

    #[test]
    fn test_duality_flattens_entitlements() {
        let resolver = SchemaPathResolver::new();
        let query = QueryId::InvestorEntitlements.definition();
        let json = resolver
            .resolve_path(
                query,
                SchemaModel::Embedded,
                DatabaseTarget::SqlJson,
                FieldRole::AdvisoryContexts,
            )
            .unwrap();
        let duality = resolver
            .resolve_path(
                query,
                SchemaModel::Embedded,
                DatabaseTarget::DualityView,
                FieldRole::AdvisoryContexts,
            )
            .unwrap();
        assert_eq!(json.dotted(), "entitlements.advisoryContext");
        assert_eq!(duality.dotted(), "advisoryContexts");
    }

    #[test]
    fn test_relational_columns() {
        let resolver = SchemaPathResolver::new();
        let field = resolver
            .resolve(
                investors(),
                SchemaModel::Normalized,
                DatabaseTarget::Relational,
                FieldRole::ViewableMarketValue,
            )
            .unwrap();
        assert_eq!(
            field,
            PhysicalField::Column {
                table: "book_role_advisor".to_string(),
                column: "viewable_market_value",
                kind: ScalarKind::Real,
            }
        );

        let contexts = resolver
            .resolve(
                QueryId::GroupsByDataOwner.definition(),
                SchemaModel::Embedded,
                DatabaseTarget::Relational,
                FieldRole::AdvisoryContexts,
            )
            .unwrap();
        assert_eq!(
            contexts,
            PhysicalField::ChildTable {
                table: "investor_group_advisory_context".to_string(),
                value_column: Some(("advisory_context", ScalarKind::Text)),
            }
        );
    }

    #[test]
    fn test_unmapped_role_is_an_error() {
        let resolver = SchemaPathResolver::new();
        let err = resolver
            .resolve(
                QueryId::AdvisorsByHierarchyPersona.definition(),
                SchemaModel::Embedded,
                DatabaseTarget::DocumentStore,
                FieldRole::Holdings,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Unmapped { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_discriminator_only_for_normalized() {
        let resolver = SchemaPathResolver::new();
        assert!(resolver
            .discriminator(investors(), SchemaModel::Embedded, DatabaseTarget::SqlJson)
            .is_none());
        let disc = resolver
            .discriminator(investors(), SchemaModel::Normalized, DatabaseTarget::Relational)
            .unwrap();
        assert_eq!(disc.value, "BookRoleInvestor");
        assert!(matches!(disc.field, PhysicalField::Column { column: "type", .. }));
    }
}
