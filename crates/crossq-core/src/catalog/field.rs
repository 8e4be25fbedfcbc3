//! Field and array definitions for entities.

use super::types::ScalarKind;

/// A scalar field: its document name and relational column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name in documents.
    pub name: &'static str,
    /// Column name in relational tables.
    pub column: &'static str,
    /// Scalar type.
    pub kind: ScalarKind,
}

impl FieldDef {
    pub const fn text(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            kind: ScalarKind::Text,
        }
    }

    pub const fn integer(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            kind: ScalarKind::Integer,
        }
    }

    pub const fn real(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            kind: ScalarKind::Real,
        }
    }
}

/// Element type of a repeated sub-entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementDef {
    /// Array of scalars, stored in one child-table column.
    Scalar { column: &'static str, kind: ScalarKind },
    /// Array of objects, one child-table column per field.
    Object(&'static [FieldDef]),
}

impl ElementDef {
    /// Find an element field by document name.
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        match self {
            ElementDef::Object(fields) => fields.iter().find(|f| f.name == name),
            ElementDef::Scalar { .. } => None,
        }
    }
}

/// A repeated sub-entity and where it lives under each physical layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayDef {
    /// Logical name, used by the resolver.
    pub name: &'static str,
    /// Path inside an embedded-model document.
    pub embedded: &'static [&'static str],
    /// Path inside a normalized-model document.
    pub normalized: &'static [&'static str],
    /// Top-level name inside a duality-view document.
    pub flattened: &'static str,
    /// Child-table suffix in the relational layout.
    pub table: &'static str,
    /// Element type.
    pub element: ElementDef,
}
