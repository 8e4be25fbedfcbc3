//! Entity catalogue.
//!
//! Static definitions of the four entities and the names each one takes under
//! every physical layout: document collections, JSON tables, relational
//! parent/child tables, and duality views.

mod entity;
mod field;
mod types;

pub use entity::{
    normalized_arrays, normalized_columns, EntityDef, DISCRIMINATOR, DOCUMENT_ID, DOC_COLUMN,
    ID_COLUMN, NORMALIZED_COLLECTION, NORMALIZED_TABLE, ORDINAL_COLUMN, PARENT_COLUMN,
};
pub use field::{ArrayDef, ElementDef, FieldDef};
pub use types::ScalarKind;
