//! Schema models and database targets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Physical arrangement of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaModel {
    /// One collection or table per entity, sub-entities nested as arrays.
    Embedded,
    /// All entities in one polymorphic collection or table, discriminated by `type`.
    Normalized,
}

impl SchemaModel {
    pub const ALL: [SchemaModel; 2] = [SchemaModel::Embedded, SchemaModel::Normalized];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaModel::Embedded => "embedded",
            SchemaModel::Normalized => "normalized",
        }
    }
}

impl fmt::Display for SchemaModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SchemaModel::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::UnknownSchemaModel(s.to_string()))
    }
}

/// Driver family a target is reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverFamily {
    /// Filter documents and aggregation pipelines.
    Document,
    /// SQL statements with positional binds.
    Sql,
}

/// A database/driver combination under benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatabaseTarget {
    /// Native document database.
    DocumentStore,
    /// JSON-document API fronting a relational engine.
    DocumentApi,
    /// JSON-path predicates over JSON columns.
    SqlJson,
    /// JOIN/EXISTS SQL over fully normalized tables.
    Relational,
    /// Relational-to-document projection views.
    DualityView,
}

impl DatabaseTarget {
    pub const ALL: [DatabaseTarget; 5] = [
        DatabaseTarget::DocumentStore,
        DatabaseTarget::DocumentApi,
        DatabaseTarget::SqlJson,
        DatabaseTarget::Relational,
        DatabaseTarget::DualityView,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseTarget::DocumentStore => "document-store",
            DatabaseTarget::DocumentApi => "document-api",
            DatabaseTarget::SqlJson => "sql-json",
            DatabaseTarget::Relational => "relational",
            DatabaseTarget::DualityView => "duality-view",
        }
    }

    /// Which driver family executes plans for this target.
    pub fn driver_family(&self) -> DriverFamily {
        match self {
            DatabaseTarget::DocumentStore | DatabaseTarget::DocumentApi => DriverFamily::Document,
            DatabaseTarget::SqlJson | DatabaseTarget::Relational | DatabaseTarget::DualityView => {
                DriverFamily::Sql
            }
        }
    }

    /// Whether the engine accepts a window-count stage in aggregation pipelines.
    ///
    /// Only the native document engine does; the document API over a
    /// relational engine rejects the stage.
    pub fn supports_window_stage(&self) -> bool {
        matches!(self, DatabaseTarget::DocumentStore)
    }
}

impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatabaseTarget::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownTarget(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_families() {
        assert_eq!(DatabaseTarget::DocumentApi.driver_family(), DriverFamily::Document);
        assert_eq!(DatabaseTarget::DualityView.driver_family(), DriverFamily::Sql);
    }

    #[test]
    fn test_window_stage_is_native_only() {
        let supported: Vec<_> = DatabaseTarget::ALL
            .into_iter()
            .filter(DatabaseTarget::supports_window_stage)
            .collect();
        assert_eq!(supported, vec![DatabaseTarget::DocumentStore]);
    }

    #[test]
    fn test_parse_roundtrip() {
        for target in DatabaseTarget::ALL {
            assert_eq!(target.as_str().parse::<DatabaseTarget>().unwrap(), target);
        }
        assert_eq!("normalized".parse::<SchemaModel>().unwrap(), SchemaModel::Normalized);
    }
}
