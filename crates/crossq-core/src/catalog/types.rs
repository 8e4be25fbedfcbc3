//! Scalar types stored in documents and relational columns.

use crossq_proto::Value;

/// Scalar data type of a document field or relational column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Real,
}

impl ScalarKind {
    /// Whether comparisons on this kind are numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarKind::Integer | ScalarKind::Real)
    }

    /// Coerce a document value into this kind, keeping nulls.
    ///
    /// Returns `None` when the value cannot represent this kind.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (_, Value::Null) => Some(Value::Null),
            (ScalarKind::Text, Value::String(_)) => Some(value.clone()),
            (ScalarKind::Integer, v) => v.as_i64().map(Value::Int64),
            (ScalarKind::Real, v) => v.as_f64().map(Value::Float64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce() {
        assert_eq!(ScalarKind::Real.coerce(&Value::Int64(2)), Some(Value::Float64(2.0)));
        assert_eq!(ScalarKind::Integer.coerce(&Value::Float64(3.0)), Some(Value::Int64(3)));
        assert_eq!(ScalarKind::Text.coerce(&Value::Int64(3)), None);
        assert_eq!(ScalarKind::Text.coerce(&Value::Null), Some(Value::Null));
    }
}
