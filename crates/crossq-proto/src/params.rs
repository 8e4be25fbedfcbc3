//! Named query parameters.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::value::Value;

/// The fixed vocabulary of parameter names across the nine logical queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamName {
    AdvisorId,
    PartyRoleId,
    SearchTerm,
    MinMarketValue,
    MaxMarketValue,
    AdvisoryContext,
    FundTicker,
    PartyNodePathValue,
    PersonaNm,
    PxPartyRoleId,
    DataOwnerPartyRoleId,
}

impl ParamName {
    /// Every parameter name, in declaration order.
    pub const ALL: [ParamName; 11] = [
        ParamName::AdvisorId,
        ParamName::PartyRoleId,
        ParamName::SearchTerm,
        ParamName::MinMarketValue,
        ParamName::MaxMarketValue,
        ParamName::AdvisoryContext,
        ParamName::FundTicker,
        ParamName::PartyNodePathValue,
        ParamName::PersonaNm,
        ParamName::PxPartyRoleId,
        ParamName::DataOwnerPartyRoleId,
    ];

    /// The external (camelCase) name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamName::AdvisorId => "advisorId",
            ParamName::PartyRoleId => "partyRoleId",
            ParamName::SearchTerm => "searchTerm",
            ParamName::MinMarketValue => "minMarketValue",
            ParamName::MaxMarketValue => "maxMarketValue",
            ParamName::AdvisoryContext => "advisoryContext",
            ParamName::FundTicker => "fundTicker",
            ParamName::PartyNodePathValue => "partyNodePathValue",
            ParamName::PersonaNm => "personaNm",
            ParamName::PxPartyRoleId => "pxPartyRoleId",
            ParamName::DataOwnerPartyRoleId => "dataOwnerPartyRoleId",
        }
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| Error::UnknownParameter(s.to_string()))
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "int64",
            ParamValue::Float(_) => "float64",
            ParamValue::Str(_) => "string",
        }
    }

    /// Convert to a document value.
    pub fn to_value(&self) -> Value {
        match self {
            ParamValue::Int(i) => Value::Int64(*i),
            ParamValue::Float(f) => Value::Float64(*f),
            ParamValue::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// The concrete inputs for one execution of a logical query.
///
/// Only the parameters the query declares are populated. Iteration order is
/// stable so the set prints the same way in every report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<ParamName, ParamValue>,
}

impl ParameterSet {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, builder style.
    pub fn with(mut self, name: ParamName, value: impl Into<ParamValue>) -> Self {
        self.values.insert(name, value.into());
        self
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, name: ParamName, value: impl Into<ParamValue>) {
        self.values.insert(name, value.into());
    }

    /// Get a parameter if present.
    pub fn get(&self, name: ParamName) -> Option<&ParamValue> {
        self.values.get(&name)
    }

    /// Whether a parameter is present.
    pub fn contains(&self, name: ParamName) -> bool {
        self.values.contains_key(&name)
    }

    /// Number of populated parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameter is populated.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over populated parameters.
    pub fn iter(&self) -> impl Iterator<Item = (ParamName, &ParamValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Get a parameter or fail naming the query that needed it.
    pub fn require(&self, query: &str, name: ParamName) -> Result<&ParamValue, Error> {
        self.values.get(&name).ok_or_else(|| Error::MissingParameter {
            query: query.to_string(),
            name: name.as_str().to_string(),
        })
    }

    /// Get a string parameter.
    pub fn require_str(&self, query: &str, name: ParamName) -> Result<&str, Error> {
        match self.require(query, name)? {
            ParamValue::Str(s) => Ok(s),
            other => Err(type_error(name, "string", other)),
        }
    }

    /// Get an integer parameter.
    pub fn require_i64(&self, query: &str, name: ParamName) -> Result<i64, Error> {
        match self.require(query, name)? {
            ParamValue::Int(i) => Ok(*i),
            other => Err(type_error(name, "int64", other)),
        }
    }

    /// Get a numeric parameter, widening integers.
    pub fn require_f64(&self, query: &str, name: ParamName) -> Result<f64, Error> {
        match self.require(query, name)? {
            ParamValue::Float(f) => Ok(*f),
            ParamValue::Int(i) => Ok(*i as f64),
            other => Err(type_error(name, "float64", other)),
        }
    }
}

fn type_error(name: ParamName, expected: &'static str, actual: &ParamValue) -> Error {
    Error::ParameterType {
        name: name.as_str().to_string(),
        expected,
        actual: actual.type_name(),
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_typed() {
        let params = ParameterSet::new()
            .with(ParamName::AdvisorId, "ADV001")
            .with(ParamName::MinMarketValue, 0.0)
            .with(ParamName::PartyRoleId, 7i64);

        assert_eq!(params.require_str("q", ParamName::AdvisorId).unwrap(), "ADV001");
        assert_eq!(params.require_f64("q", ParamName::MinMarketValue).unwrap(), 0.0);
        assert_eq!(params.require_f64("q", ParamName::PartyRoleId).unwrap(), 7.0);
        assert!(matches!(
            params.require_i64("q", ParamName::AdvisorId),
            Err(Error::ParameterType { .. })
        ));
        assert!(matches!(
            params.require("q", ParamName::FundTicker),
            Err(Error::MissingParameter { .. })
        ));
    }

    #[test]
    fn test_display_is_stable() {
        let params = ParameterSet::new()
            .with(ParamName::MaxMarketValue, 100.0)
            .with(ParamName::AdvisorId, "ADV001");
        assert_eq!(params.to_string(), r#"{advisorId="ADV001", maxMarketValue=100}"#);
    }

    #[test]
    fn test_float_display_keeps_full_precision() {
        let params = ParameterSet::new()
            .with(ParamName::MinMarketValue, 100.005)
            .with(ParamName::MaxMarketValue, 1234.567_891);
        assert_eq!(
            params.to_string(),
            "{minMarketValue=100.005, maxMarketValue=1234.567891}"
        );
    }

    #[test]
    fn test_json_shape() {
        let params = ParameterSet::new()
            .with(ParamName::AdvisorId, "ADV001")
            .with(ParamName::PartyRoleId, 3i64);
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"advisorId":"ADV001","partyRoleId":3}"#);
        let back: ParameterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_param_name_parse() {
        assert_eq!("personaNm".parse::<ParamName>().unwrap(), ParamName::PersonaNm);
        assert!("nope".parse::<ParamName>().is_err());
    }
}
