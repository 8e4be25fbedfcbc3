//! Target-independent predicate plans for the nine logical queries.
//!
//! A [`LogicalPlan`] binds a query's parameters into a tree of typed
//! predicates over [`FieldRole`]s. Every builder compiles the same plan, so
//! filter semantics (inclusive ranges, membership, case-insensitive search,
//! the viewable-account floor) are written down exactly once.

use std::fmt;

use crossq_proto::{LogicalQuery, ParamName, ParameterSet, QueryId, Value, RANKED_LIMIT};

use crate::error::Result;
use crate::resolve::FieldRole;

/// Advisors must have at least this many viewable accounts to be ranked.
pub const VIEWABLE_ACCOUNTS_FLOOR: i64 = 1;

/// Investor type the client-only queries restrict to.
pub const CLIENT_INVESTOR_TYPE: &str = "Client";

/// Group status excluded by the group queries.
pub const CLOSED_STATUS: &str = "Closed";

/// Name of the nested object the unwound element is projected into.
pub const PROJECTED_ELEMENT: &str = "advisor";

/// Scalar comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gte,
    Lte,
}

impl CompareOp {
    /// Operator text shared by SQL dialects.
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
        }
    }

    /// Document filter operator.
    pub fn document(&self) -> &'static str {
        match self {
            CompareOp::Eq => "$eq",
            CompareOp::Ne => "$ne",
            CompareOp::Gte => "$gte",
            CompareOp::Lte => "$lte",
        }
    }
}

/// A comparison between a field and a bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub role: FieldRole,
    pub op: CompareOp,
    pub value: Value,
}

impl Comparison {
    pub fn new(role: FieldRole, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            role,
            op,
            value: value.into(),
        }
    }

    pub fn eq(role: FieldRole, value: impl Into<Value>) -> Self {
        Self::new(role, CompareOp::Eq, value)
    }
}

/// A typed predicate node.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Scalar comparison on a document field.
    Compare(Comparison),
    /// Inclusive range on a numeric field.
    Range { role: FieldRole, min: Value, max: Value },
    /// Case-insensitive substring match on a text field.
    ContainsText { role: FieldRole, term: String },
    /// A scalar array holds the value.
    ArrayContains { array: FieldRole, value: Value },
    /// Some element of an object array satisfies every condition.
    AnyElement {
        array: FieldRole,
        conditions: Vec<Comparison>,
    },
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare(c) => write!(f, "{} {} {}", c.role, c.op.sql(), c.value),
            Predicate::Range { role, min, max } => write!(f, "{role} in [{min}, {max}]"),
            Predicate::ContainsText { role, term } => write!(f, "{role} ~* {term:?}"),
            Predicate::ArrayContains { array, value } => write!(f, "{value} in {array}"),
            Predicate::AnyElement { array, conditions } => {
                write!(f, "any {array} (")?;
                for (i, c) in conditions.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" and ")?;
                    }
                    write!(f, "{} {} {}", c.role, c.op.sql(), c.value)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Shape of the unwind-project-sort tail of a ranked projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwindSpec {
    /// The repeated sub-entity expanded into one row per element.
    pub array: FieldRole,
    /// Element field reported as the row key.
    pub key: FieldRole,
    /// Element field sorted on, descending.
    pub sort: FieldRole,
    /// Top-level fields kept in the projection.
    pub document_fields: &'static [FieldRole],
    /// Element fields projected under [`PROJECTED_ELEMENT`].
    pub element_fields: &'static [FieldRole],
    /// Row cap.
    pub limit: usize,
}

const RANKED_DOCUMENT_FIELDS: &[FieldRole] = &[
    FieldRole::DocumentId,
    FieldRole::EntityKey,
    FieldRole::DisplayName,
];

const RANKED_ELEMENT_FIELDS: &[FieldRole] = &[
    FieldRole::AdvisorId,
    FieldRole::AdvisorName,
    FieldRole::ViewableAccounts,
    FieldRole::ViewableMarketValue,
];

impl UnwindSpec {
    /// The unwind tail of a ranked query, `None` for filtered queries.
    pub fn for_query(query: &LogicalQuery) -> Option<UnwindSpec> {
        query.is_ranked().then_some(UnwindSpec {
            array: FieldRole::Advisors,
            key: FieldRole::AdvisorId,
            sort: FieldRole::ViewableMarketValue,
            document_fields: RANKED_DOCUMENT_FIELDS,
            element_fields: RANKED_ELEMENT_FIELDS,
            limit: RANKED_LIMIT,
        })
    }
}

/// A logical query with its parameters bound.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalPlan {
    pub query: &'static LogicalQuery,
    /// Conjunctive predicates on the parent document.
    pub predicates: Vec<Predicate>,
    /// Unwind tail for ranked projections.
    pub unwind: Option<UnwindSpec>,
    /// Conditions on the unwound element, applied after the unwind.
    pub post_unwind: Vec<Comparison>,
}

impl LogicalPlan {
    /// Bind a query's parameters into its predicate plan.
    pub fn for_query(query: &'static LogicalQuery, params: &ParameterSet) -> Result<Self> {
        let name = query.id.as_str();
        let mut predicates = baseline(query.id);
        let mut post_unwind = Vec::new();

        match query.id {
            QueryId::InvestorsByAdvisor | QueryId::GroupsByAdvisor => {
                let advisor = params.require_str(name, ParamName::AdvisorId)?;
                let conditions = vec![
                    Comparison::eq(FieldRole::AdvisorId, advisor),
                    Comparison::new(
                        FieldRole::ViewableAccounts,
                        CompareOp::Gte,
                        VIEWABLE_ACCOUNTS_FLOOR,
                    ),
                ];
                predicates.push(Predicate::AnyElement {
                    array: FieldRole::Advisors,
                    conditions: conditions.clone(),
                });
                post_unwind = conditions;
            }
            QueryId::InvestorNameSearch => {
                let term = params.require_str(name, ParamName::SearchTerm)?;
                let party_role = params.require_i64(name, ParamName::PartyRoleId)?;
                predicates.push(Predicate::ContainsText {
                    role: FieldRole::DisplayName,
                    term: term.to_string(),
                });
                predicates.push(Predicate::Compare(Comparison::eq(
                    FieldRole::PartyRoleId,
                    party_role,
                )));
            }
            QueryId::InvestorEntitlements => {
                let px = params.require_i64(name, ParamName::PxPartyRoleId)?;
                let context = params.require_str(name, ParamName::AdvisoryContext)?;
                let advisor = params.require_str(name, ParamName::AdvisorId)?;
                predicates.push(Predicate::ArrayContains {
                    array: FieldRole::PxPartyRoleIds,
                    value: Value::from(px),
                });
                predicates.push(Predicate::ArrayContains {
                    array: FieldRole::AdvisoryContexts,
                    value: Value::from(context),
                });
                predicates.push(Predicate::AnyElement {
                    array: FieldRole::Advisors,
                    conditions: vec![Comparison::eq(FieldRole::AdvisorId, advisor)],
                });
            }
            QueryId::InvestorMarketValueRange => {
                predicates.push(market_value_range(name, params)?);
            }
            QueryId::GroupsByDataOwner => {
                let owner = params.require_i64(name, ParamName::DataOwnerPartyRoleId)?;
                let context = params.require_str(name, ParamName::AdvisoryContext)?;
                predicates.push(Predicate::Compare(Comparison::eq(FieldRole::DataOwner, owner)));
                predicates.push(Predicate::ArrayContains {
                    array: FieldRole::AdvisoryContexts,
                    value: Value::from(context),
                });
            }
            QueryId::AccountsByFundTicker => {
                let ticker = params.require_str(name, ParamName::FundTicker)?;
                let context = params.require_str(name, ParamName::AdvisoryContext)?;
                predicates.push(Predicate::AnyElement {
                    array: FieldRole::Holdings,
                    conditions: vec![Comparison::eq(FieldRole::FundTicker, ticker)],
                });
                predicates.push(Predicate::ArrayContains {
                    array: FieldRole::AdvisoryContexts,
                    value: Value::from(context),
                });
            }
            QueryId::AccountsByAdvisorValueRange => {
                let advisor = params.require_str(name, ParamName::AdvisorId)?;
                predicates.push(Predicate::AnyElement {
                    array: FieldRole::Advisors,
                    conditions: vec![Comparison::eq(FieldRole::AdvisorId, advisor)],
                });
                predicates.push(market_value_range(name, params)?);
            }
            QueryId::AdvisorsByHierarchyPersona => {
                let node = params.require_str(name, ParamName::PartyNodePathValue)?;
                let persona = params.require_str(name, ParamName::PersonaNm)?;
                predicates.push(Predicate::ArrayContains {
                    array: FieldRole::PartyNodePath,
                    value: Value::from(node),
                });
                predicates.push(Predicate::AnyElement {
                    array: FieldRole::Personas,
                    conditions: vec![Comparison::eq(FieldRole::PersonaName, persona)],
                });
            }
        }

        Ok(Self {
            query,
            predicates,
            unwind: UnwindSpec::for_query(query),
            post_unwind,
        })
    }

    pub fn is_ranked(&self) -> bool {
        self.unwind.is_some()
    }
}

/// Parameter-free predicates a query always applies.
///
/// The sampler uses these to find candidate documents before it knows any
/// parameter values.
pub fn baseline(query: QueryId) -> Vec<Predicate> {
    match query {
        QueryId::InvestorsByAdvisor | QueryId::InvestorMarketValueRange => {
            vec![Predicate::Compare(Comparison::eq(
                FieldRole::InvestorType,
                CLIENT_INVESTOR_TYPE,
            ))]
        }
        QueryId::GroupsByAdvisor | QueryId::GroupsByDataOwner => {
            vec![Predicate::Compare(Comparison::new(
                FieldRole::Status,
                CompareOp::Ne,
                CLOSED_STATUS,
            ))]
        }
        QueryId::InvestorNameSearch
        | QueryId::InvestorEntitlements
        | QueryId::AccountsByFundTicker
        | QueryId::AccountsByAdvisorValueRange
        | QueryId::AdvisorsByHierarchyPersona => Vec::new(),
    }
}

fn market_value_range(query: &str, params: &ParameterSet) -> Result<Predicate> {
    Ok(Predicate::Range {
        role: FieldRole::MarketValue,
        min: Value::from(params.require_f64(query, ParamName::MinMarketValue)?),
        max: Value::from(params.require_f64(query, ParamName::MaxMarketValue)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_ranked_plan_has_guard_and_post_unwind() {
        let params = ParameterSet::new().with(ParamName::AdvisorId, "ADV001");
        let plan = LogicalPlan::for_query(QueryId::InvestorsByAdvisor.definition(), &params)
            .unwrap();

        assert!(plan.is_ranked());
        assert_eq!(plan.predicates.len(), 2);
        assert!(matches!(
            &plan.predicates[1],
            Predicate::AnyElement { array: FieldRole::Advisors, conditions } if conditions.len() == 2
        ));
        assert_eq!(plan.post_unwind.len(), 2);
        assert_eq!(plan.post_unwind[1].value, Value::Int64(VIEWABLE_ACCOUNTS_FLOOR));
        assert_eq!(plan.unwind.as_ref().map(|u| u.limit), Some(50));
    }

    #[test]
    fn test_range_is_widened_to_float() {
        let params = ParameterSet::new()
            .with(ParamName::MinMarketValue, 0i64)
            .with(ParamName::MaxMarketValue, 100.0);
        let plan =
            LogicalPlan::for_query(QueryId::InvestorMarketValueRange.definition(), &params)
                .unwrap();

        assert!(!plan.is_ranked());
        assert_eq!(
            plan.predicates[1],
            Predicate::Range {
                role: FieldRole::MarketValue,
                min: Value::Float64(0.0),
                max: Value::Float64(100.0),
            }
        );
    }

    #[test]
    fn test_missing_parameter_is_reported() {
        let err = LogicalPlan::for_query(
            QueryId::AccountsByFundTicker.definition(),
            &ParameterSet::new().with(ParamName::FundTicker, "VTI"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.to_string().contains("advisoryContext"));
    }

    #[test]
    fn test_every_query_binds_its_declared_parameters() {
        let full = ParameterSet::new()
            .with(ParamName::AdvisorId, "ADV001")
            .with(ParamName::PartyRoleId, 7i64)
            .with(ParamName::SearchTerm, "smith")
            .with(ParamName::MinMarketValue, 0.0)
            .with(ParamName::MaxMarketValue, 10.0)
            .with(ParamName::AdvisoryContext, "CTX01")
            .with(ParamName::FundTicker, "VTI")
            .with(ParamName::PartyNodePathValue, "NODE-1")
            .with(ParamName::PersonaNm, "Planner")
            .with(ParamName::PxPartyRoleId, 9i64)
            .with(ParamName::DataOwnerPartyRoleId, 11i64);

        for query in LogicalQuery::all() {
            let mut params = ParameterSet::new();
            for name in query.parameters {
                if let Some(value) = full.get(*name) {
                    params.insert(*name, value.clone());
                }
            }
            let plan = LogicalPlan::for_query(query, &params).unwrap();
            assert!(!plan.predicates.is_empty(), "{} has no predicates", query.id);
        }
    }

    #[test]
    fn test_predicate_display() {
        let p = Predicate::AnyElement {
            array: FieldRole::Holdings,
            conditions: vec![Comparison::eq(FieldRole::FundTicker, "VTI")],
        };
        assert_eq!(p.to_string(), "any Holdings (FundTicker = VTI)");
    }
}
