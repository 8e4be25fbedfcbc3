//! The nine logical queries.
//!
//! A logical query is a target-independent intent: which entity it reads, the
//! shape of its result, and the parameters it needs. Translation into native
//! plans happens in `crossq-core`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::params::ParamName;

/// Maximum rows returned by a ranked projection.
pub const RANKED_LIMIT: usize = 50;

/// Conceptual entity a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Entity {
    /// Advisor-to-investor relationship document.
    BookRoleInvestor,
    /// Investor-group relationship document.
    BookRoleGroup,
    /// Account document.
    Account,
    /// Advisor document.
    Advisor,
}

impl Entity {
    /// Every entity.
    pub const ALL: [Entity; 4] = [
        Entity::BookRoleInvestor,
        Entity::BookRoleGroup,
        Entity::Account,
        Entity::Advisor,
    ];

    /// Discriminator value stored in the `type` field of the normalized model.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Entity::BookRoleInvestor => "BookRoleInvestor",
            Entity::BookRoleGroup => "BookRoleGroup",
            Entity::Account => "Account",
            Entity::Advisor => "Advisor",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// Result shape of a logical query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// Filter, unwind a repeated sub-entity, post-filter, project, sort by a
    /// numeric field descending, limit.
    RankedProjection,
    /// Filter returning whole matching documents in no guaranteed order.
    FilteredDocument,
}

/// Identifier of one of the nine logical queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryId {
    InvestorsByAdvisor,
    GroupsByAdvisor,
    InvestorNameSearch,
    InvestorEntitlements,
    InvestorMarketValueRange,
    GroupsByDataOwner,
    AccountsByFundTicker,
    AccountsByAdvisorValueRange,
    AdvisorsByHierarchyPersona,
}

impl QueryId {
    /// Every query, in catalogue order.
    pub const ALL: [QueryId; 9] = [
        QueryId::InvestorsByAdvisor,
        QueryId::GroupsByAdvisor,
        QueryId::InvestorNameSearch,
        QueryId::InvestorEntitlements,
        QueryId::InvestorMarketValueRange,
        QueryId::GroupsByDataOwner,
        QueryId::AccountsByFundTicker,
        QueryId::AccountsByAdvisorValueRange,
        QueryId::AdvisorsByHierarchyPersona,
    ];

    /// Stable kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryId::InvestorsByAdvisor => "investors-by-advisor",
            QueryId::GroupsByAdvisor => "groups-by-advisor",
            QueryId::InvestorNameSearch => "investor-name-search",
            QueryId::InvestorEntitlements => "investor-entitlements",
            QueryId::InvestorMarketValueRange => "investor-market-value-range",
            QueryId::GroupsByDataOwner => "groups-by-data-owner",
            QueryId::AccountsByFundTicker => "accounts-by-fund-ticker",
            QueryId::AccountsByAdvisorValueRange => "accounts-by-advisor-value-range",
            QueryId::AdvisorsByHierarchyPersona => "advisors-by-hierarchy-persona",
        }
    }

    /// The full definition of this query.
    pub fn definition(&self) -> &'static LogicalQuery {
        &CATALOGUE[*self as usize]
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| Error::UnknownQuery(s.to_string()))
    }
}

/// An immutable logical query definition.
#[derive(Debug, PartialEq, Eq)]
pub struct LogicalQuery {
    pub id: QueryId,
    pub description: &'static str,
    pub entity: Entity,
    pub shape: Shape,
    /// Parameters the query reads, in the order they are documented.
    pub parameters: &'static [ParamName],
}

impl LogicalQuery {
    /// All nine logical queries.
    pub fn all() -> &'static [LogicalQuery] {
        &CATALOGUE
    }

    /// Whether this query returns ranked rows.
    pub fn is_ranked(&self) -> bool {
        self.shape == Shape::RankedProjection
    }
}

// Indexed by `QueryId as usize`; keep in declaration order.
static CATALOGUE: [LogicalQuery; 9] = [
    LogicalQuery {
        id: QueryId::InvestorsByAdvisor,
        description: "Client investors serviced by an advisor with at least one viewable account, \
                      ranked by the advisor's viewable market value",
        entity: Entity::BookRoleInvestor,
        shape: Shape::RankedProjection,
        parameters: &[ParamName::AdvisorId],
    },
    LogicalQuery {
        id: QueryId::GroupsByAdvisor,
        description: "Open investor groups serviced by an advisor with at least one viewable \
                      account, ranked by the advisor's viewable market value",
        entity: Entity::BookRoleGroup,
        shape: Shape::RankedProjection,
        parameters: &[ParamName::AdvisorId],
    },
    LogicalQuery {
        id: QueryId::InvestorNameSearch,
        description: "Investors whose full name contains a search term (case-insensitive) \
                      with an exact party role id",
        entity: Entity::BookRoleInvestor,
        shape: Shape::FilteredDocument,
        parameters: &[ParamName::SearchTerm, ParamName::PartyRoleId],
    },
    LogicalQuery {
        id: QueryId::InvestorEntitlements,
        description: "Investors entitled to a party role and advisory context and serviced \
                      by an advisor",
        entity: Entity::BookRoleInvestor,
        shape: Shape::FilteredDocument,
        parameters: &[
            ParamName::PxPartyRoleId,
            ParamName::AdvisoryContext,
            ParamName::AdvisorId,
        ],
    },
    LogicalQuery {
        id: QueryId::InvestorMarketValueRange,
        description: "Client investors with total viewable market value in an inclusive range",
        entity: Entity::BookRoleInvestor,
        shape: Shape::FilteredDocument,
        parameters: &[ParamName::MinMarketValue, ParamName::MaxMarketValue],
    },
    LogicalQuery {
        id: QueryId::GroupsByDataOwner,
        description: "Open investor groups owned by a party role and entitled to an advisory \
                      context",
        entity: Entity::BookRoleGroup,
        shape: Shape::FilteredDocument,
        parameters: &[ParamName::DataOwnerPartyRoleId, ParamName::AdvisoryContext],
    },
    LogicalQuery {
        id: QueryId::AccountsByFundTicker,
        description: "Accounts holding a fund ticker and entitled to an advisory context",
        entity: Entity::Account,
        shape: Shape::FilteredDocument,
        parameters: &[ParamName::FundTicker, ParamName::AdvisoryContext],
    },
    LogicalQuery {
        id: QueryId::AccountsByAdvisorValueRange,
        description: "Accounts serviced by an advisor with market value in an inclusive range",
        entity: Entity::Account,
        shape: Shape::FilteredDocument,
        parameters: &[
            ParamName::AdvisorId,
            ParamName::MinMarketValue,
            ParamName::MaxMarketValue,
        ],
    },
    LogicalQuery {
        id: QueryId::AdvisorsByHierarchyPersona,
        description: "Advisors under a hierarchy node acting with a persona",
        entity: Entity::Advisor,
        shape: Shape::FilteredDocument,
        parameters: &[ParamName::PartyNodePathValue, ParamName::PersonaNm],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_is_indexed_by_id() {
        for id in QueryId::ALL {
            assert_eq!(id.definition().id, id);
        }
        assert_eq!(LogicalQuery::all().len(), 9);
    }

    #[test]
    fn test_query_id_parse() {
        for id in QueryId::ALL {
            assert_eq!(id.as_str().parse::<QueryId>().unwrap(), id);
        }
        assert!("no-such-query".parse::<QueryId>().is_err());
    }

    #[test]
    fn test_shapes_cover_all_entities() {
        let ranked = LogicalQuery::all().iter().filter(|q| q.is_ranked()).count();
        assert_eq!(ranked, 2);
        for entity in Entity::ALL {
            assert!(LogicalQuery::all().iter().any(|q| q.entity == entity));
        }
    }

    #[test]
    fn test_serde_name_matches_as_str() {
        let json = serde_json::to_string(&QueryId::AccountsByAdvisorValueRange).unwrap();
        assert_eq!(json, "\"accounts-by-advisor-value-range\"");
    }
}
