//! Logical query plans.

mod logical;

pub use logical::{
    baseline, CompareOp, Comparison, LogicalPlan, Predicate, UnwindSpec, CLIENT_INVESTOR_TYPE,
    CLOSED_STATUS, PROJECTED_ELEMENT, VIEWABLE_ACCOUNTS_FLOOR,
};
