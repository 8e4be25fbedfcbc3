//! End-to-end agreement of every target on shared data.

use std::collections::BTreeSet;

use crossq_bench::fixtures::{
    account_holdings_fixture, advisor_hierarchy_fixture, advisor_ranking_fixture,
    group_status_fixture, range_boundary_fixture,
};
use crossq_bench::Workbench;
use crossq_core::config::{BenchConfig, Scale};
use crossq_proto::{
    CanonicalResult, DatabaseTarget, ParamName, ParameterSet, QueryId, RankedRow, SchemaModel,
};

fn tiny() -> BenchConfig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    BenchConfig::new()
        .with_scale(Scale::Tiny)
        .with_warm_up_iterations(1)
        .with_measurement_iterations(2)
        .with_parameter_sets_per_query(2)
}

fn ids(items: &[&str]) -> CanonicalResult {
    CanonicalResult::IdSet(items.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>())
}

fn assert_everywhere(
    bench: &Workbench,
    query: QueryId,
    params: &ParameterSet,
    expected: &CanonicalResult,
) {
    for model in SchemaModel::ALL {
        for target in DatabaseTarget::ALL {
            let result = bench
                .run(query.definition(), model, target, params)
                .unwrap_or_else(|e| panic!("{query} {model} {target}: {e}"));
            assert_eq!(&result, expected, "{query} {model} {target}");
        }
    }
}

#[test]
fn test_generated_matrix_has_no_mismatches() {
    let mut bench = Workbench::open(tiny()).unwrap();
    let summary = bench.load_generated().unwrap();
    assert!(summary.documents > 0);
    assert!(summary.rows > 0);

    let report = bench.validate_matrix().unwrap();
    assert!(report.skipped.is_empty(), "{:?}", report.skipped);
    let mismatches: Vec<String> = report.mismatches().map(ToString::to_string).collect();
    assert!(mismatches.is_empty(), "{mismatches:#?}");
    assert!(report.passed());
    assert!(report.outcomes.len() >= QueryId::ALL.len() * SchemaModel::ALL.len());
    assert!(report.outcomes.iter().any(|o| !o.all_empty()));
}

#[test]
fn test_advisor_ranking_excludes_accountless_references() {
    let bench = Workbench::open(tiny()).unwrap();
    bench.load(&advisor_ranking_fixture()).unwrap();

    let params = ParameterSet::new().with(ParamName::AdvisorId, "ADV001");
    let expected = CanonicalResult::RankedRows(vec![RankedRow::new("ADV001", 1500.0, "INV1")]);
    assert_everywhere(&bench, QueryId::InvestorsByAdvisor, &params, &expected);
}

#[test]
fn test_unknown_advisor_is_empty_everywhere() {
    let bench = Workbench::open(tiny()).unwrap();
    bench.load(&advisor_ranking_fixture()).unwrap();

    let params = ParameterSet::new().with(ParamName::AdvisorId, "ADV999");
    assert_everywhere(
        &bench,
        QueryId::InvestorsByAdvisor,
        &params,
        &CanonicalResult::RankedRows(Vec::new()),
    );
}

#[test]
fn test_range_bounds_are_inclusive() {
    let bench = Workbench::open(tiny()).unwrap();
    bench.load(&range_boundary_fixture()).unwrap();

    let params = ParameterSet::new()
        .with(ParamName::MinMarketValue, 0.0)
        .with(ParamName::MaxMarketValue, 100.0);
    assert_everywhere(&bench, QueryId::InvestorMarketValueRange, &params, &ids(&["INV-A"]));

    let params = ParameterSet::new()
        .with(ParamName::MinMarketValue, 100.01)
        .with(ParamName::MaxMarketValue, 100.01);
    assert_everywhere(&bench, QueryId::InvestorMarketValueRange, &params, &ids(&["INV-B"]));
}

#[test]
fn test_name_search_ignores_case() {
    let bench = Workbench::open(tiny()).unwrap();
    bench.load(&advisor_ranking_fixture()).unwrap();

    let params = ParameterSet::new()
        .with(ParamName::SearchTerm, "LOVE")
        .with(ParamName::PartyRoleId, 100_001i64);
    assert_everywhere(
        &bench,
        QueryId::InvestorNameSearch,
        &params,
        &ids(&["INV1", "INV2", "INV3"]),
    );

    let params = ParameterSet::new()
        .with(ParamName::SearchTerm, "love")
        .with(ParamName::PartyRoleId, 100_002i64);
    assert_everywhere(&bench, QueryId::InvestorNameSearch, &params, &ids(&[]));
}

#[test]
fn test_entitlements_require_every_condition() {
    let bench = Workbench::open(tiny()).unwrap();
    bench.load(&advisor_ranking_fixture()).unwrap();

    let params = ParameterSet::new()
        .with(ParamName::PxPartyRoleId, 100_001i64)
        .with(ParamName::AdvisoryContext, "CTX001")
        .with(ParamName::AdvisorId, "ADV001");
    assert_everywhere(&bench, QueryId::InvestorEntitlements, &params, &ids(&["INV1", "INV2"]));

    let params = ParameterSet::new()
        .with(ParamName::PxPartyRoleId, 100_001i64)
        .with(ParamName::AdvisoryContext, "CTX002")
        .with(ParamName::AdvisorId, "ADV001");
    assert_everywhere(&bench, QueryId::InvestorEntitlements, &params, &ids(&[]));
}

#[test]
fn test_group_ranking_skips_closed_and_breaks_ties_by_id() {
    let bench = Workbench::open(tiny()).unwrap();
    bench.load(&group_status_fixture()).unwrap();

    let params = ParameterSet::new().with(ParamName::AdvisorId, "ADV001");
    let expected = CanonicalResult::RankedRows(vec![
        RankedRow::new("ADV001", 1200.0, "GRP-E"),
        RankedRow::new("ADV001", 500.0, "GRP-A"),
        RankedRow::new("ADV001", 500.0, "GRP-B"),
    ]);
    assert_everywhere(&bench, QueryId::GroupsByAdvisor, &params, &expected);

    let params = ParameterSet::new().with(ParamName::AdvisorId, "ADV002");
    let expected = CanonicalResult::RankedRows(vec![
        RankedRow::new("ADV002", 50.0, "GRP-A"),
        RankedRow::new("ADV002", 10.0, "GRP-D"),
    ]);
    assert_everywhere(&bench, QueryId::GroupsByAdvisor, &params, &expected);
}

#[test]
fn test_groups_by_data_owner_need_owner_context_and_open_status() {
    let bench = Workbench::open(tiny()).unwrap();
    bench.load(&group_status_fixture()).unwrap();

    let params = ParameterSet::new()
        .with(ParamName::DataOwnerPartyRoleId, 100_001i64)
        .with(ParamName::AdvisoryContext, "CTX001");
    assert_everywhere(&bench, QueryId::GroupsByDataOwner, &params, &ids(&["GRP-A"]));

    let params = ParameterSet::new()
        .with(ParamName::DataOwnerPartyRoleId, 100_002i64)
        .with(ParamName::AdvisoryContext, "CTX002");
    assert_everywhere(&bench, QueryId::GroupsByDataOwner, &params, &ids(&["GRP-E"]));

    let params = ParameterSet::new()
        .with(ParamName::DataOwnerPartyRoleId, 100_003i64)
        .with(ParamName::AdvisoryContext, "CTX001");
    assert_everywhere(&bench, QueryId::GroupsByDataOwner, &params, &ids(&[]));
}

#[test]
fn test_accounts_by_fund_ticker_match_any_holding_in_context() {
    let bench = Workbench::open(tiny()).unwrap();
    bench.load(&account_holdings_fixture()).unwrap();

    let params = ParameterSet::new()
        .with(ParamName::FundTicker, "VTI")
        .with(ParamName::AdvisoryContext, "CTX001");
    assert_everywhere(&bench, QueryId::AccountsByFundTicker, &params, &ids(&["ACC-1"]));

    let params = ParameterSet::new()
        .with(ParamName::FundTicker, "BND")
        .with(ParamName::AdvisoryContext, "CTX001");
    assert_everywhere(
        &bench,
        QueryId::AccountsByFundTicker,
        &params,
        &ids(&["ACC-1", "ACC-2"]),
    );

    let params = ParameterSet::new()
        .with(ParamName::FundTicker, "QQQ")
        .with(ParamName::AdvisoryContext, "CTX001");
    assert_everywhere(&bench, QueryId::AccountsByFundTicker, &params, &ids(&[]));
}

#[test]
fn test_account_value_range_includes_both_edges() {
    let bench = Workbench::open(tiny()).unwrap();
    bench.load(&account_holdings_fixture()).unwrap();

    let params = ParameterSet::new()
        .with(ParamName::AdvisorId, "ADV001")
        .with(ParamName::MinMarketValue, 100.0)
        .with(ParamName::MaxMarketValue, 250.0);
    assert_everywhere(
        &bench,
        QueryId::AccountsByAdvisorValueRange,
        &params,
        &ids(&["ACC-1", "ACC-4"]),
    );

    let params = ParameterSet::new()
        .with(ParamName::AdvisorId, "ADV001")
        .with(ParamName::MinMarketValue, 100.01)
        .with(ParamName::MaxMarketValue, 249.99);
    assert_everywhere(&bench, QueryId::AccountsByAdvisorValueRange, &params, &ids(&[]));

    let params = ParameterSet::new()
        .with(ParamName::AdvisorId, "ADV002")
        .with(ParamName::MinMarketValue, 0.0)
        .with(ParamName::MaxMarketValue, 1000.0);
    assert_everywhere(
        &bench,
        QueryId::AccountsByAdvisorValueRange,
        &params,
        &ids(&["ACC-3"]),
    );
}

#[test]
fn test_hierarchy_persona_needs_node_and_persona() {
    let bench = Workbench::open(tiny()).unwrap();
    bench.load(&advisor_hierarchy_fixture()).unwrap();

    let cases: [(&str, &str, &[&str]); 5] = [
        ("ROOT/R1/B1", "Planner", &["ADV101"]),
        ("ROOT/R1", "Planner", &["ADV101", "ADV102"]),
        ("ROOT", "Trader", &["ADV101"]),
        ("ROOT/R2", "Planner", &[]),
        ("ROOT/R1", "Analyst", &[]),
    ];
    for (node, persona, expected) in cases {
        let params = ParameterSet::new()
            .with(ParamName::PartyNodePathValue, node)
            .with(ParamName::PersonaNm, persona);
        assert_everywhere(
            &bench,
            QueryId::AdvisorsByHierarchyPersona,
            &params,
            &ids(expected),
        );
    }
}

#[test]
fn test_reload_replaces_previous_data() {
    let bench = Workbench::open(tiny()).unwrap();
    bench.load(&advisor_ranking_fixture()).unwrap();
    bench.load(&range_boundary_fixture()).unwrap();

    let params = ParameterSet::new().with(ParamName::AdvisorId, "ADV001");
    let expected = CanonicalResult::RankedRows(vec![
        RankedRow::new("ADV001", 100.01, "INV-B"),
        RankedRow::new("ADV001", 100.0, "INV-A"),
    ]);
    assert_everywhere(&bench, QueryId::InvestorsByAdvisor, &params, &expected);
}

#[test]
fn test_document_api_plans_omit_window_stage() {
    let mut bench = Workbench::open(tiny()).unwrap();
    bench.load_generated().unwrap();
    let dumps = bench.dump_plans().unwrap();
    for dump in dumps.iter().filter(|d| d.target == DatabaseTarget::DocumentApi) {
        assert!(!dump.text.contains("$setWindowFields"), "{}", dump.text);
    }
}
