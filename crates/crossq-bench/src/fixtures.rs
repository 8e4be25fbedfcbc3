//! Synthetic financial-advisory data.
//!
//! Generation is seeded from the configuration so every run (and every
//! target inside a run) sees the same documents. Documents are built in the
//! embedded model; [`Dataset::documents_for`] rewrites them for the
//! normalized model on demand.

use std::collections::BTreeMap;

use crossq_core::catalog::{EntityDef, DOCUMENT_ID};
use crossq_core::config::BenchConfig;
use crossq_core::sampler::search_term;
use crossq_core::{ReferencePool, SamplerContext};
use crossq_proto::{Entity, SchemaModel, Value};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::Result;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Grace", "Edsger", "Barbara", "Donald", "Frances", "John", "Katherine",
    "Margaret", "Niklaus", "Radia", "Tim", "Sophie", "Ken", "Leslie",
];

const LAST_NAMES: &[&str] = &[
    "Lovelace", "Turing", "Hopper", "Dijkstra", "Liskov", "Knuth", "Allen", "Backus", "Johnson",
    "Hamilton", "Wirth", "Perlman", "Berners", "Wilson", "Thompson", "Lamport", "Ritchie",
    "Kernighan", "Hoare", "Milner",
];

const FUND_TICKERS: &[&str] = &[
    "VTI", "VXUS", "BND", "VOO", "QQQ", "AGG", "IWM", "EFA", "SCHD", "VIG", "TLT", "GLD",
];

const PERSONA_NAMES: &[&str] = &["Planner", "Trader", "Analyst", "Manager", "Assistant"];

const GROUP_STATUSES: &[&str] = &["Open", "Open", "Open", "Pending", "Closed"];

const ACCOUNT_STATUSES: &[&str] = &["Active", "Active", "Active", "Dormant", "Closed"];
const ACCOUNT_KINDS: &[&str] = &["IRA", "Brokerage", "Trust", "529"];

const REGIONS: usize = 3;
const BRANCHES_PER_REGION: usize = 3;

/// Generated documents per entity, in the embedded model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    documents: BTreeMap<Entity, Vec<Value>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity: Entity, doc: Value) {
        self.documents.entry(entity).or_default().push(doc);
    }

    /// Embedded-model documents of an entity.
    pub fn documents(&self, entity: Entity) -> &[Value] {
        self.documents.get(&entity).map_or(&[], Vec::as_slice)
    }

    /// Documents of an entity as stored under a schema model.
    pub fn documents_for(&self, entity: Entity, model: SchemaModel) -> Vec<Value> {
        let docs = self.documents(entity);
        match model {
            SchemaModel::Embedded => docs.to_vec(),
            SchemaModel::Normalized => {
                let def = EntityDef::of(entity);
                docs.iter().map(|d| def.to_normalized(d)).collect()
            }
        }
    }

    /// Total documents over all entities.
    pub fn len(&self) -> usize {
        self.documents.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn money(cents: i64) -> Value {
    Value::Float64(cents as f64 / 100.0)
}

fn pick<'a, T>(rng: &mut StdRng, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

fn pick_some<T: Clone>(rng: &mut StdRng, items: &[T], max: usize) -> Vec<T> {
    let n = rng.gen_range(1..=max.min(items.len()).max(1));
    items.choose_multiple(rng, n).cloned().collect()
}

#[derive(Debug, Clone)]
struct AdvisorSeed {
    id: String,
    name: String,
}

/// Seeded generator for a full dataset.
pub struct DatasetGenerator<'a> {
    config: &'a BenchConfig,
    rng: StdRng,
    advisors: Vec<AdvisorSeed>,
    contexts: Vec<String>,
    party_roles: Vec<i64>,
    fin_insts: Vec<i64>,
    nodes: Vec<String>,
}

impl<'a> DatasetGenerator<'a> {
    pub fn new(config: &'a BenchConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let advisors = (1..=config.scale.advisors())
            .map(|i| AdvisorSeed {
                id: format!("ADV{i:04}"),
                name: format!("{} {}", pick(&mut rng, FIRST_NAMES), pick(&mut rng, LAST_NAMES)),
            })
            .collect();
        let mut nodes = vec!["ROOT".to_string()];
        for r in 1..=REGIONS {
            nodes.push(format!("ROOT/R{r}"));
            for b in 1..=BRANCHES_PER_REGION {
                nodes.push(format!("ROOT/R{r}/B{b}"));
            }
        }
        Self {
            config,
            rng,
            advisors,
            contexts: (1..=config.advisory_context_pool_size)
                .map(|i| format!("CTX{i:03}"))
                .collect(),
            party_roles: (1..=config.party_role_id_pool_size as i64)
                .map(|i| 100_000 + i)
                .collect(),
            fin_insts: (1..=config.fin_inst_id_pool_size as i64).collect(),
            nodes,
        }
    }

    /// Generate every entity and populate the reference pools of `context`.
    pub fn generate(mut self, context: &SamplerContext) -> Result<Dataset> {
        let scale = self.config.scale;
        let mut dataset = Dataset::new();

        for i in 0..scale.advisors() {
            let doc = self.advisor(i);
            dataset.push(Entity::Advisor, doc);
        }
        for i in 1..=scale.investors() {
            let doc = self.investor(i);
            dataset.push(Entity::BookRoleInvestor, doc);
        }
        for i in 1..=scale.groups() {
            let doc = self.group(i);
            dataset.push(Entity::BookRoleGroup, doc);
        }
        for i in 1..=scale.accounts() {
            let doc = self.account(i);
            dataset.push(Entity::Account, doc);
        }

        context.extend(
            ReferencePool::AdvisorId,
            self.advisors.iter().map(|a| a.id.clone()),
        )?;
        context.extend(ReferencePool::AdvisoryContext, self.contexts.clone())?;
        context.extend(ReferencePool::PartyRoleId, self.party_roles.clone())?;
        context.extend(ReferencePool::FinInstId, self.fin_insts.clone())?;
        context.extend(ReferencePool::FundTicker, FUND_TICKERS.iter().copied())?;
        context.extend(ReferencePool::PartyNodePath, self.nodes.clone())?;
        context.extend(ReferencePool::PersonaName, PERSONA_NAMES.iter().copied())?;
        context.extend(
            ReferencePool::SearchTerm,
            LAST_NAMES.iter().filter_map(|n| search_term(n)),
        )?;

        info!(
            documents = dataset.len(),
            scale = ?scale,
            seed = self.config.seed,
            "generated dataset"
        );
        Ok(dataset)
    }

    fn person(&mut self) -> String {
        format!(
            "{} {}",
            pick(&mut self.rng, FIRST_NAMES),
            pick(&mut self.rng, LAST_NAMES)
        )
    }

    /// Advisor references with their summed viewable market value, in cents.
    fn advisor_refs(&mut self, max: usize) -> (Vec<Value>, i64) {
        let chosen = pick_some(&mut self.rng, &self.advisors, max);
        let mut total = 0;
        let refs = chosen
            .into_iter()
            .map(|a| {
                let cents = self.rng.gen_range(0..25_000_000);
                total += cents;
                advisor_ref(&a.id, &a.name, self.rng.gen_range(0..=5), cents)
            })
            .collect();
        (refs, total)
    }

    fn contexts(&mut self) -> Value {
        let picked = pick_some(&mut self.rng, &self.contexts, 3);
        Value::Array(picked.into_iter().map(Value::from).collect())
    }

    fn entitlements(&mut self) -> Value {
        let roles = pick_some(&mut self.rng, &self.party_roles, 3);
        Value::object([
            (
                "pxPartyRoleIdList",
                Value::Array(roles.into_iter().map(Value::from).collect()),
            ),
            ("advisoryContext", self.contexts()),
        ])
    }

    fn advisor(&mut self, index: usize) -> Value {
        let seed = self.advisors[index].clone();
        let region = self.rng.gen_range(1..=REGIONS);
        let branch = self.rng.gen_range(1..=BRANCHES_PER_REGION);
        let personas = pick_some(&mut self.rng, PERSONA_NAMES, 2)
            .into_iter()
            .map(|name| {
                let role = *pick(&mut self.rng, &self.party_roles);
                Value::object([
                    ("personaNm", Value::from(name)),
                    ("pxPartyRoleId", Value::from(role)),
                ])
            })
            .collect();
        Value::object([
            (DOCUMENT_ID, Value::from(seed.id.as_str())),
            ("advisorId", Value::from(seed.id.as_str())),
            ("advisorName", Value::from(seed.name)),
            ("bookMarketValue", money(self.rng.gen_range(0..500_000_000))),
            (
                "partyNodePath",
                Value::Array(vec![
                    Value::from("ROOT"),
                    Value::from(format!("ROOT/R{region}")),
                    Value::from(format!("ROOT/R{region}/B{branch}")),
                ]),
            ),
            ("personas", Value::Array(personas)),
        ])
    }

    fn investor(&mut self, index: usize) -> Value {
        let id = format!("INV{index:06}");
        let investor_type = if self.rng.gen_bool(0.8) {
            "Client"
        } else {
            "Prospect"
        };
        let name = self.person();
        let party_role = *pick(&mut self.rng, &self.party_roles);
        let (advisors, total) = self.advisor_refs(3);
        let entitlements = self.entitlements();
        investor(&id, investor_type, &name, party_role, total, advisors, entitlements)
    }

    fn group(&mut self, index: usize) -> Value {
        let id = format!("GRP{index:05}");
        let name = format!("{} Family Group", pick(&mut self.rng, LAST_NAMES));
        let status = *pick(&mut self.rng, GROUP_STATUSES);
        let owner = *pick(&mut self.rng, &self.party_roles);
        let (advisors, total) = self.advisor_refs(3);
        Value::object([
            (DOCUMENT_ID, Value::from(id.as_str())),
            ("groupId", Value::from(id.as_str())),
            ("groupName", Value::from(name)),
            ("status", Value::from(status)),
            ("dataOwnerPartyRoleId", Value::from(owner)),
            ("totalViewableAccountsMarketValue", money(total)),
            ("advisors", Value::Array(advisors)),
            ("entitlements", self.entitlements()),
        ])
    }

    fn account(&mut self, index: usize) -> Value {
        let id = format!("ACC{index:06}");
        let name = format!("{} {}", self.person(), pick(&mut self.rng, ACCOUNT_KINDS));
        let status = *pick(&mut self.rng, ACCOUNT_STATUSES);
        let fin_inst = *pick(&mut self.rng, &self.fin_insts);
        let (advisors, _) = self.advisor_refs(2);
        let mut market_value = 0;
        let holdings = pick_some(&mut self.rng, FUND_TICKERS, 4)
            .into_iter()
            .map(|ticker| {
                let cents = self.rng.gen_range(1_000..10_000_000);
                market_value += cents;
                Value::object([
                    ("fundTicker", Value::from(ticker)),
                    ("quantity", Value::from(self.rng.gen_range(1..1_000i64))),
                    ("marketValue", money(cents)),
                ])
            })
            .collect();
        let contexts = self.contexts();
        Value::object([
            (DOCUMENT_ID, Value::from(id.as_str())),
            ("accountId", Value::from(id.as_str())),
            ("accountName", Value::from(name)),
            ("status", Value::from(status)),
            ("finInstId", Value::from(fin_inst)),
            ("marketValue", money(market_value)),
            ("advisors", Value::Array(advisors)),
            ("holdings", Value::Array(holdings)),
            (
                "entitlements",
                Value::object([("advisoryContext", contexts)]),
            ),
        ])
    }
}

/// Generate the configured dataset and populate the reference pools.
pub fn generate(config: &BenchConfig, context: &SamplerContext) -> Result<Dataset> {
    DatasetGenerator::new(config).generate(context)
}

fn advisor_ref(id: &str, name: &str, viewable_accounts: i64, cents: i64) -> Value {
    Value::object([
        ("advisorId", Value::from(id)),
        ("advisorName", Value::from(name)),
        ("noOfViewableAccts", Value::from(viewable_accounts)),
        ("viewableMarketValue", money(cents)),
    ])
}

fn investor(
    id: &str,
    investor_type: &str,
    name: &str,
    party_role: i64,
    total_cents: i64,
    advisors: Vec<Value>,
    entitlements: Value,
) -> Value {
    Value::object([
        (DOCUMENT_ID, Value::from(id)),
        ("investorId", Value::from(id)),
        ("investorType", Value::from(investor_type)),
        ("investorFullName", Value::from(name)),
        ("partyRoleId", Value::from(party_role)),
        ("totalViewableAccountsMarketValue", money(total_cents)),
        ("advisors", Value::Array(advisors)),
        ("entitlements", entitlements),
    ])
}

fn group(
    id: &str,
    status: &str,
    owner: i64,
    advisors: Vec<(&str, i64, i64)>,
    context: &str,
) -> Value {
    let total: i64 = advisors.iter().map(|(_, _, cents)| cents).sum();
    let advisors = advisors
        .into_iter()
        .map(|(advisor, accounts, cents)| advisor_ref(advisor, "Grace Hopper", accounts, cents))
        .collect();
    Value::object([
        (DOCUMENT_ID, Value::from(id)),
        ("groupId", Value::from(id)),
        ("groupName", Value::from("Lovelace Family Group")),
        ("status", Value::from(status)),
        ("dataOwnerPartyRoleId", Value::from(owner)),
        ("totalViewableAccountsMarketValue", money(total)),
        ("advisors", Value::Array(advisors)),
        ("entitlements", entitlements(100_001, context)),
    ])
}

fn account(id: &str, advisor: &str, holdings: &[(&str, i64)], context: &str) -> Value {
    let market_value: i64 = holdings.iter().map(|(_, cents)| cents).sum();
    let holdings = holdings
        .iter()
        .map(|(ticker, cents)| {
            Value::object([
                ("fundTicker", Value::from(*ticker)),
                ("quantity", Value::from(10i64)),
                ("marketValue", money(*cents)),
            ])
        })
        .collect();
    Value::object([
        (DOCUMENT_ID, Value::from(id)),
        ("accountId", Value::from(id)),
        ("accountName", Value::from("Ada Lovelace IRA")),
        ("status", Value::from("Active")),
        ("finInstId", Value::from(1i64)),
        ("marketValue", money(market_value)),
        (
            "advisors",
            Value::Array(vec![advisor_ref(advisor, "Grace Hopper", 1, market_value)]),
        ),
        ("holdings", Value::Array(holdings)),
        (
            "entitlements",
            Value::object([("advisoryContext", Value::Array(vec![Value::from(context)]))]),
        ),
    ])
}

fn advisor(id: &str, path: &[&str], personas: &[&str]) -> Value {
    Value::object([
        (DOCUMENT_ID, Value::from(id)),
        ("advisorId", Value::from(id)),
        ("advisorName", Value::from("Grace Hopper")),
        ("bookMarketValue", money(1_000_000)),
        (
            "partyNodePath",
            Value::Array(path.iter().map(|node| Value::from(*node)).collect()),
        ),
        (
            "personas",
            Value::Array(
                personas
                    .iter()
                    .map(|name| {
                        Value::object([
                            ("personaNm", Value::from(*name)),
                            ("pxPartyRoleId", Value::from(100_001i64)),
                        ])
                    })
                    .collect(),
            ),
        ),
    ])
}

fn entitlements(px_party_role: i64, context: &str) -> Value {
    Value::object([
        ("pxPartyRoleIdList", Value::Array(vec![Value::from(px_party_role)])),
        ("advisoryContext", Value::Array(vec![Value::from(context)])),
    ])
}

fn fixture_entitlements() -> Value {
    entitlements(100_001, "CTX001")
}

/// Three client investors: `INV1` and `INV2` reference `ADV001` with 2 and 0
/// viewable accounts, `INV3` references only `ADV002`.
pub fn advisor_ranking_fixture() -> Dataset {
    let mut dataset = Dataset::new();
    let rows = [
        ("INV1", "ADV001", 2, 150_000),
        ("INV2", "ADV001", 0, 90_000),
        ("INV3", "ADV002", 3, 70_000),
    ];
    for (id, advisor, accounts, cents) in rows {
        dataset.push(
            Entity::BookRoleInvestor,
            investor(
                id,
                "Client",
                "Ada Lovelace",
                100_001,
                cents,
                vec![advisor_ref(advisor, "Grace Hopper", accounts, cents)],
                fixture_entitlements(),
            ),
        );
    }
    dataset
}

/// Two client investors whose totals sit on either side of 100.00.
pub fn range_boundary_fixture() -> Dataset {
    let mut dataset = Dataset::new();
    for (id, cents) in [("INV-A", 10_000), ("INV-B", 10_001)] {
        dataset.push(
            Entity::BookRoleInvestor,
            investor(
                id,
                "Client",
                "Alan Turing",
                100_002,
                cents,
                vec![advisor_ref("ADV001", "Grace Hopper", 1, cents)],
                fixture_entitlements(),
            ),
        );
    }
    dataset
}

/// Five groups referencing `ADV001`:
///
/// | group   | status  | owner  | context | ADV001 accounts / value |
/// |---------|---------|--------|---------|-------------------------|
/// | GRP-A   | Open    | 100001 | CTX001  | 2 / 500.00              |
/// | GRP-B   | Pending | 100001 | CTX002  | 1 / 500.00              |
/// | GRP-C   | Closed  | 100001 | CTX001  | 3 / 900.00              |
/// | GRP-D   | Open    | 100002 | CTX001  | 0 / 700.00              |
/// | GRP-E   | Open    | 100002 | CTX002  | 1 / 1200.00             |
///
/// `GRP-A` and `GRP-D` also reference `ADV002`.
pub fn group_status_fixture() -> Dataset {
    let mut dataset = Dataset::new();
    let groups = [
        group(
            "GRP-A",
            "Open",
            100_001,
            vec![("ADV001", 2, 50_000), ("ADV002", 1, 5_000)],
            "CTX001",
        ),
        group("GRP-B", "Pending", 100_001, vec![("ADV001", 1, 50_000)], "CTX002"),
        group("GRP-C", "Closed", 100_001, vec![("ADV001", 3, 90_000)], "CTX001"),
        group(
            "GRP-D",
            "Open",
            100_002,
            vec![("ADV001", 0, 70_000), ("ADV002", 1, 1_000)],
            "CTX001",
        ),
        group("GRP-E", "Open", 100_002, vec![("ADV001", 1, 120_000)], "CTX002"),
    ];
    for doc in groups {
        dataset.push(Entity::BookRoleGroup, doc);
    }
    dataset
}

/// Four accounts; market value is the sum of the holdings.
///
/// `ACC-1` holds VTI and BND worth 250.00 in total, `ACC-2` only BND at
/// 300.00, `ACC-3` VTI under `CTX002` with advisor `ADV002`, and `ACC-4`
/// VXUS at exactly 100.00.
pub fn account_holdings_fixture() -> Dataset {
    let mut dataset = Dataset::new();
    let accounts = [
        account("ACC-1", "ADV001", &[("VTI", 15_000), ("BND", 10_000)], "CTX001"),
        account("ACC-2", "ADV001", &[("BND", 30_000)], "CTX001"),
        account("ACC-3", "ADV002", &[("VTI", 9_999)], "CTX002"),
        account("ACC-4", "ADV001", &[("VXUS", 10_000)], "CTX001"),
    ];
    for doc in accounts {
        dataset.push(Entity::Account, doc);
    }
    dataset
}

/// Three advisors: `ADV101` (R1/B1, Planner and Trader), `ADV102` (R1/B2,
/// Planner) and `ADV103` (R2/B1, Analyst).
pub fn advisor_hierarchy_fixture() -> Dataset {
    let mut dataset = Dataset::new();
    let advisors = [
        advisor("ADV101", &["ROOT", "ROOT/R1", "ROOT/R1/B1"], &["Planner", "Trader"]),
        advisor("ADV102", &["ROOT", "ROOT/R1", "ROOT/R1/B2"], &["Planner"]),
        advisor("ADV103", &["ROOT", "ROOT/R2", "ROOT/R2/B1"], &["Analyst"]),
    ];
    for doc in advisors {
        dataset.push(Entity::Advisor, doc);
    }
    dataset
}
