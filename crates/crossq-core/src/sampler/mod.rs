//! Parameter sampling.
//!
//! The [`ParameterSampler`] derives parameter sets from live data so every
//! target returns comparable, non-empty results. For each logical query it
//! asks a [`CandidateSource`] (the reference target) for documents matching
//! the query's baseline predicates, extracts the concrete values the query
//! needs from each candidate, and caches the resulting sets. When no
//! candidate yields a set, it falls back to drawing values from the
//! reference pools of a [`SamplerContext`].

mod context;

use std::collections::HashMap;
use std::sync::Arc;

use crossq_proto::{
    DatabaseTarget, LogicalQuery, ParamName, ParamValue, ParameterSet, QueryId, SchemaModel,
    Value,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::BenchConfig;
use crate::error::Result;
use crate::query::{baseline, Predicate, VIEWABLE_ACCOUNTS_FLOOR};
use crate::resolve::{FieldRole, SchemaPathResolver};

pub use context::{ReferencePool, SamplerContext};

/// Fraction of a value used as the half-width of a derived range.
pub const RANGE_DELTA_RATIO: f64 = 0.10;

/// Smallest half-width of a derived range.
pub const MIN_RANGE_DELTA: f64 = 1_000.0;

/// Upper bound of generated ranges when no data is available.
pub const FALLBACK_RANGE_CEILING: f64 = 1_000_000.0;

/// Supplies candidate documents for data-backed sampling.
pub trait CandidateSource {
    /// Up to `limit` documents of the query's entity, stored under `model`,
    /// matching every predicate.
    fn candidates(
        &self,
        query: &'static LogicalQuery,
        model: SchemaModel,
        predicates: &[Predicate],
        limit: usize,
    ) -> Result<Vec<Value>>;
}

/// Draws parameter sets for the logical queries.
#[derive(Debug)]
pub struct ParameterSampler {
    context: Arc<SamplerContext>,
    resolver: SchemaPathResolver,
    model: SchemaModel,
    candidate_limit: usize,
    rng: StdRng,
    cache: HashMap<QueryId, Vec<ParameterSet>>,
}

impl ParameterSampler {
    /// Create a sampler reading candidates stored under the embedded model.
    pub fn new(context: Arc<SamplerContext>, seed: u64) -> Self {
        Self {
            context,
            resolver: SchemaPathResolver::new(),
            model: SchemaModel::Embedded,
            candidate_limit: crate::config::DEFAULT_CANDIDATE_LIMIT,
            rng: StdRng::seed_from_u64(seed),
            cache: HashMap::new(),
        }
    }

    /// Create a sampler with the seed and candidate limit of a configuration.
    pub fn from_config(context: Arc<SamplerContext>, config: &BenchConfig) -> Self {
        let model = config
            .schema_models
            .first()
            .copied()
            .unwrap_or(SchemaModel::Embedded);
        Self::new(context, config.seed)
            .with_model(model)
            .with_candidate_limit(config.candidate_limit)
    }

    /// Schema model candidates are read under.
    pub fn with_model(mut self, model: SchemaModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }

    pub fn context(&self) -> &SamplerContext {
        &self.context
    }

    /// Number of cached parameter sets for a query.
    pub fn cached(&self, query: QueryId) -> usize {
        self.cache.get(&query).map_or(0, Vec::len)
    }

    /// Fetch candidates for a query and cache the parameter sets they yield.
    ///
    /// Returns the number of cached sets. Recoverable source failures count
    /// as zero candidates.
    pub fn prime(
        &mut self,
        source: &dyn CandidateSource,
        query: &'static LogicalQuery,
    ) -> Result<usize> {
        let predicates = baseline(query.id);
        let candidates =
            match source.candidates(query, self.model, &predicates, self.candidate_limit) {
                Ok(docs) => docs,
                Err(e) if !e.is_fatal() => {
                    warn!(query = %query.id, error = %e, "candidate fetch failed");
                    Vec::new()
                }
                Err(e) => return Err(e),
            };

        let mut sets: Vec<ParameterSet> = Vec::new();
        for doc in &candidates {
            let reader = CandidateReader {
                query,
                model: self.model,
                resolver: self.resolver,
                doc,
            };
            for set in self.extract(&reader)? {
                if !sets.contains(&set) {
                    sets.push(set);
                }
            }
        }

        debug!(
            query = %query.id,
            candidates = candidates.len(),
            sets = sets.len(),
            "primed sampler"
        );
        if sets.is_empty() {
            warn!(query = %query.id, "no data-backed parameters, falling back to reference pools");
        }
        let count = sets.len();
        self.cache.insert(query.id, sets);
        Ok(count)
    }

    /// Draw one parameter set for a query.
    pub fn sample(
        &mut self,
        source: &dyn CandidateSource,
        query: &'static LogicalQuery,
    ) -> Result<ParameterSet> {
        if !self.cache.contains_key(&query.id) {
            self.prime(source, query)?;
        }
        let drawn = self
            .cache
            .get(&query.id)
            .and_then(|sets| sets.choose(&mut self.rng))
            .cloned();
        match drawn {
            Some(set) => Ok(set),
            None => self.generate(query),
        }
    }

    /// Draw up to `n` distinct parameter sets for a query.
    ///
    /// Falls back to `n` generated sets when no data-backed set exists.
    pub fn sample_many(
        &mut self,
        source: &dyn CandidateSource,
        query: &'static LogicalQuery,
        n: usize,
    ) -> Result<Vec<ParameterSet>> {
        if !self.cache.contains_key(&query.id) {
            self.prime(source, query)?;
        }
        let drawn: Vec<ParameterSet> = self
            .cache
            .get(&query.id)
            .map(|sets| sets.choose_multiple(&mut self.rng, n).cloned().collect())
            .unwrap_or_default();
        if !drawn.is_empty() {
            return Ok(drawn);
        }
        (0..n).map(|_| self.generate(query)).collect()
    }

    /// Generate a parameter set from the reference pools alone.
    ///
    /// Generated sets are not guaranteed to match any document.
    pub fn generate(&mut self, query: &LogicalQuery) -> Result<ParameterSet> {
        let mut params = ParameterSet::new();
        let mut range: Option<(f64, f64)> = None;
        for name in query.parameters {
            let value = match name {
                ParamName::AdvisorId => self.draw(ReferencePool::AdvisorId)?,
                ParamName::PartyRoleId
                | ParamName::PxPartyRoleId
                | ParamName::DataOwnerPartyRoleId => self.draw(ReferencePool::PartyRoleId)?,
                ParamName::SearchTerm => self.draw(ReferencePool::SearchTerm)?,
                ParamName::AdvisoryContext => self.draw(ReferencePool::AdvisoryContext)?,
                ParamName::FundTicker => self.draw(ReferencePool::FundTicker)?,
                ParamName::PartyNodePathValue => self.draw(ReferencePool::PartyNodePath)?,
                ParamName::PersonaNm => self.draw(ReferencePool::PersonaName)?,
                ParamName::MinMarketValue | ParamName::MaxMarketValue => {
                    let (min, max) = *range.get_or_insert_with(|| {
                        let min = self.rng.gen_range(0.0..FALLBACK_RANGE_CEILING / 2.0);
                        let max = self.rng.gen_range(min..FALLBACK_RANGE_CEILING);
                        (min, max)
                    });
                    let bound = if *name == ParamName::MinMarketValue {
                        min
                    } else {
                        max
                    };
                    ParamValue::Float(bound)
                }
            };
            params.insert(*name, value);
        }
        Ok(params)
    }

    fn draw(&mut self, pool: ReferencePool) -> Result<ParamValue> {
        self.context.draw(pool, &mut self.rng)
    }

    /// Parameter sets one candidate document supports.
    fn extract(&mut self, doc: &CandidateReader<'_>) -> Result<Vec<ParameterSet>> {
        let sets = match doc.query.id {
            QueryId::InvestorsByAdvisor | QueryId::GroupsByAdvisor => {
                let mut sets = Vec::new();
                for advisor in doc.elements(FieldRole::Advisors)? {
                    let viewable = doc
                        .element_field(advisor, FieldRole::ViewableAccounts)?
                        .and_then(Value::as_i64);
                    let id = doc
                        .element_field(advisor, FieldRole::AdvisorId)?
                        .and_then(Value::as_str);
                    if let (Some(id), Some(viewable)) = (id, viewable) {
                        if viewable >= VIEWABLE_ACCOUNTS_FLOOR {
                            sets.push(ParameterSet::new().with(ParamName::AdvisorId, id));
                        }
                    }
                }
                sets
            }
            QueryId::InvestorNameSearch => {
                let term = doc
                    .scalar(FieldRole::DisplayName)?
                    .and_then(Value::as_str)
                    .and_then(search_term);
                let party_role = doc.scalar(FieldRole::PartyRoleId)?.and_then(Value::as_i64);
                match (term, party_role) {
                    (Some(term), Some(id)) => vec![ParameterSet::new()
                        .with(ParamName::SearchTerm, term)
                        .with(ParamName::PartyRoleId, id)],
                    _ => vec![],
                }
            }
            QueryId::InvestorEntitlements => {
                let px = self.pick_scalar(doc, FieldRole::PxPartyRoleIds)?;
                let context = self.pick_scalar(doc, FieldRole::AdvisoryContexts)?;
                let advisor = self.pick_element(doc, FieldRole::Advisors, FieldRole::AdvisorId)?;
                match (
                    px.as_ref().and_then(Value::as_i64),
                    context.as_ref().and_then(Value::as_str),
                    advisor.as_ref().and_then(Value::as_str),
                ) {
                    (Some(px), Some(context), Some(advisor)) => vec![ParameterSet::new()
                        .with(ParamName::PxPartyRoleId, px)
                        .with(ParamName::AdvisoryContext, context)
                        .with(ParamName::AdvisorId, advisor)],
                    _ => vec![],
                }
            }
            QueryId::InvestorMarketValueRange => doc
                .scalar(FieldRole::MarketValue)?
                .and_then(Value::as_f64)
                .map(|value| {
                    let (min, max) = range_around(value);
                    vec![ParameterSet::new()
                        .with(ParamName::MinMarketValue, min)
                        .with(ParamName::MaxMarketValue, max)]
                })
                .unwrap_or_default(),
            QueryId::GroupsByDataOwner => {
                let owner = doc.scalar(FieldRole::DataOwner)?.and_then(Value::as_i64);
                let context = self.pick_scalar(doc, FieldRole::AdvisoryContexts)?;
                match (owner, context.as_ref().and_then(Value::as_str)) {
                    (Some(owner), Some(context)) => vec![ParameterSet::new()
                        .with(ParamName::DataOwnerPartyRoleId, owner)
                        .with(ParamName::AdvisoryContext, context)],
                    _ => vec![],
                }
            }
            QueryId::AccountsByFundTicker => {
                let ticker = self.pick_element(doc, FieldRole::Holdings, FieldRole::FundTicker)?;
                let context = self.pick_scalar(doc, FieldRole::AdvisoryContexts)?;
                match (
                    ticker.as_ref().and_then(Value::as_str),
                    context.as_ref().and_then(Value::as_str),
                ) {
                    (Some(ticker), Some(context)) => vec![ParameterSet::new()
                        .with(ParamName::FundTicker, ticker)
                        .with(ParamName::AdvisoryContext, context)],
                    _ => vec![],
                }
            }
            QueryId::AccountsByAdvisorValueRange => {
                let advisor = self.pick_element(doc, FieldRole::Advisors, FieldRole::AdvisorId)?;
                let value = doc.scalar(FieldRole::MarketValue)?.and_then(Value::as_f64);
                match (advisor.as_ref().and_then(Value::as_str), value) {
                    (Some(advisor), Some(value)) => {
                        let (min, max) = range_around(value);
                        vec![ParameterSet::new()
                            .with(ParamName::AdvisorId, advisor)
                            .with(ParamName::MinMarketValue, min)
                            .with(ParamName::MaxMarketValue, max)]
                    }
                    _ => vec![],
                }
            }
            QueryId::AdvisorsByHierarchyPersona => {
                let node = self.pick_scalar(doc, FieldRole::PartyNodePath)?;
                let persona =
                    self.pick_element(doc, FieldRole::Personas, FieldRole::PersonaName)?;
                match (
                    node.as_ref().and_then(Value::as_str),
                    persona.as_ref().and_then(Value::as_str),
                ) {
                    (Some(node), Some(persona)) => vec![ParameterSet::new()
                        .with(ParamName::PartyNodePathValue, node)
                        .with(ParamName::PersonaNm, persona)],
                    _ => vec![],
                }
            }
        };
        Ok(sets)
    }

    /// A random element of a scalar array.
    fn pick_scalar(&mut self, doc: &CandidateReader<'_>, array: FieldRole) -> Result<Option<Value>> {
        Ok(doc.elements(array)?.choose(&mut self.rng).cloned())
    }

    /// A field of a random element of an object array.
    fn pick_element(
        &mut self,
        doc: &CandidateReader<'_>,
        array: FieldRole,
        field: FieldRole,
    ) -> Result<Option<Value>> {
        match doc.elements(array)?.choose(&mut self.rng) {
            Some(element) => Ok(doc.element_field(element, field)?.cloned()),
            None => Ok(None),
        }
    }
}

/// Reads logical roles out of one candidate document.
struct CandidateReader<'a> {
    query: &'static LogicalQuery,
    model: SchemaModel,
    resolver: SchemaPathResolver,
    doc: &'a Value,
}

impl<'a> CandidateReader<'a> {
    fn scalar(&self, role: FieldRole) -> Result<Option<&'a Value>> {
        let path = self.resolver.resolve_path(
            self.query,
            self.model,
            DatabaseTarget::DocumentStore,
            role,
        )?;
        Ok(path.read(self.doc))
    }

    fn elements(&self, array: FieldRole) -> Result<&'a [Value]> {
        Ok(self
            .scalar(array)?
            .and_then(Value::as_array)
            .unwrap_or_default())
    }

    fn element_field<'e>(&self, element: &'e Value, role: FieldRole) -> Result<Option<&'e Value>> {
        let path = self.resolver.resolve_path(
            self.query,
            self.model,
            DatabaseTarget::DocumentStore,
            role,
        )?;
        Ok(path.read(element))
    }
}

/// Search term derived from a name: its last word, lower-cased.
///
/// Lower-casing exercises the case-insensitive match on every target.
pub fn search_term(name: &str) -> Option<String> {
    name.split_whitespace()
        .last()
        .filter(|word| word.chars().count() >= 2)
        .map(str::to_lowercase)
}

/// Inclusive range centered on a value, wide enough to contain it after
/// any driver's floating-point round trip.
pub fn range_around(value: f64) -> (f64, f64) {
    let delta = (value.abs() * RANGE_DELTA_RATIO).max(MIN_RANGE_DELTA);
    (value - delta, value + delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct FixedSource(Vec<Value>);

    impl CandidateSource for FixedSource {
        fn candidates(
            &self,
            _query: &'static LogicalQuery,
            _model: SchemaModel,
            _predicates: &[Predicate],
            limit: usize,
        ) -> Result<Vec<Value>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    struct FailingSource;

    impl CandidateSource for FailingSource {
        fn candidates(
            &self,
            _query: &'static LogicalQuery,
            _model: SchemaModel,
            _predicates: &[Predicate],
            _limit: usize,
        ) -> Result<Vec<Value>> {
            Err(Error::execution(DatabaseTarget::DocumentStore, "down"))
        }
    }

    fn investors() -> Vec<Value> {
        vec![
            Value::parse(
                r#"{"_id": "INV1", "investorId": "INV1", "investorType": "Client",
                    "investorFullName": "Ada Lovelace", "partyRoleId": 7,
                    "totalViewableAccountsMarketValue": 2500.5,
                    "advisors": [
                        {"advisorId": "ADV001", "noOfViewableAccts": 2, "viewableMarketValue": 10.0},
                        {"advisorId": "ADV002", "noOfViewableAccts": 0, "viewableMarketValue": 5.0}
                    ],
                    "entitlements": {"pxPartyRoleIdList": [7], "advisoryContext": ["CTX01"]}}"#,
            )
            .unwrap(),
            Value::parse(
                r#"{"_id": "INV2", "investorId": "INV2", "investorType": "Client",
                    "investorFullName": "Grace Hopper", "partyRoleId": 8,
                    "totalViewableAccountsMarketValue": 100.0,
                    "advisors": [{"advisorId": "ADV001", "noOfViewableAccts": 1, "viewableMarketValue": 1.0}],
                    "entitlements": {"pxPartyRoleIdList": [], "advisoryContext": []}}"#,
            )
            .unwrap(),
        ]
    }

    fn sampler() -> ParameterSampler {
        let context = SamplerContext::new();
        context
            .extend(ReferencePool::AdvisorId, ["ADV900"])
            .unwrap();
        context
            .extend(ReferencePool::AdvisoryContext, ["CTX99"])
            .unwrap();
        context.extend(ReferencePool::PartyRoleId, [42i64]).unwrap();
        context.freeze();
        ParameterSampler::new(Arc::new(context), 7)
    }

    #[test]
    fn test_ranked_sets_respect_viewable_floor() {
        let mut sampler = sampler();
        let source = FixedSource(investors());
        let query = QueryId::InvestorsByAdvisor.definition();

        assert_eq!(sampler.prime(&source, query).unwrap(), 1);
        let params = sampler.sample(&source, query).unwrap();
        assert_eq!(
            params.get(ParamName::AdvisorId),
            Some(&ParamValue::from("ADV001"))
        );
    }

    #[test]
    fn test_name_search_term_is_lowercased_word() {
        let mut sampler = sampler();
        let source = FixedSource(investors());
        let params = sampler
            .sample(&source, QueryId::InvestorNameSearch.definition())
            .unwrap();
        let term = params.get(ParamName::SearchTerm).unwrap();
        assert!(
            *term == ParamValue::from("lovelace") || *term == ParamValue::from("hopper"),
            "unexpected term {term}"
        );
        assert!(params.contains(ParamName::PartyRoleId));
    }

    #[test]
    fn test_derived_range_contains_value() {
        let mut sampler = sampler();
        let source = FixedSource(investors());
        let sets = sampler
            .sample_many(&source, QueryId::InvestorMarketValueRange.definition(), 5)
            .unwrap();
        assert_eq!(sets.len(), 2);
        for set in sets {
            let min = set.require_f64("q", ParamName::MinMarketValue).unwrap();
            let max = set.require_f64("q", ParamName::MaxMarketValue).unwrap();
            assert!(min <= 100.0 && 100.0 <= max || min <= 2500.5 && 2500.5 <= max);
        }
    }

    #[test]
    fn test_candidates_missing_arrays_are_skipped() {
        let mut sampler = sampler();
        let source = FixedSource(investors());
        // INV2 has empty entitlement arrays.
        assert_eq!(
            sampler
                .prime(&source, QueryId::InvestorEntitlements.definition())
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_fallback_uses_reference_pools() {
        let mut sampler = sampler();
        let params = sampler
            .sample(&FailingSource, QueryId::InvestorEntitlements.definition())
            .unwrap();
        assert_eq!(params.get(ParamName::AdvisorId), Some(&ParamValue::from("ADV900")));
        assert_eq!(params.get(ParamName::PxPartyRoleId), Some(&ParamValue::Int(42)));
        assert_eq!(sampler.cached(QueryId::InvestorEntitlements), 0);
    }

    #[test]
    fn test_fallback_range_is_ordered() {
        let mut sampler = sampler();
        let params = sampler
            .generate(QueryId::InvestorMarketValueRange.definition())
            .unwrap();
        let min = params.require_f64("q", ParamName::MinMarketValue).unwrap();
        let max = params.require_f64("q", ParamName::MaxMarketValue).unwrap();
        assert!(min <= max);
    }

    #[test]
    fn test_fallback_with_empty_pool_fails() {
        let mut sampler = sampler();
        let err = sampler
            .generate(QueryId::AccountsByFundTicker.definition())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyPool("fundTicker")));
    }

    #[test]
    fn test_same_seed_same_draws() {
        let source = FixedSource(investors());
        let query = QueryId::InvestorEntitlements.definition();
        let a = sampler().sample_many(&source, query, 3).unwrap();
        let b = sampler().sample_many(&source, query, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_search_term_and_range_helpers() {
        assert_eq!(search_term("Ada  Lovelace"), Some("lovelace".to_string()));
        assert_eq!(search_term("X"), None);
        assert_eq!(search_term(""), None);
        let (min, max) = range_around(100.0);
        assert_eq!((min, max), (-900.0, 1100.0));
        let (min, max) = range_around(50_000.0);
        assert_eq!((min, max), (45_000.0, 55_000.0));
    }
}
