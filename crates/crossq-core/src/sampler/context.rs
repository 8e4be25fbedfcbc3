//! Reference pools for fallback parameter generation.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crossq_proto::ParamValue;
use parking_lot::RwLock;
use rand::Rng;

use crate::error::{Error, Result};

/// A pool of reference values recorded during data generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferencePool {
    AdvisorId,
    PartyRoleId,
    AdvisoryContext,
    FundTicker,
    FinInstId,
    PartyNodePath,
    PersonaName,
    /// Name fragments usable as search terms.
    SearchTerm,
}

impl ReferencePool {
    pub const ALL: [ReferencePool; 8] = [
        ReferencePool::AdvisorId,
        ReferencePool::PartyRoleId,
        ReferencePool::AdvisoryContext,
        ReferencePool::FundTicker,
        ReferencePool::FinInstId,
        ReferencePool::PartyNodePath,
        ReferencePool::PersonaName,
        ReferencePool::SearchTerm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferencePool::AdvisorId => "advisorId",
            ReferencePool::PartyRoleId => "partyRoleId",
            ReferencePool::AdvisoryContext => "advisoryContext",
            ReferencePool::FundTicker => "fundTicker",
            ReferencePool::FinInstId => "finInstId",
            ReferencePool::PartyNodePath => "partyNodePath",
            ReferencePool::PersonaName => "personaNm",
            ReferencePool::SearchTerm => "searchTerm",
        }
    }
}

impl fmt::Display for ReferencePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference data shared between data generation and the sampler.
///
/// Pools are populated while the dataset is generated, then frozen. After
/// [`freeze`](Self::freeze) every write fails with [`Error::SamplerFrozen`]
/// and reads never observe a partially written pool.
#[derive(Debug, Default)]
pub struct SamplerContext {
    pools: RwLock<HashMap<ReferencePool, Vec<ParamValue>>>,
    frozen: AtomicBool,
}

impl SamplerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append values to a pool.
    pub fn extend<I, V>(&self, pool: ReferencePool, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        let mut pools = self.pools.write();
        if self.frozen.load(Ordering::Acquire) {
            return Err(Error::SamplerFrozen);
        }
        pools
            .entry(pool)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        Ok(())
    }

    /// End the population phase.
    pub fn freeze(&self) {
        let _pools = self.pools.write();
        self.frozen.store(true, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Number of values in a pool.
    pub fn len(&self, pool: ReferencePool) -> usize {
        self.pools.read().get(&pool).map_or(0, Vec::len)
    }

    /// Whether every pool is empty.
    pub fn is_empty(&self) -> bool {
        self.pools.read().values().all(Vec::is_empty)
    }

    /// Draw a value uniformly at random from a pool.
    pub fn draw<R: Rng + ?Sized>(&self, pool: ReferencePool, rng: &mut R) -> Result<ParamValue> {
        let pools = self.pools.read();
        let values = pools
            .get(&pool)
            .filter(|values| !values.is_empty())
            .ok_or(Error::EmptyPool(pool.as_str()))?;
        Ok(values[rng.gen_range(0..values.len())].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_extend_then_draw() {
        let context = SamplerContext::new();
        context
            .extend(ReferencePool::AdvisorId, ["ADV001", "ADV002"])
            .unwrap();
        context.extend(ReferencePool::PartyRoleId, [7i64]).unwrap();
        assert_eq!(context.len(ReferencePool::AdvisorId), 2);

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let drawn = context.draw(ReferencePool::AdvisorId, &mut rng).unwrap();
            assert!(matches!(drawn, ParamValue::Str(s) if s.starts_with("ADV")));
        }
        assert_eq!(
            context.draw(ReferencePool::PartyRoleId, &mut rng).unwrap(),
            ParamValue::Int(7)
        );
    }

    #[test]
    fn test_frozen_rejects_writes() {
        let context = SamplerContext::new();
        context.extend(ReferencePool::FundTicker, ["VTI"]).unwrap();
        context.freeze();
        assert!(context.is_frozen());

        let err = context
            .extend(ReferencePool::FundTicker, ["VOO"])
            .unwrap_err();
        assert!(matches!(err, Error::SamplerFrozen));
        assert!(err.is_fatal());
        assert_eq!(context.len(ReferencePool::FundTicker), 1);
    }

    #[test]
    fn test_empty_pool() {
        let context = SamplerContext::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(context.is_empty());
        assert!(matches!(
            context.draw(ReferencePool::PersonaName, &mut rng),
            Err(Error::EmptyPool("personaNm"))
        ));
    }
}
