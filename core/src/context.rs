//! Per-caller query context.
//!
//! A `QueryContext` carries what one translation request (or one client
//! session) brings to the lookup: an optional sampling bias, and caches for
//! the statistics computed under that bias. The caller owns the context and
//! decides how long those caches live.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::bias::SamplingBias;
use crate::bitext::Side;
use crate::cache::StatsCache;
use crate::Config;

#[derive(Debug)]
pub struct QueryContext {
    bias: Option<Arc<dyn SamplingBias>>,
    source: StatsCache,
    target: StatsCache,
    // Engine generation the cached statistics were computed on.
    generation: Mutex<Option<u64>>,
}

impl QueryContext {
    pub fn new(bias: Option<Arc<dyn SamplingBias>>, config: &Config) -> Self {
        Self {
            bias,
            source: StatsCache::new(config.cache_size, config.permanent_cache_threshold),
            target: StatsCache::new(config.cache_size, config.permanent_cache_threshold),
            generation: Mutex::new(None),
        }
    }

    /// Context with `bias` and default cache sizes.
    pub fn with_bias(bias: Arc<dyn SamplingBias>) -> Self {
        Self::new(Some(bias), &Config::default())
    }

    pub fn bias(&self) -> Option<&Arc<dyn SamplingBias>> {
        self.bias.as_ref()
    }

    /// Cache for `side`, emptied first if it holds statistics from another
    /// engine generation. A generation changes with every append and every
    /// change of the default sample size, and is never shared by two engines.
    pub(crate) fn cache(&self, side: Side, generation: u64) -> &StatsCache {
        let mut seen = self.generation.lock();
        if *seen != Some(generation) {
            self.source.clear();
            self.target.clear();
            *seen = Some(generation);
        }
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    pub fn clear(&self) {
        self.source.clear();
        self.target.clear();
    }
}
