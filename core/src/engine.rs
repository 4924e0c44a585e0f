// core/src/engine.rs
//
// Decoder-facing phrase table engine.
//
// The engine owns the current bitext generation, the statistics caches
// and the sampling agenda. Callers descend a cursor themselves, then ask
// for statistics (`lookup` blocks, `prep` prefetches) and expand them into
// ranked phrase pairs.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::agenda::{Agenda, SampleRequest};
use crate::bitext::{Bitext, Side};
use crate::cache::StatsCache;
use crate::context::QueryContext;
use crate::error::{BitextError, Result};
use crate::phrase_pair::{expand_stats, PhrasePair};
use crate::pstats::PhraseStats;
use crate::suffix_array::Cursor;
use crate::Config;

static NEXT_GENERATION_ID: AtomicU64 = AtomicU64::new(0);

/// A bitext generation together with the caches valid for it.
#[derive(Debug)]
struct Generation {
    // Unique across all engines in the process; query contexts key their
    // caches on it.
    id: u64,
    bitext: Arc<Bitext>,
    default_sample_size: usize,
    source: StatsCache,
    target: StatsCache,
}

impl Generation {
    fn new(bitext: Arc<Bitext>, default_sample_size: usize, config: &Config) -> Self {
        Self {
            id: NEXT_GENERATION_ID.fetch_add(1, Ordering::Relaxed),
            bitext,
            default_sample_size,
            source: StatsCache::new(config.cache_size, config.permanent_cache_threshold),
            target: StatsCache::new(config.cache_size, config.permanent_cache_threshold),
        }
    }

    fn cache(&self, side: Side) -> &StatsCache {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }
}

/// On-the-fly phrase table over a sampled bitext.
pub struct Engine {
    config: Config,
    generation: RwLock<Arc<Generation>>,
    // Serializes appends and default-size changes.
    append: Mutex<()>,
    agenda: Agenda,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
}

impl Engine {
    /// Create an engine over `bitext` and start the worker pool.
    pub fn new(bitext: Bitext, config: Config) -> Result<Self> {
        let agenda = Agenda::new(config.workers)?;
        let generation = Generation::new(Arc::new(bitext), config.default_sample_size, &config);
        info!(
            sentences = generation.bitext.num_sentences(),
            sample_size = config.default_sample_size,
            method = ?config.sampling_method,
            "phrase table engine ready"
        );
        Ok(Self {
            config,
            generation: RwLock::new(Arc::new(generation)),
            append: Mutex::new(()),
            agenda,
            cache_hits: AtomicUsize::new(0),
            cache_misses: AtomicUsize::new(0),
        })
    }

    /// Open a bitext from disk (see [`Bitext::open`]) and wrap it.
    pub fn open<P: AsRef<std::path::Path>>(
        prefix: P,
        l1: &str,
        l2: &str,
        config: Config,
    ) -> Result<Self> {
        Self::new(Bitext::open(prefix, l1, l2)?, config)
    }

    fn current(&self) -> Arc<Generation> {
        self.generation.read().clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current bitext generation.
    pub fn bitext(&self) -> Arc<Bitext> {
        self.current().bitext.clone()
    }

    /// Root cursor on the current generation.
    pub fn cursor(&self, side: Side) -> Cursor {
        self.current().bitext.cursor(side)
    }

    /// Cursor for a whitespace-tokenized phrase on the current generation.
    pub fn find(&self, side: Side, text: &str) -> Option<Cursor> {
        self.current().bitext.find(side, text)
    }

    pub fn default_sample_size(&self) -> usize {
        self.current().default_sample_size
    }

    /// Change the default sample size. Cached statistics were sampled with
    /// the old size, so the engine caches are replaced.
    pub fn set_default_sample_size(&self, size: usize) {
        let _guard = self.append.lock();
        let current = self.current();
        if current.default_sample_size == size {
            return;
        }
        let next = Generation::new(current.bitext.clone(), size, &self.config);
        *self.generation.write() = Arc::new(next);
        info!(size, "default sample size changed, caches replaced");
    }

    /// Statistics handle for `cursor`, from a cache or a (possibly shared)
    /// sampling job. Does not wait for sampling to finish.
    fn stats_handle(
        &self,
        ctx: Option<&QueryContext>,
        cursor: &Cursor,
        cap: Option<usize>,
    ) -> Result<Arc<PhraseStats>> {
        let generation = self.current();
        let bitext = &generation.bitext;
        let side = bitext.side_of(cursor).ok_or(BitextError::StaleCursor)?;
        let cap = cap.unwrap_or(generation.default_sample_size);
        let pid = cursor.phrase_id();
        let count = cursor.occurrence_count();
        let bias = ctx.and_then(|c| c.bias().cloned());

        let cacheable = count > self.config.cache_threshold && cap == generation.default_sample_size;
        let cache = match ctx {
            _ if !cacheable => None,
            Some(c) if c.bias().is_some() => Some(c.cache(side, generation.id)),
            _ => Some(generation.cache(side)),
        };

        if let Some(cache) = cache {
            if let Some(stats) = cache.get(pid) {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(pid, "statistics cache hit");
                return Ok(stats);
            }
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }

        let stats = self.agenda.submit(SampleRequest {
            bitext: bitext.clone(),
            cursor: cursor.clone(),
            side,
            cap,
            method: self.config.sampling_method,
            bias,
            seed: self.config.seed,
        });
        if let Some(cache) = cache {
            if let Some((evicted, _)) = cache.insert(pid, stats.clone()) {
                debug!(pid, evicted, "statistics cache eviction");
            }
        }
        Ok(stats)
    }

    /// Statistics for the phrase under `cursor`, sampled with `cap`
    /// occurrences (default sample size if `None`). Blocks until ready.
    pub fn lookup(
        &self,
        ctx: Option<&QueryContext>,
        cursor: &Cursor,
        cap: Option<usize>,
    ) -> Result<Arc<PhraseStats>> {
        let stats = self.stats_handle(ctx, cursor, cap)?;
        stats.wait();
        Ok(stats)
    }

    /// Start sampling the phrase under `cursor` without waiting.
    pub fn prep(&self, ctx: Option<&QueryContext>, cursor: &Cursor) -> Result<()> {
        self.stats_handle(ctx, cursor, None).map(|_| ())
    }

    /// Expand statistics obtained for `cursor` into pruned phrase pairs,
    /// highest joint count first. Waits for the statistics if needed.
    pub fn expand(&self, cursor: &Cursor, stats: &PhraseStats) -> Result<Vec<PhrasePair>> {
        let Some(source) = cursor.first_span() else {
            return Ok(Vec::new());
        };
        if stats.pid() != source.pid() {
            return Err(BitextError::StatsMismatch {
                expected: source.pid(),
                found: stats.pid(),
            });
        }
        let data = stats.data();
        Ok(expand_stats(
            stats.side(),
            source,
            &data,
            self.config.prune_ratio,
        ))
    }

    /// Append sentence pairs `(source, target, alignment)` and switch to the
    /// resulting generation. Returns the new revision.
    ///
    /// Lookups running concurrently finish on the old generation; cursors
    /// created before the switch are rejected afterwards.
    pub fn add_sentences<S: AsRef<str>>(&self, pairs: &[(S, S, S)]) -> Result<u64> {
        let _guard = self.append.lock();
        let current = self.current();
        let bitext = Arc::new(current.bitext.add(pairs)?);
        let revision = bitext.revision();
        let next = Generation::new(bitext, current.default_sample_size, &self.config);
        *self.generation.write() = Arc::new(next);
        info!(revision, added = pairs.len(), "switched to new bitext generation");
        Ok(revision)
    }

    /// Current bitext revision.
    pub fn revision(&self) -> u64 {
        self.current().bitext.revision()
    }

    pub fn agenda(&self) -> &Agenda {
        &self.agenda
    }

    /// Get cache statistics for monitoring.
    ///
    /// Returns (hits, misses) tuple.
    pub fn cache_stats(&self) -> (usize, usize) {
        (
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
        )
    }

    /// Get cache hit rate as a percentage (0.0 to 100.0).
    ///
    /// Returns None if no cache accesses have been made yet.
    pub fn cache_hit_rate(&self) -> Option<f32> {
        let (hits, misses) = self.cache_stats();
        let total = hits + misses;
        if total == 0 {
            None
        } else {
            Some((hits as f32 / total as f32) * 100.0)
        }
    }

    /// Entries in the engine caches of the current generation.
    pub fn cache_size(&self, side: Side) -> usize {
        self.current().cache(side).len()
    }

    /// Capacity of each engine cache.
    pub fn cache_capacity(&self) -> usize {
        self.current().source.capacity()
    }

    /// Clear the engine caches and reset the counters.
    pub fn clear_cache(&self) {
        let current = self.current();
        current.source.clear();
        current.target.clear();
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bias::SentenceBias;
    use crate::bitext::BitextBuilder;

    fn engine(n: usize, config: Config) -> Engine {
        let mut b = BitextBuilder::new();
        for _ in 0..n {
            b.add_pair("das haus ist klein", "the house is small", "0-0 1-1 2-2 3-3")
                .unwrap();
        }
        Engine::new(b.build().unwrap(), config).unwrap()
    }

    #[test]
    fn lookup_and_expand() {
        let e = engine(3, Config::default());
        let c = e.find(Side::Source, "das haus").unwrap();
        let stats = e.lookup(None, &c, None).unwrap();
        assert!(stats.is_ready());
        assert_eq!(stats.raw_cnt(), 3);
        assert_eq!(stats.good(), 3);
        let pairs = e.expand(&c, &stats).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].target_text(&e.bitext()), "the house");
        assert_eq!(pairs[0].joint, 3);
        assert_eq!(pairs[0].aln, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn rare_phrases_are_not_cached() {
        let e = engine(3, Config::default());
        let c = e.find(Side::Source, "haus").unwrap();
        e.lookup(None, &c, None).unwrap();
        assert_eq!(e.cache_size(Side::Source), 0);
        assert_eq!(e.cache_stats(), (0, 0));
        assert_eq!(e.cache_hit_rate(), None);
    }

    #[test]
    fn frequent_phrases_hit_the_cache() {
        let config = Config {
            cache_threshold: 2,
            ..Config::default()
        };
        let e = engine(5, config);
        let c = e.find(Side::Target, "house").unwrap();
        let a = e.lookup(None, &c, None).unwrap();
        let b = e.lookup(None, &c, None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(e.cache_stats(), (1, 1));
        assert_eq!(e.cache_size(Side::Target), 1);
        // a non-default cap bypasses the cache
        e.lookup(None, &c, Some(2)).unwrap();
        assert_eq!(e.cache_stats(), (1, 1));

        e.set_default_sample_size(10);
        assert_eq!(e.cache_size(Side::Target), 0);
    }

    fn biased_context(e: &Engine) -> QueryContext {
        let n = e.bitext().num_sentences();
        let bias = Arc::new(SentenceBias::new(vec![1.0; n], n).unwrap());
        QueryContext::new(Some(bias), e.config())
    }

    #[test]
    fn context_cache_follows_default_sample_size() {
        let config = Config {
            default_sample_size: 10,
            cache_threshold: 2,
            ..Config::default()
        };
        let e = engine(40, config);
        let ctx = biased_context(&e);
        let c = e.find(Side::Source, "haus").unwrap();
        let first = e.lookup(Some(&ctx), &c, None).unwrap();
        assert_eq!(first.sample_cnt(), 10);
        assert!(Arc::ptr_eq(&first, &e.lookup(Some(&ctx), &c, None).unwrap()));

        e.set_default_sample_size(20);
        let second = e.lookup(Some(&ctx), &c, None).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.sample_cnt(), 20);
    }

    #[test]
    fn context_shared_by_two_engines_keeps_them_apart() {
        let config = Config {
            cache_threshold: 2,
            ..Config::default()
        };
        let one = engine(40, config.clone());
        let two = engine(40, config);
        assert_eq!(one.revision(), two.revision());
        let ctx = biased_context(&one);

        let c1 = one.find(Side::Source, "haus").unwrap();
        let c2 = two.find(Side::Source, "haus").unwrap();
        let s1 = one.lookup(Some(&ctx), &c1, None).unwrap();
        let s2 = two.lookup(Some(&ctx), &c2, None).unwrap();
        assert!(!Arc::ptr_eq(&s1, &s2));
        assert_eq!(two.cache_stats(), (0, 1));
    }

    #[test]
    fn expand_rejects_foreign_stats() {
        let e = engine(2, Config::default());
        let c = e.find(Side::Source, "das").unwrap();
        let d = e.find(Side::Source, "klein").unwrap();
        let stats = e.lookup(None, &c, None).unwrap();
        assert!(matches!(
            e.expand(&d, &stats),
            Err(BitextError::StatsMismatch { .. })
        ));
    }
}
