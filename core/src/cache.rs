//! Statistics cache: a bounded LRU of phrase statistics keyed by phrase id,
//! with an unbounded permanent tier for very frequent phrases.

use ahash::AHashMap;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::pstats::PhraseStats;

#[derive(Debug)]
pub struct StatsCache {
    lru: Mutex<LruCache<u64, Arc<PhraseStats>>>,
    permanent: RwLock<AHashMap<u64, Arc<PhraseStats>>>,
    permanent_threshold: usize,
}

impl StatsCache {
    /// Cache holding up to `capacity` entries in the LRU tier. Entries whose
    /// raw occurrence count reaches `permanent_threshold` are never evicted.
    pub fn new(capacity: usize, permanent_threshold: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            lru: Mutex::new(LruCache::new(cap)),
            permanent: RwLock::new(AHashMap::new()),
            permanent_threshold,
        }
    }

    /// Look up `pid`, refreshing its recency.
    pub fn get(&self, pid: u64) -> Option<Arc<PhraseStats>> {
        if let Some(stats) = self.permanent.read().get(&pid) {
            return Some(stats.clone());
        }
        self.lru.lock().get(&pid).cloned()
    }

    /// Look up `pid` without touching recency.
    pub fn contains(&self, pid: u64) -> bool {
        self.permanent.read().contains_key(&pid) || self.lru.lock().contains(&pid)
    }

    /// Insert statistics, returning the entry evicted to make room, if any.
    pub fn insert(&self, pid: u64, stats: Arc<PhraseStats>) -> Option<(u64, Arc<PhraseStats>)> {
        if stats.raw_cnt() >= self.permanent_threshold {
            self.permanent.write().insert(pid, stats);
            return None;
        }
        match self.lru.lock().push(pid, stats) {
            // `push` returns the old value when the key was already present
            Some((k, _)) if k == pid => None,
            evicted => evicted,
        }
    }

    /// Number of cached entries in both tiers.
    pub fn len(&self) -> usize {
        self.lru.lock().len() + self.permanent.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity of the LRU tier.
    pub fn capacity(&self) -> usize {
        self.lru.lock().cap().get()
    }

    pub fn clear(&self) {
        self.lru.lock().clear();
        self.permanent.write().clear();
    }
}
