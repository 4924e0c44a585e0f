//! sapt-core
//!
//! Suffix-array phrase table: phrase-pair statistics computed on the fly
//! from a word-aligned parallel corpus, instead of a precomputed table.
//!
//! The corpus is indexed once with a suffix array per language. At query
//! time a source phrase is located by descending a cursor, a bounded
//! sample of its occurrences is projected through the word alignment, and
//! the resulting counts are cached and shared between concurrent callers.
//!
//! Public API:
//! - `Bitext` / `BitextBuilder` - Aligned corpus with both suffix arrays
//! - `Cursor` - Incremental phrase match over a suffix array
//! - `Engine` - Lookup, prefetch and expansion with caching and a worker pool
//! - `PhraseStats` - Shared, possibly still in-progress, sampling result
//! - `PhrasePair` - Ranked candidate translation with its statistics
//! - `QueryContext` - Per-caller bias and caches
//! - `Config` - Sampling, caching and pruning settings
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{BitextError, Result};

mod persist;

pub mod vocab;
pub use vocab::{TokenId, Vocabulary, NULL_ID, UNK_ID};

pub mod track;
pub use track::Track;

pub mod alignment;
pub use alignment::{parse_alignment_line, AlignmentPoint, AlignmentTrack};

pub mod suffix_array;
pub use suffix_array::{Cursor, Span, SuffixArray, TokenPosition};

pub mod orientation;
pub use orientation::PhraseOrientation;

pub mod docmap;
pub use docmap::DocumentMap;

pub mod bitext;
pub use bitext::{Bitext, BitextBuilder, PhraseBounds, Side};

pub mod bias;
pub use bias::{DocumentBias, SamplingBias, SentenceBias};

pub mod pstats;
pub use pstats::{JointStats, PhraseStats, StatsData};

pub mod sampler;
pub use sampler::SamplingMethod;

pub mod agenda;
pub use agenda::Agenda;

pub mod cache;
pub use cache::StatsCache;

pub mod context;
pub use context::QueryContext;

pub mod phrase_pair;
pub use phrase_pair::{
    rank_phrase_pairs, PhrasePair, PhrasePairComparator, SortDescendingByBiasWeight,
    SortDescendingByJointCount, SortDescendingByProbability,
};

pub mod engine;
pub use engine::Engine;

/// Engine configuration.
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Occurrences sampled per phrase unless the caller asks otherwise.
    pub default_sample_size: usize,

    /// Sampling worker threads (clamped to 1..=24).
    pub workers: usize,

    // Cache Management
    /// Maximum number of entries in each LRU statistics cache
    pub cache_size: usize,
    /// Phrases with at most this many occurrences are never cached
    /// (resampling them is cheap).
    pub cache_threshold: usize,
    /// Phrases with at least this many occurrences stay cached for good.
    pub permanent_cache_threshold: usize,

    /// How occurrences are selected: "exhaustive", "random" or "ranked".
    pub sampling_method: SamplingMethod,

    /// Drop pairs whose marginal counts exceed `joint * prune_ratio`.
    /// 0 disables pruning.
    pub prune_ratio: usize,

    /// Base seed for the per-job random generators.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_sample_size: 1000,
            workers: 8,
            cache_size: 10000,
            cache_threshold: 50,
            permanent_cache_threshold: 100_000,
            sampling_method: SamplingMethod::Random,
            prune_ratio: 128,
            seed: 0,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| BitextError::io(path, e))?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| BitextError::io(path, e))
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Utility helpers.
pub mod utils {
    /// Normalize input strings (NFC) and trim whitespace.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_string()
    }
}
