//! Error types for loading, building and querying a bitext.

use std::path::PathBuf;

/// Errors raised by sapt-core.
///
/// Everything except [`BitextError::StaleCursor`],
/// [`BitextError::StatsMismatch`] and [`BitextError::NoDocumentMap`] is a
/// load-time failure: the bitext (or bias, or config) being constructed is
/// discarded and nothing partial is handed back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum BitextError {
    /// A file could not be read or written.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted blob could not be decoded or encoded.
    #[error("corrupt or unreadable file {}: {source}", path.display())]
    Codec {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    /// Two structures that must describe the same corpus disagree on its size.
    #[error("sentence count mismatch: {left_name} has {left} sentences, {right_name} has {right}")]
    SentenceCountMismatch {
        left_name: &'static str,
        left: usize,
        right_name: &'static str,
        right: usize,
    },

    /// A suffix array does not belong to the track it is paired with.
    #[error("index does not match its track: {0}")]
    IndexMismatch(String),

    /// A track blob is internally inconsistent.
    #[error("malformed track: {0}")]
    MalformedTrack(String),

    /// An alignment point lies outside its sentence pair, or could not be parsed.
    #[error("bad alignment in sentence {sid}: {message}")]
    Alignment { sid: usize, message: String },

    /// Sentences are limited to 65535 tokens so offsets fit in 16 bits.
    #[error("sentence {sid} has {len} tokens (limit is {})", u16::MAX)]
    SentenceTooLong { sid: usize, len: usize },

    /// The document map does not cover the corpus exactly.
    #[error("document map covers {found} sentences but the corpus has {expected}")]
    DocumentMapMismatch { expected: usize, found: usize },

    /// A line of the document map could not be parsed.
    #[error("document map line {line}: {message}")]
    DocumentMapSyntax { line: usize, message: String },

    /// A sentence bias vector does not have one entry per sentence.
    #[error("bias vector has {found} entries but the corpus has {expected} sentences")]
    BiasMismatch { expected: usize, found: usize },

    /// A sentence bias file contains something other than non-negative numbers.
    #[error("bias entry {index}: {message}")]
    BiasSyntax { index: usize, message: String },

    /// A document bias was requested from a bitext without a document map.
    #[error("document bias requested but no document map is loaded")]
    NoDocumentMap,

    /// The cursor was created on an index that is not part of the current bitext generation.
    #[error("cursor does not belong to the current bitext generation")]
    StaleCursor,

    /// Statistics were expanded against a cursor for a different phrase.
    #[error("statistics for phrase {found:#x} expanded with a cursor on phrase {expected:#x}")]
    StatsMismatch { expected: u64, found: u64 },

    /// A sampling worker thread could not be started.
    #[error("could not start sampling worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration could not be serialized.
    #[error("could not serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl BitextError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BitextError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn codec(path: impl Into<PathBuf>, source: bincode::Error) -> Self {
        BitextError::Codec {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BitextError>;
