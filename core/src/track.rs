//! Track: an ordered collection of tokenized sentences.
//!
//! All tokens live in one flat array; `starts[i]..starts[i + 1]` is the
//! span of sentence `i`. Tracks are append-only: `push_sentence` never
//! touches existing sentences, and a loaded (static) track is simply shared
//! behind an `Arc` and never mutated again.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BitextError, Result};
use crate::persist;
use crate::vocab::TokenId;

/// Longest sentence a track accepts; offsets inside a sentence are `u16`.
pub const MAX_SENTENCE_LEN: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Sentence start offsets into `tokens`; always one longer than the
    /// number of sentences and non-decreasing.
    starts: Vec<usize>,
    tokens: Vec<TokenId>,
}

#[derive(Serialize, Deserialize)]
struct TrackFile {
    sentences: u64,
    starts: Vec<usize>,
    tokens: Vec<TokenId>,
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}

impl Track {
    pub fn new() -> Self {
        Self {
            starts: vec![0],
            tokens: Vec::new(),
        }
    }

    /// Append a sentence and return its id.
    pub fn push_sentence(&mut self, sentence: &[TokenId]) -> Result<u32> {
        let sid = self.len();
        if sentence.len() > MAX_SENTENCE_LEN {
            return Err(BitextError::SentenceTooLong {
                sid,
                len: sentence.len(),
            });
        }
        self.tokens.extend_from_slice(sentence);
        self.starts.push(self.tokens.len());
        Ok(sid as u32)
    }

    /// Number of sentences.
    pub fn len(&self) -> usize {
        self.starts.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of tokens.
    pub fn num_tokens(&self) -> usize {
        self.tokens.len()
    }

    /// Tokens of sentence `sid`.
    ///
    /// Panics if `sid` is out of range; sentence ids always come from an
    /// index or alignment built over this very track.
    pub fn sentence(&self, sid: u32) -> &[TokenId] {
        let sid = sid as usize;
        &self.tokens[self.starts[sid]..self.starts[sid + 1]]
    }

    /// Length of sentence `sid` in tokens.
    pub fn sentence_len(&self, sid: u32) -> usize {
        let sid = sid as usize;
        self.starts[sid + 1] - self.starts[sid]
    }

    /// The suffix of sentence `sid` starting at `offset`.
    pub fn suffix(&self, sid: u32, offset: u16) -> &[TokenId] {
        &self.sentence(sid)[offset as usize..]
    }

    /// Save to a `.mct` file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persist::save_blob(
            path,
            &TrackFile {
                sentences: self.len() as u64,
                starts: self.starts.clone(),
                tokens: self.tokens.clone(),
            },
        )
    }

    /// Load a `.mct` file, validating the header against the offset table.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file: TrackFile = persist::load_blob(path)?;
        if file.starts.len() != file.sentences as usize + 1 {
            return Err(BitextError::MalformedTrack(format!(
                "header says {} sentences, offset table has {} entries",
                file.sentences,
                file.starts.len()
            )));
        }
        if file.starts.first() != Some(&0)
            || file.starts.last() != Some(&file.tokens.len())
            || file.starts.windows(2).any(|w| w[0] > w[1])
        {
            return Err(BitextError::MalformedTrack(
                "offset table is not monotonic or does not span the token array".to_string(),
            ));
        }
        if let Some((sid, w)) = file
            .starts
            .windows(2)
            .enumerate()
            .find(|(_, w)| w[1] - w[0] > MAX_SENTENCE_LEN)
        {
            return Err(BitextError::SentenceTooLong {
                sid,
                len: w[1] - w[0],
            });
        }
        Ok(Self {
            starts: file.starts,
            tokens: file.tokens,
        })
    }
}
