//! Suffix array over a [`Track`] and the cursor used to descend it.
//!
//! The array holds one [`TokenPosition`] per corpus token, sorted by the
//! token suffix starting there. Suffixes stop at the end of their sentence,
//! so a suffix that is a prefix of another sorts first. Identical suffixes
//! are ordered by position, which makes the array (and therefore phrase
//! ids) fully deterministic.
//!
//! A [`Cursor`] behaves like a node in a virtual trie of all phrases: it
//! keeps one `[lower, upper)` range per matched token, and each extension
//! binary-searches only inside the previous range.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use crate::error::{BitextError, Result};
use crate::persist;
use crate::track::Track;
use crate::vocab::TokenId;

/// Start position of a suffix: sentence id and token offset in the sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenPosition {
    pub sid: u32,
    pub offset: u16,
}

impl TokenPosition {
    pub fn new(sid: u32, offset: u16) -> Self {
        Self { sid, offset }
    }
}

/// A phrase occurrence: sentence, start offset and length.
///
/// A span doubles as a phrase id (see [`Span::pid`]): the span of the
/// first suffix-array entry of a phrase identifies the phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub sid: u32,
    pub offset: u16,
    pub len: u16,
}

impl Span {
    pub fn pid(&self) -> u64 {
        (u64::from(self.sid) << 32) | (u64::from(self.offset) << 16) | u64::from(self.len)
    }

    pub fn from_pid(pid: u64) -> Self {
        Self {
            sid: (pid >> 32) as u32,
            offset: ((pid >> 16) & 0xffff) as u16,
            len: (pid & 0xffff) as u16,
        }
    }

    /// Tokens of this span in `track`.
    pub fn tokens<'a>(&self, track: &'a Track) -> &'a [TokenId] {
        let start = self.offset as usize;
        &track.sentence(self.sid)[start..start + self.len as usize]
    }
}

#[derive(Debug)]
pub struct SuffixArray {
    track: Arc<Track>,
    entries: Vec<TokenPosition>,
}

#[derive(Serialize, Deserialize)]
struct SuffixArrayFile {
    sentences: u64,
    tokens: u64,
    entries: Vec<TokenPosition>,
}

fn compare_suffixes(track: &Track, a: &TokenPosition, b: &TokenPosition) -> Ordering {
    track
        .suffix(a.sid, a.offset)
        .cmp(track.suffix(b.sid, b.offset))
        .then_with(|| a.cmp(b))
}

fn positions(track: &Track, first_sid: usize) -> Vec<TokenPosition> {
    let mut out = Vec::new();
    for sid in first_sid..track.len() {
        let sid = sid as u32;
        for offset in 0..track.sentence_len(sid) {
            out.push(TokenPosition::new(sid, offset as u16));
        }
    }
    out
}

impl SuffixArray {
    /// Index every token of `track`.
    pub fn build(track: Arc<Track>) -> Self {
        let mut entries = positions(&track, 0);
        entries.sort_unstable_by(|a, b| compare_suffixes(&track, a, b));
        Self { track, entries }
    }

    /// Build the index for a grown track by merging the positions of the
    /// appended sentences into this (older) array. `track` must extend the
    /// track this array was built over.
    pub fn extended(&self, track: Arc<Track>) -> Result<Self> {
        let old = self.track.len();
        if track.len() < old || track.num_tokens() < self.track.num_tokens() {
            return Err(BitextError::IndexMismatch(format!(
                "cannot extend an index over {} sentences to a track of {}",
                old,
                track.len()
            )));
        }
        let mut fresh = positions(&track, old);
        fresh.sort_unstable_by(|a, b| compare_suffixes(&track, a, b));

        let mut entries = Vec::with_capacity(self.entries.len() + fresh.len());
        let (mut i, mut j) = (0, 0);
        while i < self.entries.len() && j < fresh.len() {
            if compare_suffixes(&track, &self.entries[i], &fresh[j]) == Ordering::Greater {
                entries.push(fresh[j]);
                j += 1;
            } else {
                entries.push(self.entries[i]);
                i += 1;
            }
        }
        entries.extend_from_slice(&self.entries[i..]);
        entries.extend_from_slice(&fresh[j..]);
        Ok(Self { track, entries })
    }

    /// The track this array indexes.
    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    /// Number of entries (= number of corpus tokens).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TokenPosition] {
        &self.entries
    }

    /// Token `depth` positions into the suffix starting at `p`, or `None`
    /// past the sentence end.
    fn token_at(&self, p: &TokenPosition, depth: usize) -> Option<TokenId> {
        self.track.suffix(p.sid, p.offset).get(depth).copied()
    }

    /// Sub-range of `[lo, hi)` whose suffixes have `token` at `depth`.
    /// All suffixes in `[lo, hi)` must share their first `depth` tokens.
    fn child_range(&self, lo: usize, hi: usize, depth: usize, token: TokenId) -> (usize, usize) {
        let slice = &self.entries[lo..hi];
        let start = slice.partition_point(|p| self.token_at(p, depth) < Some(token));
        let end = slice.partition_point(|p| self.token_at(p, depth) <= Some(token));
        (lo + start, lo + end)
    }

    /// Save to a `.sfa` file, recording the size of the paired track.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persist::save_blob(
            path,
            &SuffixArrayFile {
                sentences: self.track.len() as u64,
                tokens: self.track.num_tokens() as u64,
                entries: self.entries.clone(),
            },
        )
    }

    /// Load a `.sfa` file and pair it with `track`.
    ///
    /// Fails if the file was built over a track of a different size,
    /// contains positions outside `track`, or is not strictly sorted (which
    /// also rules out duplicate entries).
    pub fn load<P: AsRef<Path>>(path: P, track: Arc<Track>) -> Result<Self> {
        let file: SuffixArrayFile = persist::load_blob(path)?;
        if file.sentences as usize != track.len() || file.tokens as usize != track.num_tokens() {
            return Err(BitextError::IndexMismatch(format!(
                "index built over {} sentences / {} tokens, track has {} / {}",
                file.sentences,
                file.tokens,
                track.len(),
                track.num_tokens()
            )));
        }
        if file.entries.len() != track.num_tokens() {
            return Err(BitextError::IndexMismatch(format!(
                "index has {} entries for {} tokens",
                file.entries.len(),
                track.num_tokens()
            )));
        }
        if let Some(p) = file.entries.iter().find(|p| {
            p.sid as usize >= track.len() || p.offset as usize >= track.sentence_len(p.sid)
        }) {
            return Err(BitextError::IndexMismatch(format!(
                "entry {}:{} lies outside the track",
                p.sid, p.offset
            )));
        }
        if let Some(w) = file
            .entries
            .windows(2)
            .find(|w| compare_suffixes(&track, &w[0], &w[1]) != Ordering::Less)
        {
            return Err(BitextError::IndexMismatch(format!(
                "entries {}:{} and {}:{} are out of order",
                w[0].sid, w[0].offset, w[1].sid, w[1].offset
            )));
        }
        Ok(Self {
            track,
            entries: file.entries,
        })
    }
}

/// A partially matched phrase and its suffix-array range.
///
/// The cursor owns an `Arc` to its index, so it can be cloned and sent to
/// worker threads freely. Depth 0 (the root) covers the whole array.
#[derive(Debug, Clone)]
pub struct Cursor {
    index: Arc<SuffixArray>,
    lower: Vec<usize>,
    upper: Vec<usize>,
}

impl Cursor {
    /// Root cursor over `index`.
    pub fn new(index: Arc<SuffixArray>) -> Self {
        Self {
            index,
            lower: Vec::new(),
            upper: Vec::new(),
        }
    }

    /// Cursor matching exactly `tokens`, or `None` if the phrase does not occur.
    pub fn for_phrase(index: Arc<SuffixArray>, tokens: &[TokenId]) -> Option<Self> {
        let mut c = Self::new(index);
        for &t in tokens {
            if !c.extend(t) {
                return None;
            }
        }
        Some(c)
    }

    pub fn index(&self) -> &Arc<SuffixArray> {
        &self.index
    }

    /// Length of the matched phrase.
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    /// True at the root.
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Current `[lower, upper)` range of entries.
    pub fn range(&self) -> (usize, usize) {
        match (self.lower.last(), self.upper.last()) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            _ => (0, self.index.len()),
        }
    }

    fn parent_range(&self) -> (usize, usize) {
        let n = self.lower.len();
        if n >= 2 {
            (self.lower[n - 2], self.upper[n - 2])
        } else {
            (0, self.index.len())
        }
    }

    /// Narrow to suffixes whose next token is `token`. Leaves the cursor
    /// unchanged and returns false if there are none.
    pub fn extend(&mut self, token: TokenId) -> bool {
        let (lo, hi) = self.range();
        let (start, end) = self.index.child_range(lo, hi, self.len(), token);
        if start == end {
            return false;
        }
        self.lower.push(start);
        self.upper.push(end);
        true
    }

    /// Move to the first (smallest) one-token extension.
    pub fn down(&mut self) -> bool {
        let (lo, hi) = self.range();
        let depth = self.len();
        let entries = &self.index.entries[lo..hi];
        let first = lo + entries.partition_point(|p| self.index.token_at(p, depth).is_none());
        if first == hi {
            return false;
        }
        let Some(token) = self.index.token_at(&self.index.entries[first], depth) else {
            return false;
        };
        let (start, end) = self.index.child_range(first, hi, depth, token);
        self.lower.push(start);
        self.upper.push(end);
        true
    }

    /// Move to the next sibling: same prefix, next larger last token.
    pub fn over(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        let (_, parent_hi) = self.parent_range();
        let (_, hi) = self.range();
        if hi >= parent_hi {
            return false;
        }
        let depth = self.len() - 1;
        let Some(token) = self.index.token_at(&self.index.entries[hi], depth) else {
            return false;
        };
        let (start, end) = self.index.child_range(hi, parent_hi, depth, token);
        if let (Some(l), Some(u)) = (self.lower.last_mut(), self.upper.last_mut()) {
            *l = start;
            *u = end;
        }
        true
    }

    /// Drop the last matched token.
    pub fn up(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.lower.pop();
        self.upper.pop();
        true
    }

    /// Exact number of occurrences of the matched phrase.
    pub fn occurrence_count(&self) -> usize {
        let (lo, hi) = self.range();
        hi - lo
    }

    /// Number of distinct sentences containing the phrase.
    pub fn sentence_count(&self) -> usize {
        let mut sids: Vec<u32> = self.occurrences().map(|p| p.sid).collect();
        sids.sort_unstable();
        sids.dedup();
        sids.len()
    }

    /// Lazily enumerate the occurrences in suffix-array order.
    pub fn occurrences(&self) -> impl Iterator<Item = TokenPosition> + '_ {
        let (lo, hi) = self.range();
        self.index.entries[lo..hi].iter().copied()
    }

    /// Span of the first occurrence, if the cursor is below the root.
    pub fn first_span(&self) -> Option<Span> {
        let &lo = self.lower.last()?;
        let p = self.index.entries[lo];
        Some(Span {
            sid: p.sid,
            offset: p.offset,
            len: self.len() as u16,
        })
    }

    /// The matched tokens (empty at the root).
    pub fn tokens(&self) -> &[TokenId] {
        match self.first_span() {
            Some(span) => span.tokens(&self.index.track),
            None => &[],
        }
    }

    /// Phrase id of the matched phrase; 0 at the root.
    pub fn phrase_id(&self) -> u64 {
        self.first_span().map(|s| s.pid()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // a b a b c / b a / c
    fn index() -> Arc<SuffixArray> {
        let mut t = Track::new();
        t.push_sentence(&[2, 3, 2, 3, 4]).unwrap();
        t.push_sentence(&[3, 2]).unwrap();
        t.push_sentence(&[4]).unwrap();
        Arc::new(SuffixArray::build(Arc::new(t)))
    }

    #[test]
    fn entries_are_sorted() {
        let sa = index();
        assert_eq!(sa.len(), 8);
        for w in sa.entries().windows(2) {
            assert_ne!(
                compare_suffixes(sa.track(), &w[0], &w[1]),
                Ordering::Greater
            );
        }
    }

    #[test]
    fn extend_counts_occurrences() {
        let sa = index();
        let mut c = Cursor::new(sa.clone());
        assert_eq!(c.occurrence_count(), 8);
        assert!(c.extend(2));
        assert_eq!(c.occurrence_count(), 3);
        assert!(c.extend(3));
        assert_eq!(c.occurrence_count(), 2);
        assert!(!c.extend(2));
        assert_eq!(c.len(), 2);
        assert!(c.extend(4));
        assert_eq!(c.occurrence_count(), 1);
        assert_eq!(c.tokens(), &[2, 3, 4]);
        assert_eq!(c.sentence_count(), 1);
    }

    #[test]
    fn phrase_does_not_cross_sentence_boundary() {
        // "c b" would span sentences 0 and 1 in the flat token array.
        assert!(Cursor::for_phrase(index(), &[4, 3]).is_none());
        // "b a" occurs in sentence 0 and sentence 1.
        let c = Cursor::for_phrase(index(), &[3, 2]).unwrap();
        assert_eq!(c.occurrence_count(), 2);
        assert_eq!(c.sentence_count(), 2);
    }

    #[test]
    fn phrase_id_roundtrips_through_span() {
        let c = Cursor::for_phrase(index(), &[3, 2]).unwrap();
        let span = Span::from_pid(c.phrase_id());
        assert_eq!(span.len, 2);
        assert_eq!(span.tokens(c.index().track()), &[3, 2]);
        // the same phrase found twice has the same id
        let d = Cursor::for_phrase(index(), &[3, 2]).unwrap();
        assert_eq!(c.phrase_id(), d.phrase_id());
    }

    #[test]
    fn trie_navigation() {
        let mut c = Cursor::new(index());
        assert!(c.down());
        assert_eq!(c.tokens(), &[2]);
        assert!(c.over());
        assert_eq!(c.tokens(), &[3]);
        assert!(c.over());
        assert_eq!(c.tokens(), &[4]);
        assert!(!c.over());
        assert!(c.up());
        assert!(c.is_empty());
        assert!(!c.up());

        let mut c = Cursor::for_phrase(index(), &[3]).unwrap();
        assert!(c.down());
        assert_eq!(c.tokens(), &[3, 2]);
        assert!(c.over());
        assert_eq!(c.tokens(), &[3, 4]);
        assert!(!c.over());
    }

    #[test]
    fn empty_corpus_root() {
        let sa = Arc::new(SuffixArray::build(Arc::new(Track::new())));
        let mut c = Cursor::new(sa);
        assert_eq!(c.occurrence_count(), 0);
        assert!(!c.extend(2));
        assert!(!c.down());
        assert_eq!(c.phrase_id(), 0);
    }

    #[test]
    fn extended_index_equals_rebuilt_index() {
        let sa = index();
        let mut grown = (**sa.track()).clone();
        grown.push_sentence(&[2, 3, 5]).unwrap();
        grown.push_sentence(&[3]).unwrap();
        let grown = Arc::new(grown);
        let merged = sa.extended(grown.clone()).unwrap();
        let rebuilt = SuffixArray::build(grown);
        assert_eq!(merged.entries(), rebuilt.entries());
    }

    #[test]
    fn save_and_load_checks_pairing() {
        let tmp = std::env::temp_dir().join("sapt_suffix_array_test.sfa");
        let sa = index();
        sa.save(&tmp).unwrap();
        let loaded = SuffixArray::load(&tmp, sa.track().clone()).unwrap();
        assert_eq!(loaded.entries(), sa.entries());

        let mut other = Track::new();
        other.push_sentence(&[2]).unwrap();
        assert!(matches!(
            SuffixArray::load(&tmp, Arc::new(other)),
            Err(BitextError::IndexMismatch(_))
        ));
        let _ = std::fs::remove_file(tmp);
    }
}
