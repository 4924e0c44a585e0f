// core/src/orientation.rs
//
// Lexicalized reordering classes for an extracted phrase pair.
//
// The orientation of a phrase pair is judged by the neighbouring target
// word: the first aligned target word after the pair (forward) or the last
// aligned target word before it (backward). From that word we grow the
// smallest block of source and target positions that is closed under the
// alignment, and compare the block's source position with the current
// source span.

use serde::{Deserialize, Serialize};

use crate::alignment::AlignmentPoint;

/// Number of orientation classes.
pub const NUM_ORIENTATIONS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhraseOrientation {
    /// Nothing aligned before the phrase on the target side.
    First,
    Mono,
    JumpFwd,
    Swap,
    JumpBwd,
    /// Nothing aligned after the phrase on the target side.
    Last,
    /// The neighbouring block is not separable from the phrase.
    Other,
}

impl PhraseOrientation {
    pub const ALL: [PhraseOrientation; NUM_ORIENTATIONS] = [
        PhraseOrientation::First,
        PhraseOrientation::Mono,
        PhraseOrientation::JumpFwd,
        PhraseOrientation::Swap,
        PhraseOrientation::JumpBwd,
        PhraseOrientation::Last,
        PhraseOrientation::Other,
    ];

    /// Position in per-class tally arrays.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Alignment of one sentence pair as adjacency lists in both directions.
///
/// "Source" and "target" here are the query side and the other side; a
/// flipped lookup simply builds the links with the pair swapped.
#[derive(Debug, Clone)]
pub(crate) struct SentenceLinks {
    pub src: Vec<Vec<u16>>,
    pub trg: Vec<Vec<u16>>,
}

impl SentenceLinks {
    pub fn new(points: &[AlignmentPoint], len1: usize, len2: usize, flip: bool) -> Self {
        let mut src = vec![Vec::new(); len1];
        let mut trg = vec![Vec::new(); len2];
        for &(a, b) in points {
            let (s, t) = if flip { (b, a) } else { (a, b) };
            src[s as usize].push(t);
            trg[t as usize].push(s);
        }
        Self { src, trg }
    }

    fn any_src_aligned(&self, from: usize, to: usize) -> bool {
        (from..to).any(|i| !self.src[i].is_empty())
    }

    /// Grow the smallest alignment-closed block around target word `seed`.
    /// Returns inclusive `(src_lo, src_hi, trg_lo, trg_hi)`.
    fn closed_block(&self, seed: usize) -> (usize, usize, usize, usize) {
        let (mut s_lo, mut s_hi) = (usize::MAX, 0usize);
        let (mut t_lo, mut t_hi) = (seed, seed);
        loop {
            let before = (s_lo, s_hi, t_lo, t_hi);
            for j in t_lo..=t_hi {
                for &i in &self.trg[j] {
                    s_lo = s_lo.min(i as usize);
                    s_hi = s_hi.max(i as usize);
                }
            }
            if s_lo <= s_hi {
                for i in s_lo..=s_hi {
                    for &j in &self.src[i] {
                        t_lo = t_lo.min(j as usize);
                        t_hi = t_hi.max(j as usize);
                    }
                }
            }
            if before == (s_lo, s_hi, t_lo, t_hi) {
                return (s_lo, s_hi, t_lo, t_hi);
            }
        }
    }

    fn classify(
        &self,
        seed: usize,
        start: usize,
        stop: usize,
        soft: (usize, usize),
        after: bool,
    ) -> PhraseOrientation {
        let (b1, e1, b2, e2) = self.closed_block(seed);
        if (b1 < stop && e1 >= start) || (b2 < soft.1 && e2 >= soft.0) {
            return PhraseOrientation::Other;
        }
        let block_right = b1 >= stop;
        let gap_clear = if block_right {
            !self.any_src_aligned(stop, b1)
        } else {
            !self.any_src_aligned(e1 + 1, start)
        };
        // A following block to the right, or a preceding block to the left,
        // continues in source order.
        match (after == block_right, gap_clear) {
            (true, true) => PhraseOrientation::Mono,
            (true, false) => PhraseOrientation::JumpFwd,
            (false, true) => PhraseOrientation::Swap,
            (false, false) => PhraseOrientation::JumpBwd,
        }
    }

    /// Orientation of the material following the phrase pair.
    pub fn forward(&self, start: usize, stop: usize, soft: (usize, usize)) -> PhraseOrientation {
        match (soft.1..self.trg.len()).find(|&j| !self.trg[j].is_empty()) {
            Some(j) => self.classify(j, start, stop, soft, true),
            None => PhraseOrientation::Last,
        }
    }

    /// Orientation of the material preceding the phrase pair.
    pub fn backward(&self, start: usize, stop: usize, soft: (usize, usize)) -> PhraseOrientation {
        match (0..soft.0).rev().find(|&j| !self.trg[j].is_empty()) {
            Some(j) => self.classify(j, start, stop, soft, false),
            None => PhraseOrientation::First,
        }
    }
}
