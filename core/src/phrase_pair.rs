// core/src/phrase_pair.rs
//
// Phrase pairs expanded from sampled statistics, and their ranking.

use std::cmp::Ordering;

use crate::alignment::AlignmentPoint;
use crate::bitext::{Bitext, Side};
use crate::orientation::NUM_ORIENTATIONS;
use crate::pstats::{JointStats, StatsData};
use crate::suffix_array::Span;

/// A candidate translation of a source phrase with its statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct PhrasePair {
    /// Side the source phrase was looked up on.
    pub side: Side,
    pub source: Span,
    pub target: Span,
    /// Occurrences of the source phrase in the corpus.
    pub raw1: usize,
    /// Occurrences considered by the sampler.
    pub sample1: usize,
    /// Considered occurrences that produced phrase pairs.
    pub good1: usize,
    /// Occurrences of the target phrase in the corpus.
    pub raw2: usize,
    /// Estimated number of target occurrences the sample stands for.
    pub good2: usize,
    /// Joint count in the sample.
    pub joint: u32,
    pub wcnt: f32,
    pub bcnt: f32,
    /// `(document id, good samples)` of the source phrase, by document id.
    pub indoc: Vec<(u32, u32)>,
    /// Most frequent word alignment, relative to the phrase starts.
    pub aln: Vec<AlignmentPoint>,
    pub dfwd: [f32; NUM_ORIENTATIONS],
    pub dbwd: [f32; NUM_ORIENTATIONS],
}

/// Add-one smoothed distribution over the orientation classes.
fn smoothed(counts: &[u32; NUM_ORIENTATIONS]) -> [f32; NUM_ORIENTATIONS] {
    let total: u32 = counts.iter().sum();
    let denom = (total as usize + NUM_ORIENTATIONS) as f32;
    let mut out = [0.0; NUM_ORIENTATIONS];
    for (o, &c) in out.iter_mut().zip(counts) {
        *o = (c as f32 + 1.0) / denom;
    }
    out
}

impl PhrasePair {
    pub(crate) fn new(
        side: Side,
        source: Span,
        target_pid: u64,
        data: &StatsData,
        js: &JointStats,
    ) -> Self {
        let raw1 = data.raw_cnt;
        let good1 = data.good;
        let raw2 = js.cnt2 as usize;
        let joint = js.rcnt;
        let scaled = if raw1 == 0 {
            0
        } else {
            (raw2 as u64 * good1 as u64 / raw1 as u64) as usize
        };
        let mut indoc: Vec<(u32, u32)> = data.indoc.iter().map(|(&d, &n)| (d, n)).collect();
        indoc.sort_unstable();
        Self {
            side,
            source,
            target: Span::from_pid(target_pid),
            raw1,
            sample1: data.sample_cnt,
            good1,
            raw2,
            good2: scaled.max(joint as usize),
            joint,
            wcnt: js.wcnt,
            bcnt: js.bcnt,
            indoc,
            aln: js.best_alignment().map(<[_]>::to_vec).unwrap_or_default(),
            dfwd: smoothed(&js.ofwd),
            dbwd: smoothed(&js.obwd),
        }
    }

    /// True if the pair is so rare relative to either marginal that it is
    /// most likely an alignment error. A ratio of 0 disables pruning.
    pub fn is_noise(&self, prune_ratio: usize) -> bool {
        if prune_ratio == 0 {
            return false;
        }
        let limit = self.joint as usize * prune_ratio;
        self.good1 > limit || self.good2 > limit
    }

    /// Forward phrase probability estimate `joint / good1`.
    pub fn probability(&self) -> f32 {
        if self.good1 == 0 {
            0.0
        } else {
            self.joint as f32 / self.good1 as f32
        }
    }

    pub fn source_text(&self, bitext: &Bitext) -> String {
        bitext.span_to_string(self.side, &self.source)
    }

    pub fn target_text(&self, bitext: &Bitext) -> String {
        bitext.span_to_string(self.side.other(), &self.target)
    }
}

/// Ordering used to rank phrase pairs; "less" ranks first.
pub trait PhrasePairComparator {
    fn compare(&self, a: &PhrasePair, b: &PhrasePair) -> Ordering;
}

impl<F> PhrasePairComparator for F
where
    F: Fn(&PhrasePair, &PhrasePair) -> Ordering,
{
    fn compare(&self, a: &PhrasePair, b: &PhrasePair) -> Ordering {
        self(a, b)
    }
}

fn by_target(a: &PhrasePair, b: &PhrasePair) -> Ordering {
    a.target.pid().cmp(&b.target.pid())
}

/// Highest joint count first.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortDescendingByJointCount;

impl PhrasePairComparator for SortDescendingByJointCount {
    fn compare(&self, a: &PhrasePair, b: &PhrasePair) -> Ordering {
        b.joint.cmp(&a.joint).then_with(|| by_target(a, b))
    }
}

/// Highest `joint / good1` first.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortDescendingByProbability;

impl PhrasePairComparator for SortDescendingByProbability {
    fn compare(&self, a: &PhrasePair, b: &PhrasePair) -> Ordering {
        b.probability()
            .total_cmp(&a.probability())
            .then_with(|| by_target(a, b))
    }
}

/// Highest bias-weighted joint count first.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortDescendingByBiasWeight;

impl PhrasePairComparator for SortDescendingByBiasWeight {
    fn compare(&self, a: &PhrasePair, b: &PhrasePair) -> Ordering {
        b.bcnt.total_cmp(&a.bcnt).then_with(|| by_target(a, b))
    }
}

/// Sort `pairs` with `cmp`.
pub fn rank_phrase_pairs<C: PhrasePairComparator + ?Sized>(pairs: &mut [PhrasePair], cmp: &C) {
    pairs.sort_by(|a, b| cmp.compare(a, b));
}

/// Expand sampled statistics into pruned, ranked phrase pairs.
pub(crate) fn expand_stats(
    side: Side,
    source: Span,
    data: &StatsData,
    prune_ratio: usize,
) -> Vec<PhrasePair> {
    let mut pairs: Vec<PhrasePair> = data
        .trg
        .iter()
        .map(|(&tpid, js)| PhrasePair::new(side, source, tpid, data, js))
        .filter(|pp| !pp.is_noise(prune_ratio))
        .collect();
    rank_phrase_pairs(&mut pairs, &SortDescendingByJointCount);
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::PhraseOrientation;

    fn pair(target_sid: u32, joint: u32, good1: usize) -> PhrasePair {
        let mut js = JointStats::default();
        for _ in 0..joint {
            js.add(
                1.0,
                0.5,
                &[(0, 0)],
                PhraseOrientation::Mono,
                PhraseOrientation::Mono,
            );
        }
        js.cnt2 = 10;
        let mut data = StatsData::with_raw_count(100);
        data.good = good1;
        data.sample_cnt = good1;
        let target = Span {
            sid: target_sid,
            offset: 0,
            len: 1,
        };
        PhrasePair::new(Side::Source, Span::from_pid(0), target.pid(), &data, &js)
    }

    #[test]
    fn derived_counts() {
        let pp = pair(1, 4, 50);
        assert_eq!(pp.good2, 5);
        assert_eq!(pp.joint, 4);
        assert!((pp.bcnt - 2.0).abs() < 1e-6);
        assert_eq!(pp.aln, vec![(0, 0)]);
        // (4 + 1) / (4 + 7) for Mono, (0 + 1) / 11 elsewhere
        assert!((pp.dfwd[PhraseOrientation::Mono.index()] - 5.0 / 11.0).abs() < 1e-6);
        assert!((pp.dfwd.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        // good2 never drops below the joint count
        assert_eq!(pair(1, 3, 1).good2, 3);
    }

    #[test]
    fn pruning() {
        assert!(!pair(1, 1, 100).is_noise(128));
        assert!(pair(1, 1, 200).is_noise(128));
        assert!(!pair(1, 1, 200).is_noise(0));
    }

    #[test]
    fn ranking_is_stable_on_ties() {
        let mut pairs = vec![pair(3, 2, 10), pair(1, 2, 10), pair(2, 5, 10)];
        rank_phrase_pairs(&mut pairs, &SortDescendingByJointCount);
        let sids: Vec<u32> = pairs.iter().map(|p| p.target.sid).collect();
        assert_eq!(sids, vec![2, 1, 3]);

        let mut again = vec![pair(1, 2, 10), pair(3, 2, 10), pair(2, 5, 10)];
        rank_phrase_pairs(&mut again, &SortDescendingByJointCount);
        assert_eq!(again, pairs);
    }

    #[test]
    fn closures_are_comparators() {
        let mut pairs = vec![pair(1, 2, 10), pair(2, 5, 10)];
        rank_phrase_pairs(&mut pairs, &|a: &PhrasePair, b: &PhrasePair| a.joint.cmp(&b.joint));
        assert_eq!(pairs[0].joint, 2);
        rank_phrase_pairs(&mut pairs, &SortDescendingByProbability);
        assert_eq!(pairs[0].joint, 5);
        rank_phrase_pairs(&mut pairs, &SortDescendingByBiasWeight);
        assert_eq!(pairs[0].joint, 5);
    }
}
