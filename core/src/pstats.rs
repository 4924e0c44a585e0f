//! Phrase statistics: the shared, incrementally published result of a
//! sampling job.

use ahash::AHashMap;
use parking_lot::{Condvar, MappedMutexGuard, Mutex, MutexGuard};

use crate::alignment::AlignmentPoint;
use crate::bitext::Side;
use crate::orientation::{PhraseOrientation, NUM_ORIENTATIONS};

/// Statistics for one (source phrase, target phrase) pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointStats {
    /// Occurrences that produced this target phrase.
    pub rcnt: u32,
    /// Sum of `1 / num_pairs` over those occurrences.
    pub wcnt: f32,
    /// Sum of the bias weights of those occurrences' sentences.
    pub bcnt: f32,
    /// Occurrence count of the target phrase in the whole corpus.
    pub cnt2: u32,
    pub ofwd: [u32; NUM_ORIENTATIONS],
    pub obwd: [u32; NUM_ORIENTATIONS],
    alignments: Vec<(Vec<AlignmentPoint>, u32)>,
}

impl JointStats {
    pub(crate) fn add(
        &mut self,
        weight: f32,
        bias_weight: f32,
        alignment: &[AlignmentPoint],
        fwd: PhraseOrientation,
        bwd: PhraseOrientation,
    ) {
        self.rcnt += 1;
        self.wcnt += weight;
        self.bcnt += bias_weight;
        self.ofwd[fwd.index()] += 1;
        self.obwd[bwd.index()] += 1;
        match self.alignments.iter_mut().find(|(a, _)| a == alignment) {
            Some((_, n)) => *n += 1,
            None => self.alignments.push((alignment.to_vec(), 1)),
        }
    }

    fn merge(&mut self, other: &JointStats) {
        self.rcnt += other.rcnt;
        self.wcnt += other.wcnt;
        self.bcnt += other.bcnt;
        self.cnt2 = self.cnt2.max(other.cnt2);
        for k in 0..NUM_ORIENTATIONS {
            self.ofwd[k] += other.ofwd[k];
            self.obwd[k] += other.obwd[k];
        }
        for (a, n) in &other.alignments {
            match self.alignments.iter_mut().find(|(x, _)| x == a) {
                Some((_, m)) => *m += n,
                None => self.alignments.push((a.clone(), *n)),
            }
        }
    }

    /// Observed word alignments, most frequent first (ties keep first-seen order).
    pub fn alignments(&self) -> Vec<(&[AlignmentPoint], u32)> {
        let mut out: Vec<_> = self
            .alignments
            .iter()
            .map(|(a, n)| (a.as_slice(), *n))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1));
        out
    }

    /// The most frequent word alignment.
    pub fn best_alignment(&self) -> Option<&[AlignmentPoint]> {
        self.alignments().first().map(|(a, _)| *a)
    }
}

/// Aggregated statistics of a source phrase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsData {
    /// Exact number of occurrences in the corpus.
    pub raw_cnt: usize,
    /// Occurrences considered by the sampler.
    pub sample_cnt: usize,
    /// Considered occurrences that produced at least one phrase pair.
    pub good: usize,
    /// Total number of phrase pairs extracted.
    pub sum_pairs: usize,
    pub ofwd: [u32; NUM_ORIENTATIONS],
    pub obwd: [u32; NUM_ORIENTATIONS],
    /// Target phrase id -> joint statistics.
    pub trg: AHashMap<u64, JointStats>,
    /// Document id -> number of good samples from that document.
    pub indoc: AHashMap<u32, u32>,
}

impl StatsData {
    pub(crate) fn with_raw_count(raw_cnt: usize) -> Self {
        Self {
            raw_cnt,
            ..Default::default()
        }
    }

    fn merge(&mut self, other: &StatsData) {
        self.sample_cnt += other.sample_cnt;
        self.good += other.good;
        self.sum_pairs += other.sum_pairs;
        for k in 0..NUM_ORIENTATIONS {
            self.ofwd[k] += other.ofwd[k];
            self.obwd[k] += other.obwd[k];
        }
        for (pid, js) in &other.trg {
            self.trg.entry(*pid).or_default().merge(js);
        }
        for (did, n) in &other.indoc {
            *self.indoc.entry(*did).or_insert(0) += n;
        }
    }
}

#[derive(Debug)]
struct Inner {
    in_progress: usize,
    data: StatsData,
}

/// Statistics of one phrase, filled in by sampling workers.
///
/// Handles are shared through `Arc`. Until the sampling worker has
/// released them the statistics are *in progress*; [`PhraseStats::wait`]
/// blocks until then.
#[derive(Debug)]
pub struct PhraseStats {
    side: Side,
    pid: u64,
    inner: Mutex<Inner>,
    ready: Condvar,
}

impl PhraseStats {
    /// New statistics with one worker already registered.
    pub(crate) fn pending(side: Side, pid: u64, raw_cnt: usize) -> Self {
        Self {
            side,
            pid,
            inner: Mutex::new(Inner {
                in_progress: 1,
                data: StatsData::with_raw_count(raw_cnt),
            }),
            ready: Condvar::new(),
        }
    }

    /// Side of the phrase these statistics describe.
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn pid(&self) -> u64 {
        self.pid
    }

    /// Merge a worker's partial result and deregister it.
    pub(crate) fn release(&self, partial: &StatsData) {
        let mut inner = self.inner.lock();
        assert!(inner.in_progress > 0, "phrase statistics released twice");
        inner.data.merge(partial);
        let good = inner.data.good;
        for (pid, js) in &inner.data.trg {
            assert!(
                js.rcnt as usize <= good,
                "joint count {} of target {pid:#x} exceeds good sample count {good}",
                js.rcnt
            );
        }
        inner.in_progress -= 1;
        if inner.in_progress == 0 {
            self.ready.notify_all();
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.lock().in_progress == 0
    }

    /// Block until all workers have released the statistics.
    pub fn wait(&self) {
        let mut inner = self.inner.lock();
        while inner.in_progress > 0 {
            self.ready.wait(&mut inner);
        }
    }

    /// Wait and borrow the finished statistics.
    pub fn data(&self) -> MappedMutexGuard<'_, StatsData> {
        let mut inner = self.inner.lock();
        while inner.in_progress > 0 {
            self.ready.wait(&mut inner);
        }
        MutexGuard::map(inner, |i| &mut i.data)
    }

    /// Exact occurrence count; available before sampling finishes.
    pub fn raw_cnt(&self) -> usize {
        self.inner.lock().data.raw_cnt
    }

    pub fn sample_cnt(&self) -> usize {
        self.data().sample_cnt
    }

    pub fn good(&self) -> usize {
        self.data().good
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_blocks_until_release() {
        let stats = Arc::new(PhraseStats::pending(Side::Source, 7, 3));
        assert!(!stats.is_ready());
        assert_eq!(stats.raw_cnt(), 3);

        let s = stats.clone();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let mut partial = StatsData::default();
            partial.sample_cnt = 3;
            partial.good = 2;
            s.release(&partial);
        });
        assert_eq!(stats.good(), 2);
        assert!(stats.is_ready());
        worker.join().unwrap();
    }

    #[test]
    fn partial_results_merge() {
        let stats = PhraseStats::pending(Side::Source, 1, 10);
        let mut a = StatsData::default();
        a.good = 1;
        a.sample_cnt = 1;
        a.trg.entry(42).or_default().add(
            1.0,
            0.0,
            &[(0, 0)],
            PhraseOrientation::Mono,
            PhraseOrientation::First,
        );
        let mut both = a.clone();
        both.merge(&a);
        stats.release(&both);
        assert!(stats.is_ready());
        let data = stats.data();
        assert_eq!(data.good, 2);
        let js = &data.trg[&42];
        assert_eq!(js.rcnt, 2);
        assert_eq!(js.alignments(), vec![(&[(0u16, 0u16)][..], 2)]);
        assert_eq!(js.obwd[PhraseOrientation::First.index()], 2);
    }

    #[test]
    #[should_panic(expected = "exceeds good sample count")]
    fn joint_count_above_good_panics() {
        let stats = PhraseStats::pending(Side::Source, 1, 1);
        let mut a = StatsData::default();
        a.trg.entry(1).or_default().rcnt = 1;
        stats.release(&a);
    }

    #[test]
    fn best_alignment_is_most_frequent() {
        let mut js = JointStats::default();
        let (m, f) = (PhraseOrientation::Mono, PhraseOrientation::First);
        js.add(1.0, 0.0, &[(0, 1)], m, f);
        js.add(1.0, 0.0, &[(0, 0)], m, f);
        js.add(0.5, 0.0, &[(0, 0)], m, f);
        assert_eq!(js.best_alignment(), Some(&[(0u16, 0u16)][..]));
        assert!((js.wcnt - 2.5).abs() < 1e-6);
    }
}
