//! Sampling jobs: pick occurrences of a phrase, project each through the
//! word alignment, and tally the target phrases found.

use ahash::AHashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::bias::SamplingBias;
use crate::bitext::{Bitext, Side};
use crate::pstats::{PhraseStats, StatsData};
use crate::suffix_array::{Cursor, TokenPosition};

/// How occurrences are chosen for the sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMethod {
    /// Every occurrence, regardless of the sample size.
    Exhaustive,
    /// Uniform (or bias-weighted) random sample of exactly
    /// `min(cap, occurrences)` occurrences.
    #[default]
    Random,
    /// The `cap` occurrences with the highest bias weight.
    Ranked,
}

/// One unit of work for the agenda.
#[derive(Debug)]
pub(crate) struct SamplingJob {
    pub bitext: Arc<Bitext>,
    pub cursor: Cursor,
    pub side: Side,
    pub cap: usize,
    pub method: SamplingMethod,
    pub bias: Option<Arc<dyn SamplingBias>>,
    pub stats: Arc<PhraseStats>,
    pub seed: u64,
}

/// Survival function of the binomial distribution: `P(X > k)` for
/// `X ~ Binomial(n, p)`.
fn binomial_sf(n: usize, p: f64, k: usize) -> f64 {
    if k >= n || p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }
    let log_ratio = (p / (1.0 - p)).ln();
    let mut log_pmf = n as f64 * (1.0 - p).ln();
    let mut cdf = 0.0;
    for i in 0..=k {
        cdf += log_pmf.exp();
        log_pmf += ((n - i) as f64 / (i + 1) as f64).ln() + log_ratio;
    }
    (1.0 - cdf).max(0.0)
}

/// Verdict of the distribution check for one candidate occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Skip,
    Consider,
    Force,
}

/// Expected make-up of a biased random sample: each class's share of the
/// bias mass among the phrase's occurrences, and the sample size aimed for.
#[derive(Debug, Default)]
struct ClassQuota {
    target: usize,
    shares: AHashMap<u32, f64>,
}

impl ClassQuota {
    fn new(bias: &dyn SamplingBias, cursor: &Cursor, cap: usize) -> (Self, f64) {
        let mut quota = Self {
            target: cap.min(cursor.occurrence_count()),
            shares: AHashMap::new(),
        };
        let mut total = 0.0;
        for p in cursor.occurrences() {
            let w = f64::from(bias.weight(p.sid));
            total += w;
            if let Some(class) = bias.class(p.sid) {
                *quota.shares.entry(class).or_insert(0.0) += w;
            }
        }
        if total > 0.0 {
            quota.shares.values_mut().for_each(|m| *m /= total);
        } else {
            quota.shares.clear();
        }
        (quota, total)
    }

    /// Skip occurrences of a class that already holds more than a sample of
    /// the target size would plausibly give it; force those of a minority
    /// class that is still well below its share.
    fn verdict(&self, class: Option<u32>, data: &StatsData) -> Verdict {
        let Some(class) = class else {
            return Verdict::Consider;
        };
        let Some(&p) = self.shares.get(&class) else {
            return Verdict::Consider;
        };
        let k = data.indoc.get(&class).copied().unwrap_or(0) as usize;
        if p > 0.5 || k == 0 {
            return Verdict::Consider;
        }
        let d = binomial_sf(self.target, p, k);
        if d < 0.05 {
            Verdict::Skip
        } else if p < 0.5 && d > 0.9 {
            Verdict::Force
        } else {
            Verdict::Consider
        }
    }
}

/// Candidate in the bounded ranked-sampling heap. The heap's maximum is
/// the *worst* candidate: lowest score, then latest position.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    score: f32,
    idx: usize,
    pos: TokenPosition,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(self.idx.cmp(&other.idx))
    }
}

impl SamplingJob {
    /// Sample the phrase and return the tallies. The caller publishes them
    /// with [`PhraseStats::release`].
    pub fn sample(&self) -> StatsData {
        let mut data = StatsData::default();
        let mut rng = StdRng::seed_from_u64(self.seed);
        match self.method {
            SamplingMethod::Exhaustive => {
                for p in self.cursor.occurrences() {
                    self.consider_sample(p, &mut data);
                }
            }
            SamplingMethod::Random => self.random_sampling(&mut rng, &mut data),
            SamplingMethod::Ranked => self.ranked_sampling(&mut data),
        }
        debug!(
            pid = self.stats.pid(),
            side = ?self.side,
            raw = self.cursor.occurrence_count(),
            sampled = data.sample_cnt,
            good = data.good,
            targets = data.trg.len(),
            "sampling job finished"
        );
        data
    }

    fn bias_weight(&self, sid: u32) -> f32 {
        self.bias.as_ref().map(|b| b.weight(sid)).unwrap_or(1.0)
    }

    /// Selection sampling over the occurrence range. Without a bias every
    /// remaining occurrence is accepted with probability
    /// `needed / remaining`, which yields exactly `min(cap, N)` samples.
    ///
    /// With a bias, each class is held near its share of the bias mass in
    /// a sample of the final size, not of the part drawn so far:
    /// occurrences arrive grouped by document.
    fn random_sampling(&self, rng: &mut StdRng, data: &mut StatsData) {
        let total = self.cursor.occurrence_count();
        let (quota, bias_total) = match &self.bias {
            Some(b) => ClassQuota::new(b.as_ref(), &self.cursor, self.cap),
            None => (ClassQuota::default(), 0.0),
        };
        for (ctr, p) in self.cursor.occurrences().enumerate() {
            if data.sample_cnt >= self.cap {
                break;
            }
            let verdict = match &self.bias {
                Some(b) => quota.verdict(b.class(p.sid), data),
                None => Verdict::Consider,
            };
            let accept = match verdict {
                Verdict::Skip => false,
                Verdict::Force => true,
                Verdict::Consider => {
                    let left = (total - ctr) as f64;
                    let chosen = data.sample_cnt as f64;
                    let threshold = if self.bias.is_some() && bias_total > 0.0 {
                        f64::from(self.bias_weight(p.sid)) / bias_total
                            * total as f64
                            * self.cap as f64
                    } else {
                        self.cap as f64
                    };
                    left * rng.random::<f64>() + chosen < threshold
                }
            };
            if accept {
                self.consider_sample(p, data);
            }
        }
    }

    /// Take the `cap` occurrences with the highest bias weight; ties go to
    /// the earlier occurrence.
    fn ranked_sampling(&self, data: &mut StatsData) {
        let mut heap: BinaryHeap<Ranked> =
            BinaryHeap::with_capacity(self.cap.min(self.cursor.occurrence_count()) + 1);
        for (idx, pos) in self.cursor.occurrences().enumerate() {
            let cand = Ranked {
                score: self.bias_weight(pos.sid),
                idx,
                pos,
            };
            if heap.len() < self.cap {
                heap.push(cand);
            } else if heap.peek().is_some_and(|worst| cand < *worst) {
                heap.pop();
                heap.push(cand);
            }
        }
        let mut chosen = heap.into_vec();
        chosen.sort_unstable_by_key(|r| r.idx);
        for r in chosen {
            self.consider_sample(r.pos, data);
        }
    }

    /// Project one occurrence and count every target phrase it yields.
    fn consider_sample(&self, p: TokenPosition, data: &mut StatsData) {
        let plen = self.cursor.len() as u16;
        let flip = self.side == Side::Target;
        let other = self.side.other();
        let docid = match &self.bias {
            Some(b) => b.class(p.sid),
            None => self.bitext.docmap().and_then(|dm| dm.sid2did(p.sid)),
        };

        data.sample_cnt += 1;
        let Some(pb) = self
            .bitext
            .find_target_phrase_bounds(p.sid, p.offset, p.offset + plen, flip)
        else {
            trace!(sid = p.sid, offset = p.offset, "occurrence not extractable");
            return;
        };

        let starts = pb.soft_start..=pb.hard_start;
        let ends = pb.hard_end..=pb.soft_end;
        let num_pairs = starts.clone().count() * ends.clone().count();
        data.good += 1;
        data.sum_pairs += num_pairs;
        data.ofwd[pb.po_fwd.index()] += 1;
        data.obwd[pb.po_bwd.index()] += 1;
        if let Some(did) = docid {
            *data.indoc.entry(did).or_insert(0) += 1;
        }

        let weight = 1.0 / num_pairs as f32;
        let bias_weight = self.bias_weight(p.sid);
        let sentence = self.bitext.track(other).sentence(p.sid);
        let index = self.bitext.index(other);
        let mut seen: Vec<u64> = Vec::with_capacity(num_pairs);

        for s in starts {
            let shift = pb.hard_start - s;
            let aln: Vec<_> = pb
                .core_alignment
                .iter()
                .map(|&(i, j)| (i, j + shift))
                .collect();
            let Some(mut target) =
                Cursor::for_phrase(index.clone(), &sentence[s as usize..pb.hard_end as usize])
            else {
                continue;
            };
            for e in ends.clone() {
                let tpid = target.phrase_id();
                if !seen.contains(&tpid) {
                    seen.push(tpid);
                    let js = data.trg.entry(tpid).or_default();
                    js.cnt2 = target.occurrence_count() as u32;
                    js.add(weight, bias_weight, &aln, pb.po_fwd, pb.po_bwd);
                }
                if e < pb.soft_end && !target.extend(sentence[e as usize]) {
                    break;
                }
            }
        }
    }
}
