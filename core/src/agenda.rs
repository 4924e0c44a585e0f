// core/src/agenda.rs
//
// Sampling agenda: a fixed pool of worker threads draining a FIFO of
// sampling jobs, plus a table of jobs by key so that concurrent requests
// for the same phrase share one `PhraseStats`.

use ahash::AHashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use tracing::{debug, info};

use crate::bias::SamplingBias;
use crate::bitext::{Bitext, Side};
use crate::error::{BitextError, Result};
use crate::pstats::PhraseStats;
use crate::sampler::{SamplingJob, SamplingMethod};
use crate::suffix_array::Cursor;

/// Upper bound on the worker pool.
pub const MAX_WORKERS: usize = 24;

/// Dead entries are purged from the job table every this many submissions.
const PURGE_INTERVAL: usize = 1024;

/// Identity of a sampling request: bitext generation, side, phrase id,
/// sample size and bias identity.
type JobKey = (u64, Side, u64, usize, usize);

/// A request to sample one phrase.
#[derive(Debug, Clone)]
pub(crate) struct SampleRequest {
    pub bitext: Arc<Bitext>,
    pub cursor: Cursor,
    pub side: Side,
    pub cap: usize,
    pub method: SamplingMethod,
    pub bias: Option<Arc<dyn SamplingBias>>,
    pub seed: u64,
}

fn bias_id(bias: &Option<Arc<dyn SamplingBias>>) -> usize {
    bias.as_ref()
        .map(|b| Arc::as_ptr(b) as *const () as usize)
        .unwrap_or(0)
}

impl SampleRequest {
    fn key(&self) -> JobKey {
        (
            self.bitext.revision(),
            self.side,
            self.cursor.phrase_id(),
            self.cap,
            bias_id(&self.bias),
        )
    }
}

struct Entry {
    stats: Weak<PhraseStats>,
    // The bias address is part of the key; an entry is only valid while the
    // bias it was created for is still alive.
    bias: Option<Weak<dyn SamplingBias>>,
}

impl Entry {
    fn live(&self) -> Option<Arc<PhraseStats>> {
        if let Some(b) = &self.bias {
            b.upgrade()?;
        }
        self.stats.upgrade()
    }
}

struct Queue {
    jobs: VecDeque<SamplingJob>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
    executed: AtomicUsize,
}

/// Worker pool with per-phrase job deduplication.
pub struct Agenda {
    shared: Arc<Shared>,
    table: Mutex<AHashMap<JobKey, Entry>>,
    submitted: AtomicUsize,
    workers: Vec<JoinHandle<()>>,
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break job;
                }
                if queue.shutdown {
                    return;
                }
                shared.available.wait(&mut queue);
            }
        };
        let data = job.sample();
        shared.executed.fetch_add(1, Ordering::Relaxed);
        job.stats.release(&data);
    }
}

impl Agenda {
    /// Start `workers` threads (clamped to `1..=MAX_WORKERS`).
    pub fn new(workers: usize) -> Result<Self> {
        let n = workers.clamp(1, MAX_WORKERS);
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
            executed: AtomicUsize::new(0),
        });
        let mut agenda = Self {
            shared,
            table: Mutex::new(AHashMap::new()),
            submitted: AtomicUsize::new(0),
            workers: Vec::with_capacity(n),
        };
        for i in 0..n {
            let shared = agenda.shared.clone();
            let handle = std::thread::Builder::new()
                .name(format!("sapt-sampler-{i}"))
                .spawn(move || worker_loop(shared))
                .map_err(BitextError::WorkerSpawn)?;
            agenda.workers.push(handle);
        }
        info!(workers = n, "sampling agenda started");
        Ok(agenda)
    }

    /// Statistics for `request`: the live handle of an identical earlier
    /// request if there is one, otherwise a fresh in-progress handle whose
    /// job has been queued. Never blocks on sampling work.
    pub(crate) fn submit(&self, request: SampleRequest) -> Arc<PhraseStats> {
        let key = request.key();
        let mut table = self.table.lock();
        if let Some(stats) = table.get(&key).and_then(Entry::live) {
            debug!(pid = key.2, ready = stats.is_ready(), "joined existing sampling job");
            return stats;
        }

        let pid = request.cursor.phrase_id();
        let stats = Arc::new(PhraseStats::pending(
            request.side,
            pid,
            request.cursor.occurrence_count(),
        ));
        table.insert(
            key,
            Entry {
                stats: Arc::downgrade(&stats),
                bias: request.bias.as_ref().map(Arc::downgrade),
            },
        );
        if self.submitted.fetch_add(1, Ordering::Relaxed) % PURGE_INTERVAL == PURGE_INTERVAL - 1 {
            table.retain(|_, e| e.live().is_some());
        }

        let job = SamplingJob {
            seed: request.seed ^ pid,
            bitext: request.bitext,
            cursor: request.cursor,
            side: request.side,
            cap: request.cap,
            method: request.method,
            bias: request.bias,
            stats: stats.clone(),
        };
        debug!(pid, cap = job.cap, side = ?job.side, "queued sampling job");
        self.shared.queue.lock().jobs.push_back(job);
        self.shared.available.notify_one();
        stats
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Jobs waiting for a worker.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    /// Jobs run to completion so far.
    pub fn executed(&self) -> usize {
        self.shared.executed.load(Ordering::Relaxed)
    }
}

impl Drop for Agenda {
    fn drop(&mut self) {
        self.shared.queue.lock().shutdown = true;
        self.shared.available.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!(executed = self.executed(), "sampling agenda stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitext::BitextBuilder;

    fn bitext() -> Arc<Bitext> {
        let mut b = BitextBuilder::new();
        for _ in 0..5 {
            b.add_pair("das haus", "the house", "0-0 1-1").unwrap();
        }
        Arc::new(b.build().unwrap())
    }

    fn request(bt: &Arc<Bitext>, cap: usize) -> SampleRequest {
        SampleRequest {
            bitext: bt.clone(),
            cursor: bt.find(Side::Source, "haus").unwrap(),
            side: Side::Source,
            cap,
            method: SamplingMethod::Random,
            bias: None,
            seed: 0,
        }
    }

    #[test]
    fn worker_count_is_clamped() {
        assert_eq!(Agenda::new(0).unwrap().num_workers(), 1);
        assert_eq!(Agenda::new(100).unwrap().num_workers(), MAX_WORKERS);
    }

    #[test]
    fn identical_requests_share_stats() {
        let bt = bitext();
        let agenda = Agenda::new(2).unwrap();
        let a = agenda.submit(request(&bt, 10));
        let b = agenda.submit(request(&bt, 10));
        assert!(Arc::ptr_eq(&a, &b));
        let c = agenda.submit(request(&bt, 3));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.good(), 5);
        assert_eq!(c.sample_cnt(), 3);
    }

    #[test]
    fn drop_drains_queue() {
        let bt = bitext();
        let agenda = Agenda::new(1).unwrap();
        let handles: Vec<_> = (1..20).map(|cap| agenda.submit(request(&bt, cap))).collect();
        drop(agenda);
        assert!(handles.iter().all(|h| h.is_ready()));
    }
}
