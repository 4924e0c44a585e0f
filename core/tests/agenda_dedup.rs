// core/tests/agenda_dedup.rs
//
// Concurrent lookups of the same phrase share a single sampling job.

use sapt_core::{BitextBuilder, Config, Engine, Side};
use std::sync::{Arc, Barrier};
use std::thread;

fn engine(workers: usize) -> Arc<Engine> {
    let mut b = BitextBuilder::new();
    for i in 0..2000 {
        let src = format!("der hund {} bellt", i % 17);
        let trg = format!("the dog {} barks", i % 17);
        b.add_pair(&src, &trg, "0-0 1-1 2-2 3-3").unwrap();
    }
    let config = Config {
        workers,
        ..Config::default()
    };
    Arc::new(Engine::new(b.build().unwrap(), config).unwrap())
}

#[test]
fn test_concurrent_lookups_run_one_job() {
    let e = engine(4);
    let cursor = e.find(Side::Source, "der hund").unwrap();
    let n = 16;
    let barrier = Arc::new(Barrier::new(n));
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let e = e.clone();
            let c = cursor.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                e.lookup(None, &c, None).unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for r in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], r));
    }
    assert_eq!(e.agenda().executed(), 1);
    assert_eq!(results[0].sample_cnt(), 1000);
}

#[test]
fn test_uncached_requests_still_deduplicate() {
    let e = engine(2);
    let cursor = e.find(Side::Source, "bellt").unwrap();
    // a non-default cap is never cached, so sharing comes from the agenda
    let a = e.lookup(None, &cursor, Some(10)).unwrap();
    let b = e.lookup(None, &cursor, Some(10)).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(e.agenda().executed(), 1);
    assert_eq!(a.sample_cnt(), 10);

    // a different cap is a different job
    let c = e.lookup(None, &cursor, Some(20)).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(c.sample_cnt(), 20);
    assert_eq!(e.agenda().executed(), 2);
}

#[test]
fn test_prep_then_lookup_shares_stats() {
    let e = engine(1);
    let cursor = e.find(Side::Target, "barks").unwrap();
    e.prep(None, &cursor).unwrap();
    let stats = e.lookup(None, &cursor, None).unwrap();
    assert!(stats.is_ready());
    assert_eq!(e.agenda().executed(), 1);
    assert_eq!(e.cache_stats(), (1, 1));
}
