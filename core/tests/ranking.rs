// core/tests/ranking.rs
//
// Ranking and pruning of expanded phrase pairs.

use sapt_core::{
    rank_phrase_pairs, BitextBuilder, Config, Engine, PhrasePair, Side,
    SortDescendingByBiasWeight, SortDescendingByProbability,
};

fn engine(prune_ratio: usize) -> Engine {
    let mut b = BitextBuilder::new();
    for (trg, n) in [("Bank", 6), ("Ufer", 3), ("Sitz", 1)] {
        for _ in 0..n {
            b.add_pair("bank", trg, "0-0").unwrap();
        }
    }
    let config = Config {
        prune_ratio,
        workers: 1,
        ..Config::default()
    };
    Engine::new(b.build().unwrap(), config).unwrap()
}

fn texts(e: &Engine, pairs: &[PhrasePair]) -> Vec<String> {
    let bt = e.bitext();
    pairs.iter().map(|p| p.target_text(&bt)).collect()
}

#[test]
fn test_expansion_is_ranked_by_joint_count() {
    let e = engine(128);
    let c = e.find(Side::Source, "bank").unwrap();
    let stats = e.lookup(None, &c, None).unwrap();
    let pairs = e.expand(&c, &stats).unwrap();
    assert_eq!(texts(&e, &pairs), vec!["Bank", "Ufer", "Sitz"]);
    assert_eq!(
        pairs.iter().map(|p| p.joint).collect::<Vec<_>>(),
        vec![6, 3, 1]
    );
    for p in &pairs {
        assert_eq!(p.raw1, 10);
        assert_eq!(p.good1, 10);
        assert_eq!(p.raw2, p.joint as usize);
    }
    assert!((pairs[0].probability() - 0.6).abs() < 1e-6);
}

#[test]
fn test_expansion_is_stable_across_calls() {
    let e = engine(128);
    let c = e.find(Side::Source, "bank").unwrap();
    let stats = e.lookup(None, &c, None).unwrap();
    let first = e.expand(&c, &stats).unwrap();
    let second = e.expand(&c, &stats).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_rare_pairs_are_pruned() {
    let e = engine(5);
    let c = e.find(Side::Source, "bank").unwrap();
    let stats = e.lookup(None, &c, None).unwrap();
    let pairs = e.expand(&c, &stats).unwrap();
    // 10 > 1 * 5 drops "Sitz"; 10 <= 3 * 5 keeps "Ufer"
    assert_eq!(texts(&e, &pairs), vec!["Bank", "Ufer"]);
}

#[test]
fn test_custom_comparators() {
    let e = engine(0);
    let c = e.find(Side::Source, "bank").unwrap();
    let stats = e.lookup(None, &c, None).unwrap();
    let mut pairs = e.expand(&c, &stats).unwrap();

    rank_phrase_pairs(&mut pairs, &|a: &PhrasePair, b: &PhrasePair| a.raw2.cmp(&b.raw2));
    assert_eq!(texts(&e, &pairs), vec!["Sitz", "Ufer", "Bank"]);

    rank_phrase_pairs(&mut pairs, &SortDescendingByProbability);
    assert_eq!(texts(&e, &pairs), vec!["Bank", "Ufer", "Sitz"]);

    // unbiased lookups weigh every sample 1.0
    rank_phrase_pairs(&mut pairs, &SortDescendingByBiasWeight);
    assert_eq!(texts(&e, &pairs), vec!["Bank", "Ufer", "Sitz"]);
    assert!((pairs[0].bcnt - 6.0).abs() < 1e-6);
}

#[test]
fn test_expand_rejects_foreign_stats() {
    let e = engine(128);
    let bank = e.find(Side::Source, "bank").unwrap();
    let ufer = e.find(Side::Target, "Ufer").unwrap();
    let stats = e.lookup(None, &ufer, None).unwrap();
    assert!(e.expand(&bank, &stats).is_err());
}
