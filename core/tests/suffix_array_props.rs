// core/tests/suffix_array_props.rs
//
// Cursor behaviour over a generated corpus, checked against brute-force
// counting:
// - every extension narrows (or keeps) the occurrence range
// - occurrence counts match a scan of the track
// - trie traversal with down/over/up visits each distinct phrase once

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sapt_core::{BitextBuilder, Cursor, Side, TokenId, Track};

fn corpus(seed: u64, sentences: usize) -> sapt_core::Bitext {
    let words = ["a", "b", "c", "d", "e"];
    let mut rng = StdRng::seed_from_u64(seed);
    let mut b = BitextBuilder::new();
    for _ in 0..sentences {
        let len = rng.random_range(1..8);
        let s: Vec<&str> = (0..len).map(|_| words[rng.random_range(0..words.len())]).collect();
        let line = s.join(" ");
        let aln: Vec<String> = (0..len).map(|i| format!("{i}-{i}")).collect();
        b.add_pair(&line, &line, &aln.join(" ")).unwrap();
    }
    b.build().unwrap()
}

fn brute_force_count(track: &Track, phrase: &[TokenId]) -> usize {
    (0..track.len() as u32)
        .map(|sid| {
            let s = track.sentence(sid);
            if s.len() < phrase.len() {
                0
            } else {
                s.windows(phrase.len()).filter(|w| *w == phrase).count()
            }
        })
        .sum()
}

#[test]
fn test_monotonic_narrowing() {
    let bt = corpus(7, 200);
    let track = bt.track(Side::Source);
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..200 {
        let mut c = bt.cursor(Side::Source);
        let mut prev = c.occurrence_count();
        assert_eq!(prev, track.num_tokens());
        for _ in 0..5 {
            // ids 2..=6 are the five corpus words
            let t = rng.random_range(2..7) as TokenId;
            if !c.extend(t) {
                break;
            }
            let n = c.occurrence_count();
            assert!(n <= prev, "extension grew the range from {prev} to {n}");
            assert!(n > 0);
            prev = n;
        }
    }
}

#[test]
fn test_counts_match_brute_force() {
    let bt = corpus(11, 150);
    let track = bt.track(Side::Source).clone();
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..300 {
        let len = rng.random_range(1..4);
        let phrase: Vec<TokenId> = (0..len).map(|_| rng.random_range(2..7)).collect();
        let expected = brute_force_count(&track, &phrase);
        match Cursor::for_phrase(bt.index(Side::Source).clone(), &phrase) {
            Some(c) => {
                assert_eq!(c.occurrence_count(), expected, "phrase {phrase:?}");
                for p in c.occurrences() {
                    let start = p.offset as usize;
                    assert_eq!(&track.sentence(p.sid)[start..start + len], &phrase[..]);
                }
            }
            None => assert_eq!(expected, 0, "phrase {phrase:?} not found"),
        }
    }
}

#[test]
fn test_trie_traversal_partitions_parent() {
    let bt = corpus(3, 100);
    let mut c = bt.cursor(Side::Source);
    let mut total = 0;
    let mut seen = Vec::new();
    assert!(c.down());
    loop {
        total += c.occurrence_count();
        seen.push(c.tokens().to_vec());
        if !c.over() {
            break;
        }
    }
    // unigrams partition the whole array
    assert_eq!(total, bt.track(Side::Source).num_tokens());
    let mut dedup = seen.clone();
    dedup.dedup();
    assert_eq!(dedup, seen);
    assert!(c.up());
    assert!(c.is_empty());
}

#[test]
fn test_empty_corpus() {
    let bt = BitextBuilder::new().build().unwrap();
    let mut c = bt.cursor(Side::Source);
    assert_eq!(c.occurrence_count(), 0);
    assert!(!c.extend(2));
    assert_eq!(c.occurrences().count(), 0);
}
