//! Property-style checks over randomized key/value sequences, seeded for
//! reproducibility rather than pulling in a dedicated property-testing
//! framework the teacher crate does not use.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use chainstore::{ChainIndex, OpenOptions};

fn open_store() -> (tempfile::TempDir, ChainIndex) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    let store = ChainIndex::open(&path, OpenOptions::default()).unwrap();
    (dir, store)
}

fn random_bytes(rng: &mut ChaCha8Rng, max_len: usize) -> Vec<u8> {
    let len = rng.gen_range(1..=max_len);
    (0..len).map(|_| rng.gen()).collect()
}

#[test]
fn round_trip_over_distinct_keys() {
    let (_dir, mut store) = open_store();
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    let mut entries = Vec::new();
    for i in 0..200u32 {
        let key = format!("key-{i}").into_bytes();
        let value = random_bytes(&mut rng, 64);
        store.set(&key, &value).unwrap();
        entries.push((key, value));
    }

    for (key, value) in &entries {
        assert_eq!(store.get(key).unwrap().as_deref(), Some(value.as_slice()));
    }
}

#[test]
fn shadowing_overwrite_then_delete() {
    let (_dir, mut store) = open_store();
    let mut rng = ChaCha8Rng::seed_from_u64(2);

    for _ in 0..50 {
        let key = random_bytes(&mut rng, 16);
        let v1 = random_bytes(&mut rng, 32);
        let v2 = random_bytes(&mut rng, 32);

        store.set(&key, &v1).unwrap();
        store.set(&key, &v2).unwrap();
        assert_eq!(store.get(&key).unwrap().as_deref(), Some(v2.as_slice()));

        store.del(&key).unwrap();
        assert_eq!(store.get(&key).unwrap(), None);
    }
}

#[test]
fn generation_increases_by_one_per_set() {
    let (_dir, mut store) = open_store();
    for i in 1..=100u64 {
        store.set(format!("k{i}").as_bytes(), b"v").unwrap();
        assert_eq!(store.head_generation(), i);
    }
}

#[test]
fn chain_integrity_strictly_decreasing_generations() {
    let (_dir, mut store) = open_store();
    for i in 0..40 {
        store.set(format!("k{i}").as_bytes(), b"v").unwrap();
    }

    let mut cursor = store.head().unwrap().unwrap();
    let mut last_generation = cursor.generation();
    let mut hops = 1;
    while let Some(prev) = cursor.previous().unwrap() {
        assert!(prev.generation() < last_generation);
        last_generation = prev.generation();
        cursor = prev;
        hops += 1;
    }
    assert_eq!(cursor.predecessor(), 0);
    assert_eq!(hops, 40);
}

#[test]
fn serialize_ingest_round_trip_for_every_generation() {
    let (_dir_a, mut a) = open_store();
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let mut keys = Vec::new();
    for i in 0..20 {
        let key = format!("k{i}").into_bytes();
        let value = random_bytes(&mut rng, 24);
        a.set(&key, &value).unwrap();
        keys.push(key);
    }

    for (i, key) in keys.iter().enumerate() {
        let generation = (i + 1) as u64;
        let (_dir_b, mut b) = open_store();
        let wire = a.serialize(&a.fetch(generation).unwrap().unwrap()).unwrap();
        b.ingest(&wire).unwrap();

        assert_eq!(b.head_generation(), generation);
        assert_eq!(b.get(key).unwrap(), a.get(key).unwrap());
    }
}

#[test]
fn compaction_preserves_observables() {
    let (_dir, mut store) = open_store();
    let mut rng = ChaCha8Rng::seed_from_u64(4);

    let keys: Vec<Vec<u8>> = (0..10).map(|i| format!("k{i}").into_bytes()).collect();
    for _ in 0..300 {
        let key = &keys[rng.gen_range(0..keys.len())];
        if rng.gen_bool(0.1) {
            store.del(key).unwrap();
        } else {
            let value = random_bytes(&mut rng, 16);
            store.set(key, &value).unwrap();
        }
    }

    let before: Vec<_> = keys.iter().map(|k| store.get(k).unwrap()).collect();
    let head_generation_before = store.head_generation();

    store.compact().unwrap();

    let after: Vec<_> = keys.iter().map(|k| store.get(k).unwrap()).collect();
    assert_eq!(before, after);
    assert_eq!(store.head_generation(), head_generation_before);
}

#[test]
fn fetch_policy_matches_spec() {
    let (_dir, mut store) = open_store();
    for i in 0..10 {
        store.set(format!("k{i}").as_bytes(), b"v").unwrap();
    }

    // Below every stored generation: returns the oldest frame.
    let oldest = store.fetch(0).unwrap().unwrap();
    assert_eq!(oldest.generation(), 1);

    // Exact match.
    for g in 1..=10u64 {
        assert_eq!(store.fetch(g).unwrap().unwrap().generation(), g);
    }

    // Above every stored generation: no anchor exists.
    assert!(store.fetch(11).unwrap().is_none());
}
