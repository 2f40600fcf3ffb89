//! End-to-end structural scenarios for the multi-key B+ tree, forcing the
//! same small degree (7, min_occupancy 3) as `bptree_scenarios_test.rs` by
//! widening the key component of the `(key, value)` composite, so splits and
//! merges over duplicate-key runs are actually exercised rather than assumed.

use common::fixed::FixedString;
use storage_engine::MultiBPlusTree;
use test_case::test_case;

type WideKey = FixedString<500>;

fn open(dir: &tempfile::TempDir, name: &str) -> MultiBPlusTree<WideKey, i32> {
    MultiBPlusTree::open(dir.path(), name).unwrap()
}

fn key(n: u64) -> WideKey {
    WideKey::new(&n.to_string())
}

/// Scenario 3-style: one station accumulating enough distinct trains that
/// its run of `(station, train)` pairs overflows a single leaf.
#[test]
fn one_key_with_many_values_splits_and_stays_findable() {
    let dir = tempfile::tempdir().unwrap();
    let tree = open(&dir, "t");
    assert!(tree.root_is_leaf().unwrap());

    let station = key(1);
    for train in 0..7i32 {
        tree.insert(station, train).unwrap();
    }

    assert!(!tree.root_is_leaf().unwrap());
    assert_eq!(tree.leaf_count().unwrap(), 2);

    let mut trains = tree.find(&station).unwrap();
    trains.sort();
    assert_eq!(trains, (0..7).collect::<Vec<_>>());
}

/// Re-inserting an already-present pair after a split is still a no-op.
#[test]
fn duplicate_insert_after_split_does_not_grow_size() {
    let dir = tempfile::tempdir().unwrap();
    let tree = open(&dir, "t");
    let station = key(1);
    for train in 0..7i32 {
        tree.insert(station, train).unwrap();
    }
    assert_eq!(tree.size(), 7);

    tree.insert(station, 3).unwrap();
    assert_eq!(tree.size(), 7);
    assert!(tree.contains(&station, &3).unwrap());
}

/// Erasing pairs back down under min_occupancy merges leaves and, at the
/// end, collapses the root back to a single leaf — same shape as the unique
/// tree's scenario, but driven by value-component ordering within one key.
#[test]
fn erasing_after_split_merges_leaves_and_collapses_root() {
    let dir = tempfile::tempdir().unwrap();
    let tree = open(&dir, "t");
    let station = key(1);
    for train in 0..7i32 {
        tree.insert(station, train).unwrap();
    }
    assert_eq!(tree.leaf_count().unwrap(), 2);

    for train in (3..7i32).rev() {
        assert!(tree.erase(&station, &train).unwrap());
    }

    assert_eq!(tree.size(), 3);
    assert!(tree.root_is_leaf().unwrap());
    assert_eq!(tree.leaf_count().unwrap(), 1);
    let mut remaining = tree.find(&station).unwrap();
    remaining.sort();
    assert_eq!(remaining, vec![0, 1, 2]);
}

/// Several distinct keys interleaved, each accumulating enough values to
/// force splits, checked across a few different key/value counts.
#[test_case(3, 5; "few keys, few values")]
#[test_case(10, 3; "many keys, few values")]
#[test_case(2, 20; "few keys, many values")]
fn many_keys_many_values_split_then_drain(key_count: u64, values_per_key: i32) {
    let dir = tempfile::tempdir().unwrap();
    let tree = open(&dir, "t");

    for k in 0..key_count {
        for v in 0..values_per_key {
            tree.insert(key(k), v).unwrap();
        }
    }
    assert_eq!(tree.size(), key_count * values_per_key as u64);

    for k in 0..key_count {
        let mut values = tree.find(&key(k)).unwrap();
        values.sort();
        assert_eq!(values, (0..values_per_key).collect::<Vec<_>>());
    }

    for k in 0..key_count {
        for v in 0..values_per_key {
            assert!(tree.erase(&key(k), &v).unwrap());
        }
    }

    assert!(tree.is_empty());
    assert!(tree.root_is_leaf().unwrap());
    assert_eq!(tree.leaf_count().unwrap(), 0);
}

/// A random mix of inserts/erases across a handful of keys, checked against
/// a reference multimap built from `HashMap<K, HashSet<V>>`.
///
/// Grounded in `examples/NLincoln-tree-data/btree-fuzzer`'s reference-model
/// fuzz pattern, adapted to the multimap's duplicate-key shape.
#[test]
fn random_insert_erase_matches_reference_multimap() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::{HashMap, HashSet};

    let dir = tempfile::tempdir().unwrap();
    let tree = open(&dir, "t");
    let mut reference: HashMap<u64, HashSet<i32>> = HashMap::new();
    let mut rng = StdRng::seed_from_u64(0xBADF00D);

    for _ in 0..500 {
        let k = rng.gen_range(0..10u64);
        let v = rng.gen_range(0..30i32);
        if rng.gen_bool(0.7) {
            tree.insert(key(k), v).unwrap();
            reference.entry(k).or_default().insert(v);
        } else if let Some(set) = reference.get_mut(&k) {
            let existed = set.remove(&v);
            assert_eq!(tree.erase(&key(k), &v).unwrap(), existed);
            if set.is_empty() {
                reference.remove(&k);
            }
        } else {
            assert!(!tree.erase(&key(k), &v).unwrap());
        }
    }

    for k in 0..10u64 {
        let mut expected: Vec<i32> = reference.get(&k).cloned().unwrap_or_default().into_iter().collect();
        expected.sort();
        let mut actual = tree.find(&key(k)).unwrap();
        actual.sort();
        assert_eq!(actual, expected);
    }
}
