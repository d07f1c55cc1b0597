//! Property-based tests for the `tree` module.
//!
//! Differential testing against `BTreeMap` as an oracle, with the red-black
//! invariants audited by explicit traversal after every operation.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;

use keynode::{Node, NodeTree, RejectReason};
use proptest::prelude::*;

// ============================================================================
//  Strategies
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Insert(u64),
    Remove(u64),
    Find(u64),
    Replace(u64),
}

/// A small key space forces duplicate inserts and remove misses.
fn operations(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    let key = 0_u64..48;
    prop::collection::vec(
        prop_oneof![
            4 => key.clone().prop_map(Op::Insert),
            3 => key.clone().prop_map(Op::Remove),
            2 => key.clone().prop_map(Op::Find),
            1 => key.prop_map(Op::Replace),
        ],
        0..=max_ops,
    )
}

fn unique_keys(max_count: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::hash_set(any::<u64>(), 0..=max_count)
        .prop_map(|set| set.into_iter().collect())
}

// ============================================================================
//  Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every inserted key is findable; every other key is absent.
    #[test]
    fn insert_then_find(keys in unique_keys(128)) {
        let tree: NodeTree<u64> = NodeTree::new();
        for &key in &keys {
            prop_assert!(tree.insert(Node::new(key, key)).unwrap().is_inserted());
        }
        let stats = tree.validate().unwrap();
        prop_assert_eq!(stats.len, keys.len());

        for &key in &keys {
            prop_assert_eq!(tree.find(key).unwrap().map(|n| n.key()), Some(key));
        }
        for probe in 0_u64..64 {
            let expected = keys.contains(&probe);
            prop_assert_eq!(tree.find(probe).unwrap().is_some(), expected);
        }
    }

    /// The tree behaves like `BTreeMap` across mixed operations, and the
    /// red-black invariants hold after every single step.
    #[test]
    fn mixed_operations_match_btreemap(ops in operations(96)) {
        let tree: NodeTree<u64> = NodeTree::new();
        let mut oracle: BTreeMap<u64, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key) => {
                    let outcome = tree.insert(Node::new(key, key)).unwrap();
                    if oracle.contains_key(&key) {
                        // occupant stays; the new node is handed back
                        let handed_back = outcome.into_occupied().unwrap();
                        prop_assert_eq!(handed_back.key(), key);
                    } else {
                        prop_assert!(outcome.is_inserted());
                        oracle.insert(key, key);
                    }
                }
                Op::Remove(key) => {
                    let got = tree.remove(key).unwrap().map(|n| n.key());
                    prop_assert_eq!(got, oracle.remove(&key).map(|_| key));
                }
                Op::Find(key) => {
                    let got = tree.find(key).unwrap().map(|n| *n.value());
                    prop_assert_eq!(got, oracle.get(&key).copied());
                }
                Op::Replace(key) => match tree.replace(Node::new(key, key + 1000)) {
                    Ok(old) => {
                        let prior = oracle.insert(key, key + 1000);
                        prop_assert_eq!(Some(*old.value()), prior);
                    }
                    Err(rejected) => {
                        prop_assert_eq!(rejected.reason, RejectReason::KeyNotFound);
                        prop_assert!(!oracle.contains_key(&key));
                    }
                },
            }
            let stats = tree.validate().unwrap();
            prop_assert_eq!(stats.len, oracle.len());
        }
    }

    /// Inserting then draining in any order leaves an empty, valid tree.
    #[test]
    fn drain_leaves_empty_tree(keys in unique_keys(96), seed in any::<u64>()) {
        let tree: NodeTree<u64> = NodeTree::new();
        for &key in &keys {
            tree.insert(Node::new(key, key)).unwrap();
        }

        // Deterministic shuffle of the removal order.
        let mut order = keys.clone();
        let mut state = seed | 1;
        for i in (1..order.len()).rev() {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            #[allow(clippy::cast_possible_truncation)]
            let j = (state >> 33) as usize % (i + 1);
            order.swap(i, j);
        }

        for &key in &order {
            prop_assert_eq!(tree.remove(key).unwrap().map(|n| n.key()), Some(key));
            tree.validate().unwrap();
        }
        prop_assert!(tree.is_empty().unwrap());
        prop_assert_eq!(tree.validate().unwrap().len, 0);
    }

    /// Balance bound: the black height of `n` members is at most
    /// `log2(n+1) + 1` (nil level included), which bounds total height.
    #[test]
    fn black_height_is_logarithmic(keys in unique_keys(200)) {
        let tree: NodeTree<u64> = NodeTree::new();
        for &key in &keys {
            tree.insert(Node::new(key, key)).unwrap();
        }
        let stats = tree.validate().unwrap();
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bound = ((keys.len() + 1) as f64).log2() as usize + 2;
        prop_assert!(
            stats.black_height <= bound,
            "black height {} over bound {} for {} members",
            stats.black_height, bound, keys.len()
        );
    }
}
