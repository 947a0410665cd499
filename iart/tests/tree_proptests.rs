//! Property-based tests for trees and transactions.
//!
//! Differential testing against `BTreeMap`. Keys are drawn from a small alphabet that includes
//! the escape bytes, so prefix splits, node collapses and nul handling come up constantly.

use iart::{Tree, TxnConfig};
use proptest::prelude::*;
use std::collections::BTreeMap;

// ============================================================================
//  Strategies
// ============================================================================

/// Short keys over a handful of bytes, nul and 0xff among them.
fn small_key() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(vec![0u8, 1, b'a', b'b', 0xff]), 0..=6)
}

/// Keys with a long shared head so inner prefixes overflow the inline buffer.
fn long_key() -> impl Strategy<Value = Vec<u8>> {
    small_key().prop_map(|tail| {
        let mut key = b"shared/head/longer/than/inline/".to_vec();
        key.extend(tail);
        key
    })
}

fn any_key() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![3 => small_key(), 1 => long_key()]
}

#[derive(Debug, Clone)]
enum Op {
    Insert(Vec<u8>, u64),
    Delete(Vec<u8>),
    DeletePrefix(Vec<u8>),
    Get(Vec<u8>),
    Commit,
}

fn operations(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            6 => (any_key(), any::<u64>()).prop_map(|(k, v)| Op::Insert(k, v)),
            3 => any_key().prop_map(Op::Delete),
            1 => small_key()
                .prop_map(|mut k| {
                    k.truncate(2);
                    k
                })
                .prop_map(Op::DeletePrefix),
            2 => any_key().prop_map(Op::Get),
            1 => Just(Op::Commit),
        ],
        0..=max_ops,
    )
}

fn entries(tree: &Tree<u64>) -> Vec<(Vec<u8>, u64)> {
    tree.iter().map(|(k, v)| (k, *v)).collect()
}

fn model_entries(model: &BTreeMap<Vec<u8>, u64>) -> Vec<(Vec<u8>, u64)> {
    model.iter().map(|(k, v)| (k.clone(), *v)).collect()
}

// ============================================================================
//  Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// A transaction applying random operations matches the model, and every committed
    /// snapshot keeps matching the model as it was at commit time.
    #[test]
    fn txn_matches_model(ops in operations(200)) {
        let mut tree = Tree::new();
        let mut txn = tree.txn();
        let mut model = BTreeMap::new();
        let mut snapshots = Vec::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => prop_assert_eq!(txn.insert(&k, v), model.insert(k, v)),
                Op::Delete(k) => prop_assert_eq!(txn.delete(&k), model.remove(&k)),
                Op::DeletePrefix(p) => {
                    let doomed: Vec<Vec<u8>> =
                        model.keys().filter(|k| k.starts_with(&p)).cloned().collect();
                    for k in &doomed {
                        model.remove(k);
                    }
                    prop_assert_eq!(txn.delete_prefix(&p), doomed.len());
                }
                Op::Get(k) => prop_assert_eq!(txn.get(&k), model.get(&k)),
                Op::Commit => {
                    tree = txn.commit_only();
                    snapshots.push((tree.clone(), model.clone()));
                }
            }
            prop_assert_eq!(txn.len(), model.len());
        }

        tree = txn.commit();
        prop_assert_eq!(entries(&tree), model_entries(&model));
        for (snapshot, expected) in &snapshots {
            prop_assert_eq!(snapshot.len(), expected.len());
            prop_assert_eq!(entries(snapshot), model_entries(expected));
        }
    }

    /// Minimum and maximum agree with the ends of the model.
    #[test]
    fn min_max_match_model(pairs in prop::collection::vec((any_key(), any::<u64>()), 0..100)) {
        let tree: Tree<u64> = pairs.iter().map(|(k, v)| (k.as_slice(), *v)).collect();
        let model: BTreeMap<Vec<u8>, u64> = pairs.into_iter().collect();
        prop_assert_eq!(tree.minimum().map(|l| l.key()), model.keys().next().cloned());
        prop_assert_eq!(tree.maximum().map(|l| l.key()), model.keys().next_back().cloned());
    }

    /// Every key that is a prefix of the query comes out of the path iterator, shortest first,
    /// and the longest of them is the longest prefix match.
    #[test]
    fn path_iter_matches_brute_force(
        pairs in prop::collection::vec((small_key(), any::<u64>()), 0..60),
        query in small_key(),
    ) {
        let tree: Tree<u64> = pairs.iter().map(|(k, v)| (k.as_slice(), *v)).collect();
        let model: BTreeMap<Vec<u8>, u64> = pairs.into_iter().collect();

        let expected: Vec<(Vec<u8>, u64)> = model
            .iter()
            .filter(|(k, _)| query.starts_with(k))
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        let got: Vec<(Vec<u8>, u64)> = tree.path_iter(&query).map(|(k, v)| (k, *v)).collect();
        prop_assert_eq!(&got, &expected);
        prop_assert_eq!(
            tree.longest_prefix(&query).map(|(k, v)| (k, *v)),
            expected.last().cloned()
        );
    }

    /// Seeking to a prefix yields exactly the model keys starting with it, in order.
    #[test]
    fn seek_prefix_matches_model(
        pairs in prop::collection::vec((any_key(), any::<u64>()), 0..80),
        prefix in small_key(),
    ) {
        let tree: Tree<u64> = pairs.iter().map(|(k, v)| (k.as_slice(), *v)).collect();
        let model: BTreeMap<Vec<u8>, u64> = pairs.into_iter().collect();

        let mut iter = tree.iter();
        iter.seek_prefix(&prefix);
        let got: Vec<Vec<u8>> = iter.map(|(k, _)| k).collect();
        let expected: Vec<Vec<u8>> =
            model.keys().filter(|k| k.starts_with(&prefix)).cloned().collect();
        prop_assert_eq!(got, expected);
    }

    /// With a tiny tracking cache every commit overflows into the tree diff. A watch on a key is
    /// closed exactly when that key's entry changed.
    #[test]
    fn diff_notify_closes_changed_leaves(
        initial in prop::collection::vec((small_key(), any::<u64>()), 1..60),
        ops in operations(60),
    ) {
        let tree: Tree<u64> = initial.iter().map(|(k, v)| (k.as_slice(), *v)).collect();
        let before: BTreeMap<Vec<u8>, u64> = initial.into_iter().collect();
        let watches: Vec<_> = before.keys().map(|k| (k.clone(), tree.get_watch(k).0)).collect();

        let config = TxnConfig { modified_cache_size: 1, track_mutate: true };
        let mut txn = tree.txn_with_config(config).unwrap();
        let mut touched = std::collections::BTreeSet::new();
        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    txn.insert(&k, v);
                    touched.insert(k);
                }
                Op::Delete(k) => {
                    if txn.delete(&k).is_some() {
                        touched.insert(k);
                    }
                }
                Op::DeletePrefix(p) => {
                    touched.extend(before.keys().filter(|k| k.starts_with(&p)).cloned());
                    txn.delete_prefix(&p);
                }
                Op::Get(_) | Op::Commit => {}
            }
        }
        txn.commit();

        for (key, watch) in &watches {
            if touched.contains(key) {
                prop_assert!(watch.is_closed(), "watch on {:?} left open", key);
            }
        }
    }
}
