#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use iart::{Tree, Txn};

#[derive(Arbitrary, Debug, Clone)]
enum TxnOp {
    Get { key: Vec<u8> },
    Insert { key: Vec<u8>, val: u16 },
    Delete { key: Vec<u8> },
    DeletePrefix { prefix: Vec<u8> },
    LongestPrefix { path: Vec<u8> },
    Commit,
    Fork,
}

fn short(mut key: Vec<u8>) -> Vec<u8> {
    key.truncate(12);
    key
}

fuzz_target!(|ops: Vec<TxnOp>| {
    let mut txn: Txn<u16> = Tree::new().txn();
    let mut reference = BTreeMap::<Vec<u8>, u16>::new();
    let mut snapshots: Vec<(Tree<u16>, BTreeMap<Vec<u8>, u16>)> = Vec::new();
    let mut forks: Vec<(Txn<u16>, BTreeMap<Vec<u8>, u16>)> = Vec::new();

    for op in ops {
        match op {
            TxnOp::Get { key } => {
                let key = short(key);
                assert_eq!(txn.get(&key), reference.get(&key), "get {key:?}");
            }
            TxnOp::Insert { key, val } => {
                let key = short(key);
                let old = txn.insert(&key, val);
                assert_eq!(old, reference.insert(key.clone(), val), "insert {key:?}");
            }
            TxnOp::Delete { key } => {
                let key = short(key);
                assert_eq!(txn.delete(&key), reference.remove(&key), "delete {key:?}");
            }
            TxnOp::DeletePrefix { prefix } => {
                let prefix = short(prefix);
                let before = reference.len();
                reference.retain(|k, _| !k.starts_with(&prefix));
                assert_eq!(
                    txn.delete_prefix(&prefix),
                    before - reference.len(),
                    "delete_prefix {prefix:?}"
                );
            }
            TxnOp::LongestPrefix { path } => {
                let path = short(path);
                let expected = reference
                    .iter()
                    .filter(|(k, _)| path.starts_with(k))
                    .max_by_key(|(k, _)| k.len())
                    .map(|(k, v)| (k.clone(), v));
                let tree = txn.commit_only();
                assert_eq!(tree.longest_prefix(&path), expected, "longest_prefix {path:?}");
            }
            TxnOp::Commit => {
                snapshots.push((txn.commit_only(), reference.clone()));
            }
            TxnOp::Fork => {
                // The fork takes a few writes of its own; neither side may see the other's.
                let mut fork = txn.clone();
                let mut fork_reference = reference.clone();
                for (i, key) in reference.keys().take(3).enumerate() {
                    fork.insert(key, i as u16);
                    fork_reference.insert(key.clone(), i as u16);
                }
                forks.push((fork, fork_reference));
            }
        }
        assert_eq!(txn.len(), reference.len());
    }

    let tree = txn.commit();
    let entries: Vec<(Vec<u8>, u16)> = tree.iter().map(|(k, v)| (k, *v)).collect();
    let expected: Vec<(Vec<u8>, u16)> = reference.into_iter().collect();
    assert_eq!(entries, expected, "final tree");

    for (snapshot, snapshot_reference) in &snapshots {
        let entries: Vec<(Vec<u8>, u16)> = snapshot.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(Vec<u8>, u16)> =
            snapshot_reference.iter().map(|(k, v)| (k.clone(), *v)).collect();
        assert_eq!(entries, expected, "snapshot drifted after later writes");
    }

    for (fork, fork_reference) in forks {
        let tree = fork.commit();
        let entries: Vec<(Vec<u8>, u16)> = tree.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(Vec<u8>, u16)> = fork_reference.into_iter().collect();
        assert_eq!(entries, expected, "fork drifted");
    }
});
