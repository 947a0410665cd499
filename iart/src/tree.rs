use std::sync::Arc;

use crate::config::TxnConfig;
use crate::error::ConfigError;
use crate::iter::{Iter, PathIter};
use crate::keys::StoredKey;
use crate::node::{Leaf, Node, NodeRef};
use crate::partials::Prefix;
use crate::txn::Txn;
use crate::watch::WatchHandle;

/// Read-side traversals available on any subtree.
impl<V> Node<V> {
    /// All entries beneath this node in ascending key order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(self)
    }

    /// Every entry whose key is a prefix of `path`, shortest first.
    pub fn path_iter(&self, path: &[u8]) -> PathIter<'_, V> {
        PathIter::new(self, path)
    }

    /// Visit entries in order until `f` returns true.
    pub fn walk<F>(&self, f: F)
    where
        F: FnMut(&[u8], &V) -> bool,
    {
        walk_entries(self.iter(), f);
    }

    /// Visit, in order, the entries whose key starts with `prefix` until `f` returns true.
    pub fn walk_prefix<F>(&self, prefix: &[u8], f: F)
    where
        F: FnMut(&[u8], &V) -> bool,
    {
        let mut iter = self.iter();
        iter.seek_prefix(prefix);
        walk_entries(iter, f);
    }

    /// Visit the entries whose key is a prefix of `path`, shortest first, until `f` returns
    /// true.
    pub fn walk_path<F>(&self, path: &[u8], f: F)
    where
        F: FnMut(&[u8], &V) -> bool,
    {
        walk_entries(self.path_iter(path), f);
    }
}

fn walk_entries<'a, V: 'a, F>(entries: impl Iterator<Item = (Vec<u8>, &'a V)>, mut f: F)
where
    F: FnMut(&[u8], &V) -> bool,
{
    for (key, value) in entries {
        if f(&key, value) {
            break;
        }
    }
}

/// An immutable adaptive radix tree.
///
/// A `Tree` is a snapshot: cloning is O(1) and shares every node. Mutation goes through a
/// [`Txn`], which copies the nodes on the path it changes and produces a new `Tree` on commit,
/// leaving every earlier snapshot intact.
pub struct Tree<V> {
    root: NodeRef<V>,
    size: usize,
}

impl<V> Clone for Tree<V> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            size: self.size,
        }
    }
}

impl<V> Default for Tree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Tree<V> {
    pub fn new() -> Self {
        Self {
            root: Arc::new(Node::new_node4(Prefix::empty(), 0)),
            size: 0,
        }
    }

    pub(crate) fn from_parts(root: NodeRef<V>, size: usize) -> Self {
        Self { root, size }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn root(&self) -> &Node<V> {
        &self.root
    }

    /// Start a transaction against this snapshot with default settings.
    pub fn txn(&self) -> Txn<V> {
        Txn::new(Arc::clone(&self.root), self.size, &TxnConfig::default())
    }

    pub fn txn_with_config(&self, config: TxnConfig) -> Result<Txn<V>, ConfigError> {
        config.validate()?;
        Ok(Txn::new(Arc::clone(&self.root), self.size, &config))
    }

    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> Option<&V> {
        let key = StoredKey::new_from_slice(key.as_ref());
        self.root.lookup(key.as_slice(), 0).map(Leaf::value)
    }

    /// Look up `key`, returning a handle that is closed when the entry, or the part of the tree
    /// where it would live, changes.
    pub fn get_watch<K: AsRef<[u8]>>(&self, key: K) -> (WatchHandle, Option<&V>) {
        let key = StoredKey::new_from_slice(key.as_ref());
        self.root.lookup_watch(key.as_slice())
    }

    /// The entry with the longest key that is a prefix of `key`.
    pub fn longest_prefix<K: AsRef<[u8]>>(&self, key: K) -> Option<(Vec<u8>, &V)> {
        self.root.path_iter(key.as_ref()).last()
    }

    pub fn minimum(&self) -> Option<&Leaf<V>> {
        self.root.minimum()
    }

    pub fn maximum(&self) -> Option<&Leaf<V>> {
        self.root.maximum()
    }

    pub fn iter(&self) -> Iter<'_, V> {
        self.root.iter()
    }

    pub fn path_iter<K: AsRef<[u8]>>(&self, path: K) -> PathIter<'_, V> {
        self.root.path_iter(path.as_ref())
    }

    pub fn walk<F>(&self, f: F)
    where
        F: FnMut(&[u8], &V) -> bool,
    {
        self.root.walk(f)
    }

    pub fn walk_prefix<K: AsRef<[u8]>, F>(&self, prefix: K, f: F)
    where
        F: FnMut(&[u8], &V) -> bool,
    {
        self.root.walk_prefix(prefix.as_ref(), f)
    }

    pub fn walk_path<K: AsRef<[u8]>, F>(&self, path: K, f: F)
    where
        F: FnMut(&[u8], &V) -> bool,
    {
        self.root.walk_path(path.as_ref(), f)
    }
}

/// One-shot mutations. Each runs a transaction without change tracking and commits it into
/// `self`; watchers are not notified. Use a [`Txn`] with tracking enabled for that.
impl<V: Clone> Tree<V> {
    pub fn insert<K: AsRef<[u8]>>(&mut self, key: K, value: V) -> Option<V> {
        let mut txn = self.txn();
        let old = txn.insert(key, value);
        *self = txn.commit();
        old
    }

    pub fn delete<K: AsRef<[u8]>>(&mut self, key: K) -> Option<V> {
        let mut txn = self.txn();
        let old = txn.delete(key);
        if old.is_some() {
            *self = txn.commit();
        }
        old
    }

    /// Remove every entry whose key starts with `prefix`, returning how many were removed.
    pub fn delete_prefix<K: AsRef<[u8]>>(&mut self, prefix: K) -> usize {
        let mut txn = self.txn();
        let removed = txn.delete_prefix(prefix);
        if removed > 0 {
            *self = txn.commit();
        }
        removed
    }
}

impl<K: AsRef<[u8]>, V: Clone> FromIterator<(K, V)> for Tree<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut txn = Tree::new().txn();
        for (key, value) in iter {
            txn.insert(key, value);
        }
        txn.commit()
    }
}
