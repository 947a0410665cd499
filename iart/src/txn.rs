use std::cmp::Ordering as CmpOrdering;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::config::TxnConfig;
use crate::iter::RawIter;
use crate::keys::{StoredKey, encode_body, longest_common_prefix};
use crate::node::{Content, Node, NodeKind, NodeRef};
use crate::partials::Prefix;
use crate::tree::Tree;
use crate::watch::WatchHandle;

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// Versions start at 1, so nodes built outside any transaction (version 0) are never written in
/// place.
fn next_version() -> u64 {
    NEXT_VERSION.fetch_add(1, Ordering::Relaxed)
}

/// Copy-on-write state and watch tracking for one transaction. Kept apart from the working root
/// so a recursive mutation can hold a child slot and the context at once.
struct WriteContext {
    version: u64,
    track_mutate: bool,
    tracked: HashSet<WatchHandle>,
    overflow: bool,
    max_tracked: usize,
}

impl WriteContext {
    fn new(config: &TxnConfig) -> Self {
        Self {
            version: next_version(),
            track_mutate: config.track_mutate,
            tracked: HashSet::new(),
            overflow: false,
            max_tracked: config.modified_cache_size,
        }
    }

    /// Record a handle to close on notify. Past `max_tracked` handles the set is dropped and
    /// notify diffs the trees instead.
    fn track(&mut self, watch: &WatchHandle) {
        if !self.track_mutate || self.overflow {
            return;
        }
        self.tracked.insert(watch.clone());
        if self.tracked.len() > self.max_tracked {
            debug!(max_tracked = self.max_tracked, "watch tracking overflowed");
            self.overflow = true;
            self.tracked = HashSet::new();
        }
    }

    /// Make the inner node in `slot` writable by this transaction. A node created by this
    /// transaction and not shared is returned as is; anything else is copied into the slot and
    /// the original's handle tracked.
    fn writable<'a, V>(&mut self, slot: &'a mut NodeRef<V>) -> &'a mut Node<V> {
        if slot.version != self.version || Arc::get_mut(slot).is_none() {
            let copy = slot.cow_clone(self.version);
            self.track(&slot.watch);
            *slot = Arc::new(copy);
        }
        match Arc::get_mut(slot) {
            Some(node) => node,
            None => unreachable!("freshly copied node is shared"),
        }
    }

    fn insert_recurse<V: Clone>(
        &mut self,
        slot: &mut NodeRef<V>,
        key: &StoredKey,
        value: V,
        depth: usize,
    ) -> Option<V> {
        let k = key.as_slice();

        if let Content::Leaf(leaf) = &slot.content {
            if leaf.key == *key {
                let old = leaf.value.clone();
                self.track(&slot.watch);
                *slot = Arc::new(Node::new_leaf(key.clone(), value, self.version));
                return Some(old);
            }

            // Split the leaf: a new inner node takes the common run and both leaves hang off it.
            let existing = leaf.key.as_slice();
            let common = longest_common_prefix(existing, k, depth);
            let mut inner = Node::new_node4(Prefix::from_key(k, depth, common), self.version);
            inner.add_child(existing[depth + common], Arc::clone(slot));
            inner.add_child(
                k[depth + common],
                Arc::new(Node::new_leaf(key.clone(), value, self.version)),
            );
            *slot = Arc::new(inner);
            return None;
        }

        let mut depth = depth;
        let plen = slot.prefix.len();
        if plen > 0 {
            let mismatch = slot.prefix_mismatch(k, depth);
            if mismatch < plen {
                // Split the prefix: the common part moves to a new parent, the rest stays on the
                // existing node below the separator byte.
                let (sep, rest) = if slot.prefix.is_overflowed() {
                    let Some(min_leaf) = slot.minimum() else {
                        unreachable!("inner node without leaves");
                    };
                    let lk = min_leaf.key.as_slice();
                    (
                        lk[depth + mismatch],
                        Prefix::from_key(lk, depth + mismatch + 1, plen - mismatch - 1),
                    )
                } else {
                    (
                        slot.prefix.inline()[mismatch],
                        slot.prefix.trimmed(mismatch + 1),
                    )
                };
                let mut existing = Arc::clone(slot);
                self.writable(&mut existing).prefix = rest;

                let mut inner = Node::new_node4(Prefix::from_key(k, depth, mismatch), self.version);
                inner.add_child(sep, existing);
                inner.add_child(
                    k[depth + mismatch],
                    Arc::new(Node::new_leaf(key.clone(), value, self.version)),
                );
                *slot = Arc::new(inner);
                return None;
            }
            depth += plen;
        }

        let sep = k[depth];
        let node = self.writable(slot);
        if let Some(child) = node.find_child_mut(sep) {
            return self.insert_recurse(child, key, value, depth + 1);
        }
        node.add_child(
            sep,
            Arc::new(Node::new_leaf(key.clone(), value, self.version)),
        );
        None
    }

    /// Remove the subtree reached from `slot` by following `separators`, folding any `Node4` left
    /// with a single child into that child on the way back up.
    fn remove_path<V>(
        &mut self,
        slot: &mut NodeRef<V>,
        separators: &[u8],
        is_root: bool,
    ) -> Option<NodeRef<V>> {
        let (&sep, rest) = separators.split_first()?;
        let node = self.writable(slot);
        let removed = if rest.is_empty() {
            node.remove_child(sep)?
        } else {
            self.remove_path(node.find_child_mut(sep)?, rest, false)?
        };
        if !is_root {
            self.collapse(slot);
        }
        Some(removed)
    }

    fn collapse<V>(&mut self, slot: &mut NodeRef<V>) {
        let Some(node) = Arc::get_mut(slot) else {
            return;
        };
        if node.kind() != NodeKind::Node4 || node.num_children() != 1 {
            return;
        }
        let parent_prefix = node.prefix;
        let Some((sep, mut child)) = node.take_sole_child() else {
            return;
        };
        if !child.is_leaf() {
            let child_node = self.writable(&mut child);
            child_node.prefix = Prefix::joined(&parent_prefix, sep, &child_node.prefix);
        }
        trace!(sep, prefix_len = child.prefix.len(), "collapsed node4 into its child");
        *slot = child;
    }

    /// Track every handle in a removed subtree, returning how many leaves it held.
    fn retire_subtree<V>(&mut self, subtree: &Node<V>) -> usize {
        let mut leaves = 0;
        let mut stack = vec![subtree];
        while let Some(node) = stack.pop() {
            self.track(&node.watch);
            if node.is_leaf() {
                leaves += 1;
            }
            stack.extend(node.children().map(|(_, child)| &**child));
        }
        leaves
    }
}

/// A batch of mutations against a snapshot of a [`Tree`].
///
/// The snapshot the transaction started from is never modified. Nodes the transaction copies
/// are mutated in place until commit, after which they are frozen. With `track_mutate` on, the
/// watch handles of every replaced node are closed on [`Txn::notify`].
pub struct Txn<V> {
    root: NodeRef<V>,
    snapshot: NodeRef<V>,
    size: usize,
    writer: WriteContext,
}

impl<V> Txn<V> {
    pub(crate) fn new(root: NodeRef<V>, size: usize, config: &TxnConfig) -> Self {
        Self {
            snapshot: Arc::clone(&root),
            root,
            size,
            writer: WriteContext::new(config),
        }
    }

    /// Toggle recording of modified nodes for notify.
    pub fn track_mutate(&mut self, track: bool) {
        self.writer.track_mutate = track;
    }

    pub fn root(&self) -> &Node<V> {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> Option<&V> {
        let key = StoredKey::new_from_slice(key.as_ref());
        self.root.lookup(key.as_slice(), 0).map(|leaf| leaf.value())
    }

    pub fn get_watch<K: AsRef<[u8]>>(&self, key: K) -> (WatchHandle, Option<&V>) {
        let key = StoredKey::new_from_slice(key.as_ref());
        self.root.lookup_watch(key.as_slice())
    }

    /// Produce the tree as it stands without firing notifications. Nodes written so far are
    /// frozen; later writes in this transaction copy them again.
    pub fn commit_only(&mut self) -> Tree<V> {
        self.writer.version = next_version();
        debug!(
            size = self.size,
            tracked = self.writer.tracked.len(),
            overflow = self.writer.overflow,
            "committed transaction"
        );
        Tree::from_parts(Arc::clone(&self.root), self.size)
    }

    /// Close the handles of everything modified since the last notify.
    pub fn notify(&mut self) {
        if !self.writer.track_mutate {
            return;
        }
        if self.writer.overflow {
            debug!("falling back to tree diff for notifications");
            self.slow_notify();
        } else {
            for watch in self.writer.tracked.drain() {
                watch.close();
            }
        }
        self.writer.tracked = HashSet::new();
        self.writer.overflow = false;
        self.snapshot = Arc::clone(&self.root);
    }

    pub fn commit(mut self) -> Tree<V> {
        let tree = self.commit_only();
        self.notify();
        tree
    }

    /// Walk the snapshot and the working tree in path order, closing the handle of every old
    /// node that was removed or replaced.
    fn slow_notify(&self) {
        let mut old = RawIter::new(&self.snapshot);
        let mut new = RawIter::new(&self.root);
        let mut closed = 0usize;
        while let Some(old_node) = old.front() {
            let Some(new_node) = new.front() else {
                old_node.watch.close();
                closed += 1;
                old.advance();
                continue;
            };
            match old.path().cmp(new.path()) {
                CmpOrdering::Less => {
                    old_node.watch.close();
                    closed += 1;
                    old.advance();
                }
                CmpOrdering::Greater => new.advance(),
                CmpOrdering::Equal => {
                    if std::ptr::eq(old_node, new_node) {
                        old.skip_subtree();
                        new.skip_subtree();
                    } else {
                        old_node.watch.close();
                        closed += 1;
                        old.advance();
                        new.advance();
                    }
                }
            }
        }
        debug!(closed, "tree diff notified watchers");
    }
}

impl<V: Clone> Txn<V> {
    /// Insert or replace the value under `key`, returning the previous value.
    pub fn insert<K: AsRef<[u8]>>(&mut self, key: K, value: V) -> Option<V> {
        let key = StoredKey::new_from_slice(key.as_ref());
        let old = self.writer.insert_recurse(&mut self.root, &key, value, 0);
        if old.is_none() {
            self.size += 1;
        }
        old
    }

    /// Remove `key`, returning its value.
    pub fn delete<K: AsRef<[u8]>>(&mut self, key: K) -> Option<V> {
        let key = StoredKey::new_from_slice(key.as_ref());
        // The only stored key starting with a full stored key is that key itself.
        let (separators, _) = self.root.seek_prefix(key.as_slice())?;
        let removed = self.writer.remove_path(&mut self.root, &separators, true)?;
        let leaf = removed.leaf()?;
        self.writer.track(&removed.watch);
        self.size -= 1;
        Some(leaf.value().clone())
    }

    /// Remove every entry whose key starts with `prefix`, returning how many were removed.
    pub fn delete_prefix<K: AsRef<[u8]>>(&mut self, prefix: K) -> usize {
        let body = encode_body(prefix.as_ref());
        let Some((separators, _)) = self.root.seek_prefix(&body) else {
            return 0;
        };
        let Some(removed) = self.writer.remove_path(&mut self.root, &separators, true) else {
            return 0;
        };
        let leaves = self.writer.retire_subtree(&removed);
        self.size -= leaves;
        debug!(removed = leaves, "deleted prefix");
        leaves
    }
}

impl<V> Clone for Txn<V> {
    /// An independent transaction over the same working tree. Tracking starts off and the
    /// clone writes under its own version, so neither side can disturb the other's nodes.
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            snapshot: Arc::clone(&self.snapshot),
            size: self.size,
            writer: WriteContext::new(&TxnConfig {
                modified_cache_size: self.writer.max_tracked,
                track_mutate: false,
            }),
        }
    }
}
