use std::cmp::min;
use std::sync::Arc;

use tracing::trace;

use crate::keys::StoredKey;
use crate::mapping::NodeMapping;
use crate::mapping::direct_mapping::DirectMapping;
use crate::mapping::indexed_mapping::IndexedMapping;
use crate::mapping::keyed_mapping::KeyedMapping;
use crate::partials::{MAX_PREFIX_LEN, Prefix};
use crate::watch::WatchHandle;

/// Shared pointer to an immutable node. Trees and transactions share subtrees through these.
pub type NodeRef<V> = Arc<Node<V>>;

/// A stored key and its value.
pub struct Leaf<V> {
    pub(crate) key: StoredKey,
    pub(crate) value: V,
}

impl<V> Leaf<V> {
    /// The key as the caller inserted it.
    pub fn key(&self) -> Vec<u8> {
        self.key.to_user_key()
    }

    pub fn stored_key(&self) -> &StoredKey {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }
}

/// The fan-out class of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Leaf,
    Node4,
    Node16,
    Node48,
    Node256,
}

pub(crate) enum Content<V> {
    Leaf(Leaf<V>),
    Node4(KeyedMapping<NodeRef<V>, 4>),
    Node16(KeyedMapping<NodeRef<V>, 16>),
    Node48(IndexedMapping<NodeRef<V>>),
    Node256(DirectMapping<NodeRef<V>>),
}

/// A tree node. Leaves carry a key and value; inner nodes carry a compressed prefix and a child
/// index sized to their fan-out. Every node owns a watch handle that is closed when the node is
/// replaced by a transaction commit.
pub struct Node<V> {
    pub(crate) prefix: Prefix,
    pub(crate) content: Content<V>,
    pub(crate) watch: WatchHandle,
    /// The transaction that created this node. Only that transaction may mutate it in place.
    pub(crate) version: u64,
}

impl<V> Node<V> {
    #[inline]
    pub(crate) fn new_leaf(key: StoredKey, value: V, version: u64) -> Self {
        Self {
            prefix: Prefix::empty(),
            content: Content::Leaf(Leaf { key, value }),
            watch: WatchHandle::new(),
            version,
        }
    }

    #[inline]
    pub(crate) fn new_node4(prefix: Prefix, version: u64) -> Self {
        Self {
            prefix,
            content: Content::Node4(KeyedMapping::new()),
            watch: WatchHandle::new(),
            version,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match &self.content {
            Content::Leaf(_) => NodeKind::Leaf,
            Content::Node4(_) => NodeKind::Node4,
            Content::Node16(_) => NodeKind::Node16,
            Content::Node48(_) => NodeKind::Node48,
            Content::Node256(_) => NodeKind::Node256,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(&self.content, Content::Leaf(_))
    }

    pub fn leaf(&self) -> Option<&Leaf<V>> {
        let Content::Leaf(leaf) = &self.content else {
            return None;
        };
        Some(leaf)
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn watch(&self) -> &WatchHandle {
        &self.watch
    }

    pub fn num_children(&self) -> usize {
        match &self.content {
            Content::Node4(n) => n.num_children(),
            Content::Node16(n) => n.num_children(),
            Content::Node48(n) => n.num_children(),
            Content::Node256(n) => n.num_children(),
            Content::Leaf(_) => 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        match &self.content {
            Content::Node4(_) => 4,
            Content::Node16(_) => 16,
            Content::Node48(_) => 48,
            Content::Node256(_) => 256,
            Content::Leaf(_) => 0,
        }
    }

    #[inline]
    pub(crate) fn find_child(&self, key: u8) -> Option<&NodeRef<V>> {
        match &self.content {
            Content::Node4(km) => km.seek_child(key),
            Content::Node16(km) => km.seek_child(key),
            Content::Node48(im) => im.seek_child(key),
            Content::Node256(dm) => dm.seek_child(key),
            Content::Leaf(_) => None,
        }
    }

    pub(crate) fn find_child_mut(&mut self, key: u8) -> Option<&mut NodeRef<V>> {
        match &mut self.content {
            Content::Node4(km) => km.seek_child_mut(key),
            Content::Node16(km) => km.seek_child_mut(key),
            Content::Node48(im) => im.seek_child_mut(key),
            Content::Node256(dm) => dm.seek_child_mut(key),
            Content::Leaf(_) => None,
        }
    }

    /// Add a child, growing to the next fan-out class first if this node is full.
    pub(crate) fn add_child(&mut self, key: u8, child: NodeRef<V>) {
        if self.is_full() && self.find_child(key).is_none() {
            self.grow();
        }

        match &mut self.content {
            Content::Node4(km) => km.add_child(key, child),
            Content::Node16(km) => km.add_child(key, child),
            Content::Node48(im) => im.add_child(key, child),
            Content::Node256(dm) => dm.add_child(key, child),
            Content::Leaf(_) => unreachable!("Should not be possible."),
        }
    }

    /// Remove a child, shrinking to the next smaller fan-out class when the count hits the
    /// demotion threshold. A `Node4` left with one child is folded into its parent slot by the
    /// caller, which is the only place that can replace the node.
    pub(crate) fn remove_child(&mut self, key: u8) -> Option<NodeRef<V>> {
        let (removed, shrink) = match &mut self.content {
            Content::Node4(km) => (km.delete_child(key), false),
            Content::Node16(km) => {
                let removed = km.delete_child(key);
                (removed, km.num_children() == 3)
            }
            Content::Node48(im) => {
                let removed = im.delete_child(key);
                (removed, im.num_children() == 12)
            }
            Content::Node256(dm) => {
                let removed = dm.delete_child(key);
                (removed, dm.num_children() == 37)
            }
            Content::Leaf(_) => unreachable!("Should not be possible."),
        };
        if removed.is_some() && shrink {
            self.shrink();
        }
        removed
    }

    /// Take the only child of a `Node4`, leaving it empty.
    pub(crate) fn take_sole_child(&mut self) -> Option<(u8, NodeRef<V>)> {
        match &mut self.content {
            Content::Node4(km) => km.take_only_child(),
            _ => None,
        }
    }

    #[inline]
    fn is_full(&self) -> bool {
        match &self.content {
            Content::Node4(km) => km.is_full(),
            Content::Node16(km) => km.is_full(),
            Content::Node48(im) => im.is_full(),
            Content::Node256(dm) => dm.is_full(),
            Content::Leaf(_) => unreachable!("Should not be possible."),
        }
    }

    fn grow(&mut self) {
        let from = self.kind();
        let content = match &mut self.content {
            Content::Node4(km) => Content::Node16(KeyedMapping::from_resized(km)),
            Content::Node16(km) => Content::Node48(IndexedMapping::from_keyed(km)),
            Content::Node48(im) => Content::Node256(DirectMapping::from_indexed(im)),
            Content::Node256(_) => unreachable!("Should never grow a node256"),
            Content::Leaf(_) => unreachable!("Should not be possible."),
        };
        self.content = content;
        trace!(?from, to = ?self.kind(), children = self.num_children(), "grew node");
    }

    fn shrink(&mut self) {
        let from = self.kind();
        let content = match &mut self.content {
            Content::Node16(km) => Content::Node4(KeyedMapping::from_resized(km)),
            Content::Node48(im) => Content::Node16(KeyedMapping::from_indexed(im)),
            Content::Node256(dm) => Content::Node48(IndexedMapping::from_direct(dm)),
            Content::Node4(_) => unreachable!("Node4 is collapsed, not shrunk"),
            Content::Leaf(_) => unreachable!("Should not be possible."),
        };
        self.content = content;
        trace!(?from, to = ?self.kind(), children = self.num_children(), "shrank node");
    }

    /// Children in ascending key-byte order.
    pub(crate) fn children(&self) -> Box<dyn DoubleEndedIterator<Item = (u8, &NodeRef<V>)> + '_> {
        match &self.content {
            Content::Node4(km) => Box::new(km.iter()),
            Content::Node16(km) => Box::new(km.iter()),
            Content::Node48(im) => Box::new(im.iter()),
            Content::Node256(dm) => Box::new(dm.iter()),
            Content::Leaf(_) => Box::new(std::iter::empty()),
        }
    }

    /// The leaf with the smallest key beneath this node.
    pub fn minimum(&self) -> Option<&Leaf<V>> {
        let mut node = self;
        loop {
            let next = match &node.content {
                Content::Leaf(leaf) => return Some(leaf),
                Content::Node4(km) => km.first(),
                Content::Node16(km) => km.first(),
                Content::Node48(im) => im.first(),
                Content::Node256(dm) => dm.first(),
            };
            node = next?;
        }
    }

    /// The leaf with the largest key beneath this node.
    pub fn maximum(&self) -> Option<&Leaf<V>> {
        let mut node = self;
        loop {
            let next = match &node.content {
                Content::Leaf(leaf) => return Some(leaf),
                Content::Node4(km) => km.last(),
                Content::Node16(km) => km.last(),
                Content::Node48(im) => im.last(),
                Content::Node256(dm) => dm.last(),
            };
            node = next?;
        }
    }

    /// Like `Prefix::check`, but a prefix longer than the inline buffer is compared in full
    /// against the minimum leaf beneath this node.
    pub(crate) fn prefix_mismatch(&self, key: &[u8], depth: usize) -> usize {
        let matched = self.prefix.check(key, depth);
        if !self.prefix.is_overflowed() || matched < MAX_PREFIX_LEN {
            return matched;
        }
        let Some(leaf) = self.minimum() else {
            return matched;
        };
        let leaf_key = leaf.key.as_slice();
        let limit = min(
            self.prefix.len(),
            min(key.len(), leaf_key.len()).saturating_sub(depth),
        );
        (matched..limit)
            .find(|&i| leaf_key[depth + i] != key[depth + i])
            .unwrap_or(limit)
    }

    /// The complete compressed prefix of this node, for a node that starts at `depth`.
    pub(crate) fn full_prefix(&self, depth: usize) -> &[u8] {
        if !self.prefix.is_overflowed() {
            return self.prefix.inline();
        }
        match self.minimum() {
            Some(leaf) => &leaf.key.as_slice()[depth..depth + self.prefix.len()],
            None => self.prefix.inline(),
        }
    }

    /// A writable copy of an inner node for transaction `version`. Children are shared; the copy
    /// gets its own watch handle.
    pub(crate) fn cow_clone(&self, version: u64) -> Self {
        let content = match &self.content {
            Content::Node4(km) => Content::Node4(km.clone()),
            Content::Node16(km) => Content::Node16(km.clone()),
            Content::Node48(im) => Content::Node48(im.clone()),
            Content::Node256(dm) => Content::Node256(dm.clone()),
            Content::Leaf(_) => unreachable!("leaves are replaced, never copied"),
        };
        Self {
            prefix: self.prefix,
            content,
            watch: WatchHandle::new(),
            version,
        }
    }

    /// Find the leaf stored under `key`, starting at this node which sits at `depth`.
    pub(crate) fn lookup(&self, key: &[u8], depth: usize) -> Option<&Leaf<V>> {
        let mut node = self;
        let mut depth = depth;
        loop {
            if let Content::Leaf(leaf) = &node.content {
                return (leaf.key.as_slice() == key).then_some(leaf);
            }
            let plen = node.prefix.len();
            if plen > 0 {
                if node.prefix.check(key, depth) != min(plen, MAX_PREFIX_LEN) {
                    return None;
                }
                depth += plen;
            }
            if depth >= key.len() {
                return None;
            }
            node = node.find_child(key[depth])?;
            depth += 1;
        }
    }

    /// Like `lookup`, but also returns the watch handle of the leaf when found, or of the deepest
    /// inner node visited when not, so a waiter learns when the key may have appeared.
    pub(crate) fn lookup_watch(&self, key: &[u8]) -> (WatchHandle, Option<&V>) {
        let mut node = self;
        let mut watch = &self.watch;
        let mut depth = 0;
        loop {
            if let Content::Leaf(leaf) = &node.content {
                if leaf.key.as_slice() == key {
                    return (node.watch.clone(), Some(&leaf.value));
                }
                return (watch.clone(), None);
            }
            watch = &node.watch;
            let plen = node.prefix.len();
            if plen > 0 {
                if node.prefix.check(key, depth) != min(plen, MAX_PREFIX_LEN) {
                    return (watch.clone(), None);
                }
                depth += plen;
            }
            if depth >= key.len() {
                return (watch.clone(), None);
            }
            match node.find_child(key[depth]) {
                Some(child) => node = child,
                None => return (watch.clone(), None),
            }
            depth += 1;
        }
    }

    /// The node rooting every key whose encoded body starts with `body`, together with the
    /// separator bytes followed from this node to reach it.
    pub(crate) fn seek_prefix(&self, body: &[u8]) -> Option<(Vec<u8>, &Node<V>)> {
        let mut node = self;
        let mut depth = 0;
        let mut separators = Vec::new();
        loop {
            if depth >= body.len() {
                return Some((separators, node));
            }
            if let Content::Leaf(leaf) = &node.content {
                return leaf
                    .key
                    .as_slice()
                    .starts_with(body)
                    .then_some((separators, node));
            }
            let full = node.full_prefix(depth);
            let remaining = &body[depth..];
            if remaining.len() <= full.len() {
                return full.starts_with(remaining).then_some((separators, node));
            }
            if !remaining.starts_with(full) {
                return None;
            }
            depth += full.len();
            let sep = body[depth];
            node = node.find_child(sep)?;
            separators.push(sep);
            depth += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(key: &str, value: u32) -> NodeRef<u32> {
        Arc::new(Node::new_leaf(StoredKey::from(key), value, 0))
    }

    fn child_value(node: &Node<u32>, key: u8) -> Option<u32> {
        node.find_child(key).and_then(|c| c.leaf()).map(|l| *l.value())
    }

    #[test]
    fn test_n4() {
        let mut n4 = Node::new_node4(Prefix::empty(), 0);
        n4.add_child(5, leaf("e", 1));
        n4.add_child(4, leaf("d", 2));
        n4.add_child(3, leaf("c", 3));
        n4.add_child(2, leaf("b", 4));
        assert_eq!(n4.kind(), NodeKind::Node4);

        assert_eq!(child_value(&n4, 5), Some(1));
        assert_eq!(child_value(&n4, 2), Some(4));

        n4.remove_child(5);
        assert!(n4.find_child(5).is_none());
        assert_eq!(child_value(&n4, 4), Some(2));

        n4.remove_child(2);
        n4.remove_child(3);
        assert_eq!(n4.kind(), NodeKind::Node4);
        let (sep, only) = n4.take_sole_child().unwrap();
        assert_eq!(sep, 4);
        assert_eq!(*only.leaf().unwrap().value(), 2);
    }

    #[test]
    fn test_grow_through_every_class() {
        let mut node = Node::new_node4(Prefix::empty(), 0);
        for i in 0..=255u8 {
            node.add_child(i, leaf("x", i as u32));
            let expected = match node.num_children() {
                0..=4 => NodeKind::Node4,
                5..=16 => NodeKind::Node16,
                17..=48 => NodeKind::Node48,
                _ => NodeKind::Node256,
            };
            assert_eq!(node.kind(), expected, "after {} children", i as usize + 1);
        }
        assert_eq!(node.capacity(), 256);
        for i in 0..=255u8 {
            assert_eq!(child_value(&node, i), Some(i as u32));
        }
        let keys: Vec<u8> = node.children().map(|(k, _)| k).collect();
        assert_eq!(keys, (0..=255u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_shrink_thresholds() {
        let mut node = Node::new_node4(Prefix::empty(), 0);
        for i in 0..=255u8 {
            node.add_child(i, leaf("x", i as u32));
        }
        let mut remaining = 256;
        for i in (0..=255u8).rev() {
            assert_eq!(node.remove_child(i).map(|n| *n.leaf().unwrap().value()), Some(i as u32));
            remaining -= 1;
            let expected = match remaining {
                38..=256 => NodeKind::Node256,
                13..=37 => NodeKind::Node48,
                4..=12 => NodeKind::Node16,
                _ => NodeKind::Node4,
            };
            assert_eq!(node.kind(), expected, "with {remaining} children");
            if remaining == 1 {
                break;
            }
        }
        assert_eq!(child_value(&node, 0), Some(0));
    }

    #[test]
    fn test_add_existing_key_in_full_node_does_not_grow() {
        let mut node = Node::new_node4(Prefix::empty(), 0);
        for i in 0..4u8 {
            node.add_child(i, leaf("x", i as u32));
        }
        node.add_child(2, leaf("y", 20));
        assert_eq!(node.kind(), NodeKind::Node4);
        assert_eq!(child_value(&node, 2), Some(20));
    }

    #[test]
    fn test_minimum_maximum() {
        let mut node = Node::new_node4(Prefix::empty(), 0);
        let mut inner = Node::new_node4(Prefix::empty(), 0);
        inner.add_child(b'b', leaf("mb", 2));
        inner.add_child(b'a', leaf("ma", 1));
        node.add_child(b'm', Arc::new(inner));
        node.add_child(b'z', leaf("z", 3));
        assert_eq!(node.minimum().unwrap().key(), b"ma");
        assert_eq!(node.maximum().unwrap().key(), b"z");
        assert!(Node::<u32>::new_node4(Prefix::empty(), 0).minimum().is_none());
    }

    #[test]
    fn test_prefix_mismatch_reads_overflow_from_leaf() {
        let k1 = StoredKey::from("abcdefghijklmnop1");
        let k2 = StoredKey::from("abcdefghijklmnop2");
        // Prefix covers everything after the marker byte up to the diverging byte.
        let plen = 16;
        let mut node = Node::new_node4(Prefix::from_key(k1.as_slice(), 1, plen), 0);
        node.add_child(k1.at(1 + plen), Arc::new(Node::new_leaf(k1.clone(), 1, 0)));
        node.add_child(k2.at(1 + plen), Arc::new(Node::new_leaf(k2.clone(), 2, 0)));
        assert!(node.prefix.is_overflowed());

        assert_eq!(node.prefix_mismatch(k1.as_slice(), 1), plen);
        let probe = StoredKey::from("abcdefghiXklmnop1");
        assert_eq!(node.prefix_mismatch(probe.as_slice(), 1), 9);
        let probe = StoredKey::from("abcdefghijklmXop1");
        assert_eq!(node.prefix_mismatch(probe.as_slice(), 1), 13);
        assert_eq!(node.full_prefix(1), &k1.as_slice()[1..1 + plen]);
    }

    #[test]
    fn test_cow_clone_shares_children_with_fresh_watch() {
        let mut node = Node::new_node4(Prefix::empty(), 1);
        let child = leaf("a", 1);
        node.add_child(b'a', child.clone());
        let copy = node.cow_clone(2);
        assert_eq!(copy.version, 2);
        assert_ne!(copy.watch, node.watch);
        assert!(Arc::ptr_eq(copy.find_child(b'a').unwrap(), &child));
    }
}
