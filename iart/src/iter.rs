use crate::keys::{TERMINATOR, encode_body, prefix_boundaries};
use crate::node::{Content, Node};

/// Depth-first, in-order iterator over the leaves beneath a node.
///
/// Children are pushed in reverse key order so pops come out ascending.
pub struct Iter<'a, V> {
    root: &'a Node<V>,
    stack: Vec<&'a Node<V>>,
    prefix: Option<Vec<u8>>,
    current: Option<&'a Node<V>>,
}

impl<'a, V> Iter<'a, V> {
    pub(crate) fn new(root: &'a Node<V>) -> Self {
        Self {
            root,
            stack: vec![root],
            prefix: None,
            current: None,
        }
    }

    /// Restart the iteration at the subtree holding every key that starts with `prefix`. If no
    /// such key exists the iterator is left empty.
    pub fn seek_prefix(&mut self, prefix: &[u8]) {
        let body = encode_body(prefix);
        self.stack.clear();
        self.current = None;
        if let Some((_, node)) = self.root.seek_prefix(&body) {
            self.stack.push(node);
        }
        self.prefix = Some(body);
    }

    /// The next entry, without consuming it.
    pub fn front(&mut self) -> Option<(Vec<u8>, &'a V)> {
        let node = self.next_leaf()?;
        self.stack.push(node);
        node.leaf().map(|leaf| (leaf.key(), &leaf.value))
    }

    /// Key of the entry most recently returned by `next`.
    pub fn path(&self) -> Option<Vec<u8>> {
        self.current.and_then(Node::leaf).map(|leaf| leaf.key())
    }

    fn next_leaf(&mut self) -> Option<&'a Node<V>> {
        while let Some(node) = self.stack.pop() {
            if let Content::Leaf(leaf) = &node.content {
                let matched = match &self.prefix {
                    Some(body) => leaf.key.as_slice().starts_with(body),
                    None => true,
                };
                if matched {
                    return Some(node);
                }
                continue;
            }
            self.stack.extend(node.children().rev().map(|(_, child)| &**child));
        }
        None
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (Vec<u8>, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next_leaf()?;
        self.current = Some(node);
        node.leaf().map(|leaf| (leaf.key(), &leaf.value))
    }
}

/// Pre-order walk over every node, inner nodes included, tagged with the node's path: the stored
/// key bytes up to the end of its compressed prefix, or the full stored key for a leaf.
///
/// Paths are unique within a tree and come out in ascending order, which lets two trees be
/// compared in lockstep.
pub struct RawIter<'a, V> {
    stack: Vec<(&'a Node<V>, Vec<u8>)>,
    front: Option<(&'a Node<V>, Vec<u8>)>,
}

impl<'a, V> RawIter<'a, V> {
    pub fn new(root: &'a Node<V>) -> Self {
        let mut iter = Self {
            stack: vec![(root, Vec::new())],
            front: None,
        };
        iter.load_front();
        iter
    }

    /// The current node, or `None` once the walk is finished.
    pub fn front(&self) -> Option<&'a Node<V>> {
        self.front.as_ref().map(|(node, _)| *node)
    }

    /// The current node's path.
    pub fn path(&self) -> &[u8] {
        self.front
            .as_ref()
            .map(|(_, path)| path.as_slice())
            .unwrap_or_default()
    }

    /// Move to the next node in pre-order.
    pub fn advance(&mut self) {
        if let Some((node, path)) = self.front.take() {
            for (sep, child) in node.children().rev() {
                let mut child_path = Vec::with_capacity(path.len() + 1);
                child_path.extend_from_slice(&path);
                child_path.push(sep);
                self.stack.push((&**child, child_path));
            }
        }
        self.load_front();
    }

    /// Move past the current node and everything beneath it.
    pub fn skip_subtree(&mut self) {
        self.front = None;
        self.load_front();
    }

    fn load_front(&mut self) {
        self.front = self.stack.pop().map(|(node, mut path)| {
            match &node.content {
                Content::Leaf(leaf) => {
                    path.clear();
                    path.extend_from_slice(leaf.key.as_slice());
                }
                _ => {
                    let depth = path.len();
                    path.extend_from_slice(node.full_prefix(depth));
                }
            }
            (node, path)
        });
    }
}

/// Yields every stored key that is a prefix of a query path, shortest first.
pub struct PathIter<'a, V> {
    body: Vec<u8>,
    cuts: Vec<usize>,
    next_cut: usize,
    node: &'a Node<V>,
    depth: usize,
    done: bool,
}

impl<'a, V> PathIter<'a, V> {
    pub(crate) fn new(root: &'a Node<V>, path: &[u8]) -> Self {
        let body = encode_body(path);
        let cuts = prefix_boundaries(&body).collect();
        Self {
            body,
            cuts,
            next_cut: 0,
            node: root,
            depth: 0,
            done: false,
        }
    }

    /// Move the cursor down the query path as far as every candidate of at least `cut` bytes
    /// must also go. Sets `done` when no longer candidate can be stored.
    fn descend(&mut self, cut: usize) {
        loop {
            if self.node.is_leaf() {
                return;
            }
            let full = self.node.full_prefix(self.depth);
            let sep_at = self.depth + full.len();
            if sep_at >= cut {
                return;
            }
            if self.body[self.depth..sep_at] != *full {
                self.done = true;
                return;
            }
            match self.node.find_child(self.body[sep_at]) {
                Some(child) => {
                    self.node = &**child;
                    self.depth = sep_at + 1;
                }
                None => {
                    self.done = true;
                    return;
                }
            }
        }
    }
}

impl<'a, V> Iterator for PathIter<'a, V> {
    type Item = (Vec<u8>, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let cut = *self.cuts.get(self.next_cut)?;
            self.next_cut += 1;
            self.descend(cut);

            let mut candidate = Vec::with_capacity(cut + TERMINATOR.len());
            candidate.extend_from_slice(&self.body[..cut]);
            candidate.extend_from_slice(&TERMINATOR);
            let node = self.node;
            if let Some(leaf) = node.lookup(&candidate, self.depth) {
                return Some((leaf.key(), &leaf.value));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::Tree;

    fn keys<'a, V: 'a>(iter: impl Iterator<Item = (Vec<u8>, &'a V)>) -> Vec<String> {
        iter.map(|(k, _)| String::from_utf8(k).unwrap()).collect()
    }

    #[test]
    fn test_iter_ordered() {
        let mut tree = Tree::new();
        for (i, k) in ["b", "a", "ab", "", "ba", "aa", "a\0"].iter().enumerate() {
            tree.insert(k, i);
        }
        assert_eq!(
            keys(tree.iter()),
            vec!["", "a", "a\0", "aa", "ab", "b", "ba"]
        );
    }

    #[test]
    fn test_seek_prefix() {
        let tree: Tree<u32> = ["foo", "foobar", "foozip", "fob", "bar", "foo/x"]
            .iter()
            .enumerate()
            .map(|(i, k)| (*k, i as u32))
            .collect();

        let mut iter = tree.iter();
        iter.seek_prefix(b"foo");
        assert_eq!(keys(iter), vec!["foo", "foo/x", "foobar", "foozip"]);

        let mut iter = tree.iter();
        iter.seek_prefix(b"fooz");
        assert_eq!(keys(iter), vec!["foozip"]);

        let mut iter = tree.iter();
        iter.seek_prefix(b"foozipp");
        assert!(keys(iter).is_empty());

        let mut iter = tree.iter();
        iter.seek_prefix(b"x");
        assert!(keys(iter).is_empty());

        let mut iter = tree.iter();
        iter.seek_prefix(b"");
        assert_eq!(keys(iter).len(), 6);
    }

    #[test]
    fn test_front_does_not_consume() {
        let tree: Tree<u32> = [("a", 1), ("b", 2)].into_iter().collect();
        let mut iter = tree.iter();
        assert_eq!(iter.front(), Some((b"a".to_vec(), &1)));
        assert_eq!(iter.front(), Some((b"a".to_vec(), &1)));
        assert_eq!(iter.path(), None);
        assert_eq!(iter.next(), Some((b"a".to_vec(), &1)));
        assert_eq!(iter.path(), Some(b"a".to_vec()));
        assert_eq!(iter.next(), Some((b"b".to_vec(), &2)));
        assert_eq!(iter.path(), Some(b"b".to_vec()));
        assert_eq!(iter.front(), None);
    }

    #[test]
    fn test_raw_iter_paths_ascending() {
        let tree: Tree<u32> = ["a", "ab", "abc", "b", "ba", "xyzzy", "xyzzz"]
            .iter()
            .enumerate()
            .map(|(i, k)| (*k, i as u32))
            .collect();
        let mut raw = super::RawIter::new(tree.root());
        let mut paths = Vec::new();
        let mut leaves = 0;
        while let Some(node) = raw.front() {
            if node.is_leaf() {
                leaves += 1;
            }
            paths.push(raw.path().to_vec());
            raw.advance();
        }
        assert_eq!(leaves, 7);
        let mut sorted = paths.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn test_path_iter() {
        let tree: Tree<u32> = [
            "foo",
            "foo/bar",
            "foo/bar/baz",
            "foo/baz/bar",
            "foo/zip/zap",
            "zipzap",
        ]
        .iter()
        .enumerate()
        .map(|(i, k)| (*k, i as u32))
        .collect();

        assert_eq!(
            keys(tree.path_iter(b"foo/bar/bazoo")),
            vec!["foo", "foo/bar", "foo/bar/baz"]
        );
        assert!(keys(tree.path_iter(b"f")).is_empty());
        assert_eq!(keys(tree.path_iter(b"foo/zip/zap")), vec!["foo", "foo/zip/zap"]);
        assert_eq!(keys(tree.path_iter(b"zipzapzop")), vec!["zipzap"]);
        assert!(keys(tree.path_iter(b"")).is_empty());
    }

    #[test]
    fn test_path_iter_with_empty_key_and_nul_bytes() {
        let tree: Tree<u32> = [("", 0), ("a", 1), ("a\0", 2), ("a\0b", 3), ("ab", 4)]
            .into_iter()
            .collect();
        assert_eq!(keys(tree.path_iter(b"a\0bc")), vec!["", "a", "a\0", "a\0b"]);
        assert_eq!(keys(tree.path_iter(b"")), vec![""]);
    }

    #[test]
    fn test_path_iter_single_leaf() {
        let tree: Tree<u32> = [("foo/bar", 1)].into_iter().collect();
        assert_eq!(keys(tree.path_iter(b"foo/bar/baz")), vec!["foo/bar"]);
        assert!(keys(tree.path_iter(b"foo/ba")).is_empty());
    }
}
