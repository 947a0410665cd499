use crate::mapping::NodeMapping;
use crate::mapping::indexed_mapping::IndexedMapping;
use crate::utils::u8_keys::{
    u8_keys_find_insert_position_sorted, u8_keys_find_key_position_sorted,
};

/// Maps a key to a node, using a sorted array of keys and a parallel array of children.
/// Used by `Node4` and `Node16`. Keeping keys sorted makes ordered iteration a straight walk,
/// at the price of shifting the tail on insert and delete.
#[derive(Clone)]
pub struct KeyedMapping<N, const WIDTH: usize> {
    pub(crate) keys: [u8; WIDTH],
    pub(crate) children: [Option<N>; WIDTH],
    pub(crate) num_children: u8,
}

impl<N, const WIDTH: usize> Default for KeyedMapping<N, WIDTH> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, const WIDTH: usize> KeyedMapping<N, WIDTH> {
    #[inline]
    pub fn new() -> Self {
        Self {
            keys: [0; WIDTH],
            children: [const { None }; WIDTH],
            num_children: 0,
        }
    }

    /// Move every child of `km` into a mapping of a different width, preserving order.
    pub fn from_resized<const OLD_WIDTH: usize>(km: &mut KeyedMapping<N, OLD_WIDTH>) -> Self {
        let count = km.num_children as usize;
        assert!(count <= WIDTH);
        let mut new = KeyedMapping::new();
        for i in 0..count {
            new.keys[i] = km.keys[i];
            new.children[i] = km.children[i].take();
        }
        new.num_children = km.num_children;
        km.num_children = 0;
        new
    }

    /// Re-derive sorted key/child arrays from a `Node48` index.
    pub(crate) fn from_indexed(im: &mut IndexedMapping<N>) -> Self {
        assert!(im.num_children() <= WIDTH);
        let mut new = KeyedMapping::new();
        for (key, child) in im.drain() {
            let idx = new.num_children as usize;
            new.keys[idx] = key;
            new.children[idx] = Some(child);
            new.num_children += 1;
        }
        new
    }

    /// Remove and return the only child.
    pub fn take_only_child(&mut self) -> Option<(u8, N)> {
        if self.num_children != 1 {
            return None;
        }
        self.num_children = 0;
        self.children[0].take().map(|child| (self.keys[0], child))
    }

    #[inline]
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (u8, &N)> {
        let count = self.num_children as usize;
        self.keys[..count]
            .iter()
            .zip(self.children[..count].iter())
            .filter_map(|(key, child)| child.as_ref().map(|c| (*key, c)))
    }

    pub fn first(&self) -> Option<&N> {
        self.children.first()?.as_ref()
    }

    pub fn last(&self) -> Option<&N> {
        let count = self.num_children as usize;
        self.children[..count].last()?.as_ref()
    }
}

impl<N, const WIDTH: usize> NodeMapping<N, WIDTH> for KeyedMapping<N, WIDTH> {
    fn add_child(&mut self, key: u8, node: N) {
        let count = self.num_children as usize;
        let Some(idx) = u8_keys_find_insert_position_sorted(key, &self.keys, count) else {
            if let Some(existing) = self.seek_child_mut(key) {
                *existing = node;
            }
            return;
        };
        assert!(count < WIDTH, "add_child: no space left");

        for i in (idx..count).rev() {
            self.keys[i + 1] = self.keys[i];
            self.children[i + 1] = self.children[i].take();
        }
        self.keys[idx] = key;
        self.children[idx] = Some(node);
        self.num_children += 1;
    }

    fn seek_child(&self, key: u8) -> Option<&N> {
        let idx = u8_keys_find_key_position_sorted(key, &self.keys, self.num_children as usize)?;
        self.children[idx].as_ref()
    }

    fn seek_child_mut(&mut self, key: u8) -> Option<&mut N> {
        let idx = u8_keys_find_key_position_sorted(key, &self.keys, self.num_children as usize)?;
        self.children[idx].as_mut()
    }

    fn delete_child(&mut self, key: u8) -> Option<N> {
        let count = self.num_children as usize;
        let idx = u8_keys_find_key_position_sorted(key, &self.keys, count)?;
        let node = self.children[idx].take();

        // Shift keys and children to the left.
        for i in idx..count - 1 {
            self.keys[i] = self.keys[i + 1];
            self.children[i] = self.children[i + 1].take();
        }
        self.num_children -= 1;
        node
    }

    #[inline(always)]
    fn num_children(&self) -> usize {
        self.num_children as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_seek_delete() {
        let mut node = KeyedMapping::<u8, 4>::new();
        node.add_child(3, 3);
        node.add_child(1, 1);
        node.add_child(4, 4);
        node.add_child(2, 2);
        assert_eq!(node.num_children(), 4);
        assert!(node.is_full());
        assert_eq!(node.keys, [1, 2, 3, 4]);
        assert_eq!(node.seek_child(1), Some(&1));
        assert_eq!(node.seek_child(4), Some(&4));
        assert_eq!(node.seek_child(5), None);
        *node.seek_child_mut(2).unwrap() = 20;
        assert_eq!(node.seek_child(2), Some(&20));
        assert_eq!(node.delete_child(1), Some(1));
        assert_eq!(node.delete_child(1), None);
        assert_eq!(node.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(node.delete_child(3), Some(3));
        assert_eq!(node.delete_child(4), Some(4));
        assert_eq!(node.take_only_child(), Some((2, 20)));
        assert_eq!(node.num_children(), 0);
    }

    #[test]
    fn test_add_existing_key_replaces() {
        let mut node = KeyedMapping::<&str, 4>::new();
        node.add_child(7, "a");
        node.add_child(7, "b");
        assert_eq!(node.num_children(), 1);
        assert_eq!(node.seek_child(7), Some(&"b"));
    }

    #[test]
    fn test_sorted_with_high_bytes() {
        let mut node = KeyedMapping::<u8, 16>::new();
        for k in [200u8, 3, 129, 255, 0, 127] {
            node.add_child(k, k);
        }
        let keys: Vec<u8> = node.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![0, 3, 127, 129, 200, 255]);
        let rev: Vec<u8> = node.iter().rev().map(|(k, _)| k).collect();
        assert_eq!(rev, vec![255, 200, 129, 127, 3, 0]);
        assert_eq!(node.first(), Some(&0));
        assert_eq!(node.last(), Some(&255));
    }

    #[test]
    fn test_resize_grow_and_shrink() {
        let mut n4 = KeyedMapping::<u8, 4>::new();
        for k in [9, 1, 5] {
            n4.add_child(k, k);
        }
        let mut n16: KeyedMapping<u8, 16> = KeyedMapping::from_resized(&mut n4);
        assert_eq!(n4.num_children(), 0);
        n16.add_child(3, 3);
        assert_eq!(n16.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec![1, 3, 5, 9]);
        n16.delete_child(9);
        let back: KeyedMapping<u8, 4> = KeyedMapping::from_resized(&mut n16);
        assert_eq!(back.iter().map(|(k, v)| (k, *v)).collect::<Vec<_>>(), vec![(1, 1), (3, 3), (5, 5)]);
    }
}
