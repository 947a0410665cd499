use crate::mapping::NodeMapping;
use crate::mapping::indexed_mapping::IndexedMapping;
use crate::utils::bitset::Bitset64;

/// Children indexed directly by key byte, used by `Node256`.
#[derive(Clone)]
pub struct DirectMapping<N> {
    children: Box<[Option<N>; 256]>,
    present: Bitset64<4>,
    num_children: usize,
}

impl<N> Default for DirectMapping<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> DirectMapping<N> {
    pub fn new() -> Self {
        Self {
            children: Box::new([const { None }; 256]),
            present: Bitset64::new(),
            num_children: 0,
        }
    }

    pub fn from_indexed(im: &mut IndexedMapping<N>) -> Self {
        let mut new_mapping = DirectMapping::new();
        for (key, child) in im.drain() {
            new_mapping.add_child(key, child);
        }
        new_mapping
    }

    /// Remove every child, in ascending key order.
    pub(crate) fn drain(&mut self) -> Vec<(u8, N)> {
        let keys: Vec<usize> = self.present.iter().collect();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(child) = self.delete_child(key as u8) {
                out.push((key as u8, child));
            }
        }
        out
    }

    #[inline]
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (u8, &N)> {
        self.present
            .iter()
            .filter_map(move |key| self.children[key].as_ref().map(|child| (key as u8, child)))
    }

    pub fn first(&self) -> Option<&N> {
        self.children[self.present.first()?].as_ref()
    }

    pub fn last(&self) -> Option<&N> {
        self.children[self.present.last()?].as_ref()
    }
}

impl<N> NodeMapping<N, 256> for DirectMapping<N> {
    #[inline]
    fn add_child(&mut self, key: u8, node: N) {
        if !self.present.check(key as usize) {
            self.present.set(key as usize);
            self.num_children += 1;
        }
        self.children[key as usize] = Some(node);
    }

    #[inline]
    fn seek_child(&self, key: u8) -> Option<&N> {
        self.children[key as usize].as_ref()
    }

    #[inline]
    fn seek_child_mut(&mut self, key: u8) -> Option<&mut N> {
        self.children[key as usize].as_mut()
    }

    #[inline]
    fn delete_child(&mut self, key: u8) -> Option<N> {
        let n = self.children[key as usize].take();
        if n.is_some() {
            self.present.unset(key as usize);
            self.num_children -= 1;
        }
        n
    }

    #[inline]
    fn num_children(&self) -> usize {
        self.num_children
    }
}
