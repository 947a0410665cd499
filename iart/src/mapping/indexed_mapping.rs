use crate::mapping::NodeMapping;
use crate::mapping::direct_mapping::DirectMapping;
use crate::mapping::keyed_mapping::KeyedMapping;
use crate::utils::bitset::Bitset64;

const WIDTH: usize = 48;

/// A mapping from key bytes to a separate array of child slots, used by `Node48`.
/// `child_index[key]` is 0 when empty, otherwise the child's slot plus one.
#[derive(Clone)]
pub struct IndexedMapping<N> {
    child_index: Box<[u8; 256]>,
    children: Box<[Option<N>; WIDTH]>,
    occupied: Bitset64<1>,
    num_children: u8,
}

impl<N> Default for IndexedMapping<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> IndexedMapping<N> {
    pub fn new() -> Self {
        Self {
            child_index: Box::new([0; 256]),
            children: Box::new([const { None }; WIDTH]),
            occupied: Bitset64::new(),
            num_children: 0,
        }
    }

    /// Children keep their slot positions; `child_index[k]` records each key at slot `i` as
    /// `i + 1`.
    pub fn from_keyed<const KM_WIDTH: usize>(km: &mut KeyedMapping<N, KM_WIDTH>) -> Self {
        let mut im = IndexedMapping::new();
        for i in 0..km.num_children as usize {
            if let Some(child) = km.children[i].take() {
                im.child_index[km.keys[i] as usize] = (i + 1) as u8;
                im.children[i] = Some(child);
                im.occupied.set(i);
                im.num_children += 1;
            }
        }
        km.num_children = 0;
        im
    }

    pub fn from_direct(dm: &mut DirectMapping<N>) -> Self {
        let mut im = IndexedMapping::new();
        for (key, child) in dm.drain() {
            im.add_child(key, child);
        }
        im
    }

    /// Remove every child, in ascending key order.
    pub(crate) fn drain(&mut self) -> Vec<(u8, N)> {
        let mut out = Vec::with_capacity(self.num_children as usize);
        for key in 0..=255u8 {
            if let Some(child) = self.delete_child(key) {
                out.push((key, child));
            }
        }
        out
    }

    #[inline]
    fn slot(&self, key: u8) -> Option<usize> {
        match self.child_index[key as usize] {
            0 => None,
            pos => Some(pos as usize - 1),
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (u8, &N)> {
        (0..=255u8).filter_map(move |key| {
            let slot = self.slot(key)?;
            self.children[slot].as_ref().map(|child| (key, child))
        })
    }

    pub fn first(&self) -> Option<&N> {
        self.iter().next().map(|(_, child)| child)
    }

    pub fn last(&self) -> Option<&N> {
        self.iter().next_back().map(|(_, child)| child)
    }
}

impl<N> NodeMapping<N, WIDTH> for IndexedMapping<N> {
    fn add_child(&mut self, key: u8, node: N) {
        if let Some(slot) = self.slot(key) {
            self.children[slot] = Some(node);
            return;
        }
        let Some(slot) = self.occupied.first_empty(WIDTH) else {
            unreachable!("add_child on a full Node48");
        };
        self.child_index[key as usize] = (slot + 1) as u8;
        self.children[slot] = Some(node);
        self.occupied.set(slot);
        self.num_children += 1;
    }

    fn seek_child(&self, key: u8) -> Option<&N> {
        self.children[self.slot(key)?].as_ref()
    }

    fn seek_child_mut(&mut self, key: u8) -> Option<&mut N> {
        let slot = self.slot(key)?;
        self.children[slot].as_mut()
    }

    fn delete_child(&mut self, key: u8) -> Option<N> {
        let slot = self.slot(key)?;
        self.child_index[key as usize] = 0;
        self.occupied.unset(slot);
        self.num_children -= 1;
        self.children[slot].take()
    }

    fn num_children(&self) -> usize {
        self.num_children as usize
    }
}
