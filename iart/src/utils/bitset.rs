use num_traits::PrimInt;

/// Fixed-size bitset over `WORDS` words of `StorageType`.
///
/// Used for slot occupancy in `Node48` and child presence in `Node256`, where ordered scans
/// (first set, last set, first empty) come down to a leading/trailing zero count per word.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Bitset<StorageType, const WORDS: usize>
where
    StorageType: PrimInt,
{
    words: [StorageType; WORDS],
}

pub type Bitset64<const WORDS: usize> = Bitset<u64, WORDS>;

impl<StorageType, const WORDS: usize> Default for Bitset<StorageType, WORDS>
where
    StorageType: PrimInt,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<StorageType, const WORDS: usize> Bitset<StorageType, WORDS>
where
    StorageType: PrimInt,
{
    const BITS: usize = std::mem::size_of::<StorageType>() * 8;

    pub fn new() -> Self {
        Self {
            words: [StorageType::zero(); WORDS],
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        WORDS * Self::BITS
    }

    #[inline]
    pub fn set(&mut self, pos: usize) {
        assert!(pos < self.capacity());
        let word = &mut self.words[pos / Self::BITS];
        *word = *word | (StorageType::one() << (pos % Self::BITS));
    }

    #[inline]
    pub fn unset(&mut self, pos: usize) {
        assert!(pos < self.capacity());
        let word = &mut self.words[pos / Self::BITS];
        *word = *word & !(StorageType::one() << (pos % Self::BITS));
    }

    #[inline]
    pub fn check(&self, pos: usize) -> bool {
        assert!(pos < self.capacity());
        !(self.words[pos / Self::BITS] & (StorageType::one() << (pos % Self::BITS))).is_zero()
    }

    pub fn clear(&mut self) {
        self.words = [StorageType::zero(); WORDS];
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| w.is_zero())
    }

    pub fn size(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Lowest unset position below `limit`.
    pub fn first_empty(&self, limit: usize) -> Option<usize> {
        for (i, w) in self.words.iter().enumerate() {
            if *w != StorageType::max_value() {
                let pos = i * Self::BITS + w.trailing_ones() as usize;
                return (pos < limit).then_some(pos);
            }
        }
        None
    }

    pub fn first(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_zero())
            .map(|(i, w)| i * Self::BITS + w.trailing_zeros() as usize)
    }

    pub fn last(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .rev()
            .find(|(_, w)| !w.is_zero())
            .map(|(i, w)| i * Self::BITS + (Self::BITS - 1 - w.leading_zeros() as usize))
    }

    /// Set positions, ascending; double ended.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        (0..self.capacity()).filter(move |&pos| self.check(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_check_unset() {
        let mut bs = Bitset64::<4>::new();
        assert_eq!(bs.capacity(), 256);
        assert!(bs.is_empty());
        for i in [0, 63, 64, 200, 255] {
            bs.set(i);
            assert!(bs.check(i));
        }
        assert_eq!(bs.size(), 5);
        assert_eq!(bs.first(), Some(0));
        assert_eq!(bs.last(), Some(255));
        bs.unset(0);
        bs.unset(255);
        assert_eq!(bs.first(), Some(63));
        assert_eq!(bs.last(), Some(200));
        assert_eq!(bs.iter().collect::<Vec<_>>(), vec![63, 64, 200]);
        assert_eq!(bs.iter().rev().collect::<Vec<_>>(), vec![200, 64, 63]);
        bs.clear();
        assert!(bs.is_empty());
        assert_eq!(bs.first(), None);
        assert_eq!(bs.last(), None);
    }

    #[test]
    fn test_first_empty() {
        let mut bs = Bitset64::<1>::new();
        assert_eq!(bs.first_empty(48), Some(0));
        for i in 0..47 {
            bs.set(i);
        }
        assert_eq!(bs.first_empty(48), Some(47));
        bs.set(47);
        assert_eq!(bs.first_empty(48), None);
        bs.unset(12);
        assert_eq!(bs.first_empty(48), Some(12));
    }

    #[test]
    fn test_narrow_storage() {
        let mut bs = Bitset::<u8, 2>::new();
        bs.set(9);
        assert_eq!(bs.first(), Some(9));
        assert_eq!(bs.last(), Some(9));
        assert_eq!(bs.capacity(), 16);
    }
}
