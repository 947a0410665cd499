pub mod direct_mapping;
pub mod indexed_mapping;
pub mod keyed_mapping;

/// Child index of an inner node: maps a key byte to a child.
pub trait NodeMapping<N, const NUM_CHILDREN: usize> {
    /// Add `node` under `key`, replacing any child already there. The caller grows the node
    /// before adding to a full mapping.
    fn add_child(&mut self, key: u8, node: N);
    fn seek_child(&self, key: u8) -> Option<&N>;
    fn seek_child_mut(&mut self, key: u8) -> Option<&mut N>;
    fn delete_child(&mut self, key: u8) -> Option<N>;
    fn num_children(&self) -> usize;
    fn width(&self) -> usize {
        NUM_CHILDREN
    }
    fn is_full(&self) -> bool {
        self.num_children() >= self.width()
    }
}
