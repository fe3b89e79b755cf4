use crate::file::{PAGE_SIZE, PageId};

use super::IndexId;

const HEADER_SIZE: usize = 4;
const RECORD_SIZE: usize = 8;

/// Zero-copy view over the index-roots directory (logical page 1).
///
/// A flat array of `(index_id, root_page_id)` records with an in-page count.
/// Every B+-tree registers its root here so indices can be re-opened after a
/// restart.
pub struct IndexRootsView<'a> {
    data: &'a mut [u8],
}

impl<'a> IndexRootsView<'a> {
    /// Records the page can hold.
    pub const CAPACITY: usize = (PAGE_SIZE - HEADER_SIZE) / RECORD_SIZE;

    pub fn new(data: &'a mut [u8]) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn count(&self) -> usize {
        u32::from_le_bytes(self.data[0..4].try_into().unwrap()) as usize
    }

    fn set_count(&mut self, count: usize) {
        self.data[0..4].copy_from_slice(&(count as u32).to_le_bytes());
    }

    fn record(&self, at: usize) -> (IndexId, PageId) {
        let base = HEADER_SIZE + at * RECORD_SIZE;
        let index_id = u32::from_le_bytes(self.data[base..base + 4].try_into().unwrap());
        let root = u32::from_le_bytes(self.data[base + 4..base + 8].try_into().unwrap());
        (index_id, root)
    }

    fn set_record(&mut self, at: usize, index_id: IndexId, root: PageId) {
        let base = HEADER_SIZE + at * RECORD_SIZE;
        self.data[base..base + 4].copy_from_slice(&index_id.to_le_bytes());
        self.data[base + 4..base + 8].copy_from_slice(&root.to_le_bytes());
    }

    fn position(&self, index_id: IndexId) -> Option<usize> {
        (0..self.count()).find(|&at| self.record(at).0 == index_id)
    }

    /// Root page recorded for an index, if any.
    pub fn get(&self, index_id: IndexId) -> Option<PageId> {
        self.position(index_id).map(|at| self.record(at).1)
    }

    /// Record a new index. Fails when the id is already present or the page
    /// is full.
    pub fn insert(&mut self, index_id: IndexId, root: PageId) -> bool {
        if self.position(index_id).is_some() || self.count() >= Self::CAPACITY {
            return false;
        }
        let count = self.count();
        self.set_record(count, index_id, root);
        self.set_count(count + 1);
        true
    }

    /// Update an existing index's root.
    pub fn update(&mut self, index_id: IndexId, root: PageId) -> bool {
        match self.position(index_id) {
            Some(at) => {
                self.set_record(at, index_id, root);
                true
            }
            None => false,
        }
    }

    /// Remove an index's record, compacting the array.
    pub fn remove(&mut self, index_id: IndexId) -> bool {
        let Some(at) = self.position(index_id) else {
            return false;
        };
        let count = self.count();
        for i in at..count - 1 {
            let (id, root) = self.record(i + 1);
            self.set_record(i, id, root);
        }
        self.set_count(count - 1);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::INVALID_PAGE_ID;

    #[test]
    fn test_insert_get_update_remove() {
        let mut buffer = vec![0u8; PAGE_SIZE];
        let mut view = IndexRootsView::new(&mut buffer);

        assert!(view.insert(7, INVALID_PAGE_ID));
        assert!(view.insert(9, 42));
        assert!(!view.insert(7, 1), "duplicate id rejected");

        assert_eq!(view.get(7), Some(INVALID_PAGE_ID));
        assert_eq!(view.get(9), Some(42));
        assert_eq!(view.get(8), None);

        assert!(view.update(7, 100));
        assert_eq!(view.get(7), Some(100));
        assert!(!view.update(8, 1));

        assert!(view.remove(7));
        assert_eq!(view.get(7), None);
        assert_eq!(view.get(9), Some(42));
        assert_eq!(view.count(), 1);
        assert!(!view.remove(7));
    }

    #[test]
    fn test_capacity_bound() {
        let mut buffer = vec![0u8; PAGE_SIZE];
        let mut view = IndexRootsView::new(&mut buffer);

        for i in 0..IndexRootsView::CAPACITY {
            assert!(view.insert(i as u32, i as u32));
        }
        assert!(!view.insert(u32::MAX - 1, 0));
    }
}
