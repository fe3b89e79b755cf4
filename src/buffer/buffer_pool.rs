use std::collections::HashMap;

use super::error::{BufferError, BufferResult};
use super::lru_replacer::LruReplacer;
use super::FrameId;
use crate::file::{DiskManager, FileResult, INVALID_PAGE_ID, PAGE_SIZE, PageId};

/// A buffer frame: one page worth of bytes plus residency metadata.
struct Frame {
    data: Vec<u8>,
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
}

impl Frame {
    fn new() -> Self {
        Self {
            data: vec![0u8; PAGE_SIZE],
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
        }
    }

    fn reset(&mut self) {
        self.data.fill(0);
        self.page_id = INVALID_PAGE_ID;
        self.pin_count = 0;
        self.is_dirty = false;
    }
}

/// Caches disk pages in a fixed array of frames.
///
/// At most one frame holds any given logical page. Callers pin a page with
/// `fetch_page`/`new_page`, reach its bytes through the frame accessors, and
/// release it with `unpin_page`, declaring dirtiness at release time. Frames
/// with pin count zero are evictable through the LRU replacer; the free list
/// is preferred over eviction so a cold pool warms up without write-backs.
pub struct BufferPoolManager {
    disk: DiskManager,
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
    replacer: LruReplacer,
}

impl BufferPoolManager {
    pub fn new(disk: DiskManager, pool_size: usize) -> Self {
        let pool_size = pool_size.max(1);
        let frames = (0..pool_size).map(|_| Frame::new()).collect();
        // Popped from the back; lower frame indices are handed out first.
        let free_list = (0..pool_size).rev().collect();
        Self {
            disk,
            frames,
            page_table: HashMap::with_capacity(pool_size),
            free_list,
            replacer: LruReplacer::new(pool_size),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Pin a page, reading it from disk if it is not resident.
    pub fn fetch_page(&mut self, page_id: PageId) -> BufferResult<FrameId> {
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            self.frames[frame_id].pin_count += 1;
            self.replacer.pin(frame_id);
            return Ok(frame_id);
        }

        let frame_id = self.acquire_frame()?;
        let frame = &mut self.frames[frame_id];
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.is_dirty = false;
        if let Err(e) = self.disk.read_page(page_id, &mut frame.data) {
            frame.reset();
            self.free_list.push(frame_id);
            return Err(e.into());
        }

        self.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        Ok(frame_id)
    }

    /// Allocate a page on disk and pin a zeroed frame for it.
    pub fn new_page(&mut self) -> BufferResult<(PageId, FrameId)> {
        let frame_id = self.acquire_frame()?;

        let page_id = match self.disk.allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                self.free_list.push(frame_id);
                return Err(e.into());
            }
        };

        let frame = &mut self.frames[frame_id];
        frame.data.fill(0);
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.is_dirty = false;

        self.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        Ok((page_id, frame_id))
    }

    /// Release one pin on a page, OR-ing in the caller's dirty bit. When the
    /// pin count reaches zero the frame becomes evictable.
    pub fn unpin_page(&mut self, page_id: PageId, is_dirty: bool) -> BufferResult<()> {
        let &frame_id = self
            .page_table
            .get(&page_id)
            .ok_or(BufferError::PageNotResident(page_id))?;
        let frame = &mut self.frames[frame_id];
        if frame.pin_count == 0 {
            return Err(BufferError::PageNotPinned(page_id));
        }
        frame.pin_count -= 1;
        frame.is_dirty |= is_dirty;
        if frame.pin_count == 0 {
            self.replacer.unpin(frame_id);
        }
        Ok(())
    }

    /// Write a resident page through to disk if dirty.
    pub fn flush_page(&mut self, page_id: PageId) -> BufferResult<()> {
        let &frame_id = self
            .page_table
            .get(&page_id)
            .ok_or(BufferError::PageNotResident(page_id))?;
        let frame = &mut self.frames[frame_id];
        if frame.is_dirty {
            self.disk.write_page(page_id, &frame.data)?;
            frame.is_dirty = false;
        }
        Ok(())
    }

    /// Write every resident dirty page through to disk.
    pub fn flush_all(&mut self) -> BufferResult<()> {
        for frame in self.frames.iter_mut() {
            if frame.page_id != INVALID_PAGE_ID && frame.is_dirty {
                self.disk.write_page(frame.page_id, &frame.data)?;
                frame.is_dirty = false;
            }
        }
        Ok(())
    }

    /// Drop a page from the pool and free it on disk.
    ///
    /// A page that is not resident is deallocated on disk directly. A pinned
    /// page cannot be deleted.
    pub fn delete_page(&mut self, page_id: PageId) -> BufferResult<()> {
        match self.page_table.get(&page_id) {
            None => {
                self.disk.deallocate_page(page_id)?;
                Ok(())
            }
            Some(&frame_id) => {
                if self.frames[frame_id].pin_count > 0 {
                    return Err(BufferError::PagePinned(page_id));
                }
                self.page_table.remove(&page_id);
                self.frames[frame_id].reset();
                self.replacer.pin(frame_id);
                self.free_list.push(frame_id);
                self.disk.deallocate_page(page_id)?;
                Ok(())
            }
        }
    }

    /// Bytes of a pinned frame.
    pub fn frame_data(&self, frame_id: FrameId) -> &[u8] {
        &self.frames[frame_id].data
    }

    /// Mutable bytes of a pinned frame. The caller declares the mutation by
    /// unpinning with `is_dirty = true`.
    pub fn frame_data_mut(&mut self, frame_id: FrameId) -> &mut [u8] {
        &mut self.frames[frame_id].data
    }

    /// Mutable bytes of two distinct pinned frames, for page-to-page moves.
    pub fn frame_pair_mut(&mut self, a: FrameId, b: FrameId) -> (&mut [u8], &mut [u8]) {
        assert_ne!(a, b, "frame_pair_mut requires distinct frames");
        if a < b {
            let (left, right) = self.frames.split_at_mut(b);
            (&mut left[a].data, &mut right[0].data)
        } else {
            let (left, right) = self.frames.split_at_mut(a);
            (&mut right[0].data, &mut left[b].data)
        }
    }

    /// Logical page currently held by a frame.
    pub fn frame_page_id(&self, frame_id: FrameId) -> PageId {
        self.frames[frame_id].page_id
    }

    /// Whether a logical page is unallocated on disk.
    pub fn is_page_free(&mut self, page_id: PageId) -> FileResult<bool> {
        self.disk.is_page_free(page_id)
    }

    /// Test hook: true iff no frame holds an outstanding pin.
    pub fn check_all_unpinned(&self) -> bool {
        let mut all_unpinned = true;
        for frame in &self.frames {
            if frame.pin_count != 0 {
                tracing::error!(
                    page_id = frame.page_id,
                    pin_count = frame.pin_count,
                    "leaked pin"
                );
                all_unpinned = false;
            }
        }
        all_unpinned
    }

    /// Flush everything and close the underlying file.
    pub fn close(&mut self) -> BufferResult<()> {
        self.flush_all()?;
        self.disk.close()?;
        Ok(())
    }

    /// Get a frame for a new resident page: free list first, LRU victim
    /// otherwise. A dirty victim is written back before reuse.
    fn acquire_frame(&mut self) -> BufferResult<FrameId> {
        if let Some(frame_id) = self.free_list.pop() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.replacer.victim() else {
            tracing::warn!(pool_size = self.frames.len(), "no victim available, every frame is pinned");
            return Err(BufferError::NoEvictableFrame);
        };
        let frame = &mut self.frames[frame_id];
        if frame.is_dirty {
            self.disk.write_page(frame.page_id, &frame.data)?;
            frame.is_dirty = false;
        }
        self.page_table.remove(&frame.page_id);
        Ok(frame_id)
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        let _ = self.flush_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::DiskManager;
    use tempfile::TempDir;

    fn setup(pool_size: usize) -> (TempDir, BufferPoolManager) {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskManager::open(dir.path().join("test.db")).unwrap();
        (dir, BufferPoolManager::new(disk, pool_size))
    }

    #[test]
    fn test_new_page_pins_zeroed_frame() {
        let (_dir, mut pool) = setup(8);
        assert_eq!(pool.pool_size(), 8);
        let (page_id, frame_id) = pool.new_page().unwrap();
        assert_eq!(page_id, 0);
        assert_eq!(pool.frame_page_id(frame_id), page_id);
        assert!(pool.frame_data(frame_id).iter().all(|&b| b == 0));
        assert!(!pool.check_all_unpinned());
        pool.unpin_page(page_id, false).unwrap();
        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_fetch_resident_page_is_same_frame() {
        let (_dir, mut pool) = setup(8);
        let (page_id, frame_id) = pool.new_page().unwrap();
        let fetched = pool.fetch_page(page_id).unwrap();
        assert_eq!(fetched, frame_id);
        pool.unpin_page(page_id, false).unwrap();
        pool.unpin_page(page_id, false).unwrap();
    }

    #[test]
    fn test_unpin_errors() {
        let (_dir, mut pool) = setup(8);
        assert!(matches!(
            pool.unpin_page(42, false),
            Err(BufferError::PageNotResident(42))
        ));

        let (page_id, _) = pool.new_page().unwrap();
        pool.unpin_page(page_id, false).unwrap();
        assert!(matches!(
            pool.unpin_page(page_id, false),
            Err(BufferError::PageNotPinned(_))
        ));
    }

    #[test]
    fn test_eviction_writes_back_dirty_page() {
        let (_dir, mut pool) = setup(4);

        // Dirty four pages, then force the LRU one out with a fifth.
        let mut ids = Vec::new();
        for i in 0..4u8 {
            let (page_id, frame_id) = pool.new_page().unwrap();
            pool.frame_data_mut(frame_id)[0] = 0x10 + i;
            pool.unpin_page(page_id, true).unwrap();
            ids.push(page_id);
        }

        let (page5, _) = pool.new_page().unwrap();
        pool.unpin_page(page5, false).unwrap();

        // ids[0] was the LRU victim; its bytes must have survived on disk.
        let frame = pool.fetch_page(ids[0]).unwrap();
        assert_eq!(pool.frame_data(frame)[0], 0x10);
        pool.unpin_page(ids[0], false).unwrap();
        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_no_evictable_frame() {
        let (_dir, mut pool) = setup(2);
        let (a, _) = pool.new_page().unwrap();
        let (b, _) = pool.new_page().unwrap();

        assert!(matches!(pool.new_page(), Err(BufferError::NoEvictableFrame)));

        pool.unpin_page(a, false).unwrap();
        pool.unpin_page(b, false).unwrap();
        assert!(pool.new_page().is_ok());
    }

    #[test]
    fn test_delete_page() {
        let (_dir, mut pool) = setup(4);
        let (page_id, _) = pool.new_page().unwrap();

        // Pinned pages refuse deletion.
        assert!(matches!(
            pool.delete_page(page_id),
            Err(BufferError::PagePinned(_))
        ));

        pool.unpin_page(page_id, false).unwrap();
        pool.delete_page(page_id).unwrap();
        assert!(pool.is_page_free(page_id).unwrap());

        // Deleting an unresident page is delegated to the disk manager.
        let (other, _) = pool.new_page().unwrap();
        pool.unpin_page(other, true).unwrap();
        pool.flush_page(other).unwrap();
        // Evict it by exhausting frames.
        for _ in 0..4 {
            let (p, _) = pool.new_page().unwrap();
            pool.unpin_page(p, false).unwrap();
        }
        pool.delete_page(other).unwrap();
        assert!(pool.is_page_free(other).unwrap());
    }

    #[test]
    fn test_fetch_unknown_page_reads_disk_bytes() {
        let (_dir, mut pool) = setup(4);
        // Never written: the disk zero-fills past EOF.
        let frame = pool.fetch_page(7).unwrap();
        assert!(pool.frame_data(frame).iter().all(|&b| b == 0));
        pool.unpin_page(7, false).unwrap();
    }

    #[test]
    fn test_flush_page_persists_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let page_id;
        {
            let disk = DiskManager::open(&path).unwrap();
            let mut pool = BufferPoolManager::new(disk, 4);
            let (id, frame_id) = pool.new_page().unwrap();
            page_id = id;
            pool.frame_data_mut(frame_id)[100] = 0x5A;
            pool.unpin_page(page_id, true).unwrap();
            pool.close().unwrap();
        }

        let disk = DiskManager::open(&path).unwrap();
        let mut pool = BufferPoolManager::new(disk, 4);
        let frame_id = pool.fetch_page(page_id).unwrap();
        assert_eq!(pool.frame_data(frame_id)[100], 0x5A);
        pool.unpin_page(page_id, false).unwrap();
    }

    #[test]
    fn test_frame_pair_mut_disjoint() {
        let (_dir, mut pool) = setup(4);
        let (a_id, a) = pool.new_page().unwrap();
        let (b_id, b) = pool.new_page().unwrap();

        {
            let (left, right) = pool.frame_pair_mut(a, b);
            left[0] = 1;
            right[0] = 2;
        }
        assert_eq!(pool.frame_data(a)[0], 1);
        assert_eq!(pool.frame_data(b)[0], 2);
        pool.unpin_page(a_id, true).unwrap();
        pool.unpin_page(b_id, true).unwrap();
    }
}
