use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::error::{FileError, FileResult};
use super::{BitmapView, EXTENT_CAPACITY, INVALID_PAGE_ID, MAX_EXTENTS, MAX_VALID_PAGE_ID, PAGE_SIZE, PageId};

/// Bytes of meta-page header before the per-extent used counts:
/// `allocated_count` and `extent_count`
pub(super) const META_HEADER_SIZE: usize = 8;

/// Manages the single database file.
///
/// The file starts with a meta page at physical offset 0, followed by
/// extents of `1 + EXTENT_CAPACITY` physical pages each: a bitmap page and
/// the data pages it governs. Logical page ids are dense across extents;
/// `map_page_id` translates them to physical positions.
pub struct DiskManager {
    file: File,
    /// Total allocated logical pages, mirrored on the meta page
    allocated: u32,
    /// Allocated pages per extent, mirrored on the meta page
    extent_used: Vec<u32>,
    /// Reusable page buffer for bitmap and meta I/O
    scratch: Vec<u8>,
    closed: bool,
}

impl DiskManager {
    /// Open a database file, creating it (and parent directories) if absent.
    pub fn open<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut scratch = vec![0u8; PAGE_SIZE];
        read_physical(&mut file, 0, &mut scratch)?;

        let allocated = u32::from_le_bytes(scratch[0..4].try_into().unwrap());
        let extent_count = u32::from_le_bytes(scratch[4..8].try_into().unwrap());
        if extent_count > MAX_EXTENTS {
            return Err(FileError::InvalidPageId(extent_count));
        }
        let mut extent_used = Vec::with_capacity(extent_count as usize);
        for i in 0..extent_count as usize {
            let at = META_HEADER_SIZE + i * 4;
            extent_used.push(u32::from_le_bytes(scratch[at..at + 4].try_into().unwrap()));
        }

        Ok(Self {
            file,
            allocated,
            extent_used,
            scratch,
            closed: false,
        })
    }

    /// Total allocated logical pages per the meta page.
    pub fn allocated_pages(&self) -> u32 {
        self.allocated
    }

    /// Number of extents the file currently has.
    pub fn extent_count(&self) -> u32 {
        self.extent_used.len() as u32
    }

    /// Allocated pages within one extent.
    pub fn extent_used(&self, extent: u32) -> u32 {
        self.extent_used.get(extent as usize).copied().unwrap_or(0)
    }

    /// Allocate a logical page, first-fit across extents, appending a new
    /// extent when every existing one is full.
    ///
    /// The bitmap page is written before the meta counters: a crash between
    /// the two leaks a page but can never double-allocate one.
    pub fn allocate_page(&mut self) -> FileResult<PageId> {
        if self.allocated >= MAX_VALID_PAGE_ID {
            tracing::warn!(allocated = self.allocated, "page allocation ceiling reached");
            return Err(FileError::AllocationExhausted);
        }

        for extent in 0..self.extent_used.len() {
            if self.extent_used[extent] >= EXTENT_CAPACITY {
                continue;
            }

            let physical = bitmap_physical_id(extent as u32);
            let mut buffer = std::mem::take(&mut self.scratch);
            read_physical(&mut self.file, physical, &mut buffer)?;

            let offset = BitmapView::new(&mut buffer).allocate();
            let result = match offset {
                Some(offset) => {
                    write_physical(&mut self.file, physical, &buffer)?;
                    self.extent_used[extent] += 1;
                    self.allocated += 1;
                    Some(extent as u32 * EXTENT_CAPACITY + offset)
                }
                None => {
                    tracing::error!(
                        extent,
                        used = self.extent_used[extent],
                        "extent counter claims space but its bitmap is full"
                    );
                    None
                }
            };
            self.scratch = buffer;

            if let Some(page_id) = result {
                self.write_meta()?;
                return Ok(page_id);
            }
        }

        // No room in any existing extent, append a fresh one.
        if self.extent_count() >= MAX_EXTENTS {
            return Err(FileError::AllocationExhausted);
        }
        let extent = self.extent_count();
        let physical = bitmap_physical_id(extent);

        let mut buffer = std::mem::take(&mut self.scratch);
        buffer.fill(0);
        let offset = BitmapView::new(&mut buffer).allocate();
        debug_assert_eq!(offset, Some(0));
        write_physical(&mut self.file, physical, &buffer)?;
        self.scratch = buffer;

        self.extent_used.push(1);
        self.allocated += 1;
        self.write_meta()?;

        Ok(extent * EXTENT_CAPACITY)
    }

    /// Free a logical page. The page must currently be allocated.
    pub fn deallocate_page(&mut self, page_id: PageId) -> FileResult<()> {
        if page_id == INVALID_PAGE_ID {
            return Err(FileError::InvalidPageId(page_id));
        }
        let extent = page_id / EXTENT_CAPACITY;
        let offset = page_id % EXTENT_CAPACITY;
        if extent >= self.extent_count() {
            return Err(FileError::PageNotAllocated(page_id));
        }

        let physical = bitmap_physical_id(extent);
        let mut buffer = std::mem::take(&mut self.scratch);
        read_physical(&mut self.file, physical, &mut buffer)?;

        let freed = BitmapView::new(&mut buffer).deallocate(offset);
        let result = if freed {
            write_physical(&mut self.file, physical, &buffer)
        } else {
            Ok(())
        };
        self.scratch = buffer;
        result?;

        if !freed {
            tracing::warn!(page_id, "deallocate of a page that is already free");
            return Err(FileError::PageNotAllocated(page_id));
        }

        self.allocated = self.allocated.saturating_sub(1);
        self.extent_used[extent as usize] = self.extent_used[extent as usize].saturating_sub(1);
        self.write_meta()?;
        Ok(())
    }

    /// Whether a logical page is free. Pages in extents that do not exist
    /// yet report free.
    pub fn is_page_free(&mut self, page_id: PageId) -> FileResult<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }
        let extent = page_id / EXTENT_CAPACITY;
        let offset = page_id % EXTENT_CAPACITY;
        if extent >= self.extent_count() {
            return Ok(true);
        }

        let physical = bitmap_physical_id(extent);
        let mut buffer = std::mem::take(&mut self.scratch);
        read_physical(&mut self.file, physical, &mut buffer)?;
        let free = BitmapView::new(&mut buffer).is_free(offset);
        self.scratch = buffer;
        Ok(free)
    }

    /// Read a logical page into `buffer`. Reads past EOF zero-fill.
    pub fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> FileResult<()> {
        check_buffer(buffer.len())?;
        let physical = map_page_id(page_id)?;
        read_physical(&mut self.file, physical, buffer)
    }

    /// Write a logical page from `buffer`.
    pub fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> FileResult<()> {
        check_buffer(buffer.len())?;
        let physical = map_page_id(page_id)?;
        write_physical(&mut self.file, physical, buffer)
    }

    /// Flush the meta page and sync the file. Idempotent.
    pub fn close(&mut self) -> FileResult<()> {
        if self.closed {
            return Ok(());
        }
        self.write_meta()?;
        self.file.sync_data()?;
        self.closed = true;
        Ok(())
    }

    fn write_meta(&mut self) -> FileResult<()> {
        let mut buffer = std::mem::take(&mut self.scratch);
        buffer.fill(0);
        buffer[0..4].copy_from_slice(&self.allocated.to_le_bytes());
        buffer[4..8].copy_from_slice(&(self.extent_used.len() as u32).to_le_bytes());
        for (i, used) in self.extent_used.iter().enumerate() {
            let at = META_HEADER_SIZE + i * 4;
            buffer[at..at + 4].copy_from_slice(&used.to_le_bytes());
        }
        let result = write_physical(&mut self.file, 0, &buffer);
        self.scratch = buffer;
        result
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Physical page of the bitmap governing `extent`.
fn bitmap_physical_id(extent: u32) -> u32 {
    1 + extent * (1 + EXTENT_CAPACITY)
}

/// Translate a logical page id to its physical position: skip the file meta,
/// skip the preceding full extents, then skip this extent's bitmap.
fn map_page_id(page_id: PageId) -> FileResult<u32> {
    if page_id == INVALID_PAGE_ID || page_id >= MAX_VALID_PAGE_ID {
        return Err(FileError::InvalidPageId(page_id));
    }
    let extent = page_id / EXTENT_CAPACITY;
    let offset = page_id % EXTENT_CAPACITY;
    Ok(bitmap_physical_id(extent) + offset + 1)
}

fn check_buffer(len: usize) -> FileResult<()> {
    if len != PAGE_SIZE {
        return Err(FileError::InvalidPageSize {
            expected: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}

fn read_physical(file: &mut File, physical: u32, buffer: &mut [u8]) -> FileResult<()> {
    let offset = physical as u64 * PAGE_SIZE as u64;
    let file_len = file.metadata()?.len();
    if offset >= file_len {
        buffer.fill(0);
        return Ok(());
    }
    file.seek(SeekFrom::Start(offset))?;
    let mut read = 0;
    while read < buffer.len() {
        let n = file.read(&mut buffer[read..])?;
        if n == 0 {
            break;
        }
        read += n;
    }
    buffer[read..].fill(0);
    Ok(())
}

fn write_physical(file: &mut File, physical: u32, buffer: &[u8]) -> FileResult<()> {
    let offset = physical as u64 * PAGE_SIZE as u64;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(buffer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_manager(dir: &TempDir) -> DiskManager {
        DiskManager::open(dir.path().join("test.db")).unwrap()
    }

    #[test]
    fn test_fresh_file_has_empty_meta() {
        let dir = tempfile::tempdir().unwrap();
        let dm = open_manager(&dir);
        assert_eq!(dm.allocated_pages(), 0);
        assert_eq!(dm.extent_count(), 0);
    }

    #[test]
    fn test_allocate_first_fit() {
        let dir = tempfile::tempdir().unwrap();
        let mut dm = open_manager(&dir);

        assert_eq!(dm.allocate_page().unwrap(), 0);
        assert_eq!(dm.allocate_page().unwrap(), 1);
        assert_eq!(dm.allocate_page().unwrap(), 2);
        assert_eq!(dm.allocated_pages(), 3);
        assert_eq!(dm.extent_count(), 1);
        assert_eq!(dm.extent_used(0), 3);
    }

    #[test]
    fn test_allocate_deallocate_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut dm = open_manager(&dir);

        let id = dm.allocate_page().unwrap();
        let before = dm.allocated_pages();
        assert!(!dm.is_page_free(id).unwrap());

        dm.deallocate_page(id).unwrap();
        assert!(dm.is_page_free(id).unwrap());
        assert_eq!(dm.allocated_pages(), before - 1);
    }

    #[test]
    fn test_deallocate_unallocated_page_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut dm = open_manager(&dir);

        dm.allocate_page().unwrap();
        assert!(matches!(
            dm.deallocate_page(7),
            Err(FileError::PageNotAllocated(7))
        ));
        // Extent does not exist at all.
        assert!(matches!(
            dm.deallocate_page(EXTENT_CAPACITY * 3),
            Err(FileError::PageNotAllocated(_))
        ));
    }

    #[test]
    fn test_pages_in_missing_extents_report_free() {
        let dir = tempfile::tempdir().unwrap();
        let mut dm = open_manager(&dir);
        assert!(dm.is_page_free(EXTENT_CAPACITY * 5 + 17).unwrap());
    }

    #[test]
    fn test_read_write_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut dm = open_manager(&dir);

        let id = dm.allocate_page().unwrap();
        let mut page = vec![0u8; PAGE_SIZE];
        page[0] = 0xAB;
        page[PAGE_SIZE - 1] = 0xCD;
        dm.write_page(id, &page).unwrap();

        let mut read_back = vec![0u8; PAGE_SIZE];
        dm.read_page(id, &mut read_back).unwrap();
        assert_eq!(read_back, page);
    }

    #[test]
    fn test_read_past_eof_zero_fills() {
        let dir = tempfile::tempdir().unwrap();
        let mut dm = open_manager(&dir);
        dm.allocate_page().unwrap();

        let mut buffer = vec![0xFFu8; PAGE_SIZE];
        dm.read_page(0, &mut buffer).unwrap();
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_second_extent_appended() {
        let dir = tempfile::tempdir().unwrap();
        let mut dm = open_manager(&dir);

        // Fill the first extent, then spill three pages into a second one.
        for i in 0..EXTENT_CAPACITY {
            assert_eq!(dm.allocate_page().unwrap(), i);
        }
        for i in 0..3 {
            assert_eq!(dm.allocate_page().unwrap(), EXTENT_CAPACITY + i);
        }

        assert_eq!(dm.extent_count(), 2);
        assert_eq!(dm.allocated_pages(), EXTENT_CAPACITY + 3);
        assert_eq!(dm.extent_used(0), EXTENT_CAPACITY);
        assert_eq!(dm.extent_used(1), 3);

        // First-fit hands a freed page straight back.
        dm.deallocate_page(0).unwrap();
        assert_eq!(dm.allocate_page().unwrap(), 0);
    }

    #[test]
    fn test_meta_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::open(&path).unwrap();
            for _ in 0..10 {
                dm.allocate_page().unwrap();
            }
            dm.deallocate_page(4).unwrap();
            dm.close().unwrap();
        }

        let mut dm = DiskManager::open(&path).unwrap();
        assert_eq!(dm.allocated_pages(), 9);
        assert_eq!(dm.extent_count(), 1);
        assert!(dm.is_page_free(4).unwrap());
        assert!(!dm.is_page_free(5).unwrap());
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut dm = open_manager(&dir);
        dm.allocate_page().unwrap();
        dm.close().unwrap();
        dm.close().unwrap();
    }

    #[test]
    fn test_invalid_buffer_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut dm = open_manager(&dir);
        dm.allocate_page().unwrap();

        let mut small = vec![0u8; PAGE_SIZE - 1];
        assert!(matches!(
            dm.read_page(0, &mut small),
            Err(FileError::InvalidPageSize { .. })
        ));
    }
}
