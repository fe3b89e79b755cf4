use super::{EXTENT_CAPACITY, PAGE_SIZE};

/// Bytes of header before the bit array: `used_count` and `next_free_offset`
pub(super) const BITMAP_HEADER_SIZE: usize = 8;

/// Zero-copy view over a bitmap page buffer.
///
/// A bitmap page governs the allocation state of the `EXTENT_CAPACITY` data
/// pages of one extent. Bit = 1 iff the corresponding data page is allocated.
/// The header caches the allocated count and a hint to the next free offset.
pub struct BitmapView<'a> {
    buffer: &'a mut [u8],
}

impl<'a> BitmapView<'a> {
    /// Wrap a page buffer. The buffer must be exactly `PAGE_SIZE` bytes.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        debug_assert_eq!(buffer.len(), PAGE_SIZE);
        Self { buffer }
    }

    pub fn used_count(&self) -> u32 {
        u32::from_le_bytes(self.buffer[0..4].try_into().unwrap())
    }

    fn set_used_count(&mut self, count: u32) {
        self.buffer[0..4].copy_from_slice(&count.to_le_bytes());
    }

    pub fn next_free_offset(&self) -> u32 {
        u32::from_le_bytes(self.buffer[4..8].try_into().unwrap())
    }

    fn set_next_free_offset(&mut self, offset: u32) {
        self.buffer[4..8].copy_from_slice(&offset.to_le_bytes());
    }

    pub fn is_full(&self) -> bool {
        self.used_count() >= EXTENT_CAPACITY
    }

    /// Check whether the data page at `offset` is free.
    /// Offsets past the extent capacity are reported as not free.
    pub fn is_free(&self, offset: u32) -> bool {
        if offset >= EXTENT_CAPACITY {
            return false;
        }
        let byte = BITMAP_HEADER_SIZE + (offset / 8) as usize;
        let bit = offset % 8;
        (self.buffer[byte] & (1 << bit)) == 0
    }

    fn set_bit(&mut self, offset: u32, allocated: bool) {
        let byte = BITMAP_HEADER_SIZE + (offset / 8) as usize;
        let bit = offset % 8;
        if allocated {
            self.buffer[byte] |= 1 << bit;
        } else {
            self.buffer[byte] &= !(1 << bit);
        }
    }

    /// Allocate a free data page, returning its offset within the extent.
    ///
    /// The search is circular starting at the `next_free_offset` hint; after
    /// a successful allocation the hint is advanced to the next actually-free
    /// offset (or `EXTENT_CAPACITY` when the extent just filled up).
    pub fn allocate(&mut self) -> Option<u32> {
        if self.is_full() {
            return None;
        }

        let mut start = self.next_free_offset();
        if start >= EXTENT_CAPACITY {
            start = 0;
        }

        let mut found = None;
        for i in 0..EXTENT_CAPACITY {
            let candidate = (start + i) % EXTENT_CAPACITY;
            if self.is_free(candidate) {
                found = Some(candidate);
                break;
            }
        }

        let offset = match found {
            Some(offset) => offset,
            None => {
                tracing::error!(
                    used = self.used_count(),
                    "bitmap reports free capacity but no free bit found"
                );
                return None;
            }
        };

        self.set_bit(offset, true);
        self.set_used_count(self.used_count() + 1);

        // Advance the hint to the next free offset after the one just taken.
        let mut hint = EXTENT_CAPACITY;
        if !self.is_full() {
            for j in 0..EXTENT_CAPACITY {
                let candidate = (offset + 1 + j) % EXTENT_CAPACITY;
                if self.is_free(candidate) {
                    hint = candidate;
                    break;
                }
            }
        }
        self.set_next_free_offset(hint);

        Some(offset)
    }

    /// Free the data page at `offset`. Returns false if the offset is out of
    /// range or the page was already free.
    pub fn deallocate(&mut self, offset: u32) -> bool {
        if offset >= EXTENT_CAPACITY || self.is_free(offset) {
            return false;
        }

        self.set_bit(offset, false);
        let used = self.used_count();
        if used == 0 {
            tracing::error!(offset, "bitmap used_count underflow on deallocate");
        } else {
            self.set_used_count(used - 1);
        }

        if offset < self.next_free_offset() {
            self.set_next_free_offset(offset);
        }
        true
    }

    /// Count of set bits, for consistency checks against `used_count`.
    pub fn popcount(&self) -> u32 {
        self.buffer[BITMAP_HEADER_SIZE..]
            .iter()
            .map(|b| b.count_ones())
            .sum()
    }
}
