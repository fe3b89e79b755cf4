use crate::buffer::BufferPoolManager;
use crate::file::{INVALID_PAGE_ID, PageId};

use super::error::{RecordError, RecordResult};
use super::row::Row;
use super::schema::Schema;
use super::table_page::{TablePageView, UpdateOutcome};
use super::RowId;

/// A relation stored as a doubly-linked chain of slotted pages.
///
/// The heap holds no reference to the buffer pool; every operation borrows
/// it explicitly, and every page fetched inside an operation is unpinned
/// before the operation returns.
pub struct TableHeap {
    first_page_id: PageId,
    schema: Schema,
}

impl TableHeap {
    /// Create a heap with a fresh, empty root page.
    pub fn create(pool: &mut BufferPoolManager, schema: Schema) -> RecordResult<Self> {
        let (page_id, frame) = pool.new_page()?;
        TablePageView::new(pool.frame_data_mut(frame)).init(page_id, INVALID_PAGE_ID);
        pool.unpin_page(page_id, true)?;
        Ok(Self {
            first_page_id: page_id,
            schema,
        })
    }

    /// Re-open a heap whose root page already exists.
    pub fn open(first_page_id: PageId, schema: Schema) -> Self {
        Self {
            first_page_id,
            schema,
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Insert a row, first-fit along the page chain, appending a new tail
    /// page when no existing page has room. On success `row.rid` is set.
    pub fn insert(&mut self, pool: &mut BufferPoolManager, row: &mut Row) -> RecordResult<()> {
        let bytes = row.to_bytes(&self.schema)?;
        if bytes.len() > TablePageView::MAX_TUPLE_SIZE {
            return Err(RecordError::RowTooLarge {
                size: bytes.len(),
                max: TablePageView::MAX_TUPLE_SIZE,
            });
        }
        if self.first_page_id == INVALID_PAGE_ID {
            return Err(not_found(super::INVALID_ROWID));
        }

        let mut page_id = self.first_page_id;
        let mut tail = self.first_page_id;
        while page_id != INVALID_PAGE_ID {
            let frame = pool.fetch_page(page_id)?;
            let mut view = TablePageView::new(pool.frame_data_mut(frame));
            if let Some(slot) = view.insert_tuple(&bytes) {
                row.rid = RowId::new(page_id, slot);
                pool.unpin_page(page_id, true)?;
                return Ok(());
            }
            let next = view.next_page_id();
            pool.unpin_page(page_id, false)?;
            tail = page_id;
            page_id = next;
        }

        // Every page is full, splice a new tail.
        let (new_page_id, frame) = pool.new_page()?;
        let mut view = TablePageView::new(pool.frame_data_mut(frame));
        view.init(new_page_id, tail);
        let slot = view
            .insert_tuple(&bytes)
            .expect("fresh page must fit a row under the size maximum");
        row.rid = RowId::new(new_page_id, slot);
        pool.unpin_page(new_page_id, true)?;

        let tail_frame = pool.fetch_page(tail)?;
        TablePageView::new(pool.frame_data_mut(tail_frame)).set_next_page_id(new_page_id);
        pool.unpin_page(tail, true)?;
        Ok(())
    }

    /// Materialize the live tuple at `rid`.
    pub fn get(&self, pool: &mut BufferPoolManager, rid: RowId) -> RecordResult<Row> {
        if !rid.is_valid() {
            return Err(not_found(rid));
        }
        let frame = pool.fetch_page(rid.page_id)?;
        let view = TablePageView::new(pool.frame_data_mut(frame));
        let result = match view.tuple_bytes(rid.slot) {
            Some(bytes) => Row::from_bytes(bytes, &self.schema).map(|(mut row, _)| {
                row.rid = rid;
                row
            }),
            None => Err(not_found(rid)),
        };
        pool.unpin_page(rid.page_id, false)?;
        result
    }

    /// Replace the tuple at `rid` with `row`'s new image.
    ///
    /// In place when the page can hold the new image; otherwise the new
    /// image is inserted elsewhere (giving `row` a new RowId) and the old
    /// slot is tombstoned.
    pub fn update(&mut self, pool: &mut BufferPoolManager, rid: RowId, row: &mut Row) -> RecordResult<()> {
        let bytes = row.to_bytes(&self.schema)?;
        if bytes.len() > TablePageView::MAX_TUPLE_SIZE {
            return Err(RecordError::RowTooLarge {
                size: bytes.len(),
                max: TablePageView::MAX_TUPLE_SIZE,
            });
        }
        if !rid.is_valid() {
            return Err(not_found(rid));
        }

        let frame = pool.fetch_page(rid.page_id)?;
        let outcome = TablePageView::new(pool.frame_data_mut(frame)).update_tuple(rid.slot, &bytes);
        match outcome {
            UpdateOutcome::Done => {
                row.rid = rid;
                pool.unpin_page(rid.page_id, true)?;
                Ok(())
            }
            UpdateOutcome::WontFit => {
                pool.unpin_page(rid.page_id, false)?;
                self.insert(pool, row)?;
                self.mark_delete(pool, rid)
            }
            UpdateOutcome::Missing | UpdateOutcome::Tombstoned => {
                pool.unpin_page(rid.page_id, false)?;
                Err(not_found(rid))
            }
        }
    }

    /// First phase of deletion: tombstone the slot.
    pub fn mark_delete(&mut self, pool: &mut BufferPoolManager, rid: RowId) -> RecordResult<()> {
        self.with_page(pool, rid, |view| view.mark_delete(rid.slot))
    }

    /// Second phase of deletion: compact the tombstoned slot out.
    pub fn apply_delete(&mut self, pool: &mut BufferPoolManager, rid: RowId) -> RecordResult<()> {
        self.with_page(pool, rid, |view| view.apply_delete(rid.slot))
    }

    /// Undo a `mark_delete`.
    pub fn rollback_delete(&mut self, pool: &mut BufferPoolManager, rid: RowId) -> RecordResult<()> {
        self.with_page(pool, rid, |view| view.rollback_delete(rid.slot))
    }

    /// Mark and immediately apply, for use without a transaction layer.
    pub fn delete(&mut self, pool: &mut BufferPoolManager, rid: RowId) -> RecordResult<()> {
        self.mark_delete(pool, rid)?;
        self.apply_delete(pool, rid)
    }

    /// Delete every page of the heap. The heap is unusable afterwards.
    pub fn free(&mut self, pool: &mut BufferPoolManager) -> RecordResult<()> {
        let mut page_id = self.first_page_id;
        while page_id != INVALID_PAGE_ID {
            let frame = pool.fetch_page(page_id)?;
            let next = TablePageView::new(pool.frame_data_mut(frame)).next_page_id();
            pool.unpin_page(page_id, false)?;
            pool.delete_page(page_id)?;
            page_id = next;
        }
        self.first_page_id = INVALID_PAGE_ID;
        Ok(())
    }

    /// Iterate the live tuples in chain order.
    pub fn iter<'a>(&'a self, pool: &'a mut BufferPoolManager) -> TableIter<'a> {
        TableIter {
            heap: self,
            pool,
            next_rid: None,
            started: false,
        }
    }

    fn with_page<F>(&mut self, pool: &mut BufferPoolManager, rid: RowId, op: F) -> RecordResult<()>
    where
        F: FnOnce(&mut TablePageView<'_>) -> bool,
    {
        if !rid.is_valid() {
            return Err(not_found(rid));
        }
        let frame = pool.fetch_page(rid.page_id)?;
        let mut view = TablePageView::new(pool.frame_data_mut(frame));
        let changed = op(&mut view);
        pool.unpin_page(rid.page_id, changed)?;
        if changed {
            Ok(())
        } else {
            Err(not_found(rid))
        }
    }

    /// First live tuple at or after the start of `page_id`'s chain suffix.
    fn first_rid_from(&self, pool: &mut BufferPoolManager, mut page_id: PageId) -> RecordResult<Option<RowId>> {
        while page_id != INVALID_PAGE_ID {
            let frame = pool.fetch_page(page_id)?;
            let view = TablePageView::new(pool.frame_data_mut(frame));
            let found = view.first_tuple_slot();
            let next = view.next_page_id();
            pool.unpin_page(page_id, false)?;
            if let Some(slot) = found {
                return Ok(Some(RowId::new(page_id, slot)));
            }
            page_id = next;
        }
        Ok(None)
    }

    /// Live tuple following `rid`, crossing page boundaries.
    fn next_rid(&self, pool: &mut BufferPoolManager, rid: RowId) -> RecordResult<Option<RowId>> {
        let frame = pool.fetch_page(rid.page_id)?;
        let view = TablePageView::new(pool.frame_data_mut(frame));
        let in_page = view.next_tuple_slot(rid.slot);
        let next_page = view.next_page_id();
        pool.unpin_page(rid.page_id, false)?;

        if let Some(slot) = in_page {
            return Ok(Some(RowId::new(rid.page_id, slot)));
        }
        self.first_rid_from(pool, next_page)
    }
}

fn not_found(rid: RowId) -> RecordError {
    RecordError::TupleNotFound {
        page_id: rid.page_id,
        slot: rid.slot,
    }
}

/// Forward iterator over a heap's live tuples.
///
/// Each step fetches, reads, and unpins; no pin is held between steps.
pub struct TableIter<'a> {
    heap: &'a TableHeap,
    pool: &'a mut BufferPoolManager,
    next_rid: Option<RowId>,
    started: bool,
}

impl Iterator for TableIter<'_> {
    type Item = RecordResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            self.next_rid = match self.heap.first_rid_from(self.pool, self.heap.first_page_id) {
                Ok(rid) => rid,
                Err(e) => return Some(Err(e)),
            };
        }

        let rid = self.next_rid?;
        let row = match self.heap.get(self.pool, rid) {
            Ok(row) => row,
            Err(e) => return Some(Err(e)),
        };
        self.next_rid = match self.heap.next_rid(self.pool, rid) {
            Ok(next) => next,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::DiskManager;
    use crate::record::{Column, DataType, Field};
    use tempfile::TempDir;

    fn sample_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Int, 0, false, true),
            Column::new("name", DataType::Char(8), 1, true, false),
        ])
    }

    fn setup() -> (TempDir, BufferPoolManager, TableHeap) {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskManager::open(dir.path().join("test.db")).unwrap();
        let mut pool = BufferPoolManager::new(disk, 16);
        let heap = TableHeap::create(&mut pool, sample_schema()).unwrap();
        (dir, pool, heap)
    }

    fn row(id: i32, name: &str) -> Row {
        Row::new(vec![Field::Int(id), Field::Char(name.to_string())])
    }

    #[test]
    fn test_insert_get_round_trip() {
        let (_dir, mut pool, mut heap) = setup();

        let mut r1 = row(1, "abc");
        let mut r2 = row(2, "xy");
        let mut r3 = row(3, "defg");
        heap.insert(&mut pool, &mut r1).unwrap();
        heap.insert(&mut pool, &mut r2).unwrap();
        heap.insert(&mut pool, &mut r3).unwrap();

        for r in [&r1, &r2, &r3] {
            let got = heap.get(&mut pool, r.rid).unwrap();
            assert_eq!(got.fields, r.fields);
            assert_eq!(got.rid, r.rid);
        }

        let rows: Vec<Row> = heap
            .iter(&mut pool)
            .collect::<RecordResult<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].fields, r1.fields);
        assert_eq!(rows[1].fields, r2.fields);
        assert_eq!(rows[2].fields, r3.fields);

        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_insert_spills_to_new_page() {
        let (_dir, mut pool, mut heap) = setup();

        // Enough rows to overflow one 4K page.
        let mut rids = Vec::new();
        for i in 0..400 {
            let mut r = row(i, "padpadpd");
            heap.insert(&mut pool, &mut r).unwrap();
            rids.push(r.rid);
        }
        assert!(rids.iter().any(|r| r.page_id != heap.first_page_id()));

        let count = heap.iter(&mut pool).count();
        assert_eq!(count, 400);
        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_row_too_large_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskManager::open(dir.path().join("test.db")).unwrap();
        let mut pool = BufferPoolManager::new(disk, 16);
        let schema = Schema::new(vec![Column::new("blob", DataType::Char(8000), 0, true, false)]);
        let mut heap = TableHeap::create(&mut pool, schema).unwrap();

        let mut r = Row::new(vec![Field::Char("x".repeat(5000))]);
        assert!(matches!(
            heap.insert(&mut pool, &mut r),
            Err(RecordError::RowTooLarge { .. })
        ));
    }

    #[test]
    fn test_update_in_place_keeps_rid() {
        let (_dir, mut pool, mut heap) = setup();
        let mut r = row(1, "before");
        heap.insert(&mut pool, &mut r).unwrap();
        let rid = r.rid;

        let mut updated = row(1, "after");
        heap.update(&mut pool, rid, &mut updated).unwrap();
        assert_eq!(updated.rid, rid);
        assert_eq!(
            heap.get(&mut pool, rid).unwrap().field(1),
            Some(&Field::Char("after".into()))
        );
    }

    #[test]
    fn test_update_moves_when_image_outgrows_page() {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskManager::open(dir.path().join("test.db")).unwrap();
        let mut pool = BufferPoolManager::new(disk, 16);
        let schema = Schema::new(vec![
            Column::new("id", DataType::Int, 0, false, true),
            Column::new("name", DataType::Char(600), 1, true, false),
        ]);
        let mut heap = TableHeap::create(&mut pool, schema).unwrap();

        // Fill the first page with short rows, letting one spill over.
        let mut first = Row::new(vec![Field::Int(0), Field::Char("short".into())]);
        heap.insert(&mut pool, &mut first).unwrap();
        let target = first.rid;
        loop {
            let mut r = Row::new(vec![Field::Int(9), Field::Char("short".into())]);
            heap.insert(&mut pool, &mut r).unwrap();
            if r.rid.page_id != target.page_id {
                break;
            }
        }

        // A much larger image cannot stay on the full page: the row moves
        // and the old slot is tombstoned.
        let mut updated = Row::new(vec![Field::Int(0), Field::Char("y".repeat(600))]);
        heap.update(&mut pool, target, &mut updated).unwrap();
        assert_ne!(updated.rid, target);
        assert!(heap.get(&mut pool, target).is_err());
        assert_eq!(
            heap.get(&mut pool, updated.rid).unwrap().field(1),
            Some(&Field::Char("y".repeat(600)))
        );
        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_two_phase_delete() {
        let (_dir, mut pool, mut heap) = setup();
        let mut r = row(5, "victim");
        heap.insert(&mut pool, &mut r).unwrap();
        let rid = r.rid;

        heap.mark_delete(&mut pool, rid).unwrap();
        assert!(heap.get(&mut pool, rid).is_err());

        heap.rollback_delete(&mut pool, rid).unwrap();
        assert_eq!(heap.get(&mut pool, rid).unwrap().fields, r.fields);

        heap.mark_delete(&mut pool, rid).unwrap();
        heap.apply_delete(&mut pool, rid).unwrap();
        assert!(heap.get(&mut pool, rid).is_err());
        // Deleting again fails.
        assert!(heap.mark_delete(&mut pool, rid).is_err());
    }

    #[test]
    fn test_iterator_skips_deleted() {
        let (_dir, mut pool, mut heap) = setup();
        let mut rids = Vec::new();
        for i in 0..10 {
            let mut r = row(i, "row");
            heap.insert(&mut pool, &mut r).unwrap();
            rids.push(r.rid);
        }
        for rid in rids.iter().step_by(2) {
            heap.delete(&mut pool, *rid).unwrap();
        }

        let ids: Vec<i32> = heap
            .iter(&mut pool)
            .map(|r| match r.unwrap().field(0) {
                Some(Field::Int(i)) => *i,
                _ => panic!("expected int"),
            })
            .collect();
        assert_eq!(ids, vec![1, 3, 5, 7, 9]);
        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_free_releases_all_pages() {
        let (_dir, mut pool, mut heap) = setup();
        for i in 0..400 {
            let mut r = row(i, "padpadpd");
            heap.insert(&mut pool, &mut r).unwrap();
        }
        let first = heap.first_page_id();

        heap.free(&mut pool).unwrap();
        assert_eq!(heap.first_page_id(), INVALID_PAGE_ID);
        assert!(pool.is_page_free(first).unwrap());
        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_empty_heap_iterates_nothing() {
        let (_dir, mut pool, heap) = setup();
        assert_eq!(heap.iter(&mut pool).count(), 0);
        assert!(pool.check_all_unpinned());
    }
}
