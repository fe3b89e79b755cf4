mod column;
mod error;
mod row;
mod schema;
mod table_heap;
mod table_page;
mod value;

pub use column::Column;
pub(crate) use column::Cursor;
pub use error::{RecordError, RecordResult};
pub use row::Row;
pub use schema::Schema;
pub use table_heap::{TableHeap, TableIter};
pub use table_page::{TablePageView, UpdateOutcome};
pub use value::{DataType, Field};

use crate::file::{INVALID_PAGE_ID, PageId};

/// Location of a tuple: the page holding it and its slot number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId {
    pub page_id: PageId,
    pub slot: u32,
}

impl RowId {
    pub fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }

    pub fn is_valid(&self) -> bool {
        self.page_id != INVALID_PAGE_ID
    }
}

/// Sentinel RowId meaning "no tuple"
pub const INVALID_ROWID: RowId = RowId {
    page_id: INVALID_PAGE_ID,
    slot: 0,
};
