use std::collections::BTreeMap;

use crate::file::{PAGE_SIZE, PageId};
use crate::index::{BPlusTree, IndexId};
use crate::record::{Cursor, Schema, TableHeap};

use super::error::{CatalogError, CatalogResult};
use super::TableId;

const CATALOG_META_MAGIC: u32 = 89849901;
const TABLE_META_MAGIC: u32 = 344528;
const INDEX_META_MAGIC: u32 = 627635;

/// The catalog's own directory, persisted on logical page 0: which meta
/// page describes each table and index.
#[derive(Debug, Default)]
pub struct CatalogMeta {
    table_meta_pages: BTreeMap<TableId, PageId>,
    index_meta_pages: BTreeMap<IndexId, PageId>,
}

impl CatalogMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> impl Iterator<Item = (TableId, PageId)> + '_ {
        self.table_meta_pages.iter().map(|(&id, &page)| (id, page))
    }

    pub fn indexes(&self) -> impl Iterator<Item = (IndexId, PageId)> + '_ {
        self.index_meta_pages.iter().map(|(&id, &page)| (id, page))
    }

    pub fn insert_table(&mut self, table_id: TableId, meta_page: PageId) {
        self.table_meta_pages.insert(table_id, meta_page);
    }

    pub fn remove_table(&mut self, table_id: TableId) -> Option<PageId> {
        self.table_meta_pages.remove(&table_id)
    }

    pub fn insert_index(&mut self, index_id: IndexId, meta_page: PageId) {
        self.index_meta_pages.insert(index_id, meta_page);
    }

    pub fn remove_index(&mut self, index_id: IndexId) -> Option<PageId> {
        self.index_meta_pages.remove(&index_id)
    }

    /// Smallest table id not yet issued.
    pub fn next_table_id(&self) -> TableId {
        self.table_meta_pages.keys().max().map_or(0, |&id| id + 1)
    }

    /// Smallest index id not yet issued.
    pub fn next_index_id(&self) -> IndexId {
        self.index_meta_pages.keys().max().map_or(0, |&id| id + 1)
    }

    /// Serialize into a page image. Fails if the catalog outgrows the page.
    pub fn write_to_page(&self, page: &mut [u8]) -> CatalogResult<()> {
        let mut out = Vec::with_capacity(12 + (self.table_meta_pages.len() + self.index_meta_pages.len()) * 8);
        out.extend_from_slice(&CATALOG_META_MAGIC.to_le_bytes());
        out.extend_from_slice(&(self.table_meta_pages.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.index_meta_pages.len() as u32).to_le_bytes());
        for (&id, &meta_page) in &self.table_meta_pages {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&meta_page.to_le_bytes());
        }
        for (&id, &meta_page) in &self.index_meta_pages {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&meta_page.to_le_bytes());
        }
        if out.len() > PAGE_SIZE {
            return Err(CatalogError::Corrupted(
                "catalog meta outgrew its page".into(),
            ));
        }
        page.fill(0);
        page[..out.len()].copy_from_slice(&out);
        Ok(())
    }

    pub fn read_from_page(page: &[u8]) -> CatalogResult<Self> {
        let mut cursor = Cursor::new(page);
        let magic = cursor.read_u32()?;
        if magic != CATALOG_META_MAGIC {
            return Err(CatalogError::Corrupted(format!(
                "bad catalog magic {magic:#x}"
            )));
        }
        let table_count = cursor.read_u32()?;
        let index_count = cursor.read_u32()?;

        let mut meta = CatalogMeta::new();
        for _ in 0..table_count {
            let id = cursor.read_u32()?;
            let page_id = cursor.read_u32()?;
            meta.table_meta_pages.insert(id, page_id);
        }
        for _ in 0..index_count {
            let id = cursor.read_u32()?;
            let page_id = cursor.read_u32()?;
            meta.index_meta_pages.insert(id, page_id);
        }
        Ok(meta)
    }
}

/// Everything needed to re-open a table: identity, heap root, and schema.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    pub table_id: TableId,
    pub name: String,
    pub first_page_id: PageId,
    pub schema: Schema,
}

impl TableMetadata {
    pub fn write_to_page(&self, page: &mut [u8]) -> CatalogResult<()> {
        let mut out = Vec::new();
        out.extend_from_slice(&TABLE_META_MAGIC.to_le_bytes());
        out.extend_from_slice(&self.table_id.to_le_bytes());
        out.extend_from_slice(&(self.name.len() as u32).to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&self.first_page_id.to_le_bytes());
        self.schema.serialize_into(&mut out);
        if out.len() > PAGE_SIZE {
            return Err(CatalogError::Corrupted(format!(
                "table metadata for '{}' outgrew its page",
                self.name
            )));
        }
        page.fill(0);
        page[..out.len()].copy_from_slice(&out);
        Ok(())
    }

    pub fn read_from_page(page: &[u8]) -> CatalogResult<Self> {
        let mut cursor = Cursor::new(page);
        let magic = cursor.read_u32()?;
        if magic != TABLE_META_MAGIC {
            return Err(CatalogError::Corrupted(format!(
                "bad table metadata magic {magic:#x}"
            )));
        }
        let table_id = cursor.read_u32()?;
        let name_len = cursor.read_u32()? as usize;
        let name = String::from_utf8(cursor.read_bytes(name_len)?.to_vec())
            .map_err(|e| CatalogError::Corrupted(format!("table name not UTF-8: {e}")))?;
        let first_page_id = cursor.read_u32()?;
        let (schema, _) = Schema::deserialize_from(cursor.remaining())?;
        Ok(Self {
            table_id,
            name,
            first_page_id,
            schema,
        })
    }
}

/// Everything needed to re-open an index: identity, owning table, and the
/// table-column positions of its key.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMetadata {
    pub index_id: IndexId,
    pub name: String,
    pub table_id: TableId,
    pub key_map: Vec<u32>,
}

impl IndexMetadata {
    pub fn write_to_page(&self, page: &mut [u8]) -> CatalogResult<()> {
        let mut out = Vec::new();
        out.extend_from_slice(&INDEX_META_MAGIC.to_le_bytes());
        out.extend_from_slice(&self.index_id.to_le_bytes());
        out.extend_from_slice(&(self.name.len() as u32).to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&self.table_id.to_le_bytes());
        out.extend_from_slice(&(self.key_map.len() as u32).to_le_bytes());
        for &column in &self.key_map {
            out.extend_from_slice(&column.to_le_bytes());
        }
        if out.len() > PAGE_SIZE {
            return Err(CatalogError::Corrupted(format!(
                "index metadata for '{}' outgrew its page",
                self.name
            )));
        }
        page.fill(0);
        page[..out.len()].copy_from_slice(&out);
        Ok(())
    }

    pub fn read_from_page(page: &[u8]) -> CatalogResult<Self> {
        let mut cursor = Cursor::new(page);
        let magic = cursor.read_u32()?;
        if magic != INDEX_META_MAGIC {
            return Err(CatalogError::Corrupted(format!(
                "bad index metadata magic {magic:#x}"
            )));
        }
        let index_id = cursor.read_u32()?;
        let name_len = cursor.read_u32()? as usize;
        let name = String::from_utf8(cursor.read_bytes(name_len)?.to_vec())
            .map_err(|e| CatalogError::Corrupted(format!("index name not UTF-8: {e}")))?;
        let table_id = cursor.read_u32()?;
        let key_count = cursor.read_u32()? as usize;
        let mut key_map = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            key_map.push(cursor.read_u32()?);
        }
        Ok(Self {
            index_id,
            name,
            table_id,
            key_map,
        })
    }
}

/// A live table: its metadata plus the heap storing its rows.
pub struct TableInfo {
    pub meta: TableMetadata,
    pub heap: TableHeap,
}

impl TableInfo {
    pub fn table_id(&self) -> TableId {
        self.meta.table_id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn schema(&self) -> &Schema {
        &self.meta.schema
    }
}

/// A live index: its metadata, the key schema projected from the table,
/// and the B+-tree storing its entries.
pub struct IndexInfo {
    pub meta: IndexMetadata,
    pub key_schema: Schema,
    pub tree: BPlusTree,
}

impl IndexInfo {
    pub fn index_id(&self) -> IndexId {
        self.meta.index_id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn table_id(&self) -> TableId {
        self.meta.table_id
    }
}
