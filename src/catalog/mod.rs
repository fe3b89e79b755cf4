//! The catalog: which heaps and indices exist, and how to re-open them.

mod error;
mod meta;

pub use error::{CatalogError, CatalogResult};
pub use meta::{CatalogMeta, IndexInfo, IndexMetadata, TableInfo, TableMetadata};

use std::collections::HashMap;

use crate::buffer::BufferPoolManager;
use crate::file::{CATALOG_META_PAGE_ID, INDEX_ROOTS_PAGE_ID, PageId};
use crate::index::{BPlusTree, IndexId, KeyManager};
use crate::record::{Row, RowId, Schema, TableHeap};

/// Table ID type
pub type TableId = u32;

/// Tracks every table and index of the database and persists the registry
/// on logical page 0. Table and index ids advance monotonically and are
/// never reissued within a catalog's lifetime.
pub struct CatalogManager {
    meta: CatalogMeta,
    table_names: HashMap<String, TableId>,
    tables: HashMap<TableId, TableInfo>,
    /// table name -> index name -> index id
    index_names: HashMap<String, HashMap<String, IndexId>>,
    indexes: HashMap<IndexId, IndexInfo>,
    next_table_id: TableId,
    next_index_id: IndexId,
}

impl CatalogManager {
    /// Bootstrap a fresh database file, claiming the two reserved logical
    /// pages: catalog meta (0) and index roots (1).
    pub fn init(pool: &mut BufferPoolManager) -> CatalogResult<Self> {
        let meta = CatalogMeta::new();

        let (meta_pid, meta_frame) = pool.new_page()?;
        if meta_pid != CATALOG_META_PAGE_ID {
            pool.unpin_page(meta_pid, false)?;
            pool.delete_page(meta_pid)?;
            return Err(CatalogError::Corrupted(
                "cannot bootstrap: database file is not empty".into(),
            ));
        }
        let write_result = meta.write_to_page(pool.frame_data_mut(meta_frame));
        pool.unpin_page(meta_pid, write_result.is_ok())?;
        write_result?;

        let (roots_pid, _) = pool.new_page()?;
        if roots_pid != INDEX_ROOTS_PAGE_ID {
            pool.unpin_page(roots_pid, false)?;
            pool.delete_page(roots_pid)?;
            return Err(CatalogError::Corrupted(
                "cannot bootstrap: database file is not empty".into(),
            ));
        }
        // A zeroed page is an empty index-roots directory.
        pool.unpin_page(roots_pid, true)?;

        pool.flush_page(CATALOG_META_PAGE_ID)?;
        pool.flush_page(INDEX_ROOTS_PAGE_ID)?;

        Ok(Self {
            meta,
            table_names: HashMap::new(),
            tables: HashMap::new(),
            index_names: HashMap::new(),
            indexes: HashMap::new(),
            next_table_id: 0,
            next_index_id: 0,
        })
    }

    /// Load the catalog of an existing database and re-open every recorded
    /// table and index.
    pub fn open(pool: &mut BufferPoolManager) -> CatalogResult<Self> {
        let frame = pool.fetch_page(CATALOG_META_PAGE_ID)?;
        let parsed = CatalogMeta::read_from_page(pool.frame_data(frame));
        pool.unpin_page(CATALOG_META_PAGE_ID, false)?;
        let meta = parsed?;

        let mut catalog = Self {
            next_table_id: meta.next_table_id(),
            next_index_id: meta.next_index_id(),
            meta,
            table_names: HashMap::new(),
            tables: HashMap::new(),
            index_names: HashMap::new(),
            indexes: HashMap::new(),
        };

        let tables: Vec<(TableId, PageId)> = catalog.meta.tables().collect();
        for (table_id, meta_page) in tables {
            if let Err(e) = catalog.load_table(pool, table_id, meta_page) {
                tracing::warn!(table_id, meta_page, "failed to load table metadata: {e}");
                return Err(e);
            }
        }
        let indexes: Vec<(IndexId, PageId)> = catalog.meta.indexes().collect();
        for (index_id, meta_page) in indexes {
            if let Err(e) = catalog.load_index(pool, index_id, meta_page) {
                tracing::warn!(index_id, meta_page, "failed to load index metadata: {e}");
                return Err(e);
            }
        }
        Ok(catalog)
    }

    // ---------------------------------------------------------------------
    // Tables
    // ---------------------------------------------------------------------

    pub fn create_table(
        &mut self,
        pool: &mut BufferPoolManager,
        name: &str,
        schema: Schema,
    ) -> CatalogResult<TableId> {
        if self.table_names.contains_key(name) {
            return Err(CatalogError::TableAlreadyExists(name.to_string()));
        }

        let table_id = self.next_table_id;
        let mut heap = TableHeap::create(pool, schema.clone())?;

        let table_meta = TableMetadata {
            table_id,
            name: name.to_string(),
            first_page_id: heap.first_page_id(),
            schema,
        };

        let meta_page = match pool.new_page() {
            Ok((meta_pid, meta_frame)) => {
                let write_result = table_meta.write_to_page(pool.frame_data_mut(meta_frame));
                pool.unpin_page(meta_pid, write_result.is_ok())?;
                match write_result {
                    Ok(()) => Ok(meta_pid),
                    Err(e) => {
                        pool.delete_page(meta_pid)?;
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e.into()),
        };
        let meta_pid = match meta_page {
            Ok(meta_pid) => meta_pid,
            Err(e) => {
                heap.free(pool)?;
                return Err(e);
            }
        };

        self.meta.insert_table(table_id, meta_pid);
        if let Err(e) = self.flush(pool) {
            self.meta.remove_table(table_id);
            pool.delete_page(meta_pid)?;
            heap.free(pool)?;
            return Err(e);
        }

        self.table_names.insert(name.to_string(), table_id);
        self.tables.insert(table_id, TableInfo { meta: table_meta, heap });
        self.next_table_id += 1;
        Ok(table_id)
    }

    pub fn table(&self, name: &str) -> CatalogResult<&TableInfo> {
        let id = self.table_id(name)?;
        self.tables
            .get(&id)
            .ok_or_else(|| CatalogError::Corrupted(format!("table '{name}' has no info record")))
    }

    pub fn table_mut(&mut self, name: &str) -> CatalogResult<&mut TableInfo> {
        let id = self.table_id(name)?;
        self.tables
            .get_mut(&id)
            .ok_or_else(|| CatalogError::Corrupted(format!("table '{name}' has no info record")))
    }

    pub fn table_by_id(&self, table_id: TableId) -> Option<&TableInfo> {
        self.tables.get(&table_id)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.values()
    }

    pub fn drop_table(&mut self, pool: &mut BufferPoolManager, name: &str) -> CatalogResult<()> {
        let table_id = self.table_id(name)?;

        // Dependent indices go first.
        let index_names: Vec<String> = self
            .index_names
            .get(name)
            .map(|by_name| by_name.keys().cloned().collect())
            .unwrap_or_default();
        for index_name in index_names {
            self.drop_index(pool, name, &index_name)?;
        }

        let mut info = self
            .tables
            .remove(&table_id)
            .ok_or_else(|| CatalogError::Corrupted(format!("table '{name}' has no info record")))?;
        self.table_names.remove(name);
        self.index_names.remove(name);

        info.heap.free(pool)?;
        if let Some(meta_page) = self.meta.remove_table(table_id) {
            pool.delete_page(meta_page)?;
        }
        self.flush(pool)
    }

    // ---------------------------------------------------------------------
    // Indices
    // ---------------------------------------------------------------------

    /// Create an index over `key_columns` of `table_name`. If the table
    /// already holds rows, they are backfilled into the new tree.
    pub fn create_index(
        &mut self,
        pool: &mut BufferPoolManager,
        table_name: &str,
        index_name: &str,
        key_columns: &[&str],
    ) -> CatalogResult<IndexId> {
        let table_id = self.table_id(table_name)?;
        if self
            .index_names
            .get(table_name)
            .is_some_and(|by_name| by_name.contains_key(index_name))
        {
            return Err(CatalogError::IndexAlreadyExists(index_name.to_string()));
        }
        if key_columns.is_empty() {
            return Err(CatalogError::EmptyIndexKey);
        }

        let table = self.tables.get(&table_id).ok_or_else(|| {
            CatalogError::Corrupted(format!("table '{table_name}' has no info record"))
        })?;
        let mut key_map = Vec::with_capacity(key_columns.len());
        for &column in key_columns {
            let position = table
                .schema()
                .column_index(column)
                .ok_or_else(|| CatalogError::ColumnNotFound(column.to_string()))?;
            key_map.push(position as u32);
        }
        let key_schema = table.schema().project(&key_map)?;

        let index_id = self.next_index_id;
        let index_meta = IndexMetadata {
            index_id,
            name: index_name.to_string(),
            table_id,
            key_map,
        };

        let (meta_pid, meta_frame) = pool.new_page()?;
        let write_result = index_meta.write_to_page(pool.frame_data_mut(meta_frame));
        pool.unpin_page(meta_pid, write_result.is_ok())?;
        if let Err(e) = write_result {
            pool.delete_page(meta_pid)?;
            return Err(e);
        }

        let key_manager = KeyManager::new(key_schema.clone());
        let mut tree = match BPlusTree::new(pool, index_id, key_manager.clone(), None, None) {
            Ok(tree) => tree,
            Err(e) => {
                pool.delete_page(meta_pid)?;
                return Err(e.into());
            }
        };

        if let Err(e) = backfill_index(pool, &table.heap, &key_schema, &key_manager, &mut tree) {
            tree.destroy(pool)?;
            pool.delete_page(meta_pid)?;
            return Err(e);
        }

        self.meta.insert_index(index_id, meta_pid);
        if let Err(e) = self.flush(pool) {
            self.meta.remove_index(index_id);
            tree.destroy(pool)?;
            pool.delete_page(meta_pid)?;
            return Err(e);
        }

        self.index_names
            .entry(table_name.to_string())
            .or_default()
            .insert(index_name.to_string(), index_id);
        self.indexes.insert(
            index_id,
            IndexInfo {
                meta: index_meta,
                key_schema,
                tree,
            },
        );
        self.next_index_id += 1;
        Ok(index_id)
    }

    pub fn index(&self, table_name: &str, index_name: &str) -> CatalogResult<&IndexInfo> {
        let id = self.index_id(table_name, index_name)?;
        self.indexes.get(&id).ok_or_else(|| {
            CatalogError::Corrupted(format!("index '{index_name}' has no info record"))
        })
    }

    pub fn index_mut(&mut self, table_name: &str, index_name: &str) -> CatalogResult<&mut IndexInfo> {
        let id = self.index_id(table_name, index_name)?;
        self.indexes.get_mut(&id).ok_or_else(|| {
            CatalogError::Corrupted(format!("index '{index_name}' has no info record"))
        })
    }

    pub fn table_indexes(&self, table_name: &str) -> CatalogResult<Vec<&IndexInfo>> {
        if !self.table_names.contains_key(table_name) {
            return Err(CatalogError::TableNotFound(table_name.to_string()));
        }
        let mut found = Vec::new();
        if let Some(by_name) = self.index_names.get(table_name) {
            for &id in by_name.values() {
                let info = self.indexes.get(&id).ok_or_else(|| {
                    CatalogError::Corrupted(format!("index {id} has no info record"))
                })?;
                found.push(info);
            }
        }
        Ok(found)
    }

    pub fn drop_index(
        &mut self,
        pool: &mut BufferPoolManager,
        table_name: &str,
        index_name: &str,
    ) -> CatalogResult<()> {
        let index_id = self.index_id(table_name, index_name)?;

        let mut info = self
            .indexes
            .remove(&index_id)
            .ok_or_else(|| CatalogError::Corrupted(format!("index '{index_name}' has no info record")))?;
        if let Some(by_name) = self.index_names.get_mut(table_name) {
            by_name.remove(index_name);
            if by_name.is_empty() {
                self.index_names.remove(table_name);
            }
        }

        info.tree.destroy(pool)?;
        if let Some(meta_page) = self.meta.remove_index(index_id) {
            pool.delete_page(meta_page)?;
        }
        self.flush(pool)
    }

    // ---------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------

    /// Write the catalog meta through to disk. This is the commit point of
    /// every DDL operation.
    pub fn flush(&self, pool: &mut BufferPoolManager) -> CatalogResult<()> {
        let frame = pool.fetch_page(CATALOG_META_PAGE_ID)?;
        let write_result = self.meta.write_to_page(pool.frame_data_mut(frame));
        pool.unpin_page(CATALOG_META_PAGE_ID, write_result.is_ok())?;
        write_result?;
        pool.flush_page(CATALOG_META_PAGE_ID)?;
        Ok(())
    }

    fn load_table(
        &mut self,
        pool: &mut BufferPoolManager,
        table_id: TableId,
        meta_page: PageId,
    ) -> CatalogResult<()> {
        let frame = pool.fetch_page(meta_page)?;
        let parsed = TableMetadata::read_from_page(pool.frame_data(frame));
        pool.unpin_page(meta_page, false)?;
        let table_meta = match parsed {
            Ok(table_meta) => table_meta,
            Err(e) => {
                tracing::error!(table_id, meta_page, "table metadata did not deserialize: {e}");
                return Err(e);
            }
        };

        if table_meta.table_id != table_id {
            tracing::error!(
                table_id,
                claimed = table_meta.table_id,
                meta_page,
                "table id mismatch between registry and meta page"
            );
            return Err(CatalogError::Corrupted(format!(
                "table meta page {meta_page} claims id {}, registry says {table_id}",
                table_meta.table_id
            )));
        }

        let heap = TableHeap::open(table_meta.first_page_id, table_meta.schema.clone());
        self.table_names.insert(table_meta.name.clone(), table_id);
        self.tables.insert(table_id, TableInfo { meta: table_meta, heap });
        Ok(())
    }

    fn load_index(
        &mut self,
        pool: &mut BufferPoolManager,
        index_id: IndexId,
        meta_page: PageId,
    ) -> CatalogResult<()> {
        let frame = pool.fetch_page(meta_page)?;
        let parsed = IndexMetadata::read_from_page(pool.frame_data(frame));
        pool.unpin_page(meta_page, false)?;
        let index_meta = match parsed {
            Ok(index_meta) => index_meta,
            Err(e) => {
                tracing::error!(index_id, meta_page, "index metadata did not deserialize: {e}");
                return Err(e);
            }
        };

        if index_meta.index_id != index_id {
            tracing::error!(
                index_id,
                claimed = index_meta.index_id,
                meta_page,
                "index id mismatch between registry and meta page"
            );
            return Err(CatalogError::Corrupted(format!(
                "index meta page {meta_page} claims id {}, registry says {index_id}",
                index_meta.index_id
            )));
        }

        let table = self.tables.get(&index_meta.table_id).ok_or_else(|| {
            tracing::error!(
                index_id,
                table_id = index_meta.table_id,
                "index references a table that is not in the catalog"
            );
            CatalogError::Corrupted(format!(
                "index '{}' references missing table {}",
                index_meta.name, index_meta.table_id
            ))
        })?;
        let table_name = table.name().to_string();
        let key_schema = table.schema().project(&index_meta.key_map)?;

        let tree = BPlusTree::new(pool, index_id, KeyManager::new(key_schema.clone()), None, None)?;
        self.index_names
            .entry(table_name)
            .or_default()
            .insert(index_meta.name.clone(), index_id);
        self.indexes.insert(
            index_id,
            IndexInfo {
                meta: index_meta,
                key_schema,
                tree,
            },
        );
        Ok(())
    }

    fn table_id(&self, name: &str) -> CatalogResult<TableId> {
        self.table_names
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    fn index_id(&self, table_name: &str, index_name: &str) -> CatalogResult<IndexId> {
        if !self.table_names.contains_key(table_name) {
            return Err(CatalogError::TableNotFound(table_name.to_string()));
        }
        self.index_names
            .get(table_name)
            .and_then(|by_name| by_name.get(index_name))
            .copied()
            .ok_or_else(|| CatalogError::IndexNotFound(index_name.to_string()))
    }
}

/// Insert every existing row of `heap` into a freshly created index.
fn backfill_index(
    pool: &mut BufferPoolManager,
    heap: &TableHeap,
    key_schema: &Schema,
    key_manager: &KeyManager,
    tree: &mut BPlusTree,
) -> CatalogResult<()> {
    let mut entries: Vec<(Vec<u8>, RowId)> = Vec::new();
    for row in heap.iter(pool) {
        let row: Row = row?;
        let key_row = row.key_from_row(key_schema)?;
        entries.push((key_manager.serialize(&key_row)?, row.rid));
    }
    for (key, rid) in entries {
        tree.insert(pool, &key, rid)?;
    }
    Ok(())
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
            Column::new("name", DataType::Char(16), 1, true, false),
        ])
    }

    fn setup() -> (TempDir, BufferPoolManager, CatalogManager) {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskManager::open(dir.path().join("test.db")).unwrap();
        let mut pool = BufferPoolManager::new(disk, 64);
        let catalog = CatalogManager::init(&mut pool).unwrap();
        (dir, pool, catalog)
    }

    fn row(id: i32, name: &str) -> Row {
        Row::new(vec![Field::Int(id), Field::Char(name.to_string())])
    }

    #[test]
    fn test_create_table_and_ids_advance() {
        let (_dir, mut pool, mut catalog) = setup();

        let a = catalog.create_table(&mut pool, "alpha", sample_schema()).unwrap();
        let b = catalog.create_table(&mut pool, "beta", sample_schema()).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);

        assert!(matches!(
            catalog.create_table(&mut pool, "alpha", sample_schema()),
            Err(CatalogError::TableAlreadyExists(_))
        ));
        assert_eq!(catalog.tables().count(), 2);
        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_table_lookup() {
        let (_dir, mut pool, mut catalog) = setup();
        let id = catalog.create_table(&mut pool, "alpha", sample_schema()).unwrap();

        assert_eq!(catalog.table("alpha").unwrap().table_id(), id);
        assert!(catalog.table_by_id(id).is_some());
        assert!(matches!(
            catalog.table("missing"),
            Err(CatalogError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_insert_rows_through_catalog() {
        let (_dir, mut pool, mut catalog) = setup();
        catalog.create_table(&mut pool, "alpha", sample_schema()).unwrap();

        let table = catalog.table_mut("alpha").unwrap();
        for i in 0..20 {
            let mut r = row(i, "some name");
            table.heap.insert(&mut pool, &mut r).unwrap();
        }
        let count = table.heap.iter(&mut pool).count();
        assert_eq!(count, 20);
        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_create_index_with_backfill() {
        let (_dir, mut pool, mut catalog) = setup();
        catalog.create_table(&mut pool, "alpha", sample_schema()).unwrap();

        let mut rids = Vec::new();
        {
            let table = catalog.table_mut("alpha").unwrap();
            for i in 0..50 {
                let mut r = row(i, "bulk");
                table.heap.insert(&mut pool, &mut r).unwrap();
                rids.push((i, r.rid));
            }
        }

        catalog
            .create_index(&mut pool, "alpha", "alpha_by_id", &["id"])
            .unwrap();

        let index = catalog.index_mut("alpha", "alpha_by_id").unwrap();
        let km = index.tree.key_manager().clone();
        for (i, rid) in rids {
            let key = km.serialize(&Row::new(vec![Field::Int(i)])).unwrap();
            assert_eq!(index.tree.get_value(&mut pool, &key).unwrap(), Some(rid));
        }
        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_create_index_validation() {
        let (_dir, mut pool, mut catalog) = setup();
        catalog.create_table(&mut pool, "alpha", sample_schema()).unwrap();

        assert!(matches!(
            catalog.create_index(&mut pool, "missing", "x", &["id"]),
            Err(CatalogError::TableNotFound(_))
        ));
        assert!(matches!(
            catalog.create_index(&mut pool, "alpha", "x", &[]),
            Err(CatalogError::EmptyIndexKey)
        ));
        assert!(matches!(
            catalog.create_index(&mut pool, "alpha", "x", &["nope"]),
            Err(CatalogError::ColumnNotFound(_))
        ));

        catalog.create_index(&mut pool, "alpha", "x", &["id"]).unwrap();
        assert!(matches!(
            catalog.create_index(&mut pool, "alpha", "x", &["id"]),
            Err(CatalogError::IndexAlreadyExists(_))
        ));
    }

    #[test]
    fn test_drop_index() {
        let (_dir, mut pool, mut catalog) = setup();
        catalog.create_table(&mut pool, "alpha", sample_schema()).unwrap();
        catalog.create_index(&mut pool, "alpha", "x", &["id"]).unwrap();

        catalog.drop_index(&mut pool, "alpha", "x").unwrap();
        assert!(matches!(
            catalog.index("alpha", "x"),
            Err(CatalogError::IndexNotFound(_))
        ));
        // Recreating under the same name gets a fresh id.
        let id = catalog.create_index(&mut pool, "alpha", "x", &["id"]).unwrap();
        assert_eq!(id, 1);
        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_drop_table_drops_dependent_indexes() {
        let (_dir, mut pool, mut catalog) = setup();
        catalog.create_table(&mut pool, "alpha", sample_schema()).unwrap();
        catalog.create_index(&mut pool, "alpha", "by_id", &["id"]).unwrap();
        catalog.create_index(&mut pool, "alpha", "by_name", &["name"]).unwrap();
        assert_eq!(catalog.table_indexes("alpha").unwrap().len(), 2);

        catalog.drop_table(&mut pool, "alpha").unwrap();
        assert!(matches!(
            catalog.table("alpha"),
            Err(CatalogError::TableNotFound(_))
        ));

        // A new table may reuse the name; ids keep advancing.
        let id = catalog.create_table(&mut pool, "alpha", sample_schema()).unwrap();
        assert_eq!(id, 1);
        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_catalog_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut stored_rids = Vec::new();

        {
            let disk = DiskManager::open(&path).unwrap();
            let mut pool = BufferPoolManager::new(disk, 64);
            let mut catalog = CatalogManager::init(&mut pool).unwrap();
            catalog.create_table(&mut pool, "alpha", sample_schema()).unwrap();
            {
                let table = catalog.table_mut("alpha").unwrap();
                for i in 0..30 {
                    let mut r = row(i, "persisted");
                    table.heap.insert(&mut pool, &mut r).unwrap();
                    stored_rids.push((i, r.rid));
                }
            }
            catalog.create_index(&mut pool, "alpha", "by_id", &["id"]).unwrap();
            pool.close().unwrap();
        }

        let disk = DiskManager::open(&path).unwrap();
        let mut pool = BufferPoolManager::new(disk, 64);
        let mut catalog = CatalogManager::open(&mut pool).unwrap();

        // Heap contents are back.
        let table = catalog.table("alpha").unwrap();
        assert_eq!(table.name(), "alpha");
        assert_eq!(table.schema().column_count(), 2);
        let rows: Vec<Row> = table
            .heap
            .iter(&mut pool)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 30);

        // The index still resolves every key.
        let index = catalog.index_mut("alpha", "by_id").unwrap();
        let km = index.tree.key_manager().clone();
        for (i, rid) in stored_rids {
            let key = km.serialize(&Row::new(vec![Field::Int(i)])).unwrap();
            assert_eq!(index.tree.get_value(&mut pool, &key).unwrap(), Some(rid));
        }

        // Ids continue past the recorded maximum.
        let next = catalog.create_table(&mut pool, "beta", sample_schema()).unwrap();
        assert_eq!(next, 1);
        assert!(pool.check_all_unpinned());
    }

    #[test]
    fn test_init_on_nonempty_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let disk = DiskManager::open(&path).unwrap();
            let mut pool = BufferPoolManager::new(disk, 16);
            CatalogManager::init(&mut pool).unwrap();
            pool.close().unwrap();
        }

        let disk = DiskManager::open(&path).unwrap();
        let mut pool = BufferPoolManager::new(disk, 16);
        assert!(matches!(
            CatalogManager::init(&mut pool),
            Err(CatalogError::Corrupted(_))
        ));
    }
}
