//! Storage and access-method core of a teaching relational database.
//!
//! The crate owns the on-disk representation of a single database file and
//! everything needed to query it: a disk space manager that hands out pages
//! from bitmap-controlled extents (`file`), a buffer pool that caches pages
//! under pin/unpin discipline with LRU eviction (`buffer`), heaps of
//! variable-width tuples in linked slotted pages (`record`), persistent
//! B+-tree indices over serialized keys (`index`), and a catalog that
//! re-opens all of it across restarts (`catalog`).
//!
//! Execution above this layer (SQL, planning, transactions) lives elsewhere;
//! callers construct the components directly:
//!
//! ```no_run
//! use minirel::buffer::BufferPoolManager;
//! use minirel::catalog::CatalogManager;
//! use minirel::file::DiskManager;
//! use minirel::record::{Column, DataType, Field, Row, Schema};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let disk = DiskManager::open("example.db")?;
//! let mut pool = BufferPoolManager::new(disk, 1024);
//! let mut catalog = CatalogManager::init(&mut pool)?;
//!
//! let schema = Schema::new(vec![
//!     Column::new("id", DataType::Int, 0, false, true),
//!     Column::new("name", DataType::Char(32), 1, true, false),
//! ]);
//! catalog.create_table(&mut pool, "people", schema)?;
//!
//! let table = catalog.table_mut("people")?;
//! let mut row = Row::new(vec![Field::Int(1), Field::Char("ada".into())]);
//! table.heap.insert(&mut pool, &mut row)?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod catalog;
pub mod file;
pub mod index;
pub mod record;
