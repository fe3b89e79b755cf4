//! Persistent B+-tree index over serialized composite keys.

mod b_plus_tree;
mod btree_page;
mod error;
mod index_roots_page;
mod key;

pub use b_plus_tree::{BPlusTree, TreeIter};
pub use btree_page::{InternalView, LeafView};
pub use error::{IndexError, IndexResult};
pub use index_roots_page::IndexRootsView;
pub use key::KeyManager;

/// Index ID type
pub type IndexId = u32;
