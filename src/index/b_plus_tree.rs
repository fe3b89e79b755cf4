use std::cmp::Ordering;

use crate::buffer::{BufferPoolManager, FrameId};
use crate::file::{INDEX_ROOTS_PAGE_ID, INVALID_PAGE_ID, PageId};
use crate::record::RowId;

use super::btree_page::{
    internal_capacity, is_leaf, leaf_capacity, node_max_size, node_size, parent_page_id,
    set_parent_page_id, InternalView, LeafView,
};
use super::error::{IndexError, IndexResult};
use super::index_roots_page::IndexRootsView;
use super::key::KeyManager;
use super::IndexId;

/// A persistent B+-tree mapping fixed-width serialized keys to RowIds.
///
/// Node pages live in the buffer pool; the root page id is persisted in the
/// index-roots directory so the tree survives restarts. All keys are unique.
/// The tree holds no reference to the buffer pool; operations borrow it.
pub struct BPlusTree {
    index_id: IndexId,
    root_page_id: PageId,
    key_manager: KeyManager,
    leaf_max_size: u32,
    internal_max_size: u32,
}

impl BPlusTree {
    /// Open (or register) the tree for `index_id`, consulting the
    /// index-roots directory for a persisted root. `None` sizes derive the
    /// largest max sizes the page size permits.
    pub fn new(
        pool: &mut BufferPoolManager,
        index_id: IndexId,
        key_manager: KeyManager,
        leaf_max_size: Option<u32>,
        internal_max_size: Option<u32>,
    ) -> IndexResult<Self> {
        let key_size = key_manager.key_size();
        let leaf_max_size = leaf_max_size.unwrap_or_else(|| leaf_capacity(key_size) - 1);
        let internal_max_size = internal_max_size.unwrap_or_else(|| internal_capacity(key_size) - 1);

        if leaf_max_size < 2 || leaf_max_size >= leaf_capacity(key_size) {
            return Err(IndexError::InvalidOrder(leaf_max_size));
        }
        if internal_max_size < 3 || internal_max_size >= internal_capacity(key_size) {
            return Err(IndexError::InvalidOrder(internal_max_size));
        }

        let frame = pool.fetch_page(INDEX_ROOTS_PAGE_ID)?;
        let (root_page_id, registered) = {
            let mut roots = IndexRootsView::new(pool.frame_data_mut(frame));
            match roots.get(index_id) {
                Some(root) => (root, false),
                None => {
                    if !roots.insert(index_id, INVALID_PAGE_ID) {
                        pool.unpin_page(INDEX_ROOTS_PAGE_ID, false)?;
                        return Err(IndexError::Corrupted("index roots page is full".into()));
                    }
                    (INVALID_PAGE_ID, true)
                }
            }
        };
        pool.unpin_page(INDEX_ROOTS_PAGE_ID, registered)?;

        Ok(Self {
            index_id,
            root_page_id,
            key_manager,
            leaf_max_size,
            internal_max_size,
        })
    }

    pub fn index_id(&self) -> IndexId {
        self.index_id
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.key_manager
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    /// Point lookup.
    pub fn get_value(&self, pool: &mut BufferPoolManager, key: &[u8]) -> IndexResult<Option<RowId>> {
        self.check_key(key)?;
        if self.is_empty() {
            return Ok(None);
        }
        let (leaf_pid, leaf_frame) = self.find_leaf(pool, Some(key))?;
        let found = LeafView::new(pool.frame_data_mut(leaf_frame)).lookup(key, &self.key_manager);
        pool.unpin_page(leaf_pid, false)?;
        Ok(found)
    }

    /// Insert a unique key. A duplicate fails with `DuplicateKey` and leaves
    /// the tree unchanged.
    pub fn insert(&mut self, pool: &mut BufferPoolManager, key: &[u8], value: RowId) -> IndexResult<()> {
        self.check_key(key)?;
        if self.is_empty() {
            return self.start_new_tree(pool, key, value);
        }
        self.insert_into_leaf(pool, key, value)
    }

    /// Delete a key. Deleting a missing key is a silent no-op.
    pub fn remove(&mut self, pool: &mut BufferPoolManager, key: &[u8]) -> IndexResult<()> {
        self.check_key(key)?;
        if self.is_empty() {
            return Ok(());
        }

        let (leaf_pid, leaf_frame) = self.find_leaf(pool, Some(key))?;
        let (removed, size, min_size, parent_pid, first_key) = {
            let mut leaf = LeafView::new(pool.frame_data_mut(leaf_frame));
            let removed = leaf.remove(key, &self.key_manager);
            let size = leaf.size();
            let first_key = if size > 0 { Some(leaf.key_at(0).to_vec()) } else { None };
            (removed, size, leaf.max_size() / 2, leaf.parent_page_id(), first_key)
        };

        if !removed {
            pool.unpin_page(leaf_pid, false)?;
            return Ok(());
        }
        pool.unpin_page(leaf_pid, true)?;

        if leaf_pid == self.root_page_id {
            if size == 0 {
                self.adjust_root(pool, leaf_pid)?;
            }
            return Ok(());
        }

        if size >= min_size {
            // The leftmost key may have changed; fix ancestor separators.
            if let Some(first_key) = first_key {
                self.refresh_separator(pool, leaf_pid, parent_pid, &first_key)?;
            }
            return Ok(());
        }

        self.coalesce_or_redistribute(pool, leaf_pid)
    }

    /// Iterate every entry in ascending key order.
    pub fn iter<'a>(&'a self, pool: &'a mut BufferPoolManager) -> IndexResult<TreeIter<'a>> {
        if self.is_empty() {
            return Ok(TreeIter::fused(pool));
        }
        let (leaf_pid, leaf_frame) = self.find_leaf(pool, None)?;
        if node_size(pool.frame_data(leaf_frame)) == 0 {
            pool.unpin_page(leaf_pid, false)?;
            return Ok(TreeIter::fused(pool));
        }
        Ok(TreeIter {
            pool,
            page_id: leaf_pid,
            frame: leaf_frame,
            index: 0,
        })
    }

    /// Iterate entries with keys `>= key`, starting inside the leaf that
    /// would contain `key`.
    pub fn iter_from<'a>(
        &'a self,
        pool: &'a mut BufferPoolManager,
        key: &[u8],
    ) -> IndexResult<TreeIter<'a>> {
        self.check_key(key)?;
        if self.is_empty() {
            return Ok(TreeIter::fused(pool));
        }
        let (leaf_pid, leaf_frame) = self.find_leaf(pool, Some(key))?;
        let (index, size) = {
            let leaf = LeafView::new(pool.frame_data_mut(leaf_frame));
            (leaf.key_index(key, &self.key_manager), leaf.size())
        };
        if index >= size {
            pool.unpin_page(leaf_pid, false)?;
            return Ok(TreeIter::fused(pool));
        }
        Ok(TreeIter {
            pool,
            page_id: leaf_pid,
            frame: leaf_frame,
            index,
        })
    }

    /// Free every node page and clear this index's root-registry entry.
    pub fn destroy(&mut self, pool: &mut BufferPoolManager) -> IndexResult<()> {
        if self.root_page_id != INVALID_PAGE_ID {
            self.destroy_subtree(pool, self.root_page_id)?;
            self.root_page_id = INVALID_PAGE_ID;
        }
        let frame = pool.fetch_page(INDEX_ROOTS_PAGE_ID)?;
        let removed = IndexRootsView::new(pool.frame_data_mut(frame)).remove(self.index_id);
        pool.unpin_page(INDEX_ROOTS_PAGE_ID, removed)?;
        Ok(())
    }

    /// Test hook: every pin released?
    pub fn check(&self, pool: &BufferPoolManager) -> bool {
        pool.check_all_unpinned()
    }

    // ---------------------------------------------------------------------
    // Insertion internals
    // ---------------------------------------------------------------------

    fn start_new_tree(&mut self, pool: &mut BufferPoolManager, key: &[u8], value: RowId) -> IndexResult<()> {
        let (root_pid, frame) = pool.new_page()?;
        {
            let mut leaf = LeafView::new(pool.frame_data_mut(frame));
            leaf.init(root_pid, INVALID_PAGE_ID, self.key_manager.key_size(), self.leaf_max_size);
            leaf.insert(key, value, &self.key_manager);
        }
        pool.unpin_page(root_pid, true)?;
        self.root_page_id = root_pid;
        self.update_registry(pool)
    }

    fn insert_into_leaf(&mut self, pool: &mut BufferPoolManager, key: &[u8], value: RowId) -> IndexResult<()> {
        let (leaf_pid, leaf_frame) = self.find_leaf(pool, Some(key))?;

        let (duplicate, has_room) = {
            let leaf = LeafView::new(pool.frame_data_mut(leaf_frame));
            (
                leaf.lookup(key, &self.key_manager).is_some(),
                leaf.size() < leaf.max_size(),
            )
        };
        if duplicate {
            pool.unpin_page(leaf_pid, false)?;
            return Err(IndexError::DuplicateKey);
        }
        if has_room {
            LeafView::new(pool.frame_data_mut(leaf_frame)).insert(key, value, &self.key_manager);
            pool.unpin_page(leaf_pid, true)?;
            return Ok(());
        }

        // Split: sibling takes the upper half and threads into the chain.
        let (new_pid, new_frame) = pool.new_page()?;
        let (parent_pid, separator) = {
            let (left_data, right_data) = pool.frame_pair_mut(leaf_frame, new_frame);
            let mut left = LeafView::new(left_data);
            let mut right = LeafView::new(right_data);
            right.init(
                new_pid,
                left.parent_page_id(),
                self.key_manager.key_size(),
                self.leaf_max_size,
            );
            left.move_half_to(&mut right);
            right.set_next_page_id(left.next_page_id());
            left.set_next_page_id(new_pid);

            if self.key_manager.compare(key, right.key_at(0)) == Ordering::Less {
                left.insert(key, value, &self.key_manager);
            } else {
                right.insert(key, value, &self.key_manager);
            }
            (left.parent_page_id(), right.key_at(0).to_vec())
        };
        pool.unpin_page(leaf_pid, true)?;
        pool.unpin_page(new_pid, true)?;

        self.insert_into_parent(pool, leaf_pid, &separator, new_pid, parent_pid)
    }

    /// Thread a freshly split-off sibling into the tree, splitting internal
    /// nodes upward as needed.
    fn insert_into_parent(
        &mut self,
        pool: &mut BufferPoolManager,
        old_pid: PageId,
        key: &[u8],
        new_pid: PageId,
        parent_pid: PageId,
    ) -> IndexResult<()> {
        if parent_pid == INVALID_PAGE_ID {
            // The root split: grow the tree by one level.
            let (root_pid, root_frame) = pool.new_page()?;
            {
                let mut root = InternalView::new(pool.frame_data_mut(root_frame));
                root.init(root_pid, INVALID_PAGE_ID, self.key_manager.key_size(), self.internal_max_size);
                root.populate_new_root(old_pid, key, new_pid);
            }
            pool.unpin_page(root_pid, true)?;
            self.set_parent(pool, old_pid, root_pid)?;
            self.set_parent(pool, new_pid, root_pid)?;
            self.root_page_id = root_pid;
            return self.update_registry(pool);
        }

        let parent_frame = pool.fetch_page(parent_pid)?;
        let overflow = {
            let mut parent = InternalView::new(pool.frame_data_mut(parent_frame));
            parent.insert_node_after(old_pid, key, new_pid);
            parent.size() > parent.max_size()
        };
        self.set_parent(pool, new_pid, parent_pid)?;

        if !overflow {
            pool.unpin_page(parent_pid, true)?;
            return Ok(());
        }

        // Split the overflowing internal node.
        let (sibling_pid, sibling_frame) = pool.new_page()?;
        let (grandparent_pid, separator, moved_children) = {
            let (parent_data, sibling_data) = pool.frame_pair_mut(parent_frame, sibling_frame);
            let mut parent = InternalView::new(parent_data);
            let mut sibling = InternalView::new(sibling_data);
            sibling.init(
                sibling_pid,
                parent.parent_page_id(),
                self.key_manager.key_size(),
                self.internal_max_size,
            );
            parent.move_half_to(&mut sibling);
            let moved = (0..sibling.size()).map(|i| sibling.value_at(i)).collect::<Vec<_>>();
            (parent.parent_page_id(), sibling.key_at(0).to_vec(), moved)
        };
        pool.unpin_page(parent_pid, true)?;
        pool.unpin_page(sibling_pid, true)?;

        for child in moved_children {
            self.set_parent(pool, child, sibling_pid)?;
        }

        self.insert_into_parent(pool, parent_pid, &separator, sibling_pid, grandparent_pid)
    }

    // ---------------------------------------------------------------------
    // Deletion internals
    // ---------------------------------------------------------------------

    /// Rebalance an underflowing non-root node by merging with or borrowing
    /// from a sibling. Prefers the left sibling except for the leftmost
    /// child, which pairs with its right sibling.
    fn coalesce_or_redistribute(&mut self, pool: &mut BufferPoolManager, node_pid: PageId) -> IndexResult<()> {
        let frame = pool.fetch_page(node_pid)?;
        let data = pool.frame_data(frame);
        let (node_is_leaf, size, max_size, parent_pid) =
            (is_leaf(data), node_size(data), node_max_size(data), parent_page_id(data));
        pool.unpin_page(node_pid, false)?;

        if parent_pid == INVALID_PAGE_ID {
            return self.adjust_root(pool, node_pid);
        }

        let parent_frame = pool.fetch_page(parent_pid)?;
        let located = {
            let parent = InternalView::new(pool.frame_data_mut(parent_frame));
            parent.value_index(node_pid).map(|index| {
                let sibling_index = if index != 0 { index - 1 } else { index + 1 };
                (index, parent.value_at(sibling_index))
            })
        };
        pool.unpin_page(parent_pid, false)?;
        let (index, sibling_pid) = located.ok_or_else(|| {
            IndexError::Corrupted(format!("node {node_pid} missing from its parent {parent_pid}"))
        })?;

        let sibling_frame = pool.fetch_page(sibling_pid)?;
        let sibling_size = node_size(pool.frame_data(sibling_frame));
        pool.unpin_page(sibling_pid, false)?;

        if size + sibling_size <= max_size {
            self.coalesce(pool, parent_pid, index, node_pid, sibling_pid, node_is_leaf)
        } else {
            self.redistribute(pool, parent_pid, index, node_pid, sibling_pid, node_is_leaf)
        }
    }

    /// Merge the right node of the pair into the left and drop its
    /// separator from the parent, cascading the parent's own underflow.
    fn coalesce(
        &mut self,
        pool: &mut BufferPoolManager,
        parent_pid: PageId,
        index: u32,
        node_pid: PageId,
        sibling_pid: PageId,
        nodes_are_leaves: bool,
    ) -> IndexResult<()> {
        let (left_pid, right_pid, right_slot) = if index != 0 {
            (sibling_pid, node_pid, index)
        } else {
            (node_pid, sibling_pid, 1)
        };

        let middle_key = if nodes_are_leaves {
            None
        } else {
            let frame = pool.fetch_page(parent_pid)?;
            let key = InternalView::new(pool.frame_data_mut(frame)).key_at(right_slot).to_vec();
            pool.unpin_page(parent_pid, false)?;
            Some(key)
        };

        let left_frame = pool.fetch_page(left_pid)?;
        let right_frame = pool.fetch_page(right_pid)?;
        let (left_first_key, moved_children) = {
            let (left_data, right_data) = pool.frame_pair_mut(left_frame, right_frame);
            if nodes_are_leaves {
                let mut left = LeafView::new(left_data);
                let mut right = LeafView::new(right_data);
                right.move_all_to(&mut left);
                let first = (left.size() > 0).then(|| left.key_at(0).to_vec());
                (first, Vec::new())
            } else {
                let mut left = InternalView::new(left_data);
                let mut right = InternalView::new(right_data);
                let moved_from = left.size();
                right.move_all_to(&mut left, middle_key.as_deref().unwrap());
                let moved = (moved_from..left.size()).map(|i| left.value_at(i)).collect();
                (None, moved)
            }
        };
        pool.unpin_page(right_pid, true)?;
        pool.unpin_page(left_pid, true)?;

        for child in moved_children {
            self.set_parent(pool, child, left_pid)?;
        }
        pool.delete_page(right_pid)?;

        let parent_frame = pool.fetch_page(parent_pid)?;
        let (parent_size, parent_min) = {
            let mut parent = InternalView::new(pool.frame_data_mut(parent_frame));
            parent.remove(right_slot);
            (parent.size(), parent.max_size().div_ceil(2))
        };
        pool.unpin_page(parent_pid, true)?;

        // The surviving leaf's first key separates it in some ancestor.
        if let Some(first_key) = left_first_key {
            self.refresh_separator(pool, left_pid, parent_pid, &first_key)?;
        }

        if parent_pid == self.root_page_id {
            self.adjust_root(pool, parent_pid)
        } else if parent_size < parent_min {
            self.coalesce_or_redistribute(pool, parent_pid)
        } else {
            Ok(())
        }
    }

    /// Move one entry from the sibling into the deficient node and update
    /// the parent's separator.
    fn redistribute(
        &mut self,
        pool: &mut BufferPoolManager,
        parent_pid: PageId,
        index: u32,
        node_pid: PageId,
        sibling_pid: PageId,
        nodes_are_leaves: bool,
    ) -> IndexResult<()> {
        if nodes_are_leaves {
            self.redistribute_leaf(pool, parent_pid, index, node_pid, sibling_pid)
        } else {
            self.redistribute_internal(pool, parent_pid, index, node_pid, sibling_pid)
        }
    }

    fn redistribute_leaf(
        &mut self,
        pool: &mut BufferPoolManager,
        parent_pid: PageId,
        index: u32,
        node_pid: PageId,
        sibling_pid: PageId,
    ) -> IndexResult<()> {
        let node_frame = pool.fetch_page(node_pid)?;
        let sibling_frame = pool.fetch_page(sibling_pid)?;
        let (separator_slot, separator_key, node_first, sibling_first) = {
            let (node_data, sibling_data) = pool.frame_pair_mut(node_frame, sibling_frame);
            let mut node = LeafView::new(node_data);
            let mut sibling = LeafView::new(sibling_data);

            let (slot, key) = if index == 0 {
                // Right sibling lends its smallest entry.
                let key = sibling.key_at(0).to_vec();
                let value = sibling.value_at(0);
                node.insert(&key, value, &self.key_manager);
                sibling.remove_at(0);
                (1, sibling.key_at(0).to_vec())
            } else {
                // Left sibling lends its largest entry.
                let last = sibling.size() - 1;
                let key = sibling.key_at(last).to_vec();
                let value = sibling.value_at(last);
                node.insert(&key, value, &self.key_manager);
                sibling.remove_at(last);
                (index, key)
            };
            (
                slot,
                key,
                node.key_at(0).to_vec(),
                sibling.key_at(0).to_vec(),
            )
        };
        pool.unpin_page(node_pid, true)?;
        pool.unpin_page(sibling_pid, true)?;

        let parent_frame = pool.fetch_page(parent_pid)?;
        InternalView::new(pool.frame_data_mut(parent_frame)).set_key_at(separator_slot, &separator_key);
        pool.unpin_page(parent_pid, true)?;

        // Both leaves may have new leftmost keys; fix ancestors for each.
        self.refresh_separator(pool, node_pid, parent_pid, &node_first)?;
        self.refresh_separator(pool, sibling_pid, parent_pid, &sibling_first)
    }

    fn redistribute_internal(
        &mut self,
        pool: &mut BufferPoolManager,
        parent_pid: PageId,
        index: u32,
        node_pid: PageId,
        sibling_pid: PageId,
    ) -> IndexResult<()> {
        if index == 0 {
            // Right sibling lends its first child; the key for the appended
            // entry is the smallest key of that child's subtree.
            let moved_key = self.subtree_first_key(pool, sibling_pid)?;

            let node_frame = pool.fetch_page(node_pid)?;
            let sibling_frame = pool.fetch_page(sibling_pid)?;
            let (moved_child, new_separator) = {
                let (node_data, sibling_data) = pool.frame_pair_mut(node_frame, sibling_frame);
                let mut node = InternalView::new(node_data);
                let mut sibling = InternalView::new(sibling_data);

                let moved_child = sibling.value_at(0);
                let size = node.size();
                node.set_size(size + 1);
                node.set_key_at(size, &moved_key);
                node.set_value_at(size, moved_child);

                let new_separator = sibling.key_at(1).to_vec();
                sibling.remove(0);
                (moved_child, new_separator)
            };
            pool.unpin_page(node_pid, true)?;
            pool.unpin_page(sibling_pid, true)?;

            let parent_frame = pool.fetch_page(parent_pid)?;
            InternalView::new(pool.frame_data_mut(parent_frame)).set_key_at(1, &new_separator);
            pool.unpin_page(parent_pid, true)?;

            self.set_parent(pool, moved_child, node_pid)
        } else {
            // Left sibling lends its last child; the old in-node keys shift
            // right and slot 1 gets the smallest key of node's old subtree.
            let node_first_key = self.subtree_first_key(pool, node_pid)?;

            let node_frame = pool.fetch_page(node_pid)?;
            let sibling_frame = pool.fetch_page(sibling_pid)?;
            let (moved_child, pushed_key) = {
                let (node_data, sibling_data) = pool.frame_pair_mut(node_frame, sibling_frame);
                let mut node = InternalView::new(node_data);
                let mut sibling = InternalView::new(sibling_data);

                let last = sibling.size() - 1;
                let pushed_key = sibling.key_at(last).to_vec();
                let moved_child = sibling.value_at(last);
                sibling.set_size(last);

                node.insert_first(&node_first_key, moved_child);
                (moved_child, pushed_key)
            };
            pool.unpin_page(node_pid, true)?;
            pool.unpin_page(sibling_pid, true)?;

            let parent_frame = pool.fetch_page(parent_pid)?;
            InternalView::new(pool.frame_data_mut(parent_frame)).set_key_at(index, &pushed_key);
            pool.unpin_page(parent_pid, true)?;

            self.set_parent(pool, moved_child, node_pid)
        }
    }

    /// Shrink the tree when the root is an empty leaf or a single-child
    /// internal node. The root is exempt from min-size rules otherwise.
    fn adjust_root(&mut self, pool: &mut BufferPoolManager, root_pid: PageId) -> IndexResult<()> {
        let frame = pool.fetch_page(root_pid)?;
        let data = pool.frame_data(frame);
        let (root_is_leaf, size) = (is_leaf(data), node_size(data));

        if !root_is_leaf && size == 1 {
            let child = InternalView::new(pool.frame_data_mut(frame)).value_at(0);
            pool.unpin_page(root_pid, false)?;
            pool.delete_page(root_pid)?;
            self.set_parent(pool, child, INVALID_PAGE_ID)?;
            self.root_page_id = child;
            self.update_registry(pool)
        } else if root_is_leaf && size == 0 {
            pool.unpin_page(root_pid, false)?;
            pool.delete_page(root_pid)?;
            self.root_page_id = INVALID_PAGE_ID;
            self.update_registry(pool)
        } else {
            pool.unpin_page(root_pid, false)?;
            Ok(())
        }
    }

    /// Walk toward the root fixing the separator that names `child_pid`'s
    /// subtree: the first ancestor where the subtree is not child 0 holds
    /// it; above that nothing changes.
    fn refresh_separator(
        &self,
        pool: &mut BufferPoolManager,
        mut child_pid: PageId,
        mut parent_pid: PageId,
        new_key: &[u8],
    ) -> IndexResult<()> {
        while parent_pid != INVALID_PAGE_ID {
            let frame = pool.fetch_page(parent_pid)?;
            let (position, grandparent) = {
                let parent = InternalView::new(pool.frame_data_mut(frame));
                (parent.value_index(child_pid), parent.parent_page_id())
            };
            match position {
                Some(0) => {
                    pool.unpin_page(parent_pid, false)?;
                    child_pid = parent_pid;
                    parent_pid = grandparent;
                }
                Some(slot) => {
                    InternalView::new(pool.frame_data_mut(frame)).set_key_at(slot, new_key);
                    pool.unpin_page(parent_pid, true)?;
                    return Ok(());
                }
                None => {
                    pool.unpin_page(parent_pid, false)?;
                    tracing::error!(child_pid, parent_pid, "separator walk lost its child");
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Shared helpers
    // ---------------------------------------------------------------------

    /// Descend to a leaf, guided by `key` or always-leftmost. The returned
    /// leaf is pinned; the caller unpins it.
    fn find_leaf(&self, pool: &mut BufferPoolManager, key: Option<&[u8]>) -> IndexResult<(PageId, FrameId)> {
        let mut page_id = self.root_page_id;
        loop {
            let frame = pool.fetch_page(page_id)?;
            if is_leaf(pool.frame_data(frame)) {
                return Ok((page_id, frame));
            }
            let child = {
                let node = InternalView::new(pool.frame_data_mut(frame));
                match key {
                    Some(key) => node.lookup(key, &self.key_manager),
                    None => node.value_at(0),
                }
            };
            pool.unpin_page(page_id, false)?;
            page_id = child;
        }
    }

    /// Smallest key stored in the subtree rooted at `page_id`.
    fn subtree_first_key(&self, pool: &mut BufferPoolManager, page_id: PageId) -> IndexResult<Vec<u8>> {
        let mut current = page_id;
        loop {
            let frame = pool.fetch_page(current)?;
            if is_leaf(pool.frame_data(frame)) {
                let key = LeafView::new(pool.frame_data_mut(frame)).key_at(0).to_vec();
                pool.unpin_page(current, false)?;
                return Ok(key);
            }
            let child = InternalView::new(pool.frame_data_mut(frame)).value_at(0);
            pool.unpin_page(current, false)?;
            current = child;
        }
    }

    fn set_parent(&self, pool: &mut BufferPoolManager, page_id: PageId, parent: PageId) -> IndexResult<()> {
        let frame = pool.fetch_page(page_id)?;
        set_parent_page_id(pool.frame_data_mut(frame), parent);
        pool.unpin_page(page_id, true)?;
        Ok(())
    }

    /// Persist the current root page id in the index-roots directory.
    fn update_registry(&self, pool: &mut BufferPoolManager) -> IndexResult<()> {
        let frame = pool.fetch_page(INDEX_ROOTS_PAGE_ID)?;
        let ok = {
            let mut roots = IndexRootsView::new(pool.frame_data_mut(frame));
            roots.update(self.index_id, self.root_page_id) || roots.insert(self.index_id, self.root_page_id)
        };
        pool.unpin_page(INDEX_ROOTS_PAGE_ID, ok)?;
        if ok {
            Ok(())
        } else {
            Err(IndexError::Corrupted("index roots page is full".into()))
        }
    }

    fn destroy_subtree(&self, pool: &mut BufferPoolManager, page_id: PageId) -> IndexResult<()> {
        let frame = pool.fetch_page(page_id)?;
        if is_leaf(pool.frame_data(frame)) {
            pool.unpin_page(page_id, false)?;
            pool.delete_page(page_id)?;
            return Ok(());
        }
        let children = {
            let node = InternalView::new(pool.frame_data_mut(frame));
            (0..node.size()).map(|i| node.value_at(i)).collect::<Vec<_>>()
        };
        pool.unpin_page(page_id, false)?;
        for child in children {
            self.destroy_subtree(pool, child)?;
        }
        pool.delete_page(page_id)?;
        Ok(())
    }

    fn check_key(&self, key: &[u8]) -> IndexResult<()> {
        if key.len() != self.key_manager.key_size() {
            return Err(IndexError::InvalidKey(format!(
                "key of {} bytes, index keys are {} bytes",
                key.len(),
                self.key_manager.key_size()
            )));
        }
        Ok(())
    }
}

/// Forward iterator over the leaf chain.
///
/// Holds at most one leaf pinned; advancing off a page unpins it before
/// fetching the next, and drop releases whatever is still held.
pub struct TreeIter<'a> {
    pool: &'a mut BufferPoolManager,
    page_id: PageId,
    frame: FrameId,
    index: u32,
}

impl<'a> TreeIter<'a> {
    fn fused(pool: &'a mut BufferPoolManager) -> Self {
        Self {
            pool,
            page_id: INVALID_PAGE_ID,
            frame: 0,
            index: 0,
        }
    }
}

impl Iterator for TreeIter<'_> {
    type Item = IndexResult<(Vec<u8>, RowId)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page_id == INVALID_PAGE_ID {
            return None;
        }

        let (key, value, size, next_page) = {
            let leaf = LeafView::new(self.pool.frame_data_mut(self.frame));
            (
                leaf.key_at(self.index).to_vec(),
                leaf.value_at(self.index),
                leaf.size(),
                leaf.next_page_id(),
            )
        };

        self.index += 1;
        if self.index >= size {
            if let Err(e) = self.pool.unpin_page(self.page_id, false) {
                self.page_id = INVALID_PAGE_ID;
                return Some(Err(e.into()));
            }
            if next_page != INVALID_PAGE_ID {
                match self.pool.fetch_page(next_page) {
                    Ok(frame) => {
                        self.page_id = next_page;
                        self.frame = frame;
                        self.index = 0;
                    }
                    Err(e) => {
                        self.page_id = INVALID_PAGE_ID;
                        return Some(Err(e.into()));
                    }
                }
            } else {
                self.page_id = INVALID_PAGE_ID;
            }
        }

        Some(Ok((key, value)))
    }
}

impl Drop for TreeIter<'_> {
    fn drop(&mut self) {
        if self.page_id != INVALID_PAGE_ID {
            let _ = self.pool.unpin_page(self.page_id, false);
        }
    }
}
