//! The unique-key B+ tree (L3a): one value per key, stored out of line in a
//! companion `ValueCache<V>` so a node's leaf slots only ever hold a fixed-
//! width key plus an 8-byte address.
//!
//! Grounded in `examples/original_source/B+Tree/BPT.h` for `insert`/
//! `insertInternal`/the split rules, and in `multi_BPT.h` for the erase path
//! — `BPT.h`'s own `eraseAdjust`/`eraseAdjustInternal` are commented out in
//! the original, so `multi_BPT.h` is the only uncommented reference for that
//! algorithm in the retrieval pack (noted in `DESIGN.md`).

use std::cell::{Cell, RefCell};
use std::ops::DerefMut;
use std::path::Path;

use buffer_pool_manager::{LruBufferPoolManager, ValueCache};
use common::api::{BufferPoolManager, PageId, INVALID_PAGE_ID, PAGE_SIZE};
use common::error::{Result, StorageError};
use common::paged_file::Record;

use super::key::IndexKey;
use super::metadata::{Layout, TreeHeader, DEFAULT_CACHE_CAPACITY};
use super::node::BPlusTreeNode;

/// A disk-backed unique B+ tree mapping `K -> V`.
///
/// Single-mutator, non-reentrant: the tree owns its node file and value file
/// exclusively for its lifetime (`SPEC_FULL.md` §5) and every method takes
/// `&self`, with all mutable state behind the cache layers' own interior
/// mutability.
pub struct BPlusTree<K, V> {
    nodes: LruBufferPoolManager,
    values: RefCell<ValueCache<V>>,
    header: Cell<TreeHeader>,
    layout: Layout,
    _marker: std::marker::PhantomData<K>,
}

impl<K: IndexKey, V: Record> BPlusTree<K, V> {
    /// Opens (creating if absent) a unique tree named `name` under `dir`,
    /// using default node- and value-cache capacities.
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        Self::open_with_capacity(
            dir,
            name,
            DEFAULT_CACHE_CAPACITY,
            buffer_pool_manager::DEFAULT_VALUE_CAPACITY,
        )
    }

    pub fn open_with_capacity(
        dir: impl AsRef<Path>,
        name: &str,
        node_capacity: usize,
        value_capacity: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let nodes = LruBufferPoolManager::new(dir.join(format!("{name}.idx")), node_capacity)?;
        let values = ValueCache::open(dir.join(format!("{name}.dat")), value_capacity)?;
        let mut buf = [0u8; PAGE_SIZE];
        nodes.read_header(&mut buf)?;
        let header = TreeHeader::deserialize(&buf);
        Ok(Self {
            nodes,
            values: RefCell::new(values),
            header: Cell::new(header),
            layout: Layout::for_key::<K>(),
            _marker: std::marker::PhantomData,
        })
    }

    pub fn size(&self) -> u64 {
        self.header.get().size
    }

    pub fn is_empty(&self) -> bool {
        self.header.get().size == 0
    }

    /// Persists the current root/size header and flushes every dirty node
    /// and value page. Callers that want durability beyond process lifetime
    /// should call this before dropping the tree.
    pub fn flush(&self) -> Result<()> {
        let mut buf = [0u8; PAGE_SIZE];
        self.header.get().serialize(&mut buf);
        self.nodes.write_header(&buf)?;
        self.nodes.flush_all_pages()?;
        self.values.borrow_mut().flush_all()
    }

    fn set_header(&self, header: TreeHeader) {
        self.header.set(header);
    }

    /// Descends from the root to the leaf that would hold `key`, using the
    /// standard internal-node `upperBound` rule: follow `child[i]` where `i`
    /// is the first index with `key[i] > key`.
    fn descend_to_leaf(&self, key: K) -> Result<PageId> {
        let mut current = self.header.get().root_page_id;
        loop {
            let mut guard = self.nodes.fetch_page(current)?;
            let node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            if node.is_leaf() {
                return Ok(current);
            }
            let idx = node.partition_point(|k| *k <= key);
            current = node.get_child(idx);
        }
    }

    /// Looks up `key`, returning its value if present.
    pub fn find(&self, key: &K) -> Result<Option<V>> {
        if self.is_empty() {
            return Ok(None);
        }
        let leaf_id = self.descend_to_leaf(*key)?;
        let address = {
            let mut guard = self.nodes.fetch_page(leaf_id)?;
            let node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            match node.binary_search(key) {
                Ok(i) => Some(node.get_value(i)),
                Err(_) => None,
            }
        };
        match address {
            Some(address) => Ok(Some(self.values.borrow_mut().get(address)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &K) -> Result<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Looks up `key`, failing with `StorageError::NotFound` if absent —
    /// the `Err`-surfacing counterpart to `find`'s `Option`.
    pub fn get(&self, key: &K) -> Result<V> {
        self.find(key)?.ok_or(StorageError::NotFound)
    }

    /// Inserts or overwrites the value at `key`. Unlike the multi-key tree,
    /// assigning an existing key overwrites its value in place rather than
    /// adding a second entry.
    pub fn assign(&self, key: K, value: V) -> Result<()> {
        let header = self.header.get();
        if header.root_page_id == INVALID_PAGE_ID {
            let root_id;
            {
                let mut guard = self.nodes.new_page()?;
                root_id = guard.page_id();
                let mut node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
                node.initialize(true, INVALID_PAGE_ID);
                let address = self.values.borrow_mut().insert_new(value)?;
                node.insert_leaf_entry(0, &key, address);
            }
            self.set_header(TreeHeader { root_page_id: root_id, size: 1 });
            log::debug!("unique tree: created root leaf {root_id}");
            return Ok(());
        }

        let leaf_id = self.descend_to_leaf(key)?;
        enum Outcome {
            Overwrite(u64),
            Inserted { full: bool },
        }
        let outcome = {
            let mut guard = self.nodes.fetch_page(leaf_id)?;
            let mut node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            match node.binary_search(&key) {
                Ok(i) => Outcome::Overwrite(node.get_value(i)),
                Err(i) => {
                    let address = self.values.borrow_mut().insert_new(value)?;
                    node.insert_leaf_entry(i, &key, address);
                    Outcome::Inserted { full: node.key_count() >= self.layout.degree }
                }
            }
        };
        match outcome {
            Outcome::Overwrite(address) => {
                self.values.borrow_mut().write_through(address, value)?;
            }
            Outcome::Inserted { full } => {
                let mut header = header;
                header.size += 1;
                self.set_header(header);
                if full {
                    self.split_leaf_and_promote(leaf_id)?;
                }
            }
        }
        Ok(())
    }

    fn split_leaf_and_promote(&self, leaf_id: PageId) -> Result<()> {
        let (promoted_key, new_leaf_id, parent_id) = self.split_leaf(leaf_id)?;
        log::debug!("unique tree: split leaf {leaf_id} into new leaf {new_leaf_id}");
        self.insert_into_parent(parent_id, leaf_id, promoted_key, new_leaf_id)
    }

    /// Splits a full leaf in two. Per the leaf-split rule, the promoted key
    /// stays in the right half (it is still live leaf data, unlike an
    /// internal separator) — the new leaf's first key is the promoted key.
    fn split_leaf(&self, leaf_id: PageId) -> Result<(K, PageId, PageId)> {
        let b = self.layout.min_occupancy;
        let new_id;
        let promoted_key;
        let parent_id;
        {
            let mut old_guard = self.nodes.fetch_page(leaf_id)?;
            let mut new_guard = self.nodes.new_page()?;
            new_id = new_guard.page_id();

            let mut old_node: BPlusTreeNode<K> = BPlusTreeNode::new(old_guard.deref_mut(), self.layout);
            parent_id = old_node.parent();
            let old_next = old_node.next_leaf();
            let n = old_node.key_count();

            let mut new_node: BPlusTreeNode<K> = BPlusTreeNode::new(new_guard.deref_mut(), self.layout);
            new_node.initialize(true, parent_id);
            for i in b..n {
                let k = old_node.get_key(i);
                let v = old_node.get_value(i);
                new_node.insert_leaf_entry(i - b, &k, v);
            }
            old_node.set_key_count(b);
            new_node.set_next_leaf(old_next);
            old_node.set_next_leaf(new_id);
            promoted_key = new_node.get_key(0);
        }
        Ok((promoted_key, new_id, parent_id))
    }

    /// Inserts `(key, right_child)` into the node at `parent_id`, creating a
    /// new root if `parent_id` is `INVALID_PAGE_ID`, and recursing into
    /// another split if the insertion overflows it.
    fn insert_into_parent(&self, parent_id: PageId, left_id: PageId, key: K, right_id: PageId) -> Result<()> {
        if parent_id == INVALID_PAGE_ID {
            let new_root_id;
            {
                let mut guard = self.nodes.new_page()?;
                new_root_id = guard.page_id();
                let mut root: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
                root.initialize(false, INVALID_PAGE_ID);
                root.set_child(0, left_id);
                root.insert_internal_entry(0, &key, right_id);
            }
            self.set_parent(left_id, new_root_id)?;
            self.set_parent(right_id, new_root_id)?;
            let mut header = self.header.get();
            header.root_page_id = new_root_id;
            self.set_header(header);
            log::debug!("unique tree: promoted new root {new_root_id}");
            return Ok(());
        }

        let full = {
            let mut guard = self.nodes.fetch_page(parent_id)?;
            let mut node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            match node.binary_search(&key) {
                Ok(_) => {
                    return Err(StorageError::Structural(
                        "duplicate separator key during internal split".into(),
                    ))
                }
                Err(i) => node.insert_internal_entry(i, &key, right_id),
            }
            node.key_count() >= self.layout.degree
        };

        if full {
            let (promoted_key, new_id, grandparent_id) = self.split_internal(parent_id)?;
            log::debug!("unique tree: split internal node {parent_id} into {new_id}");
            self.insert_into_parent(grandparent_id, parent_id, promoted_key, new_id)?;
        }
        Ok(())
    }

    fn set_parent(&self, node_id: PageId, parent_id: PageId) -> Result<()> {
        let mut guard = self.nodes.fetch_page(node_id)?;
        let mut node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
        node.set_parent(parent_id);
        Ok(())
    }

    /// Splits a full internal node. Unlike a leaf split, the promoted key is
    /// removed from both halves: it moves up into the parent as a pure
    /// separator, not live data.
    fn split_internal(&self, internal_id: PageId) -> Result<(K, PageId, PageId)> {
        let b = self.layout.min_occupancy;
        let new_id;
        let promoted_key;
        let grandparent_id;
        let new_count;
        {
            let mut old_guard = self.nodes.fetch_page(internal_id)?;
            let mut old_node: BPlusTreeNode<K> = BPlusTreeNode::new(old_guard.deref_mut(), self.layout);
            let n = old_node.key_count();
            grandparent_id = old_node.parent();
            promoted_key = old_node.get_key(b);

            let mut new_guard = self.nodes.new_page()?;
            new_id = new_guard.page_id();
            let mut new_node: BPlusTreeNode<K> = BPlusTreeNode::new(new_guard.deref_mut(), self.layout);
            new_node.initialize(false, grandparent_id);
            new_node.set_child(0, old_node.get_child(b + 1));
            for i in (b + 1)..n {
                let k = old_node.get_key(i);
                let child = old_node.get_child(i + 1);
                new_node.insert_internal_entry(i - b - 1, &k, child);
            }
            old_node.set_key_count(b);
            new_count = new_node.key_count();
        }

        let moved_children: Vec<PageId> = {
            let mut guard = self.nodes.fetch_page(new_id)?;
            let node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            (0..=new_count).map(|i| node.get_child(i)).collect()
        };
        for child in moved_children {
            self.set_parent(child, new_id)?;
        }

        Ok((promoted_key, new_id, grandparent_id))
    }

    /// Removes `key`. Returns whether it was present.
    pub fn erase(&self, key: &K) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        let leaf_id = self.descend_to_leaf(*key)?;
        let (remaining, is_root) = {
            let mut guard = self.nodes.fetch_page(leaf_id)?;
            let mut node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            let i = match node.binary_search(key) {
                Ok(i) => i,
                Err(_) => return Ok(false),
            };
            node.remove_leaf_entry(i);
            (node.key_count(), node.parent() == INVALID_PAGE_ID)
        };

        let mut header = self.header.get();
        header.size -= 1;
        if header.size == 0 {
            self.reset_to_empty()?;
            log::debug!("unique tree: erased last key, tree is now empty");
            return Ok(true);
        }
        self.set_header(header);

        if is_root || remaining >= self.layout.min_occupancy {
            return Ok(true);
        }

        self.erase_adjust_leaf(leaf_id)?;
        Ok(true)
    }

    /// Discards every node, resetting the tree-file header and its backing
    /// node file to an empty tree. The companion value file is left alone
    /// (deleted-space reclamation is out of scope — see `DESIGN.md`).
    fn reset_to_empty(&self) -> Result<()> {
        self.nodes.clear()?;
        self.set_header(TreeHeader::empty());
        Ok(())
    }

    /// Drops every entry and resets the tree to empty, including the
    /// companion value file.
    pub fn clear(&self) -> Result<()> {
        self.nodes.clear()?;
        self.values.borrow_mut().clear()?;
        self.set_header(TreeHeader::empty());
        Ok(())
    }

    /// Rebalances an underfull leaf: borrow from the right sibling, else the
    /// left, else merge with the right, else merge with the left.
    fn erase_adjust_leaf(&self, leaf_id: PageId) -> Result<()> {
        let b = self.layout.min_occupancy;

        let mut leaf_guard = self.nodes.fetch_page(leaf_id)?;
        let mut leaf: BPlusTreeNode<K> = BPlusTreeNode::new(leaf_guard.deref_mut(), self.layout);
        let parent_id = leaf.parent();
        let first_key = leaf.get_key(0);

        let mut parent_guard = self.nodes.fetch_page(parent_id)?;
        let mut parent: BPlusTreeNode<K> = BPlusTreeNode::new(parent_guard.deref_mut(), self.layout);
        let i = parent.partition_point(|k| *k <= first_key) as i64 - 1;
        let parent_count = parent.key_count() as i64;
        let right_id = if i != parent_count - 1 { Some(parent.get_child((i + 2) as usize)) } else { None };
        let left_id = if i >= 0 { Some(parent.get_child(i as usize)) } else { None };

        if let Some(right_id) = right_id {
            let mut right_guard = self.nodes.fetch_page(right_id)?;
            let mut right: BPlusTreeNode<K> = BPlusTreeNode::new(right_guard.deref_mut(), self.layout);
            if right.key_count() > b {
                let key0 = right.get_key(0);
                let val0 = right.get_value(0);
                right.remove_leaf_entry(0);
                let new_first = right.get_key(0);
                let count = leaf.key_count();
                leaf.insert_leaf_entry(count, &key0, val0);
                parent.set_key((i + 1) as usize, &new_first);
                log::trace!("unique tree: leaf {leaf_id} borrowed from right sibling {right_id}");
                return Ok(());
            }
        }

        if let Some(left_id) = left_id {
            let mut left_guard = self.nodes.fetch_page(left_id)?;
            let mut left: BPlusTreeNode<K> = BPlusTreeNode::new(left_guard.deref_mut(), self.layout);
            if left.key_count() > b {
                let last = left.key_count() - 1;
                let key_last = left.get_key(last);
                let val_last = left.get_value(last);
                left.remove_leaf_entry(last);
                leaf.insert_leaf_entry(0, &key_last, val_last);
                parent.set_key(i as usize, &key_last);
                log::trace!("unique tree: leaf {leaf_id} borrowed from left sibling {left_id}");
                return Ok(());
            }
        }

        if let Some(right_id) = right_id {
            let mut right_guard = self.nodes.fetch_page(right_id)?;
            let mut right: BPlusTreeNode<K> = BPlusTreeNode::new(right_guard.deref_mut(), self.layout);
            let base = leaf.key_count();
            let rcount = right.key_count();
            for j in 0..rcount {
                let k = right.get_key(j);
                let v = right.get_value(j);
                leaf.insert_leaf_entry(base + j, &k, v);
            }
            leaf.set_next_leaf(right.next_leaf());
            parent.remove_internal_entry((i + 1) as usize, (i + 2) as usize);
            log::debug!("unique tree: merged leaf {right_id} into {leaf_id}");
        } else if let Some(left_id) = left_id {
            let mut left_guard = self.nodes.fetch_page(left_id)?;
            let mut left: BPlusTreeNode<K> = BPlusTreeNode::new(left_guard.deref_mut(), self.layout);
            let base = left.key_count();
            let lcount = leaf.key_count();
            for j in 0..lcount {
                let k = leaf.get_key(j);
                let v = leaf.get_value(j);
                left.insert_leaf_entry(base + j, &k, v);
            }
            left.set_next_leaf(leaf.next_leaf());
            parent.remove_internal_entry(i as usize, (i + 1) as usize);
            log::debug!("unique tree: merged leaf {leaf_id} into {left_id}");
        } else {
            return Err(StorageError::Structural(format!(
                "leaf {leaf_id} has no sibling to borrow from or merge with"
            )));
        }

        drop(parent);
        drop(parent_guard);
        drop(leaf);
        drop(leaf_guard);
        self.erase_adjust_internal(parent_id)
    }

    /// Rebalances an underfull internal node the same way as a leaf, except
    /// the separator key rotates through the parent (pulled down, then
    /// replaced from the sibling's boundary key) rather than being copied
    /// directly, and every child that moves between nodes needs its `fa`
    /// rewritten.
    fn erase_adjust_internal(&self, node_id: PageId) -> Result<()> {
        let b = self.layout.min_occupancy;

        let parent_id = {
            let mut guard = self.nodes.fetch_page(node_id)?;
            let node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            node.parent()
        };

        if parent_id == INVALID_PAGE_ID {
            let (should_promote, new_root_id) = {
                let mut guard = self.nodes.fetch_page(node_id)?;
                let node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
                (node.key_count() == 0, node.get_child(0))
            };
            if should_promote {
                self.set_parent(new_root_id, INVALID_PAGE_ID)?;
                let mut header = self.header.get();
                header.root_page_id = new_root_id;
                self.set_header(header);
                log::debug!("unique tree: root {node_id} emptied, promoting {new_root_id}");
            }
            return Ok(());
        }

        let node_count = {
            let mut guard = self.nodes.fetch_page(node_id)?;
            let node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            node.key_count()
        };
        if node_count >= b {
            return Ok(());
        }

        let first_key = {
            let mut guard = self.nodes.fetch_page(node_id)?;
            let node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            node.get_key(0)
        };

        let mut parent_guard = self.nodes.fetch_page(parent_id)?;
        let mut parent: BPlusTreeNode<K> = BPlusTreeNode::new(parent_guard.deref_mut(), self.layout);
        let i = parent.partition_point(|k| *k <= first_key) as i64 - 1;
        let parent_count = parent.key_count() as i64;
        let right_id = if i != parent_count - 1 { Some(parent.get_child((i + 2) as usize)) } else { None };
        let left_id = if i >= 0 { Some(parent.get_child(i as usize)) } else { None };

        let mut node_guard = self.nodes.fetch_page(node_id)?;
        let mut node: BPlusTreeNode<K> = BPlusTreeNode::new(node_guard.deref_mut(), self.layout);

        if let Some(right_id) = right_id {
            let mut right_guard = self.nodes.fetch_page(right_id)?;
            let mut right: BPlusTreeNode<K> = BPlusTreeNode::new(right_guard.deref_mut(), self.layout);
            if right.key_count() > b {
                let separator = parent.get_key((i + 1) as usize);
                let borrowed_child = right.get_child(0);
                let count = node.key_count();
                node.insert_internal_entry(count, &separator, borrowed_child);
                let new_first = right.get_key(0);
                right.remove_internal_entry(0, 0);
                parent.set_key((i + 1) as usize, &new_first);
                drop(right);
                drop(right_guard);
                drop(node);
                drop(node_guard);
                drop(parent);
                drop(parent_guard);
                self.set_parent(borrowed_child, node_id)?;
                log::trace!("unique tree: internal node {node_id} borrowed from right sibling {right_id}");
                return Ok(());
            }
        }

        if let Some(left_id) = left_id {
            let mut left_guard = self.nodes.fetch_page(left_id)?;
            let mut left: BPlusTreeNode<K> = BPlusTreeNode::new(left_guard.deref_mut(), self.layout);
            if left.key_count() > b {
                let last = left.key_count() - 1;
                let borrowed_child = left.get_child(left.key_count());
                let old_separator = parent.get_key(i as usize);
                let new_separator = left.get_key(last);
                node.insert_internal_entry_front(&old_separator, borrowed_child);
                left.remove_internal_entry(last, left.key_count());
                parent.set_key(i as usize, &new_separator);
                drop(left);
                drop(left_guard);
                drop(node);
                drop(node_guard);
                drop(parent);
                drop(parent_guard);
                self.set_parent(borrowed_child, node_id)?;
                log::trace!("unique tree: internal node {node_id} borrowed from left sibling {left_id}");
                return Ok(());
            }
        }

        if let Some(right_id) = right_id {
            let moved_children: Vec<PageId>;
            {
                let mut right_guard = self.nodes.fetch_page(right_id)?;
                let mut right: BPlusTreeNode<K> = BPlusTreeNode::new(right_guard.deref_mut(), self.layout);
                let separator = parent.get_key((i + 1) as usize);
                let base = node.key_count();
                node.insert_internal_entry(base, &separator, right.get_child(0));
                let rcount = right.key_count();
                for j in 0..rcount {
                    let k = right.get_key(j);
                    let child = right.get_child(j + 1);
                    node.insert_internal_entry(base + 1 + j, &k, child);
                }
                moved_children = (0..=rcount).map(|j| right.get_child(j)).collect();
            }
            parent.remove_internal_entry((i + 1) as usize, (i + 2) as usize);
            drop(node);
            drop(node_guard);
            drop(parent);
            drop(parent_guard);
            for child in moved_children {
                self.set_parent(child, node_id)?;
            }
            log::debug!("unique tree: merged internal node {right_id} into {node_id}");
        } else if let Some(left_id) = left_id {
            let moved_children: Vec<PageId>;
            let absorbed_into = left_id;
            {
                let mut left_guard = self.nodes.fetch_page(left_id)?;
                let mut left: BPlusTreeNode<K> = BPlusTreeNode::new(left_guard.deref_mut(), self.layout);
                let separator = parent.get_key(i as usize);
                let base = left.key_count();
                left.insert_internal_entry(base, &separator, node.get_child(0));
                let ncount = node.key_count();
                for j in 0..ncount {
                    let k = node.get_key(j);
                    let child = node.get_child(j + 1);
                    left.insert_internal_entry(base + 1 + j, &k, child);
                }
                moved_children = (0..=ncount).map(|j| node.get_child(j)).collect();
            }
            parent.remove_internal_entry(i as usize, (i + 1) as usize);
            drop(node);
            drop(node_guard);
            drop(parent);
            drop(parent_guard);
            for child in moved_children {
                self.set_parent(child, absorbed_into)?;
            }
            log::debug!("unique tree: merged internal node {node_id} into {left_id}");
        } else {
            return Err(StorageError::Structural(format!(
                "internal node {node_id} has no sibling to borrow from or merge with"
            )));
        }

        self.erase_adjust_internal(parent_id)
    }

    /// Visits every `(key, value)` pair in ascending key order.
    pub fn for_each<F: FnMut(K, V) -> Result<()>>(&self, mut f: F) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let mut current = self.leftmost_leaf()?;
        while current != INVALID_PAGE_ID {
            let (entries, next) = {
                let mut guard = self.nodes.fetch_page(current)?;
                let node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
                let entries: Vec<(K, u64)> =
                    (0..node.key_count()).map(|i| (node.get_key(i), node.get_value(i))).collect();
                (entries, node.next_leaf())
            };
            for (key, address) in entries {
                let value = self.values.borrow_mut().get(address)?;
                f(key, value)?;
            }
            current = next;
        }
        Ok(())
    }

    fn leftmost_leaf(&self) -> Result<PageId> {
        let mut current = self.header.get().root_page_id;
        loop {
            let mut guard = self.nodes.fetch_page(current)?;
            let node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            if node.is_leaf() {
                return Ok(current);
            }
            current = node.get_child(0);
        }
    }

    /// Walks the leaf-linked-list from the leftmost leaf and counts its
    /// length. Not on any hot path; exists so structural tests can assert on
    /// split/merge shape (SPEC_FULL.md §8 scenario 4's "visits exactly
    /// `ceil(N/B)` leaves") without reaching into the tree's private pages.
    pub fn leaf_count(&self) -> Result<usize> {
        if self.is_empty() {
            return Ok(0);
        }
        let mut current = self.leftmost_leaf()?;
        let mut count = 0;
        while current != INVALID_PAGE_ID {
            count += 1;
            let mut guard = self.nodes.fetch_page(current)?;
            let node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            current = node.next_leaf();
        }
        Ok(count)
    }

    /// Whether the root page is itself a leaf — i.e. the tree has no
    /// internal nodes at all. Used by tests to confirm the root-shrink path
    /// (`eraseAdjustInternal`'s root-empty promotion) actually collapsed the
    /// tree back to a single level.
    pub fn root_is_leaf(&self) -> Result<bool> {
        if self.is_empty() {
            return Ok(true);
        }
        let root_id = self.header.get().root_page_id;
        let mut guard = self.nodes.fetch_page(root_id)?;
        let node: BPlusTreeNode<K> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
        Ok(node.is_leaf())
    }
}

/// Guarantees the header and every dirty cache page reach disk on close, per
/// `SPEC_FULL.md` §5's "released with guaranteed close on destruction"
/// resource policy — mirrors the teacher's `ActorPageGuard`/
/// `ActorBufferPoolManager` `Drop` impls, which also swallow the send error
/// rather than panic from `drop`, since a destructor cannot propagate `Result`.
impl<K: IndexKey, V: Record> Drop for BPlusTree<K, V> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("unique tree: failed to flush on drop: {e}");
        }
    }
}
