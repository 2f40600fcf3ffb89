//! The multi-key B+ tree (L3b): many `(key, value)` pairs per key, with no
//! companion value file at all — the "value" lives directly in the node's
//! key array via `Composite<K, V>`, so duplicate keys are just distinct
//! elements sharing a primary component.
//!
//! Grounded end-to-end in `examples/original_source/B+Tree/multi_BPT.h`,
//! which — unlike `BPT.h` — carries an uncommented `insert`/`erase`/
//! `eraseAdjust`/`eraseAdjustInternal` implementation; the split/borrow/merge
//! logic here mirrors `bptree.rs`'s unique tree closely (the original itself
//! duplicates the algorithm between the two files rather than sharing it).

use std::cell::Cell;
use std::ops::DerefMut;
use std::path::Path;

use buffer_pool_manager::LruBufferPoolManager;
use common::api::{BufferPoolManager, PageId, INVALID_PAGE_ID, PAGE_SIZE};
use common::error::{Result, StorageError};
use common::fixed::Composite;

use super::key::IndexKey;
use super::metadata::{Layout, TreeHeader, DEFAULT_CACHE_CAPACITY};
use super::node::BPlusTreeNode;

/// A disk-backed multimap B+ tree over `(K, V)` elements, ordered
/// lexicographically by `(key, value)`. Inserting an already-present pair is
/// a no-op; every distinct pair sharing a key is retained independently.
pub struct MultiBPlusTree<K, V> {
    nodes: LruBufferPoolManager,
    header: Cell<TreeHeader>,
    layout: Layout,
    _marker: std::marker::PhantomData<(K, V)>,
}

type Element<K, V> = Composite<K, V>;

impl<K: IndexKey, V: IndexKey> MultiBPlusTree<K, V> {
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        Self::open_with_capacity(dir, name, DEFAULT_CACHE_CAPACITY)
    }

    pub fn open_with_capacity(dir: impl AsRef<Path>, name: &str, node_capacity: usize) -> Result<Self> {
        let dir = dir.as_ref();
        let nodes = LruBufferPoolManager::new(dir.join(format!("{name}.idx")), node_capacity)?;
        let mut buf = [0u8; PAGE_SIZE];
        nodes.read_header(&mut buf)?;
        let header = TreeHeader::deserialize(&buf);
        Ok(Self {
            nodes,
            header: Cell::new(header),
            layout: Layout::for_key::<Element<K, V>>(),
            _marker: std::marker::PhantomData,
        })
    }

    pub fn size(&self) -> u64 {
        self.header.get().size
    }

    pub fn is_empty(&self) -> bool {
        self.header.get().size == 0
    }

    pub fn flush(&self) -> Result<()> {
        let mut buf = [0u8; PAGE_SIZE];
        self.header.get().serialize(&mut buf);
        self.nodes.write_header(&buf)?;
        self.nodes.flush_all_pages()
    }

    fn set_header(&self, header: TreeHeader) {
        self.header.set(header);
    }

    /// Descends using only the primary key component (`lowerBound(key)` in
    /// the original) — used for `find`'s range seek, where any element
    /// matching `key` may live to the right of a separator that only looks
    /// at a narrower prefix.
    fn descend_to_leaf_for_key(&self, key: K) -> Result<PageId> {
        let mut current = self.header.get().root_page_id;
        loop {
            let mut guard = self.nodes.fetch_page(current)?;
            let node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            if node.is_leaf() {
                return Ok(current);
            }
            let idx = node.partition_point(|e| e.primary < key);
            current = node.get_child(idx);
        }
    }

    /// Descends using the full `(key, value)` element (`upperBound(element)`
    /// in the original) — used for insert/erase, which must land on the
    /// exact leaf that would hold one specific pair.
    fn descend_to_leaf_for_element(&self, element: Element<K, V>) -> Result<PageId> {
        let mut current = self.header.get().root_page_id;
        loop {
            let mut guard = self.nodes.fetch_page(current)?;
            let node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            if node.is_leaf() {
                return Ok(current);
            }
            let idx = node.partition_point(|e| *e <= element);
            current = node.get_child(idx);
        }
    }

    /// Returns every value paired with `key`, in ascending order.
    pub fn find(&self, key: &K) -> Result<Vec<V>> {
        let mut out = Vec::new();
        if self.is_empty() {
            return Ok(out);
        }
        let mut current = self.descend_to_leaf_for_key(*key)?;
        loop {
            if current == INVALID_PAGE_ID {
                break;
            }
            let (matches, next) = {
                let mut guard = self.nodes.fetch_page(current)?;
                let node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
                let count = node.key_count();
                let mut i = node.partition_point(|e| e.primary < *key);
                let mut matches = Vec::new();
                while i < count && node.get_key(i).primary == *key {
                    matches.push(node.get_key(i).secondary);
                    i += 1;
                }
                let reached_leaf_end = i == count;
                (matches, if reached_leaf_end { node.next_leaf() } else { INVALID_PAGE_ID })
            };
            out.extend(matches);
            current = next;
        }
        Ok(out)
    }

    pub fn contains(&self, key: &K, value: &V) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        let element = Composite::new(*key, *value);
        let leaf_id = self.descend_to_leaf_for_element(element)?;
        let mut guard = self.nodes.fetch_page(leaf_id)?;
        let node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
        Ok(node.binary_search(&element).is_ok())
    }

    /// Inserts `(key, value)`. A pair already present is left untouched
    /// (idempotent, matching the multimap's set-of-pairs semantics).
    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let element = Composite::new(key, value);
        let header = self.header.get();
        if header.root_page_id == INVALID_PAGE_ID {
            let root_id;
            {
                let mut guard = self.nodes.new_page()?;
                root_id = guard.page_id();
                let mut node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
                node.initialize(true, INVALID_PAGE_ID);
                node.insert_leaf_entry(0, &element, 0);
            }
            self.set_header(TreeHeader { root_page_id: root_id, size: 1 });
            log::debug!("multi tree: created root leaf {root_id}");
            return Ok(());
        }

        let leaf_id = self.descend_to_leaf_for_element(element)?;
        let full = {
            let mut guard = self.nodes.fetch_page(leaf_id)?;
            let mut node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            match node.binary_search(&element) {
                Ok(_) => return Ok(()),
                Err(i) => {
                    node.insert_leaf_entry(i, &element, 0);
                    Some(node.key_count() >= self.layout.degree)
                }
            }
        };
        if let Some(full) = full {
            let mut header = header;
            header.size += 1;
            self.set_header(header);
            if full {
                self.split_leaf_and_promote(leaf_id)?;
            }
        }
        Ok(())
    }

    fn split_leaf_and_promote(&self, leaf_id: PageId) -> Result<()> {
        let (promoted_key, new_leaf_id, parent_id) = self.split_leaf(leaf_id)?;
        log::debug!("multi tree: split leaf {leaf_id} into new leaf {new_leaf_id}");
        self.insert_into_parent(parent_id, leaf_id, promoted_key, new_leaf_id)
    }

    fn split_leaf(&self, leaf_id: PageId) -> Result<(Element<K, V>, PageId, PageId)> {
        let b = self.layout.min_occupancy;
        let new_id;
        let promoted_key;
        let parent_id;
        {
            let mut old_guard = self.nodes.fetch_page(leaf_id)?;
            let mut new_guard = self.nodes.new_page()?;
            new_id = new_guard.page_id();

            let mut old_node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(old_guard.deref_mut(), self.layout);
            parent_id = old_node.parent();
            let old_next = old_node.next_leaf();
            let n = old_node.key_count();

            let mut new_node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(new_guard.deref_mut(), self.layout);
            new_node.initialize(true, parent_id);
            for i in b..n {
                let e = old_node.get_key(i);
                new_node.insert_leaf_entry(i - b, &e, 0);
            }
            old_node.set_key_count(b);
            new_node.set_next_leaf(old_next);
            old_node.set_next_leaf(new_id);
            promoted_key = new_node.get_key(0);
        }
        Ok((promoted_key, new_id, parent_id))
    }

    fn insert_into_parent(
        &self,
        parent_id: PageId,
        left_id: PageId,
        key: Element<K, V>,
        right_id: PageId,
    ) -> Result<()> {
        if parent_id == INVALID_PAGE_ID {
            let new_root_id;
            {
                let mut guard = self.nodes.new_page()?;
                new_root_id = guard.page_id();
                let mut root: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
                root.initialize(false, INVALID_PAGE_ID);
                root.set_child(0, left_id);
                root.insert_internal_entry(0, &key, right_id);
            }
            self.set_parent(left_id, new_root_id)?;
            self.set_parent(right_id, new_root_id)?;
            let mut header = self.header.get();
            header.root_page_id = new_root_id;
            self.set_header(header);
            log::debug!("multi tree: promoted new root {new_root_id}");
            return Ok(());
        }

        let full = {
            let mut guard = self.nodes.fetch_page(parent_id)?;
            let mut node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            match node.binary_search(&key) {
                Ok(_) => {
                    return Err(StorageError::Structural(
                        "duplicate separator element during internal split".into(),
                    ))
                }
                Err(i) => node.insert_internal_entry(i, &key, right_id),
            }
            node.key_count() >= self.layout.degree
        };

        if full {
            let (promoted_key, new_id, grandparent_id) = self.split_internal(parent_id)?;
            log::debug!("multi tree: split internal node {parent_id} into {new_id}");
            self.insert_into_parent(grandparent_id, parent_id, promoted_key, new_id)?;
        }
        Ok(())
    }

    fn set_parent(&self, node_id: PageId, parent_id: PageId) -> Result<()> {
        let mut guard = self.nodes.fetch_page(node_id)?;
        let mut node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
        node.set_parent(parent_id);
        Ok(())
    }

    fn split_internal(&self, internal_id: PageId) -> Result<(Element<K, V>, PageId, PageId)> {
        let b = self.layout.min_occupancy;
        let new_id;
        let promoted_key;
        let grandparent_id;
        let new_count;
        {
            let mut old_guard = self.nodes.fetch_page(internal_id)?;
            let mut old_node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(old_guard.deref_mut(), self.layout);
            let n = old_node.key_count();
            grandparent_id = old_node.parent();
            promoted_key = old_node.get_key(b);

            let mut new_guard = self.nodes.new_page()?;
            new_id = new_guard.page_id();
            let mut new_node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(new_guard.deref_mut(), self.layout);
            new_node.initialize(false, grandparent_id);
            new_node.set_child(0, old_node.get_child(b + 1));
            for i in (b + 1)..n {
                let e = old_node.get_key(i);
                let child = old_node.get_child(i + 1);
                new_node.insert_internal_entry(i - b - 1, &e, child);
            }
            old_node.set_key_count(b);
            new_count = new_node.key_count();
        }

        let moved_children: Vec<PageId> = {
            let mut guard = self.nodes.fetch_page(new_id)?;
            let node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            (0..=new_count).map(|i| node.get_child(i)).collect()
        };
        for child in moved_children {
            self.set_parent(child, new_id)?;
        }

        Ok((promoted_key, new_id, grandparent_id))
    }

    /// Removes the exact pair `(key, value)`. Returns whether it was present.
    pub fn erase(&self, key: &K, value: &V) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        let element = Composite::new(*key, *value);
        let leaf_id = self.descend_to_leaf_for_element(element)?;
        let (remaining, is_root) = {
            let mut guard = self.nodes.fetch_page(leaf_id)?;
            let mut node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            let i = match node.binary_search(&element) {
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
            log::debug!("multi tree: erased last pair, tree is now empty");
            return Ok(true);
        }
        self.set_header(header);

        if is_root || remaining >= self.layout.min_occupancy {
            return Ok(true);
        }

        self.erase_adjust_leaf(leaf_id)?;
        Ok(true)
    }

    fn reset_to_empty(&self) -> Result<()> {
        self.nodes.clear()?;
        self.set_header(TreeHeader::empty());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.nodes.clear()?;
        self.set_header(TreeHeader::empty());
        Ok(())
    }

    fn erase_adjust_leaf(&self, leaf_id: PageId) -> Result<()> {
        let b = self.layout.min_occupancy;

        let mut leaf_guard = self.nodes.fetch_page(leaf_id)?;
        let mut leaf: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(leaf_guard.deref_mut(), self.layout);
        let parent_id = leaf.parent();
        let first_element = leaf.get_key(0);

        let mut parent_guard = self.nodes.fetch_page(parent_id)?;
        let mut parent: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(parent_guard.deref_mut(), self.layout);
        let i = parent.partition_point(|e| *e <= first_element) as i64 - 1;
        let parent_count = parent.key_count() as i64;
        let right_id = if i != parent_count - 1 { Some(parent.get_child((i + 2) as usize)) } else { None };
        let left_id = if i >= 0 { Some(parent.get_child(i as usize)) } else { None };

        if let Some(right_id) = right_id {
            let mut right_guard = self.nodes.fetch_page(right_id)?;
            let mut right: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(right_guard.deref_mut(), self.layout);
            if right.key_count() > b {
                let elem0 = right.get_key(0);
                right.remove_leaf_entry(0);
                let new_first = right.get_key(0);
                let count = leaf.key_count();
                leaf.insert_leaf_entry(count, &elem0, 0);
                parent.set_key((i + 1) as usize, &new_first);
                log::trace!("multi tree: leaf {leaf_id} borrowed from right sibling {right_id}");
                return Ok(());
            }
        }

        if let Some(left_id) = left_id {
            let mut left_guard = self.nodes.fetch_page(left_id)?;
            let mut left: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(left_guard.deref_mut(), self.layout);
            if left.key_count() > b {
                let last = left.key_count() - 1;
                let elem_last = left.get_key(last);
                left.remove_leaf_entry(last);
                leaf.insert_leaf_entry(0, &elem_last, 0);
                parent.set_key(i as usize, &elem_last);
                log::trace!("multi tree: leaf {leaf_id} borrowed from left sibling {left_id}");
                return Ok(());
            }
        }

        if let Some(right_id) = right_id {
            let mut right_guard = self.nodes.fetch_page(right_id)?;
            let mut right: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(right_guard.deref_mut(), self.layout);
            let base = leaf.key_count();
            let rcount = right.key_count();
            for j in 0..rcount {
                let e = right.get_key(j);
                leaf.insert_leaf_entry(base + j, &e, 0);
            }
            leaf.set_next_leaf(right.next_leaf());
            parent.remove_internal_entry((i + 1) as usize, (i + 2) as usize);
            log::debug!("multi tree: merged leaf {right_id} into {leaf_id}");
        } else if let Some(left_id) = left_id {
            let mut left_guard = self.nodes.fetch_page(left_id)?;
            let mut left: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(left_guard.deref_mut(), self.layout);
            let base = left.key_count();
            let lcount = leaf.key_count();
            for j in 0..lcount {
                let e = leaf.get_key(j);
                left.insert_leaf_entry(base + j, &e, 0);
            }
            left.set_next_leaf(leaf.next_leaf());
            parent.remove_internal_entry(i as usize, (i + 1) as usize);
            log::debug!("multi tree: merged leaf {leaf_id} into {left_id}");
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

    fn erase_adjust_internal(&self, node_id: PageId) -> Result<()> {
        let b = self.layout.min_occupancy;

        let parent_id = {
            let mut guard = self.nodes.fetch_page(node_id)?;
            let node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            node.parent()
        };

        if parent_id == INVALID_PAGE_ID {
            let (should_promote, new_root_id) = {
                let mut guard = self.nodes.fetch_page(node_id)?;
                let node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
                (node.key_count() == 0, node.get_child(0))
            };
            if should_promote {
                self.set_parent(new_root_id, INVALID_PAGE_ID)?;
                let mut header = self.header.get();
                header.root_page_id = new_root_id;
                self.set_header(header);
                log::debug!("multi tree: root {node_id} emptied, promoting {new_root_id}");
            }
            return Ok(());
        }

        let node_count = {
            let mut guard = self.nodes.fetch_page(node_id)?;
            let node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            node.key_count()
        };
        if node_count >= b {
            return Ok(());
        }

        let first_element = {
            let mut guard = self.nodes.fetch_page(node_id)?;
            let node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            node.get_key(0)
        };

        let mut parent_guard = self.nodes.fetch_page(parent_id)?;
        let mut parent: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(parent_guard.deref_mut(), self.layout);
        let i = parent.partition_point(|e| *e <= first_element) as i64 - 1;
        let parent_count = parent.key_count() as i64;
        let right_id = if i != parent_count - 1 { Some(parent.get_child((i + 2) as usize)) } else { None };
        let left_id = if i >= 0 { Some(parent.get_child(i as usize)) } else { None };

        let mut node_guard = self.nodes.fetch_page(node_id)?;
        let mut node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(node_guard.deref_mut(), self.layout);

        if let Some(right_id) = right_id {
            let mut right_guard = self.nodes.fetch_page(right_id)?;
            let mut right: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(right_guard.deref_mut(), self.layout);
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
                log::trace!("multi tree: internal node {node_id} borrowed from right sibling {right_id}");
                return Ok(());
            }
        }

        if let Some(left_id) = left_id {
            let mut left_guard = self.nodes.fetch_page(left_id)?;
            let mut left: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(left_guard.deref_mut(), self.layout);
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
                log::trace!("multi tree: internal node {node_id} borrowed from left sibling {left_id}");
                return Ok(());
            }
        }

        if let Some(right_id) = right_id {
            let moved_children: Vec<PageId>;
            {
                let mut right_guard = self.nodes.fetch_page(right_id)?;
                let mut right: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(right_guard.deref_mut(), self.layout);
                let separator = parent.get_key((i + 1) as usize);
                let base = node.key_count();
                node.insert_internal_entry(base, &separator, right.get_child(0));
                let rcount = right.key_count();
                for j in 0..rcount {
                    let e = right.get_key(j);
                    let child = right.get_child(j + 1);
                    node.insert_internal_entry(base + 1 + j, &e, child);
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
            log::debug!("multi tree: merged internal node {right_id} into {node_id}");
        } else if let Some(left_id) = left_id {
            let moved_children: Vec<PageId>;
            let absorbed_into = left_id;
            {
                let mut left_guard = self.nodes.fetch_page(left_id)?;
                let mut left: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(left_guard.deref_mut(), self.layout);
                let separator = parent.get_key(i as usize);
                let base = left.key_count();
                left.insert_internal_entry(base, &separator, node.get_child(0));
                let ncount = node.key_count();
                for j in 0..ncount {
                    let e = node.get_key(j);
                    let child = node.get_child(j + 1);
                    left.insert_internal_entry(base + 1 + j, &e, child);
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
            log::debug!("multi tree: merged internal node {node_id} into {left_id}");
        } else {
            return Err(StorageError::Structural(format!(
                "internal node {node_id} has no sibling to borrow from or merge with"
            )));
        }

        self.erase_adjust_internal(parent_id)
    }

    fn leftmost_leaf(&self) -> Result<PageId> {
        let mut current = self.header.get().root_page_id;
        loop {
            let mut guard = self.nodes.fetch_page(current)?;
            let node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            if node.is_leaf() {
                return Ok(current);
            }
            current = node.get_child(0);
        }
    }

    /// See `BPlusTree::leaf_count` — same diagnostic, same grounding.
    pub fn leaf_count(&self) -> Result<usize> {
        if self.is_empty() {
            return Ok(0);
        }
        let mut current = self.leftmost_leaf()?;
        let mut count = 0;
        while current != INVALID_PAGE_ID {
            count += 1;
            let mut guard = self.nodes.fetch_page(current)?;
            let node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
            current = node.next_leaf();
        }
        Ok(count)
    }

    /// See `BPlusTree::root_is_leaf`.
    pub fn root_is_leaf(&self) -> Result<bool> {
        if self.is_empty() {
            return Ok(true);
        }
        let root_id = self.header.get().root_page_id;
        let mut guard = self.nodes.fetch_page(root_id)?;
        let node: BPlusTreeNode<Element<K, V>> = BPlusTreeNode::new(guard.deref_mut(), self.layout);
        Ok(node.is_leaf())
    }
}

/// See `BPlusTree`'s `Drop` impl — same guaranteed-flush-on-close grounding.
impl<K: IndexKey, V: IndexKey> Drop for MultiBPlusTree<K, V> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("multi tree: failed to flush on drop: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &tempfile::TempDir, name: &str) -> MultiBPlusTree<i32, i32> {
        MultiBPlusTree::open_with_capacity(dir.path(), name, 4).unwrap()
    }

    #[test]
    fn insert_then_find_returns_all_values_for_key() {
        let dir = tempfile::tempdir().unwrap();
        let tree = open(&dir, "t");
        tree.insert(1, 100).unwrap();
        tree.insert(1, 200).unwrap();
        tree.insert(2, 300).unwrap();
        let mut values = tree.find(&1).unwrap();
        values.sort();
        assert_eq!(values, vec![100, 200]);
        assert_eq!(tree.find(&2).unwrap(), vec![300]);
        assert_eq!(tree.find(&3).unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn inserting_same_pair_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let tree = open(&dir, "t");
        tree.insert(1, 100).unwrap();
        tree.insert(1, 100).unwrap();
        assert_eq!(tree.size(), 1);
        assert_eq!(tree.find(&1).unwrap(), vec![100]);
    }

    #[test]
    // Composite<i32,i32>'s degree is still large enough that this never
    // splits a leaf; it checks idempotent-duplicate bookkeeping at volume.
    // `tests/multi_scenarios_test.rs` forces real splits with a wide key.
    fn many_duplicate_keys_stay_findable() {
        let dir = tempfile::tempdir().unwrap();
        let tree = open(&dir, "t");
        for v in 0..200i32 {
            tree.insert(7, v).unwrap();
        }
        assert_eq!(tree.size(), 200);
        let mut values = tree.find(&7).unwrap();
        values.sort();
        assert_eq!(values, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn erase_removes_exact_pair_only() {
        let dir = tempfile::tempdir().unwrap();
        let tree = open(&dir, "t");
        tree.insert(1, 100).unwrap();
        tree.insert(1, 200).unwrap();
        assert!(tree.erase(&1, &100).unwrap());
        assert!(!tree.erase(&1, &100).unwrap());
        assert_eq!(tree.find(&1).unwrap(), vec![200]);
    }

    #[test]
    fn erase_all_pairs_empties_tree_and_allows_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let tree = open(&dir, "t");
        for v in 0..60i32 {
            tree.insert(v % 5, v).unwrap();
        }
        for v in 0..60i32 {
            assert!(tree.erase(&(v % 5), &v).unwrap());
        }
        assert!(tree.is_empty());
        tree.insert(9, 90).unwrap();
        assert_eq!(tree.find(&9).unwrap(), vec![90]);
    }
}
