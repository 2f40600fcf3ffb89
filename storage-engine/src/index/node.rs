//! B+ tree node layout and accessors.
//!
//! Generalizes the teacher's byte-offset accessor idiom (`PAGE_ID_OFFSET`,
//! `IS_LEAF_OFFSET`, ...) from a `KeyType`-dispatched layout to one generic
//! over any `IndexKey`, and collapses the teacher's separate `next_leaf`/
//! `prev_leaf` fields into the single reserved last-pointer-slot scheme the
//! original B+ tree file format uses: `p[Degree]` is the next-leaf link,
//! there is no previous-leaf link (the unique and multi trees never walk
//! backwards).

use std::cmp::Ordering;
use std::marker::PhantomData;

use common::api::{PageId, INVALID_PAGE_ID};

use super::key::IndexKey;
use super::metadata::{Layout, NODE_HEADER_SIZE, POINTER_SIZE};

const IS_LEAF_OFFSET: usize = 0;
const KEY_COUNT_OFFSET: usize = 1;
const PARENT_OFFSET: usize = 5;
const KEYS_OFFSET: usize = NODE_HEADER_SIZE;

/// A typed view over one node's raw page bytes.
///
/// `degree` is not stored in the page itself (every node in a tree shares
/// the same degree, computed once from `K::SIZE` at tree-open time) but is
/// needed here to locate the pointer array, which starts right after the
/// `degree`-sized key array.
pub struct BPlusTreeNode<'a, K> {
    data: &'a mut [u8],
    degree: usize,
    _marker: PhantomData<K>,
}

impl<'a, K: IndexKey> BPlusTreeNode<'a, K> {
    pub fn new(data: &'a mut [u8], layout: Layout) -> Self {
        Self { data, degree: layout.degree, _marker: PhantomData }
    }

    fn pointers_offset(&self) -> usize {
        KEYS_OFFSET + self.degree * K::SIZE
    }

    /// Initializes an empty node. `next_leaf` is set to `INVALID_PAGE_ID`
    /// for leaves; internal nodes never read the reserved slot.
    pub fn initialize(&mut self, is_leaf: bool, parent: PageId) {
        self.set_is_leaf(is_leaf);
        self.set_key_count(0);
        self.set_parent(parent);
        if is_leaf {
            self.set_next_leaf(INVALID_PAGE_ID);
        }
    }

    // ===== Header =====

    pub fn is_leaf(&self) -> bool {
        self.data[IS_LEAF_OFFSET] != 0
    }

    pub fn set_is_leaf(&mut self, is_leaf: bool) {
        self.data[IS_LEAF_OFFSET] = is_leaf as u8;
    }

    pub fn key_count(&self) -> usize {
        u32::from_le_bytes(self.data[KEY_COUNT_OFFSET..KEY_COUNT_OFFSET + 4].try_into().unwrap())
            as usize
    }

    pub fn set_key_count(&mut self, count: usize) {
        self.data[KEY_COUNT_OFFSET..KEY_COUNT_OFFSET + 4]
            .copy_from_slice(&(count as u32).to_le_bytes());
    }

    pub fn parent(&self) -> PageId {
        u64::from_le_bytes(self.data[PARENT_OFFSET..PARENT_OFFSET + 8].try_into().unwrap())
    }

    pub fn set_parent(&mut self, parent: PageId) {
        self.data[PARENT_OFFSET..PARENT_OFFSET + 8].copy_from_slice(&parent.to_le_bytes());
    }

    // ===== Keys =====

    fn key_offset(&self, index: usize) -> usize {
        KEYS_OFFSET + index * K::SIZE
    }

    pub fn get_key(&self, index: usize) -> K {
        debug_assert!(index < self.key_count());
        let offset = self.key_offset(index);
        K::read_from(&self.data[offset..offset + K::SIZE])
    }

    pub fn set_key(&mut self, index: usize, key: &K) {
        let offset = self.key_offset(index);
        key.write_to(&mut self.data[offset..offset + K::SIZE]);
    }

    /// Binary searches this node's keys for `key`. `Ok(i)` means
    /// `get_key(i) == key`; `Err(i)` is the insertion point that keeps the
    /// array sorted.
    pub fn binary_search(&self, key: &K) -> Result<usize, usize> {
        let mut lo = 0usize;
        let mut hi = self.key_count();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match key.cmp(&self.get_key(mid)) {
                Ordering::Less => hi = mid,
                Ordering::Greater => lo = mid + 1,
                Ordering::Equal => return Ok(mid),
            }
        }
        Err(lo)
    }

    /// The first index `i` for which `pred(get_key(i))` is `false`, assuming
    /// `pred` holds for a prefix of the key array and not after — the same
    /// contract as `[T]::partition_point`. Lets a caller binary-search by a
    /// projection of `K` (e.g. the multi-key tree's key-only descent, which
    /// compares only the primary component of a `Composite` element) without
    /// `K` itself needing to support that comparison directly.
    pub fn partition_point<F: Fn(&K) -> bool>(&self, pred: F) -> usize {
        let mut lo = 0usize;
        let mut hi = self.key_count();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if pred(&self.get_key(mid)) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    // ===== Pointer array =====

    fn pointer_offset(&self, index: usize) -> usize {
        self.pointers_offset() + index * POINTER_SIZE
    }

    fn get_pointer(&self, index: usize) -> u64 {
        let offset = self.pointer_offset(index);
        u64::from_le_bytes(self.data[offset..offset + 8].try_into().unwrap())
    }

    fn set_pointer(&mut self, index: usize, value: u64) {
        let offset = self.pointer_offset(index);
        self.data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// `p[Degree]`: the next-leaf link, valid for leaves only.
    pub fn next_leaf(&self) -> PageId {
        debug_assert!(self.is_leaf());
        self.get_pointer(self.degree)
    }

    pub fn set_next_leaf(&mut self, page_id: PageId) {
        debug_assert!(self.is_leaf());
        self.set_pointer(self.degree, page_id);
    }

    /// `p[index]` read as a unique-tree leaf value address.
    pub fn get_value(&self, index: usize) -> u64 {
        debug_assert!(self.is_leaf());
        self.get_pointer(index)
    }

    pub fn set_value(&mut self, index: usize, address: u64) {
        debug_assert!(self.is_leaf());
        self.set_pointer(index, address);
    }

    /// `p[index]` read as an internal-node child page id, `index` in
    /// `0..=key_count()`.
    pub fn get_child(&self, index: usize) -> PageId {
        debug_assert!(!self.is_leaf());
        self.get_pointer(index)
    }

    pub fn set_child(&mut self, index: usize, page_id: PageId) {
        debug_assert!(!self.is_leaf());
        self.set_pointer(index, page_id);
    }

    // ===== Structural mutation =====

    pub fn is_full(&self) -> bool {
        self.key_count() >= self.degree
    }

    /// Inserts `(key, value)` at `index` in a leaf node, shifting the
    /// `degree`-capacity key/value slots right. The reserved next-leaf
    /// pointer at index `degree` is untouched.
    pub fn insert_leaf_entry(&mut self, index: usize, key: &K, value: u64) {
        debug_assert!(self.is_leaf());
        let count = self.key_count();
        for i in (index..count).rev() {
            let moved_key = self.get_key(i);
            let moved_value = self.get_value(i);
            self.set_key(i + 1, &moved_key);
            self.set_value(i + 1, moved_value);
        }
        self.set_key(index, key);
        self.set_value(index, value);
        self.set_key_count(count + 1);
    }

    /// Removes the entry at `index` in a leaf node, shifting later entries
    /// left.
    pub fn remove_leaf_entry(&mut self, index: usize) {
        debug_assert!(self.is_leaf());
        let count = self.key_count();
        for i in index..count - 1 {
            let moved_key = self.get_key(i + 1);
            let moved_value = self.get_value(i + 1);
            self.set_key(i, &moved_key);
            self.set_value(i, moved_value);
        }
        self.set_key_count(count - 1);
    }

    /// Inserts `key` at `index` and `right_child` at `index + 1` in an
    /// internal node. `left_child` (at `index`) is assumed already present.
    pub fn insert_internal_entry(&mut self, index: usize, key: &K, right_child: PageId) {
        debug_assert!(!self.is_leaf());
        let count = self.key_count();
        for i in (index..count).rev() {
            let moved_key = self.get_key(i);
            self.set_key(i + 1, &moved_key);
        }
        for i in (index + 1..=count).rev() {
            let moved_child = self.get_child(i);
            self.set_child(i + 1, moved_child);
        }
        self.set_key(index, key);
        self.set_child(index + 1, right_child);
        self.set_key_count(count + 1);
    }

    /// Inserts `key` at index 0 and `left_child` as the new `p[0]`, shifting
    /// every existing key and child right by one. The mirror image of
    /// `insert_internal_entry`, needed when an internal node borrows a
    /// separator and child from its left sibling during erase-adjust (the
    /// borrowed material lands at the front, not the back).
    pub fn insert_internal_entry_front(&mut self, key: &K, left_child: PageId) {
        debug_assert!(!self.is_leaf());
        let count = self.key_count();
        for i in (0..count).rev() {
            let moved_key = self.get_key(i);
            self.set_key(i + 1, &moved_key);
        }
        for i in (0..=count).rev() {
            let moved_child = self.get_child(i);
            self.set_child(i + 1, moved_child);
        }
        self.set_key(0, key);
        self.set_child(0, left_child);
        self.set_key_count(count + 1);
    }

    /// Removes `key[index]` together with the child pointer at
    /// `child_index` (either `index` or `index + 1`, chosen by the caller
    /// depending on whether the left or right child is being discarded).
    pub fn remove_internal_entry(&mut self, index: usize, child_index: usize) {
        debug_assert!(!self.is_leaf());
        let count = self.key_count();
        for i in index..count - 1 {
            let moved_key = self.get_key(i + 1);
            self.set_key(i, &moved_key);
        }
        for i in child_index..count {
            let moved_child = self.get_child(i + 1);
            self.set_child(i, moved_child);
        }
        self.set_key_count(count - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::api::PAGE_SIZE;

    fn layout() -> Layout {
        Layout::for_key::<i32>()
    }

    #[test]
    fn initializes_leaf_header() {
        let mut data = vec![0u8; PAGE_SIZE];
        let mut node: BPlusTreeNode<i32> = BPlusTreeNode::new(&mut data, layout());
        node.initialize(true, 10);
        assert!(node.is_leaf());
        assert_eq!(node.key_count(), 0);
        assert_eq!(node.parent(), 10);
        assert_eq!(node.next_leaf(), INVALID_PAGE_ID);
    }

    #[test]
    fn leaf_insert_shifts_and_finds() {
        let mut data = vec![0u8; PAGE_SIZE];
        let mut node: BPlusTreeNode<i32> = BPlusTreeNode::new(&mut data, layout());
        node.initialize(true, INVALID_PAGE_ID);

        node.insert_leaf_entry(0, &10, 100);
        node.insert_leaf_entry(1, &30, 300);
        node.insert_leaf_entry(1, &20, 200);

        assert_eq!(node.key_count(), 3);
        assert_eq!(node.get_key(0), 10);
        assert_eq!(node.get_key(1), 20);
        assert_eq!(node.get_key(2), 30);
        assert_eq!(node.get_value(1), 200);
        assert_eq!(node.binary_search(&20), Ok(1));
        assert_eq!(node.binary_search(&15), Err(1));
    }

    #[test]
    fn leaf_remove_shifts_left() {
        let mut data = vec![0u8; PAGE_SIZE];
        let mut node: BPlusTreeNode<i32> = BPlusTreeNode::new(&mut data, layout());
        node.initialize(true, INVALID_PAGE_ID);
        node.insert_leaf_entry(0, &1, 10);
        node.insert_leaf_entry(1, &2, 20);
        node.insert_leaf_entry(2, &3, 30);

        node.remove_leaf_entry(1);
        assert_eq!(node.key_count(), 2);
        assert_eq!(node.get_key(0), 1);
        assert_eq!(node.get_key(1), 3);
    }

    #[test]
    fn internal_insert_and_remove() {
        let mut data = vec![0u8; PAGE_SIZE];
        let mut node: BPlusTreeNode<i32> = BPlusTreeNode::new(&mut data, layout());
        node.initialize(false, INVALID_PAGE_ID);
        node.set_child(0, 100);
        node.insert_internal_entry(0, &50, 200);
        node.insert_internal_entry(1, &80, 300);

        assert_eq!(node.key_count(), 2);
        assert_eq!(node.get_key(0), 50);
        assert_eq!(node.get_key(1), 80);
        assert_eq!(node.get_child(0), 100);
        assert_eq!(node.get_child(1), 200);
        assert_eq!(node.get_child(2), 300);

        node.remove_internal_entry(0, 0);
        assert_eq!(node.key_count(), 1);
        assert_eq!(node.get_key(0), 80);
        assert_eq!(node.get_child(0), 200);
        assert_eq!(node.get_child(1), 300);
    }
}
