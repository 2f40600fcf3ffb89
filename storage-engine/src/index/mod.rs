//! B+ tree index implementations for the storage core.
//!
//! Two tree shapes share the same node layout (`node::BPlusTreeNode`, generic
//! over any fixed-width `IndexKey`): `bptree::BPlusTree` for unique keys with
//! an out-of-line value, and `multi::MultiBPlusTree` for keys that may map to
//! many values, with the value folded directly into the node's key array via
//! a composite key.

pub mod bptree;
pub mod key;
pub mod metadata;
pub mod multi;
pub mod node;

pub use bptree::BPlusTree;
pub use key::IndexKey;
pub use metadata::Layout;
pub use multi::MultiBPlusTree;
