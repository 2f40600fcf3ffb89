//! Persistent indexed storage core: a paged file and LRU cache (L1/L2, in
//! `buffer_pool_manager`/`common`) underneath two B+ tree shapes (L3) keyed
//! by fixed-width records (L4).

pub mod index;

pub use index::{BPlusTree, IndexKey, Layout, MultiBPlusTree};
