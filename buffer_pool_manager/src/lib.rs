//! The L2 cache layer: a true-LRU `BufferPoolManager` over B+ tree node
//! pages, and a parallel LRU cache over paged-file values.

mod lru;
mod node_cache;
mod value_cache;

pub use node_cache::{LruBufferPoolManager, DEFAULT_CAPACITY as DEFAULT_NODE_CAPACITY};
pub use value_cache::{ValueCache, DEFAULT_CAPACITY as DEFAULT_VALUE_CAPACITY};
