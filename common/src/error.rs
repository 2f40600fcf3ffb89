//! Crate-wide error type for the storage engine.
//!
//! Mirrors the five error kinds the engine distinguishes: routine misses are
//! reported as plain `bool`/`Option` values and never reach this enum; everything
//! here is a fatal condition that should unwind to the caller's top-level dispatch.

use std::io;

/// Errors that can escape the storage core.
///
/// `NotFound` is included for APIs that choose to surface a miss as an `Err`
/// (e.g. `get` as opposed to `find`), but callers wanting the spec's
/// "boolean/sentinel" miss behavior should prefer the `Option`/`bool`-returning
/// entry points instead.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A key lookup failed.
    #[error("key not found")]
    NotFound,

    /// An `assign`/`insert` hit an already-present element where the contract
    /// requires uniqueness rather than idempotence.
    #[error("key already present")]
    KeyConflict,

    /// A paged-file address fell outside `[8, endOffset)`.
    #[error("address {0} out of bound")]
    OutOfBound(u64),

    /// A B+ tree invariant was violated (duplicate key during internal split,
    /// erase-adjust with no sibling, a node discovered with an impossible
    /// key count, ...). Always fatal.
    #[error("structural error: {0}")]
    Structural(String),

    /// The underlying file operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the crate hierarchy.
pub type Result<T> = std::result::Result<T, StorageError>;
