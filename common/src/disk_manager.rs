//! Raw positioned I/O over a single node file, one page (= one B+ tree node)
//! per `PageId`. This is the bottom of the L2 cache's backing store — it has
//! no notion of dirtiness or eviction, only "read this page" / "write this
//! page" / "allocate the next page".

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::api::{PageId, PAGE_SIZE};
use crate::error::StorageError;

/// Manages reading and writing fixed `PAGE_SIZE` pages to a file on disk
/// using positioned I/O (`read_exact_at`/`write_all_at`), so callers never
/// need to track a shared seek cursor.
#[derive(Debug)]
pub struct DiskManager {
    file: File,
    next_page_id: PageId,
}

impl DiskManager {
    /// Opens (creating if absent) the node file at `path`. `next_page_id` is
    /// recovered from the file's current length, matching the teacher's
    /// `DiskManager::new` recovery-on-open behavior.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let len = file.metadata()?.len();
        // Page 0 (INVALID_PAGE_ID) is never handed out by `allocate_page`;
        // it is reserved for the tree-file header (`rootOffset`/`endOffset`/
        // `size`) and must physically exist so `read_page(0, ..)` never runs
        // past end of file. A freshly created file gets it zero-filled here;
        // allocation then starts at page 1.
        let next_page_id = if len == 0 { 1 } else { len / PAGE_SIZE as u64 };
        let dm = Self { file, next_page_id };
        if len == 0 {
            dm.write_page(0, &[0u8; PAGE_SIZE])?;
        }
        Ok(dm)
    }

    /// Reads page `page_id` into `data`, which must be exactly `PAGE_SIZE`
    /// bytes.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<(), StorageError> {
        let offset = page_id * PAGE_SIZE as u64;
        self.file.read_exact_at(data, offset)?;
        Ok(())
    }

    /// Writes `data` (exactly `PAGE_SIZE` bytes) to page `page_id`.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<(), StorageError> {
        let offset = page_id * PAGE_SIZE as u64;
        self.file.write_all_at(data, offset)?;
        Ok(())
    }

    /// Allocates and returns the next page ID, zero-filling it on disk so a
    /// subsequent `read_page` never observes uninitialized bytes.
    pub fn allocate_page(&mut self) -> Result<PageId, StorageError> {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        self.write_page(page_id, &[0u8; PAGE_SIZE])?;
        Ok(page_id)
    }

    /// Truncates the file back to just the reserved header page and resets
    /// allocation to start at page 1. Used when a tree's `clear()` (or an
    /// erase that empties it entirely) discards every node at once — the
    /// one case in the engine where `endOffset` is allowed to shrink rather
    /// than monotonically grow (`SPEC_FULL.md` §3 invariant 5).
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.file.set_len(PAGE_SIZE as u64)?;
        self.next_page_id = 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_then_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut dm = DiskManager::new(dir.path().join("nodes.db")).unwrap();

        let page_id = dm.allocate_page().unwrap();
        assert_eq!(page_id, 1);

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 42;
        dm.write_page(page_id, &data).unwrap();

        let mut out = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut out).unwrap();
        assert_eq!(out[0], 42);
    }

    #[test]
    fn reopen_resumes_allocation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.db");
        {
            let mut dm = DiskManager::new(&path).unwrap();
            dm.allocate_page().unwrap();
            dm.allocate_page().unwrap();
        }
        let mut dm = DiskManager::new(&path).unwrap();
        assert_eq!(dm.allocate_page().unwrap(), 3);
    }
}
