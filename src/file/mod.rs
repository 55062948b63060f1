mod buffer_manager;
mod error;
mod file_manager;
mod lock_table;
mod page_cache;

pub use buffer_manager::BufferManager;
pub use error::{FileError, FileResult};
pub use file_manager::{FileHandle, PagedFileManager};
pub use lock_table::LockTable;
pub use page_cache::{CachedPage, Frame, PageCache};

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Default page size in bytes (4KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages the buffer pool may hold resident
pub const DEFAULT_POOL_SIZE: usize = 50;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Current process-wide page size
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::Relaxed)
}

/// Override the process-wide page size. Tests only; existing files and
/// cached pages are not rewritten to the new size.
pub fn set_page_size(size: usize) {
    PAGE_SIZE.store(size, Ordering::Relaxed);
}

/// Restore the default page size. Tests only.
pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::Relaxed);
}

/// Identifies one fixed-size page: a table file plus a page number within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub file: FileHandle,
    pub page_no: usize,
}

impl PageId {
    pub fn new(file: FileHandle, page_no: usize) -> Self {
        Self { file, page_no }
    }
}

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(0);

/// Opaque identifier for an active transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocate a fresh, process-unique transaction id
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn#{}", self.0)
    }
}

/// Access level requested on a page. ReadWrite subsumes ReadOnly for the holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}
