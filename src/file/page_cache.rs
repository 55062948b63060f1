use lru::LruCache;
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{FileError, FileResult};
use super::{PageId, TransactionId};

/// In-memory copy of one page plus its dirty state
pub struct Frame {
    /// Page bytes, always exactly one page long
    pub data: Vec<u8>,
    /// The transaction that dirtied this page since it was last clean
    pub dirty_by: Option<TransactionId>,
}

/// Cloneable, reference-counted handle to a cached page. Handles stay valid
/// across later buffer-manager calls: abort rewrites the frame bytes in
/// place rather than replacing the entry.
#[derive(Clone)]
pub struct CachedPage {
    pid: PageId,
    frame: Arc<Mutex<Frame>>,
}

impl CachedPage {
    pub fn new(pid: PageId, data: Vec<u8>) -> Self {
        Self {
            pid,
            frame: Arc::new(Mutex::new(Frame {
                data,
                dirty_by: None,
            })),
        }
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    /// Lock the frame for byte access. Exclusivity of writes is delivered by
    /// the page lock protocol; this mutex only keeps individual reads and
    /// writes of the buffer coherent.
    pub fn frame(&self) -> MutexGuard<'_, Frame> {
        self.frame.lock().unwrap()
    }
}

/// Bounded mapping from page id to cached page, ordered for eviction.
///
/// The LruCache is used unbounded: automatic eviction would pop the
/// least-recent entry unconditionally, but a victim here must be clean and
/// unlocked, so the buffer manager drives `evict_one` explicitly before any
/// insertion that would overflow.
pub struct PageCache {
    entries: LruCache<PageId, CachedPage>,
}

impl PageCache {
    pub fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
        }
    }

    /// Pure lookup; does not affect eviction order
    pub fn get(&mut self, pid: PageId) -> Option<CachedPage> {
        self.entries.peek(&pid).cloned()
    }

    /// Insert at the most-recently-used end. The caller has already made
    /// room if the pool was full.
    pub fn put(&mut self, pid: PageId, page: CachedPage) {
        self.entries.push(pid, page);
    }

    /// Move an entry to the most-recently-used end (after a mutation)
    pub fn touch(&mut self, pid: PageId) {
        self.entries.promote(&pid);
    }

    /// Drop an entry without flushing
    pub fn remove(&mut self, pid: PageId) -> Option<CachedPage> {
        self.entries.pop(&pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of resident page ids, oldest first
    pub fn iter_ids(&self) -> Vec<PageId> {
        let mut ids: Vec<PageId> = self.entries.iter().map(|(&pid, _)| pid).collect();
        ids.reverse();
        ids
    }

    /// Snapshot of resident page handles
    pub fn pages(&self) -> Vec<CachedPage> {
        self.entries.iter().map(|(_, page)| page.clone()).collect()
    }

    /// Remove and return the oldest page that is clean and unlocked.
    /// Fails with `BufferExhausted` when every resident page is dirty or
    /// locked; evicting either would leak uncommitted bytes to a re-fetch
    /// or write them to disk.
    pub fn evict_one(&mut self, page_locked: impl Fn(PageId) -> bool) -> FileResult<PageId> {
        let candidates = self.iter_ids();
        for pid in candidates {
            let clean = self
                .entries
                .peek(&pid)
                .is_some_and(|page| page.frame().dirty_by.is_none());
            if clean && !page_locked(pid) {
                self.entries.pop(&pid);
                return Ok(pid);
            }
        }
        Err(FileError::BufferExhausted)
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new()
    }
}
