use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

use super::error::{FileError, FileResult};
use super::file_manager::{FileHandle, PagedFileManager};
use super::lock_table::LockTable;
use super::page_cache::{CachedPage, PageCache};
use super::{PageId, Permission, TransactionId, page_size};
use crate::catalog::Catalog;
use crate::record::{RecordId, RecordResult, Tuple};

/// The transactional buffer pool. Every page read and write goes through
/// here; the pool acquires page locks before fetching, bounds residency with
/// a no-steal eviction policy, and implements force-at-commit /
/// rollback-by-discard transaction completion.
///
/// All methods take `&self`; one instance is shared by every transaction
/// thread.
pub struct BufferManager {
    /// Underlying page store
    files: Mutex<PagedFileManager>,
    /// Resident pages, ordered for eviction
    cache: Mutex<PageCache>,
    /// Page lock state; has its own mutex and condvar
    locks: LockTable,
    /// Maximum number of resident pages
    capacity: usize,
}

impl BufferManager {
    pub fn new(file_manager: PagedFileManager) -> Self {
        Self::with_capacity(file_manager, super::DEFAULT_POOL_SIZE)
    }

    pub fn with_capacity(file_manager: PagedFileManager, capacity: usize) -> Self {
        Self {
            files: Mutex::new(file_manager),
            cache: Mutex::new(PageCache::new()),
            locks: LockTable::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fetch a page on behalf of `tid` with the requested permission.
    ///
    /// Blocks until the lock is granted; fails with `TransactionAborted`
    /// when waiting would deadlock, and with `BufferExhausted` when the pool
    /// is full of dirty or locked pages. The returned handle aliases the
    /// cache entry.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permission,
    ) -> FileResult<CachedPage> {
        // Lock before fetch: a concurrent fetcher of the same page is
        // serialized here, so double reads only happen for compatible
        // readers loading identical bytes.
        self.locks.acquire(pid, tid, perm)?;

        let mut cache = self.cache.lock().unwrap();
        if let Some(page) = cache.get(pid) {
            return Ok(page);
        }

        let mut data = vec![0u8; page_size()];
        self.files
            .lock()
            .unwrap()
            .read_page(pid.file, pid.page_no, &mut data)?;

        if cache.len() >= self.capacity {
            self.evict_one(&mut cache)?;
        }

        let page = CachedPage::new(pid, data);
        cache.put(pid, page.clone());
        Ok(page)
    }

    fn evict_one(&self, cache: &mut PageCache) -> FileResult<PageId> {
        match cache.evict_one(|p| self.locks.page_locked(p)) {
            Ok(victim) => {
                debug!(file = victim.file.as_usize(), page = victim.page_no, "evicted clean page");
                Ok(victim)
            }
            Err(err) => {
                warn!(capacity = self.capacity, "buffer pool exhausted: no clean unlocked victim");
                Err(err)
            }
        }
    }

    /// Release one lock early, outside transaction completion.
    ///
    /// This breaks strict two-phase locking if misused; the only sanctioned
    /// caller is the heap-file insert scan, which releases pages it probed
    /// and found full.
    pub fn unsafe_release(&self, tid: TransactionId, pid: PageId) {
        self.locks.release(pid, tid);
    }

    /// Does `tid` hold a lock on `pid`?
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.locks.holds(pid, tid)
    }

    /// Commit (`commit = true`) or abort (`commit = false`) a transaction.
    ///
    /// Commit writes every page dirtied by `tid` to disk and syncs the
    /// touched files (force). Abort reloads each such page's bytes from disk
    /// into the existing frame, so outstanding handles observe the rollback.
    /// Locks are released in both cases, even if an I/O step failed; this
    /// call is the entirety of the transaction's shrinking phase.
    pub fn complete_transaction(&self, tid: TransactionId, commit: bool) -> FileResult<()> {
        let pages = self.cache.lock().unwrap().pages();
        let mut first_err: Option<FileError> = None;
        let mut touched: Vec<FileHandle> = Vec::new();

        for page in pages {
            let mut frame = page.frame();
            if frame.dirty_by != Some(tid) {
                continue;
            }
            let pid = page.id();
            let result = if commit {
                self.files
                    .lock()
                    .unwrap()
                    .write_page(pid.file, pid.page_no, &frame.data)
            } else {
                self.files
                    .lock()
                    .unwrap()
                    .read_page(pid.file, pid.page_no, &mut frame.data)
            };
            match result {
                Ok(()) => {
                    frame.dirty_by = None;
                    touched.push(pid.file);
                }
                Err(err) => {
                    warn!(%tid, file = pid.file.as_usize(), page = pid.page_no,
                        "page {} during transaction completion failed: {err}",
                        if commit { "flush" } else { "reload" });
                    first_err.get_or_insert(err);
                }
            }
        }

        if commit {
            touched.sort_unstable();
            touched.dedup();
            let mut files = self.files.lock().unwrap();
            for handle in touched {
                if let Err(err) = files.sync_file(handle) {
                    first_err.get_or_insert(err);
                }
            }
        }
        debug!(%tid, commit, "transaction complete, releasing locks");

        self.locks.release_all(tid);
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Insert a tuple into `table` on behalf of `tid`.
    ///
    /// The heap file scans for space under READ_ONLY locks, upgrades to
    /// READ_WRITE on the target page, and reports every page it modified;
    /// those pages are marked dirty here and moved to the young end of the
    /// eviction order.
    pub fn insert_tuple(
        &self,
        catalog: &Catalog,
        tid: TransactionId,
        table: FileHandle,
        tuple: &Tuple,
    ) -> RecordResult<RecordId> {
        let file = catalog.heap_file(table)?;
        let (rid, affected) = file.insert_tuple(self, tid, tuple)?;
        self.mark_dirty(tid, &affected);
        Ok(rid)
    }

    /// Delete the tuple identified by `rid` on behalf of `tid`
    pub fn delete_tuple(
        &self,
        catalog: &Catalog,
        tid: TransactionId,
        rid: RecordId,
    ) -> RecordResult<()> {
        let file = catalog.heap_file(rid.page_id.file)?;
        let affected = file.delete_tuple(self, tid, rid)?;
        self.mark_dirty(tid, &affected);
        Ok(())
    }

    fn mark_dirty(&self, tid: TransactionId, pids: &[PageId]) {
        let mut cache = self.cache.lock().unwrap();
        for &pid in pids {
            // Affected pages are held READ_WRITE by `tid`, so they cannot
            // have been evicted since the mutation.
            if let Some(page) = cache.get(pid) {
                page.frame().dirty_by = Some(tid);
                cache.touch(pid);
            }
        }
    }

    /// Write every dirty page to disk regardless of owner.
    ///
    /// Administrative use only: flushing a live transaction's dirty pages
    /// breaks the no-steal guarantee, so this must not run on the
    /// transaction hot path.
    pub fn flush_all(&self) -> FileResult<()> {
        let pages = self.cache.lock().unwrap().pages();
        for page in pages {
            let mut frame = page.frame();
            if frame.dirty_by.is_none() {
                continue;
            }
            let pid = page.id();
            self.files
                .lock()
                .unwrap()
                .write_page(pid.file, pid.page_no, &frame.data)?;
            frame.dirty_by = None;
        }
        self.files.lock().unwrap().sync_all()?;
        Ok(())
    }

    /// Drop a page from the cache without flushing it. Supports rollback of
    /// discarded pages and reuse of freed table pages.
    pub fn discard_page(&self, pid: PageId) {
        self.cache.lock().unwrap().remove(pid);
    }

    /// Number of pages currently resident
    pub fn cached_page_count(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Number of resident pages with a dirtying transaction
    pub fn dirty_page_count(&self) -> usize {
        self.cache
            .lock()
            .unwrap()
            .pages()
            .iter()
            .filter(|p| p.frame().dirty_by.is_some())
            .count()
    }

    // Page-store delegates, used by the catalog and heap files.

    pub fn create_file<P: AsRef<Path>>(&self, path: P) -> FileResult<()> {
        self.files.lock().unwrap().create_file(path)
    }

    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> FileResult<FileHandle> {
        self.files.lock().unwrap().open_file(path)
    }

    /// Number of pages on disk for `handle`
    pub fn page_count(&self, handle: FileHandle) -> FileResult<usize> {
        self.files.lock().unwrap().page_count(handle)
    }

    /// Extend `handle` with one page of `data`, returning the new page number
    pub fn append_page(&self, handle: FileHandle, data: &[u8]) -> FileResult<usize> {
        self.files.lock().unwrap().append_page(handle, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, mpsc};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Pool over one table file pre-seeded with `pages` pages whose first
    /// byte is the page number.
    fn setup(capacity: usize, pages: usize) -> (TempDir, Arc<BufferManager>, FileHandle) {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("table.db");

        let pool = Arc::new(BufferManager::with_capacity(
            PagedFileManager::new(),
            capacity,
        ));
        pool.create_file(&path).unwrap();
        let handle = pool.open_file(&path).unwrap();
        for n in 0..pages {
            let mut data = vec![0u8; page_size()];
            data[0] = n as u8;
            pool.append_page(handle, &data).unwrap();
        }
        (temp_dir, pool, handle)
    }

    /// Read page bytes straight from disk, bypassing the pool under test
    fn read_disk(dir: &TempDir, page_no: usize) -> Vec<u8> {
        let mut files = PagedFileManager::new();
        let handle = files.open_file(dir.path().join("table.db")).unwrap();
        let mut data = vec![0u8; page_size()];
        files.read_page(handle, page_no, &mut data).unwrap();
        data
    }

    /// Emulate a mutation through the pool: write a byte and mark dirty,
    /// as insert_tuple does for real workloads.
    fn dirty_page(pool: &BufferManager, tid: TransactionId, pid: PageId, byte: u8) {
        let page = pool.get_page(tid, pid, Permission::ReadWrite).unwrap();
        page.frame().data[0] = byte;
        pool.mark_dirty(tid, &[pid]);
    }

    #[test]
    fn test_shared_readers_see_identical_bytes() {
        let (_dir, pool, handle) = setup(10, 2);
        let (t1, t2) = (TransactionId::new(), TransactionId::new());
        let pid = PageId::new(handle, 1);

        let p1 = pool.get_page(t1, pid, Permission::ReadOnly).unwrap();
        let p2 = pool.get_page(t2, pid, Permission::ReadOnly).unwrap();

        assert_eq!(p1.frame().data[0], 1);
        assert_eq!(p2.frame().data[0], 1);
        assert!(pool.holds_lock(t1, pid));
        assert!(pool.holds_lock(t2, pid));
        assert_eq!(pool.cached_page_count(), 1);
    }

    #[test]
    fn test_writer_blocks_reader_until_commit() {
        let (dir, pool, handle) = setup(10, 1);
        let (t1, t2) = (TransactionId::new(), TransactionId::new());
        let pid = PageId::new(handle, 0);

        dirty_page(&pool, t1, pid, 99);

        let (tx, rx) = mpsc::channel();
        let pool2 = Arc::clone(&pool);
        let reader = thread::spawn(move || {
            let page = pool2.get_page(t2, pid, Permission::ReadOnly).unwrap();
            let byte = page.frame().data[0];
            tx.send(byte).unwrap();
            pool2.complete_transaction(t2, true).unwrap();
            byte
        });

        thread::sleep(Duration::from_millis(100));
        assert!(rx.try_recv().is_err(), "reader ran before writer committed");

        pool.complete_transaction(t1, true).unwrap();
        assert_eq!(reader.join().unwrap(), 99);
        assert_eq!(read_disk(&dir, 0)[0], 99);
    }

    #[test]
    fn test_no_steal_and_exhaustion() {
        let (dir, pool, handle) = setup(3, 4);
        let t1 = TransactionId::new();

        for n in 0..3 {
            dirty_page(&pool, t1, PageId::new(handle, n), 100 + n as u8);
        }

        // Nothing uncommitted may have reached disk.
        for n in 0..3 {
            assert_eq!(read_disk(&dir, n)[0], n as u8);
        }

        // Every resident page is dirty, so there is no eviction victim.
        let result = pool.get_page(t1, PageId::new(handle, 3), Permission::ReadOnly);
        assert!(matches!(result, Err(FileError::BufferExhausted)));

        // After commit the same request succeeds and the writes are forced.
        pool.complete_transaction(t1, true).unwrap();
        for n in 0..3 {
            assert_eq!(read_disk(&dir, n)[0], 100 + n as u8);
        }
        let t2 = TransactionId::new();
        let page = pool.get_page(t2, PageId::new(handle, 3), Permission::ReadOnly).unwrap();
        assert_eq!(page.frame().data[0], 3);
    }

    #[test]
    fn test_abort_restores_bytes_in_place() {
        let (dir, pool, handle) = setup(10, 2);
        let (t1, t2) = (TransactionId::new(), TransactionId::new());
        let pid = PageId::new(handle, 1);

        dirty_page(&pool, t1, pid, 200);
        let held = pool.get_page(t1, pid, Permission::ReadWrite).unwrap();

        pool.complete_transaction(t1, false).unwrap();

        // Disk was never touched and the live handle sees the rollback.
        assert_eq!(read_disk(&dir, 1)[0], 1);
        assert_eq!(held.frame().data[0], 1);

        let page = pool.get_page(t2, pid, Permission::ReadOnly).unwrap();
        assert_eq!(page.frame().data[0], 1);
    }

    #[test]
    fn test_locks_released_on_completion() {
        let (_dir, pool, handle) = setup(10, 3);
        let t1 = TransactionId::new();

        for n in 0..3 {
            pool.get_page(t1, PageId::new(handle, n), Permission::ReadOnly)
                .unwrap();
        }
        pool.complete_transaction(t1, true).unwrap();

        for n in 0..3 {
            assert!(!pool.holds_lock(t1, PageId::new(handle, n)));
        }
    }

    #[test]
    fn test_eviction_skips_locked_clean_pages() {
        let (_dir, pool, handle) = setup(2, 3);
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        // t1 keeps a clean page locked; it must not be evicted.
        pool.get_page(t1, PageId::new(handle, 0), Permission::ReadOnly)
            .unwrap();
        pool.get_page(t2, PageId::new(handle, 1), Permission::ReadOnly)
            .unwrap();
        pool.complete_transaction(t2, true).unwrap();

        let t3 = TransactionId::new();
        pool.get_page(t3, PageId::new(handle, 2), Permission::ReadOnly)
            .unwrap();

        assert_eq!(pool.cached_page_count(), 2);
        assert!(pool.holds_lock(t1, PageId::new(handle, 0)));
        // Page 1 was the only unlocked clean candidate.
        let mut cache = pool.cache.lock().unwrap();
        assert!(cache.get(PageId::new(handle, 0)).is_some());
        assert!(cache.get(PageId::new(handle, 1)).is_none());
        assert!(cache.get(PageId::new(handle, 2)).is_some());
    }

    #[test]
    fn test_residency_stays_bounded() {
        let (_dir, pool, handle) = setup(3, 8);

        for n in 0..8 {
            let t = TransactionId::new();
            pool.get_page(t, PageId::new(handle, n), Permission::ReadOnly)
                .unwrap();
            pool.complete_transaction(t, true).unwrap();
            assert!(pool.cached_page_count() <= 3);
        }
    }

    #[test]
    fn test_unsafe_release_lets_writer_in() {
        let (_dir, pool, handle) = setup(10, 1);
        let (t1, t2) = (TransactionId::new(), TransactionId::new());
        let pid = PageId::new(handle, 0);

        pool.get_page(t1, pid, Permission::ReadOnly).unwrap();
        pool.unsafe_release(t1, pid);
        assert!(!pool.holds_lock(t1, pid));

        // With the early release the writer acquires without waiting.
        pool.get_page(t2, pid, Permission::ReadWrite).unwrap();
        assert!(pool.holds_lock(t2, pid));
    }

    #[test]
    fn test_discard_page_drops_unflushed() {
        let (dir, pool, handle) = setup(10, 1);
        let t1 = TransactionId::new();
        let pid = PageId::new(handle, 0);

        dirty_page(&pool, t1, pid, 55);
        pool.discard_page(pid);
        assert_eq!(pool.cached_page_count(), 0);
        assert_eq!(read_disk(&dir, 0)[0], 0);

        // A re-fetch sees the on-disk bytes, not the discarded frame.
        let page = pool.get_page(t1, pid, Permission::ReadWrite).unwrap();
        assert_eq!(page.frame().data[0], 0);
    }

    #[test]
    fn test_flush_all_writes_every_owner() {
        let (dir, pool, handle) = setup(10, 2);
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        dirty_page(&pool, t1, PageId::new(handle, 0), 10);
        dirty_page(&pool, t2, PageId::new(handle, 1), 20);
        assert_eq!(pool.dirty_page_count(), 2);

        pool.flush_all().unwrap();
        assert_eq!(pool.dirty_page_count(), 0);
        assert_eq!(read_disk(&dir, 0)[0], 10);
        assert_eq!(read_disk(&dir, 1)[0], 20);
    }

    #[test]
    fn test_aborted_requester_retries_after_driver_rollback() {
        let (_dir, pool, handle) = setup(10, 2);
        let (t1, t2) = (TransactionId::new(), TransactionId::new());
        let (p1, p2) = (PageId::new(handle, 0), PageId::new(handle, 1));

        pool.get_page(t1, p1, Permission::ReadWrite).unwrap();
        pool.get_page(t2, p2, Permission::ReadWrite).unwrap();

        let pool2 = Arc::clone(&pool);
        let blocked = thread::spawn(move || {
            let result = pool2.get_page(t1, p2, Permission::ReadWrite);
            pool2.complete_transaction(t1, result.is_ok()).unwrap();
            result.is_ok()
        });

        thread::sleep(Duration::from_millis(100));

        // t2 closes the cycle, aborts, rolls back, and retries fresh.
        let result = pool.get_page(t2, p1, Permission::ReadWrite);
        assert!(matches!(result, Err(FileError::TransactionAborted)));
        pool.complete_transaction(t2, false).unwrap();

        assert!(blocked.join().unwrap());

        let t3 = TransactionId::new();
        pool.get_page(t3, p1, Permission::ReadWrite).unwrap();
        pool.get_page(t3, p2, Permission::ReadWrite).unwrap();
        pool.complete_transaction(t3, true).unwrap();
    }
}
