use std::path::Path;

use super::error::{RecordError, RecordResult};
use super::heap_page::HeapPage;
use super::schema::TableSchema;
use super::tuple::{RecordId, Tuple};
use crate::file::{BufferManager, FileHandle, PageId, Permission, TransactionId};

/// A heap-organized table file: an unordered collection of slotted pages.
///
/// Every page access goes through the buffer pool with an explicit lock
/// request; the struct itself carries no page state and is cheap to clone.
#[derive(Clone)]
pub struct HeapFile {
    handle: FileHandle,
    schema: TableSchema,
}

impl HeapFile {
    /// Create the backing file and wrap it
    pub fn create<P: AsRef<Path>>(
        pool: &BufferManager,
        path: P,
        schema: TableSchema,
    ) -> RecordResult<Self> {
        pool.create_file(&path)?;
        let handle = pool.open_file(&path)?;
        Ok(Self { handle, schema })
    }

    /// Open an existing backing file
    pub fn open<P: AsRef<Path>>(
        pool: &BufferManager,
        path: P,
        schema: TableSchema,
    ) -> RecordResult<Self> {
        let handle = pool.open_file(&path)?;
        Ok(Self { handle, schema })
    }

    /// Wrap a file that is already open in the pool's page store
    pub fn attach(handle: FileHandle, schema: TableSchema) -> Self {
        Self { handle, schema }
    }

    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Number of pages currently on disk
    pub fn num_pages(&self, pool: &BufferManager) -> RecordResult<usize> {
        Ok(pool.page_count(self.handle)?)
    }

    /// Insert a tuple, returning its new id and the pages it modified.
    ///
    /// Scans existing pages under READ_ONLY, upgrading to READ_WRITE on the
    /// first page with a free slot. Pages probed and found full are released
    /// again before the scan moves on. If every page is full the file is
    /// extended with an initialized empty page first, so the on-disk image
    /// never contains the uncommitted tuple.
    pub fn insert_tuple(
        &self,
        pool: &BufferManager,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> RecordResult<(RecordId, Vec<PageId>)> {
        let bytes = tuple.serialize(&self.schema)?;

        let total = pool.page_count(self.handle)?;
        for page_no in 0..total {
            let pid = PageId::new(self.handle, page_no);
            let page = pool.get_page(tid, pid, Permission::ReadOnly)?;
            let has_space = {
                let mut frame = page.frame();
                HeapPage::from_buffer(&mut frame.data)?
                    .find_free_slot()
                    .is_some()
            };

            if has_space {
                // Upgrade; the shared lock held since the probe guarantees
                // no writer filled the slot in between.
                let page = pool.get_page(tid, pid, Permission::ReadWrite)?;
                let mut frame = page.frame();
                let mut heap_page = HeapPage::from_buffer(&mut frame.data)?;
                let slot = heap_page
                    .find_free_slot()
                    .ok_or(RecordError::PageFull(page_no))?;
                heap_page.set_tuple_bytes(slot, &bytes)?;
                heap_page.mark_slot_used(slot)?;
                return Ok((RecordId::new(pid, slot), vec![pid]));
            }

            pool.unsafe_release(tid, pid);
        }

        // Every existing page is full: extend the file, then insert through
        // the pool under a write lock.
        let empty = HeapPage::empty_page_bytes(self.schema.tuple_size())?;
        let page_no = pool.append_page(self.handle, &empty)?;
        let pid = PageId::new(self.handle, page_no);

        let page = pool.get_page(tid, pid, Permission::ReadWrite)?;
        let mut frame = page.frame();
        let mut heap_page = HeapPage::from_buffer(&mut frame.data)?;
        let slot = heap_page
            .find_free_slot()
            .ok_or(RecordError::PageFull(page_no))?;
        heap_page.set_tuple_bytes(slot, &bytes)?;
        heap_page.mark_slot_used(slot)?;

        Ok((RecordId::new(pid, slot), vec![pid]))
    }

    /// Delete the tuple at `rid`, returning the pages modified
    pub fn delete_tuple(
        &self,
        pool: &BufferManager,
        tid: TransactionId,
        rid: RecordId,
    ) -> RecordResult<Vec<PageId>> {
        if rid.page_id.file != self.handle {
            return Err(RecordError::InvalidSlot(rid.page_id.page_no, rid.slot_id));
        }

        let page = pool.get_page(tid, rid.page_id, Permission::ReadWrite)?;
        let mut frame = page.frame();
        let mut heap_page = HeapPage::from_buffer(&mut frame.data)?;

        if !heap_page.is_slot_used(rid.slot_id) {
            return Err(RecordError::InvalidSlot(rid.page_id.page_no, rid.slot_id));
        }
        heap_page.mark_slot_free(rid.slot_id)?;

        Ok(vec![rid.page_id])
    }

    /// Iterator over all stored tuples. Finite and restartable; `rewind`
    /// is close followed by open.
    pub fn iter<'a>(&self, pool: &'a BufferManager, tid: TransactionId) -> HeapFileIterator<'a> {
        HeapFileIterator {
            file: self.clone(),
            pool,
            tid,
            total_pages: 0,
            page_no: 0,
            slot: 0,
            opened: false,
        }
    }
}

/// Scans a heap file page by page, acquiring READ_ONLY on each page as it is
/// visited. The page set is fixed at `open`.
pub struct HeapFileIterator<'a> {
    file: HeapFile,
    pool: &'a BufferManager,
    tid: TransactionId,
    total_pages: usize,
    page_no: usize,
    slot: usize,
    opened: bool,
}

impl HeapFileIterator<'_> {
    pub fn open(&mut self) -> RecordResult<()> {
        self.total_pages = self.file.num_pages(self.pool)?;
        self.page_no = 0;
        self.slot = 0;
        self.opened = true;
        Ok(())
    }

    pub fn close(&mut self) {
        self.opened = false;
    }

    pub fn rewind(&mut self) -> RecordResult<()> {
        self.close();
        self.open()
    }

    /// Next stored tuple, with its `rid` set; None once exhausted
    pub fn next(&mut self) -> RecordResult<Option<Tuple>> {
        if !self.opened {
            return Ok(None);
        }

        while self.page_no < self.total_pages {
            let pid = PageId::new(self.file.handle, self.page_no);
            let page = self.pool.get_page(self.tid, pid, Permission::ReadOnly)?;
            let mut frame = page.frame();
            let heap_page = HeapPage::from_buffer(&mut frame.data)?;

            while self.slot < heap_page.slot_count() {
                let slot = self.slot;
                self.slot += 1;
                if heap_page.is_slot_used(slot) {
                    let mut tuple =
                        Tuple::deserialize(heap_page.tuple_bytes(slot)?, &self.file.schema)?;
                    tuple.set_rid(RecordId::new(pid, slot));
                    return Ok(Some(tuple));
                }
            }

            self.page_no += 1;
            self.slot = 0;
        }

        Ok(None)
    }
}
