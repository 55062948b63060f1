use super::{ExecResult, Executor};
use crate::catalog::Catalog;
use crate::file::{BufferManager, FileHandle, TransactionId};
use crate::record::{HeapFileIterator, TableSchema, Tuple};

/// Sequential scan over a heap table. Acquires READ_ONLY on each page as the
/// scan reaches it; locks are held until the transaction completes.
pub struct SeqScan<'a> {
    iter: HeapFileIterator<'a>,
    schema: TableSchema,
}

impl<'a> SeqScan<'a> {
    pub fn new(
        pool: &'a BufferManager,
        catalog: &Catalog,
        tid: TransactionId,
        table: FileHandle,
    ) -> ExecResult<Self> {
        let file = catalog.heap_file(table)?;
        let schema = file.schema().clone();
        Ok(Self {
            iter: file.iter(pool, tid),
            schema,
        })
    }
}

impl Executor for SeqScan<'_> {
    fn open(&mut self) -> ExecResult<()> {
        self.iter.open()?;
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        Ok(self.iter.next()?)
    }

    fn rewind(&mut self) -> ExecResult<()> {
        self.iter.rewind()?;
        Ok(())
    }

    fn close(&mut self) {
        self.iter.close();
    }

    fn schema(&self) -> &TableSchema {
        &self.schema
    }
}
