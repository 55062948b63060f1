use super::insert::count_schema;
use super::{ExecError, ExecResult, Executor};
use crate::catalog::Catalog;
use crate::file::{BufferManager, TransactionId};
use crate::record::{TableSchema, Tuple, Value};

/// Drains the child and deletes every tuple it yields, using the record id
/// each tuple carries from its scan. Yields a single one-column count tuple;
/// later calls yield nothing.
pub struct Delete<'a> {
    pool: &'a BufferManager,
    catalog: &'a Catalog,
    tid: TransactionId,
    child: Box<dyn Executor + 'a>,
    schema: TableSchema,
    done: bool,
}

impl<'a> Delete<'a> {
    pub fn new(
        pool: &'a BufferManager,
        catalog: &'a Catalog,
        tid: TransactionId,
        child: Box<dyn Executor + 'a>,
    ) -> Self {
        Self {
            pool,
            catalog,
            tid,
            child,
            schema: count_schema("delete_result"),
            done: false,
        }
    }
}

impl Executor for Delete<'_> {
    fn open(&mut self) -> ExecResult<()> {
        self.child.open()?;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }

        let mut deleted = 0;
        while let Some(tuple) = self.child.next()? {
            let rid = tuple.rid().ok_or_else(|| {
                ExecError::Invalid("delete requires tuples with a record id".to_string())
            })?;
            self.pool.delete_tuple(self.catalog, self.tid, rid)?;
            deleted += 1;
        }
        self.done = true;
        Ok(Some(Tuple::new(vec![Value::Int(deleted)])))
    }

    fn rewind(&mut self) -> ExecResult<()> {
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn schema(&self) -> &TableSchema {
        &self.schema
    }
}
