use super::{ExecError, ExecResult, Executor};
use crate::catalog::Catalog;
use crate::file::{BufferManager, FileHandle, TransactionId};
use crate::record::{ColumnDef, DataType, TableSchema, Tuple, Value};

pub(super) fn count_schema(name: &str) -> TableSchema {
    TableSchema::new(
        name.to_string(),
        vec![ColumnDef::new("count".to_string(), DataType::Int, true)],
    )
}

/// Drains the child and inserts every tuple into `table` through the buffer
/// pool. Yields a single one-column tuple with the number of rows inserted;
/// later calls yield nothing.
pub struct Insert<'a> {
    pool: &'a BufferManager,
    catalog: &'a Catalog,
    tid: TransactionId,
    table: FileHandle,
    child: Box<dyn Executor + 'a>,
    schema: TableSchema,
    done: bool,
}

impl<'a> Insert<'a> {
    pub fn new(
        pool: &'a BufferManager,
        catalog: &'a Catalog,
        tid: TransactionId,
        table: FileHandle,
        child: Box<dyn Executor + 'a>,
    ) -> ExecResult<Self> {
        // The child must produce tuples shaped like the target table.
        let table_schema = catalog.schema_for_table(table)?;
        let child_schema = child.schema();
        let matches = table_schema.column_count() == child_schema.column_count()
            && table_schema
                .columns()
                .iter()
                .zip(child_schema.columns())
                .all(|(a, b)| a.data_type == b.data_type);
        if !matches {
            return Err(ExecError::Invalid(format!(
                "child schema does not match table '{}'",
                table_schema.table_name()
            )));
        }

        Ok(Self {
            pool,
            catalog,
            tid,
            table,
            child,
            schema: count_schema("insert_result"),
            done: false,
        })
    }
}

impl Executor for Insert<'_> {
    fn open(&mut self) -> ExecResult<()> {
        self.child.open()?;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }

        let mut inserted = 0;
        while let Some(tuple) = self.child.next()? {
            self.pool
                .insert_tuple(self.catalog, self.tid, self.table, &tuple)?;
            inserted += 1;
        }
        self.done = true;
        Ok(Some(Tuple::new(vec![Value::Int(inserted)])))
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
