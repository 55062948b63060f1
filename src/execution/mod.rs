mod aggregate;
mod delete;
mod filter;
mod insert;
mod seq_scan;

pub use aggregate::{Aggregate, AggregateOp};
pub use delete::Delete;
pub use filter::{CompareOp, Filter, Predicate};
pub use insert::Insert;
pub use seq_scan::SeqScan;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::file::FileError;
use crate::record::{RecordError, TableSchema, Tuple};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Execution error: {0}")]
    Invalid(String),
}

pub type ExecResult<T> = Result<T, ExecError>;

/// Pull-based query operator. Operators form a tree; each is opened before
/// use, yields tuples until exhausted, and can be restarted with `rewind`.
pub trait Executor {
    fn open(&mut self) -> ExecResult<()>;
    fn next(&mut self) -> ExecResult<Option<Tuple>>;
    fn rewind(&mut self) -> ExecResult<()>;
    fn close(&mut self);
    /// Schema of the tuples this operator produces
    fn schema(&self) -> &TableSchema;
}

/// Executor over an in-memory list of tuples; the leaf for INSERT pipelines
/// and a convenient source in tests.
pub struct TupleList {
    schema: TableSchema,
    tuples: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl TupleList {
    pub fn new(schema: TableSchema, tuples: Vec<Tuple>) -> Self {
        Self {
            schema,
            tuples,
            cursor: 0,
            opened: false,
        }
    }
}

impl Executor for TupleList {
    fn open(&mut self) -> ExecResult<()> {
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        if !self.opened || self.cursor >= self.tuples.len() {
            return Ok(None);
        }
        let tuple = self.tuples[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(tuple))
    }

    fn rewind(&mut self) -> ExecResult<()> {
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn schema(&self) -> &TableSchema {
        &self.schema
    }
}
