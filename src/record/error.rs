use crate::catalog::CatalogError;
use crate::file::FileError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid tuple: {0}")]
    InvalidTuple(String),

    #[error("Invalid slot: page={0}, slot={1}")]
    InvalidSlot(usize, usize),

    #[error("Page full: page={0}")]
    PageFull(usize),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("NULL value for NOT NULL column: {0}")]
    NullConstraintViolation(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
}

impl RecordError {
    /// A deadlock abort is retryable by the transaction driver; every other
    /// record error is a plain failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, RecordError::File(FileError::TransactionAborted))
    }
}

pub type RecordResult<T> = Result<T, RecordError>;
