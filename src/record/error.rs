use thiserror::Error;

use crate::buffer::BufferError;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error("Row of {size} bytes exceeds the single-page maximum of {max}")]
    RowTooLarge { size: usize, max: usize },

    #[error("No live tuple at page {page_id} slot {slot}")]
    TupleNotFound { page_id: u32, slot: u32 },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Column '{0}' cannot be NULL")]
    NullConstraintViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupted record data: {0}")]
    Corrupted(String),
}

pub type RecordResult<T> = Result<T, RecordError>;
