use thiserror::Error;

use crate::buffer::BufferError;
use crate::record::RecordError;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("Key already exists in the index")]
    DuplicateKey,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid node size {0}, a node must hold at least a handful of entries")]
    InvalidOrder(u32),

    #[error("Index structure corrupted: {0}")]
    Corrupted(String),
}

pub type IndexResult<T> = Result<T, IndexError>;
