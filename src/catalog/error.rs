use thiserror::Error;

use crate::buffer::BufferError;
use crate::index::IndexError;
use crate::record::RecordError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    #[error("Index '{0}' already exists")]
    IndexAlreadyExists(String),

    #[error("Index '{0}' does not exist")]
    IndexNotFound(String),

    #[error("Column '{0}' does not exist")]
    ColumnNotFound(String),

    #[error("An index needs at least one key column")]
    EmptyIndexKey,

    #[error("Catalog corrupted: {0}")]
    Corrupted(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
