use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("All allocatable pages are in use")]
    AllocationExhausted,

    #[error("Page {0} is not allocated")]
    PageNotAllocated(u32),

    #[error("Invalid page id: {0}")]
    InvalidPageId(u32),

    #[error("Invalid page buffer size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },
}

pub type FileResult<T> = Result<T, FileError>;
