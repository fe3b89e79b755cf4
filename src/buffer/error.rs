use thiserror::Error;

use crate::file::FileError;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error("No evictable frame available")]
    NoEvictableFrame,

    #[error("Page {0} is not resident in the buffer pool")]
    PageNotResident(u32),

    #[error("Page {0} is pinned")]
    PagePinned(u32),

    #[error("Page {0} has no outstanding pins to release")]
    PageNotPinned(u32),
}

pub type BufferResult<T> = Result<T, BufferError>;
