mod buffer_pool;
mod error;
mod lru_replacer;

pub use buffer_pool::BufferPoolManager;
pub use error::{BufferError, BufferResult};
pub use lru_replacer::LruReplacer;

/// Index of a frame within the buffer pool
pub type FrameId = usize;

/// Default number of frames in the buffer pool
pub const DEFAULT_POOL_SIZE: usize = 1024;
