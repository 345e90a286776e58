//! Buffer pool error types

use super::BufferId;
use thiserror::Error;

/// Errors reported by the buffer pool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A fresh allocation would push total memory over the configured cap
    #[error("Out of buffer memory: requested {requested} bytes, {available} bytes available")]
    OutOfMemory { requested: u64, available: u64 },

    /// The id is not on loan from this pool
    #[error("Unknown buffer: {0}")]
    UnknownBuffer(BufferId),
}

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;
