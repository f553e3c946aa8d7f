//! Errors for the local durable queue.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LdqError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    #[error("corrupted row {0}: checksum mismatch")]
    Corrupted(u64),
}

pub type Result<T> = std::result::Result<T, LdqError>;
