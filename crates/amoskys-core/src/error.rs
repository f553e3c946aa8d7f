//! Error types for envelope/canonical handling

use thiserror::Error;

/// Core crate errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    #[error("envelope missing payload")]
    MissingPayload,

    #[error("invalid field: {0}")]
    InvalidField(String),
}

pub type Result<T> = std::result::Result<T, Error>;
