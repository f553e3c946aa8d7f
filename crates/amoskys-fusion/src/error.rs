use thiserror::Error;

#[derive(Debug, Error)]
pub enum FusionError {
    #[error("persistence error: {0}")]
    Store(#[from] sled::Error),

    #[error("(de)serialization error: {0}")]
    Codec(#[from] postcard::Error),
}

pub type Result<T> = std::result::Result<T, FusionError>;
