use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("local log error: {0}")]
    Ldq(#[from] amoskys_ldq::LdqError),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, BusError>;
