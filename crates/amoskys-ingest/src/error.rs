use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("local durable queue error: {0}")]
    Ldq(#[from] amoskys_ldq::LdqError),

    #[error("fusion engine error: {0}")]
    Fusion(#[from] amoskys_fusion::FusionError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
