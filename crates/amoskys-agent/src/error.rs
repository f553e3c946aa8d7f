use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent setup failed: {0}")]
    Setup(String),

    #[error("local queue error: {0}")]
    Ldq(#[from] amoskys_ldq::LdqError),

    #[error("no publisher configured for this agent")]
    NoPublisher,
}

pub type Result<T> = std::result::Result<T, AgentError>;
