//! Error types for coordination-store operations

/// Error type for coordination-store client operations
#[derive(Debug, thiserror::Error)]
pub enum CoordError {
    #[error("node not found: {0}")]
    NoNode(String),

    #[error("node already exists: {0}")]
    NodeExists(String),

    #[error("malformed path: {0}")]
    BadPath(String),

    #[error("connection lost: {0}")]
    ConnectionLoss(String),

    #[error("session expired")]
    SessionExpired,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoordError>;
