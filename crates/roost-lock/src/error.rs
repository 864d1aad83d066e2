//! Error types for the lock protocol

use roost_coord::CoordError;

/// Error type for lock operations.
///
/// An ordinary bounded-wait expiry is not an error; `acquire_timeout` reports
/// it as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock path '{0}' does not exist, create it before locking")]
    NoSuchPath(String),

    #[error("wait for the lock was interrupted before a grant or timeout")]
    WaitInterrupted,

    #[error("connection was lost while creating the membership node, ownership is unknown")]
    AmbiguousCreate(#[source] CoordError),

    #[error("coordination store error: {0}")]
    Store(#[from] CoordError),
}

pub type Result<T> = std::result::Result<T, LockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LockError::NoSuchPath("/locks/res1".to_string());
        assert_eq!(
            err.to_string(),
            "lock path '/locks/res1' does not exist, create it before locking"
        );

        let err = LockError::WaitInterrupted;
        assert_eq!(
            err.to_string(),
            "wait for the lock was interrupted before a grant or timeout"
        );
    }

    #[test]
    fn test_from_coord_error() {
        let err: LockError = CoordError::NoNode("/x".to_string()).into();
        assert!(matches!(err, LockError::Store(_)));
    }

    #[test]
    fn test_ambiguous_create_keeps_source() {
        let err = LockError::AmbiguousCreate(CoordError::SessionExpired);
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "session expired");
    }
}
