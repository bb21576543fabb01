//! Store protocol errors.

use thiserror::Error;

/// Errors surfaced by a [`KvStore`](crate::KvStore) implementation.
#[derive(Debug, Error)]
pub enum KvError {
    /// The key holds a value of a different kind than the operation expects.
    #[error("Wrong value type at key: {key}")]
    WrongType { key: String },

    /// The store could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store did not answer in time.
    #[error("Store operation timed out")]
    Timeout,

    /// Generic error.
    #[error("{0}")]
    Custom(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_type_display() {
        let err = KvError::WrongType {
            key: "ts:Triggers".to_string(),
        };
        assert!(err.to_string().contains("ts:Triggers"));
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(KvError::Timeout.to_string(), "Store operation timed out");
    }
}
