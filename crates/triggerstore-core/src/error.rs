//! Job store errors.

use thiserror::Error;
use triggerstore_kv::KvError;

/// Job store error types.
///
/// Absence is not an error: lookups return `Ok(None)` and removals of
/// unknown entities return `Ok(false)`.
#[derive(Debug, Error)]
pub enum JobStoreError {
    /// Entity exists and replacement was not requested.
    #[error("{kind} already exists: {key}")]
    AlreadyExists { kind: &'static str, key: String },

    /// Trigger variant the store cannot persist.
    #[error("Unsupported trigger type: {0}")]
    UnsupportedTriggerType(String),

    /// Referential conflict between stored entities.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Stored fields could not be decoded.
    #[error("Corrupt record at {key}: {message}")]
    Codec { key: String, message: String },

    /// Group name that cannot be encoded into store keys.
    #[error("Invalid group name '{group}': must be non-empty and must not contain '{delimiter}'")]
    InvalidGroupName { group: String, delimiter: String },

    /// Schedule definition could not be parsed.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Store protocol failure.
    #[error("Store error: {0}")]
    Store(#[from] KvError),
}

impl JobStoreError {
    pub(crate) fn codec(key: &str, message: impl Into<String>) -> Self {
        Self::Codec {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for job store operations.
pub type Result<T> = std::result::Result<T, JobStoreError>;
