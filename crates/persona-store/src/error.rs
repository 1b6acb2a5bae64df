use persona_types::ProfileKey;

/// Errors from profile store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested profile does not exist.
    #[error("profile not found: {0}")]
    NotFound(ProfileKey),

    /// A profile with this key already exists.
    #[error("profile already exists: {0}")]
    AlreadyExists(ProfileKey),

    /// Another transaction committed against this profile after the
    /// snapshot was taken. The caller may retry from a fresh snapshot.
    #[error("write conflict on profile {0}")]
    Conflict(ProfileKey),

    /// The write set does not fit the snapshot it was computed from.
    #[error("invalid write for profile {key}: {reason}")]
    InvalidWrite { key: ProfileKey, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend is unusable (poisoned lock, corrupt log).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` for the retryable optimistic-concurrency failure.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
