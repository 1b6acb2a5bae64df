use persona_store::StoreError;
use persona_types::{ProfileKey, TypeError};
use thiserror::Error;

/// Errors reported to callers of the interaction tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The referenced profile does not exist.
    #[error("profile not found: {0}")]
    NotFound(ProfileKey),

    /// A profile with this key already exists.
    #[error("profile already exists: {0}")]
    AlreadyExists(ProfileKey),

    /// Every attempt in the retry budget lost to a concurrent commit. No
    /// part of the interaction was applied.
    #[error("interaction on {key} abandoned after {attempts} conflicting attempts")]
    Contention { key: ProfileKey, attempts: u32 },

    /// The viewer identity is empty or malformed.
    #[error("invalid viewer identity: {0}")]
    InvalidIdentity(String),

    /// A request argument other than the viewer identity is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other store failure, passed through with its source.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for TrackerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => Self::NotFound(key),
            StoreError::AlreadyExists(key) => Self::AlreadyExists(key),
            other => Self::Store(other),
        }
    }
}

impl From<TypeError> for TrackerError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidIdentity(reason) => Self::InvalidIdentity(reason),
            other @ TypeError::InvalidKey { .. } => Self::InvalidRequest(other.to_string()),
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
