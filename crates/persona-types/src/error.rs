use thiserror::Error;

/// Errors produced when constructing persona types from untrusted input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid profile key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid viewer identity: {0}")]
    InvalidIdentity(String),
}
