use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum length of a profile key in bytes.
pub const MAX_KEY_LEN: usize = 128;

/// Opaque unique identifier of a profile.
///
/// Generated keys are random UUID v4 strings. Caller-supplied keys are
/// accepted when they are non-empty, at most [`MAX_KEY_LEN`] bytes, and made
/// only of ASCII alphanumerics, `-` and `_`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileKey(String);

impl ProfileKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Validate and wrap a caller-supplied key.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TypeError> {
        let raw = raw.into();
        let reason = if raw.is_empty() {
            Some("key is empty".to_string())
        } else if raw.len() > MAX_KEY_LEN {
            Some(format!("key exceeds {MAX_KEY_LEN} bytes"))
        } else if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            Some("key may only contain ASCII alphanumerics, '-' and '_'".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => Err(TypeError::InvalidKey { key: raw, reason }),
            None => Ok(Self(raw)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProfileKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ProfileKey> for String {
    fn from(key: ProfileKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ProfileKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProfileKey({})", self.0)
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
