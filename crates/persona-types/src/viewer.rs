use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum length of a viewer identity in bytes.
pub const MAX_VIEWER_LEN: usize = 256;

/// Prefix carried by synthetic per-request anonymous identities. Reserved:
/// principal identities may not start with it.
pub const ANONYMOUS_PREFIX: &str = "anon:";

/// Opaque identity of whoever loaded a profile.
///
/// Either a stable authenticated principal id or a synthetic anonymous
/// identity minted per request. Anonymous identities are unique, so every
/// anonymous load counts as a new distinct viewer.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ViewerId(String);

impl ViewerId {
    /// Validate and wrap a principal identity.
    ///
    /// Rejects empty or whitespace-only input, control characters,
    /// identities longer than [`MAX_VIEWER_LEN`] bytes, and anything in the
    /// reserved [`ANONYMOUS_PREFIX`] namespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, TypeError> {
        let raw = raw.into();
        if raw.starts_with(ANONYMOUS_PREFIX) {
            return Err(TypeError::InvalidIdentity(format!(
                "identity may not start with reserved prefix {ANONYMOUS_PREFIX:?}"
            )));
        }
        if raw.trim().is_empty() {
            return Err(TypeError::InvalidIdentity("identity is empty".into()));
        }
        if raw.len() > MAX_VIEWER_LEN {
            return Err(TypeError::InvalidIdentity(format!(
                "identity exceeds {MAX_VIEWER_LEN} bytes"
            )));
        }
        if raw.chars().any(char::is_control) {
            return Err(TypeError::InvalidIdentity(
                "identity contains control characters".into(),
            ));
        }
        Ok(Self(raw))
    }

    /// Mint a fresh synthetic identity for an unauthenticated request.
    pub fn anonymous() -> Self {
        Self(format!("{ANONYMOUS_PREFIX}{}", uuid::Uuid::new_v4()))
    }

    /// Returns `true` if this identity was minted by [`ViewerId::anonymous`].
    pub fn is_anonymous(&self) -> bool {
        self.0.starts_with(ANONYMOUS_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ViewerId {
    type Error = TypeError;

    /// Accepts principal identities and previously minted anonymous ones.
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.strip_prefix(ANONYMOUS_PREFIX) {
            Some(id) if uuid::Uuid::parse_str(id).is_ok() => Ok(Self(value)),
            Some(_) => Err(TypeError::InvalidIdentity(format!(
                "malformed anonymous identity {value:?}"
            ))),
            None => Self::new(value),
        }
    }
}

impl From<ViewerId> for String {
    fn from(viewer: ViewerId) -> Self {
        viewer.0
    }
}

impl fmt::Debug for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewerId({})", self.0)
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
