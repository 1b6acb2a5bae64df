use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use persona_types::{TypeError, ViewerId};

use crate::error::{ServerError, ServerResult};

/// Who is making a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub anonymous: bool,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            name: "anonymous".into(),
            anonymous: true,
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            anonymous: false,
        }
    }

    /// The stable viewer identity of an authenticated principal.
    pub fn viewer_id(&self) -> Result<ViewerId, TypeError> {
        ViewerId::new(self.name.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Anonymous,
}

impl Credentials {
    /// Extract credentials from an `Authorization: Bearer <token>` header.
    ///
    /// A missing header is anonymous; any other scheme is rejected.
    pub fn from_headers(headers: &HeaderMap) -> ServerResult<Self> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Ok(Self::Anonymous);
        };
        let value = value
            .to_str()
            .map_err(|_| ServerError::AuthFailed("authorization header is not ASCII".into()))?;
        match value.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => Ok(Self::Bearer(token.trim().to_string())),
            _ => Err(ServerError::AuthFailed("expected a bearer token".into())),
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity>;
}

/// Resolves bearer tokens from a fixed token table.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenAuth {
    tokens: BTreeMap<String, String>,
}

impl StaticTokenAuth {
    pub fn new(tokens: BTreeMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity> {
        match credentials {
            Credentials::Anonymous => Ok(Identity::anonymous()),
            Credentials::Bearer(token) => match self.tokens.get(token) {
                Some(principal) => Ok(Identity::user(principal.as_str())),
                None => {
                    tracing::warn!("rejected unknown bearer token");
                    Err(ServerError::AuthFailed("invalid token".into()))
                }
            },
        }
    }
}
