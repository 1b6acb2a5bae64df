use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use persona_store::{SyncMode, WalConfig};
use persona_tracker::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// How loads without credentials are attributed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnonymousPolicy {
    /// Reject unauthenticated loads with 401.
    Deny,
    /// Give every unauthenticated load a fresh synthetic identity, so each
    /// one counts as a new distinct viewer.
    #[default]
    PerRequest,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory for the durable store. `None` keeps profiles in memory.
    pub data_dir: Option<PathBuf>,
    pub sync_mode: SyncMode,
    pub anonymous_viewers: AnonymousPolicy,
    pub max_commit_attempts: u32,
    /// Prefix of the share link returned on creation; the key is appended.
    pub share_base_url: String,
    pub max_body_bytes: usize,
    /// Bearer token to principal id.
    pub tokens: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            data_dir: None,
            sync_mode: SyncMode::default(),
            anonymous_viewers: AnonymousPolicy::default(),
            max_commit_attempts: RetryPolicy::default().max_attempts,
            share_base_url: "https://invitepage.netlify.app/?roomId=".into(),
            max_body_bytes: 10 * 1024 * 1024,
            tokens: BTreeMap::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(raw: &str) -> ServerResult<Self> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_commit_attempts)
    }

    pub fn wal_config(&self) -> WalConfig {
        WalConfig {
            sync_mode: self.sync_mode,
        }
    }

    pub fn share_url(&self, key: &str) -> String {
        format!("{}{key}", self.share_base_url)
    }
}
