use std::sync::Arc;

use chrono::Utc;
use persona_store::ProfileStore;
use persona_types::{Profile, ProfileKey, ViewerId};
use serde_json::Value;
use tracing::info;

use crate::error::TrackerResult;
use crate::recorder::InteractionRecorder;
use crate::retry::RetryPolicy;

/// Input to [`ProfileService::create_profile`].
#[derive(Clone, Debug, Default)]
pub struct NewProfile {
    /// Explicit key; a random one is generated when absent.
    pub key: Option<ProfileKey>,
    pub owner: Option<String>,
    pub payload: Value,
}

impl NewProfile {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: ProfileKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Entry points a request handler calls.
///
/// The store is constructed by the embedding service and passed in; the
/// service keeps no state beyond it.
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    recorder: InteractionRecorder,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>, retry: RetryPolicy) -> Self {
        let recorder = InteractionRecorder::new(Arc::clone(&store), retry);
        Self { store, recorder }
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    pub fn recorder(&self) -> &InteractionRecorder {
        &self.recorder
    }

    /// Create a profile with zeroed counters.
    pub fn create_profile(&self, request: NewProfile) -> TrackerResult<Profile> {
        let key = request.key.unwrap_or_else(ProfileKey::generate);
        let profile = Profile::new(key, request.owner, request.payload, Utc::now());
        let created = self.store.create(profile)?;
        info!(
            profile = %created.key,
            owner = created.owner.as_deref().unwrap_or("-"),
            "profile created"
        );
        Ok(created)
    }

    /// Look up a profile and record that `viewer` loaded it.
    ///
    /// Returns the profile as committed by the interaction, so the counters
    /// already include this load.
    pub fn load_profile(&self, key: &ProfileKey, viewer: &ViewerId) -> TrackerResult<Profile> {
        self.store.get(key)?;
        let interaction = self.recorder.record(key, viewer)?;
        Ok(interaction.profile)
    }

    /// Read a profile without counting an interaction.
    pub fn profile(&self, key: &ProfileKey) -> TrackerResult<Profile> {
        Ok(self.store.get(key)?)
    }

    /// Profiles created by `owner`, oldest first.
    pub fn profiles_owned_by(&self, owner: &str) -> TrackerResult<Vec<Profile>> {
        Ok(self.store.list_by_owner(owner)?)
    }
}

impl std::fmt::Debug for ProfileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileService")
            .field("recorder", &self.recorder)
            .finish_non_exhaustive()
    }
}
