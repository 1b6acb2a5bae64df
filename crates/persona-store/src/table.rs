//! Versioned profile table shared by the in-memory and durable backends.

use std::collections::HashMap;

use persona_types::{Profile, ProfileKey, ViewerId, ViewerRecord};

use crate::error::{StoreError, StoreResult};
use crate::txn::{TxnSnapshot, TxnWrite};

struct VersionedProfile {
    version: u64,
    doc: Profile,
}

/// Profiles keyed by id, each with its own viewer-record sub-table.
#[derive(Default)]
pub(crate) struct ProfileTable {
    profiles: HashMap<ProfileKey, VersionedProfile>,
    viewers: HashMap<ProfileKey, HashMap<ViewerId, ViewerRecord>>,
}

impl ProfileTable {
    pub(crate) fn len(&self) -> usize {
        self.profiles.len()
    }

    pub(crate) fn check_new(&self, profile: &Profile) -> StoreResult<()> {
        if self.profiles.contains_key(&profile.key) {
            return Err(StoreError::AlreadyExists(profile.key.clone()));
        }
        if profile.total_interactions != 0 || profile.unique_viewers != 0 {
            return Err(StoreError::InvalidWrite {
                key: profile.key.clone(),
                reason: "new profiles must start with zero counters".into(),
            });
        }
        Ok(())
    }

    pub(crate) fn insert_new(&mut self, profile: Profile) {
        self.viewers.entry(profile.key.clone()).or_default();
        self.profiles.insert(
            profile.key.clone(),
            VersionedProfile {
                version: 0,
                doc: profile,
            },
        );
    }

    pub(crate) fn get(&self, key: &ProfileKey) -> StoreResult<&Profile> {
        self.profiles
            .get(key)
            .map(|entry| &entry.doc)
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    pub(crate) fn viewer(
        &self,
        key: &ProfileKey,
        viewer: &ViewerId,
    ) -> StoreResult<Option<ViewerRecord>> {
        self.get(key)?;
        Ok(self
            .viewers
            .get(key)
            .and_then(|records| records.get(viewer))
            .cloned())
    }

    pub(crate) fn viewer_count(&self, key: &ProfileKey) -> StoreResult<u64> {
        self.get(key)?;
        Ok(self.viewers.get(key).map_or(0, |records| records.len() as u64))
    }

    pub(crate) fn list_by_owner(&self, owner: &str) -> Vec<Profile> {
        let mut owned: Vec<Profile> = self
            .profiles
            .values()
            .filter(|entry| entry.doc.owner.as_deref() == Some(owner))
            .map(|entry| entry.doc.clone())
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.key.cmp(&b.key)));
        owned
    }

    pub(crate) fn snapshot(&self, key: &ProfileKey, viewer: &ViewerId) -> StoreResult<TxnSnapshot> {
        let entry = self
            .profiles
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        Ok(TxnSnapshot {
            profile: entry.doc.clone(),
            version: entry.version,
            viewer: viewer.clone(),
            viewer_record: self
                .viewers
                .get(key)
                .and_then(|records| records.get(viewer))
                .cloned(),
        })
    }

    /// Check a write set against the current state without applying it.
    ///
    /// Shape errors (`InvalidWrite`) are reported before concurrency errors
    /// so that a malformed write is never retried.
    pub(crate) fn validate(&self, snapshot: &TxnSnapshot, write: &TxnWrite) -> StoreResult<()> {
        let key = snapshot.key();
        let invalid = |reason: &str| StoreError::InvalidWrite {
            key: key.clone(),
            reason: reason.to_string(),
        };

        if let Some(profile) = &write.profile {
            if &profile.key != key {
                return Err(invalid("profile key differs from snapshot"));
            }
            if profile.created_at != snapshot.profile.created_at {
                return Err(invalid("created_at is immutable"));
            }
            if profile.total_interactions < snapshot.profile.total_interactions
                || profile.unique_viewers < snapshot.profile.unique_viewers
            {
                return Err(invalid("counters may not decrease"));
            }
        }
        if let Some(record) = &write.new_viewer {
            if &record.profile != key || record.viewer != snapshot.viewer {
                return Err(invalid("viewer record does not match snapshot"));
            }
            if snapshot.viewer_record.is_some() {
                return Err(invalid("viewer record already exists in snapshot"));
            }
        }

        let current = self
            .profiles
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if current.version != snapshot.version {
            return Err(StoreError::Conflict(key.clone()));
        }
        let seen_now = self
            .viewers
            .get(key)
            .is_some_and(|records| records.contains_key(&snapshot.viewer));
        if seen_now != snapshot.viewer_seen() {
            return Err(StoreError::Conflict(key.clone()));
        }
        Ok(())
    }

    /// Apply an already validated (or replayed) write set.
    ///
    /// Returns the profile document as it stands after the write.
    pub(crate) fn apply(&mut self, key: &ProfileKey, write: TxnWrite) -> StoreResult<Profile> {
        if write.is_empty() {
            return self.get(key).cloned();
        }
        let entry = self
            .profiles
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if let Some(profile) = write.profile {
            entry.doc = profile;
        }
        entry.version += 1;
        if let Some(record) = write.new_viewer {
            self.viewers
                .entry(key.clone())
                .or_default()
                .entry(record.viewer.clone())
                .or_insert(record);
        }
        Ok(entry.doc.clone())
    }
}
