use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use persona_types::{Profile, ProfileKey, ViewerId, ViewerRecord};

use crate::error::{StoreError, StoreResult};
use crate::table::ProfileTable;
use crate::traits::ProfileStore;
use crate::txn::{TxnSnapshot, TxnWrite};

/// In-memory, HashMap-based profile store.
///
/// Intended for tests and embedding. Snapshots and commits take the lock
/// separately, so concurrent transactions genuinely race and the losers
/// observe [`StoreError::Conflict`]. Data is lost when the store is dropped.
pub struct InMemoryProfileStore {
    table: RwLock<ProfileTable>,
}

impl InMemoryProfileStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            table: RwLock::new(ProfileTable::default()),
        }
    }

    /// Number of profiles currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.len())
    }

    /// Returns `true` if the store holds no profiles.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, ProfileTable>> {
        self.table
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, ProfileTable>> {
        self.table
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn create(&self, profile: Profile) -> StoreResult<Profile> {
        let mut table = self.write()?;
        table.check_new(&profile)?;
        table.insert_new(profile.clone());
        Ok(profile)
    }

    fn get(&self, key: &ProfileKey) -> StoreResult<Profile> {
        self.read()?.get(key).cloned()
    }

    fn viewer(&self, key: &ProfileKey, viewer: &ViewerId) -> StoreResult<Option<ViewerRecord>> {
        self.read()?.viewer(key, viewer)
    }

    fn viewer_count(&self, key: &ProfileKey) -> StoreResult<u64> {
        self.read()?.viewer_count(key)
    }

    fn list_by_owner(&self, owner: &str) -> StoreResult<Vec<Profile>> {
        Ok(self.read()?.list_by_owner(owner))
    }

    fn snapshot(&self, key: &ProfileKey, viewer: &ViewerId) -> StoreResult<TxnSnapshot> {
        self.read()?.snapshot(key, viewer)
    }

    fn commit(&self, snapshot: &TxnSnapshot, write: TxnWrite) -> StoreResult<Profile> {
        let mut table = self.write()?;
        table.validate(snapshot, &write)?;
        table.apply(snapshot.key(), write)
    }
}

impl std::fmt::Debug for InMemoryProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryProfileStore")
            .field("profile_count", &self.len().ok())
            .finish()
    }
}
