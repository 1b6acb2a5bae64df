use persona_types::{Profile, ProfileKey, ViewerId, ViewerRecord};

use crate::error::{StoreError, StoreResult};
use crate::txn::{TxnSnapshot, TxnWrite};

/// Durable keyed storage of profile documents and viewer records.
///
/// All implementations must satisfy these invariants:
/// - `create` inserts a profile with both counters at zero, or fails with
///   [`StoreError::AlreadyExists`].
/// - `commit` applies the whole write set or nothing. It fails with
///   [`StoreError::Conflict`] if any commit landed on the same profile
///   after the snapshot was taken, so two transactions that read the same
///   profile version never both commit.
/// - Viewer records are created once and never updated or deleted.
/// - A committed write is visible to every subsequent read.
pub trait ProfileStore: Send + Sync {
    /// Insert a new profile.
    fn create(&self, profile: Profile) -> StoreResult<Profile>;

    /// Point lookup. Fails with [`StoreError::NotFound`] if absent.
    fn get(&self, key: &ProfileKey) -> StoreResult<Profile>;

    /// Read the viewer record for `(key, viewer)`.
    ///
    /// Returns `Ok(None)` if the viewer has never been recorded. Fails with
    /// [`StoreError::NotFound`] if the profile itself is absent.
    fn viewer(&self, key: &ProfileKey, viewer: &ViewerId) -> StoreResult<Option<ViewerRecord>>;

    /// Number of viewer records that exist for a profile.
    fn viewer_count(&self, key: &ProfileKey) -> StoreResult<u64>;

    /// All profiles created by `owner`, oldest first.
    fn list_by_owner(&self, owner: &str) -> StoreResult<Vec<Profile>>;

    /// Take the read set for one optimistic transaction.
    fn snapshot(&self, key: &ProfileKey, viewer: &ViewerId) -> StoreResult<TxnSnapshot>;

    /// Commit a write set computed from `snapshot`.
    ///
    /// Returns the profile document as committed.
    fn commit(&self, snapshot: &TxnSnapshot, write: TxnWrite) -> StoreResult<Profile>;

    /// Run one optimistic transaction: snapshot, let `body` decide the
    /// writes, commit.
    ///
    /// This is a single attempt. A [`StoreError::Conflict`] is returned to
    /// the caller, who decides whether to retry.
    fn atomically(
        &self,
        key: &ProfileKey,
        viewer: &ViewerId,
        body: &mut dyn FnMut(&TxnSnapshot) -> TxnWrite,
    ) -> StoreResult<Profile> {
        let snapshot = self.snapshot(key, viewer)?;
        let write = body(&snapshot);
        self.commit(&snapshot, write)
    }

    /// Check whether a profile exists.
    fn exists(&self, key: &ProfileKey) -> StoreResult<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
