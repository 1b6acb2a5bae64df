use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use persona_types::{Profile, ProfileKey, ViewerId, ViewerRecord};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::lock::DirLock;
use crate::table::ProfileTable;
use crate::traits::ProfileStore;
use crate::txn::{TxnSnapshot, TxnWrite};
use crate::wal::{StoreEvent, WalConfig, WriteAheadLog};

/// File name of the log inside the data directory.
pub const WAL_FILE_NAME: &str = "profiles.wal";

/// Profile store that survives restarts.
///
/// State lives in the same versioned in-memory table as
/// [`InMemoryProfileStore`](crate::InMemoryProfileStore); every mutation is
/// appended to a [`WriteAheadLog`] while the table's write lock is held and
/// applied only after the append succeeded. Opening the store replays the
/// log, so readers never observe a commit that is not on disk.
///
/// Commits are validated against this handle's table only, so the data
/// directory is locked for as long as the store is open. A second open of
/// the same directory, from this process or another, fails with
/// [`StoreError::Backend`].
pub struct DurableProfileStore {
    dir: PathBuf,
    table: RwLock<ProfileTable>,
    wal: WriteAheadLog,
    _lock: DirLock,
}

impl DurableProfileStore {
    /// Open (or initialize) a store rooted at `dir`.
    pub fn open(dir: &Path, config: WalConfig) -> StoreResult<Self> {
        let lock = DirLock::acquire(dir)?;
        let wal = WriteAheadLog::open(&dir.join(WAL_FILE_NAME), config)?;
        Self::recover(dir, lock, wal)
    }

    fn recover(dir: &Path, lock: DirLock, wal: WriteAheadLog) -> StoreResult<Self> {
        let mut table = ProfileTable::default();
        let events = wal.recover()?;
        let replayed = events.len();
        for event in events {
            replay(&mut table, event)?;
        }
        info!(
            dir = %dir.display(),
            lock = %lock.path().display(),
            replayed,
            profiles = table.len(),
            "opened durable profile store"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            table: RwLock::new(table),
            wal,
            _lock: lock,
        })
    }

    /// Directory holding the store's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of profiles currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.len())
    }

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

fn replay(table: &mut ProfileTable, event: StoreEvent) -> StoreResult<()> {
    match event {
        StoreEvent::ProfileCreated { profile } => {
            table
                .check_new(&profile)
                .map_err(|e| StoreError::Backend(format!("corrupt log: {e}")))?;
            table.insert_new(profile);
        }
        StoreEvent::Committed {
            key,
            profile,
            new_viewer,
        } => {
            table
                .apply(&key, TxnWrite { profile, new_viewer })
                .map_err(|e| StoreError::Backend(format!("corrupt log: {e}")))?;
        }
    }
    Ok(())
}

impl ProfileStore for DurableProfileStore {
    fn create(&self, profile: Profile) -> StoreResult<Profile> {
        let mut table = self.write()?;
        table.check_new(&profile)?;
        self.wal.append(&StoreEvent::ProfileCreated {
            profile: profile.clone(),
        })?;
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
        if !write.is_empty() {
            self.wal.append(&StoreEvent::committed(snapshot.key(), &write))?;
        }
        table.apply(snapshot.key(), write)
    }
}

impl std::fmt::Debug for DurableProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableProfileStore")
            .field("dir", &self.dir)
            .field("profile_count", &self.len().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::testing::{log_with_fault, Fault};
    use chrono::Utc;
    use serde_json::json;
    use std::fs::OpenOptions;

    fn key(s: &str) -> ProfileKey {
        ProfileKey::parse(s).unwrap()
    }

    fn viewer(s: &str) -> ViewerId {
        ViewerId::new(s).unwrap()
    }

    fn view(store: &DurableProfileStore, k: &str, v: &str) -> Profile {
        try_view(store, k, v).unwrap()
    }

    fn try_view(store: &DurableProfileStore, k: &str, v: &str) -> StoreResult<Profile> {
        store.atomically(&key(k), &viewer(v), &mut |snap: &TxnSnapshot| {
            let now = Utc::now();
            let first = !snap.viewer_seen();
            let write = TxnWrite::new(snap.profile.with_interaction(first, now));
            if first {
                write.with_viewer(ViewerRecord::new(snap.key().clone(), snap.viewer.clone(), now))
            } else {
                write
            }
        })
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DurableProfileStore::open(dir.path(), WalConfig::default()).unwrap();
            store
                .create(Profile::new(key("p1"), Some("alice".into()), json!({ "name": "lamp" }), Utc::now()))
                .unwrap();
            view(&store, "p1", "u1");
            view(&store, "p1", "u1");
            view(&store, "p1", "u2");
        }

        let store = DurableProfileStore::open(dir.path(), WalConfig::default()).unwrap();
        let p = store.get(&key("p1")).unwrap();
        assert_eq!(p.total_interactions, 3);
        assert_eq!(p.unique_viewers, 2);
        assert_eq!(p.payload["name"], "lamp");
        assert_eq!(store.viewer_count(&key("p1")).unwrap(), 2);
        assert!(store.viewer(&key("p1"), &viewer("u1")).unwrap().is_some());
        assert_eq!(store.list_by_owner("alice").unwrap().len(), 1);

        // Versions were rebuilt too: a new transaction commits cleanly.
        let p = view(&store, "p1", "u3");
        assert_eq!(p.unique_viewers, 3);
    }

    #[test]
    fn duplicate_create_is_not_logged() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableProfileStore::open(dir.path(), WalConfig::default()).unwrap();
        store
            .create(Profile::new(key("p1"), None, json!({}), Utc::now()))
            .unwrap();
        let before = std::fs::metadata(dir.path().join(WAL_FILE_NAME)).unwrap().len();
        assert!(matches!(
            store.create(Profile::new(key("p1"), None, json!({}), Utc::now())),
            Err(StoreError::AlreadyExists(_))
        ));
        let after = std::fs::metadata(dir.path().join(WAL_FILE_NAME)).unwrap().len();
        assert_eq!(before, after);
    }

    #[test]
    fn conflicting_commit_is_not_logged() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableProfileStore::open(dir.path(), WalConfig::default()).unwrap();
        store
            .create(Profile::new(key("p1"), None, json!({}), Utc::now()))
            .unwrap();
        let stale = store.snapshot(&key("p1"), &viewer("u1")).unwrap();
        view(&store, "p1", "u2");

        let write = TxnWrite::new(stale.profile.with_interaction(false, Utc::now()));
        assert!(store.commit(&stale, write).unwrap_err().is_conflict());
        drop(store);

        let store = DurableProfileStore::open(dir.path(), WalConfig::default()).unwrap();
        assert_eq!(store.get(&key("p1")).unwrap().total_interactions, 1);
    }

    #[test]
    fn torn_commit_is_dropped_as_a_whole() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DurableProfileStore::open(dir.path(), WalConfig::default()).unwrap();
            store
                .create(Profile::new(key("p1"), None, json!({}), Utc::now()))
                .unwrap();
            view(&store, "p1", "u1");
        }

        // Simulate a crash in the middle of writing the interaction record.
        let path = dir.path().join(WAL_FILE_NAME);
        let len = std::fs::metadata(&path).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len - 3)
            .unwrap();

        let store = DurableProfileStore::open(dir.path(), WalConfig::default()).unwrap();
        let p = store.get(&key("p1")).unwrap();
        assert_eq!(p.total_interactions, 0);
        assert_eq!(p.unique_viewers, 0);
        assert_eq!(store.viewer_count(&key("p1")).unwrap(), 0);
    }

    #[test]
    fn open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = DurableProfileStore::open(&nested, WalConfig::default()).unwrap();
        assert!(store.is_empty().unwrap());
        assert!(nested.join(WAL_FILE_NAME).exists());
        assert_eq!(store.dir(), nested.as_path());
    }

    #[test]
    fn second_open_of_live_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let first = DurableProfileStore::open(dir.path(), WalConfig::default()).unwrap();
        first
            .create(Profile::new(key("p1"), None, json!({}), Utc::now()))
            .unwrap();
        view(&first, "p1", "u1");

        match DurableProfileStore::open(dir.path(), WalConfig::default()) {
            Err(StoreError::Backend(msg)) => assert!(msg.contains("data directory in use")),
            other => panic!("expected the directory to be busy, got {other:?}"),
        }

        // The live handle keeps committing undisturbed.
        view(&first, "p1", "u2");
        drop(first);

        let store = DurableProfileStore::open(dir.path(), WalConfig::default()).unwrap();
        let p = store.get(&key("p1")).unwrap();
        assert_eq!(p.total_interactions, 2);
        assert_eq!(p.unique_viewers, 2);
        assert_eq!(store.viewer_count(&key("p1")).unwrap(), p.unique_viewers);
    }

    #[test]
    fn failed_log_append_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DurableProfileStore::open(dir.path(), WalConfig::default()).unwrap();
            store
                .create(Profile::new(key("p1"), None, json!({}), Utc::now()))
                .unwrap();
            view(&store, "p1", "u1");
        }

        {
            let lock = DirLock::acquire(dir.path()).unwrap();
            let wal = log_with_fault(&dir.path().join(WAL_FILE_NAME), Fault::Sync);
            let store = DurableProfileStore::recover(dir.path(), lock, wal).unwrap();

            assert!(matches!(try_view(&store, "p1", "u2"), Err(StoreError::Io(_))));
            let p = store.get(&key("p1")).unwrap();
            assert_eq!(p.total_interactions, 1);
            assert!(store.viewer(&key("p1"), &viewer("u2")).unwrap().is_none());

            view(&store, "p1", "u3");
        }

        let store = DurableProfileStore::open(dir.path(), WalConfig::default()).unwrap();
        let p = store.get(&key("p1")).unwrap();
        assert_eq!(p.total_interactions, 2);
        assert_eq!(p.unique_viewers, 2);
        assert_eq!(store.viewer_count(&key("p1")).unwrap(), 2);
        assert!(store.viewer(&key("p1"), &viewer("u2")).unwrap().is_none());
    }
}
