use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use persona_store::{ProfileStore, StoreError, TxnSnapshot, TxnWrite};
use persona_types::{Profile, ProfileKey, ViewerId, ViewerRecord};
use tracing::{debug, warn};

use crate::error::{TrackerError, TrackerResult};
use crate::retry::RetryPolicy;

/// Outcome of one recorded interaction.
#[derive(Clone, Debug, PartialEq)]
pub struct Interaction {
    /// The profile as committed by the interaction transaction.
    pub profile: Profile,
    /// `true` if this call created the viewer's record.
    pub first_view: bool,
    /// Number of commit attempts it took, including the successful one.
    pub attempts: u32,
}

/// Compute the writes for one interaction from a transaction snapshot.
///
/// An unseen viewer gets a record stamped `now` and bumps `unique_viewers`.
/// Every interaction bumps `total_interactions` and sets `last_updated`.
pub fn plan_interaction(snapshot: &TxnSnapshot, now: DateTime<Utc>) -> TxnWrite {
    let first_view = !snapshot.viewer_seen();
    let write = TxnWrite::new(snapshot.profile.with_interaction(first_view, now));
    if first_view {
        write.with_viewer(ViewerRecord::new(
            snapshot.key().clone(),
            snapshot.viewer.clone(),
            now,
        ))
    } else {
        write
    }
}

/// Records profile interactions against a [`ProfileStore`].
///
/// Holds no mutable state of its own: the store's commit is the only
/// serialization point, so any number of `record` calls may run at once on
/// any threads. A call that is abandoned before its commit leaves the
/// counters exactly as if it had never been made.
#[derive(Clone)]
pub struct InteractionRecorder {
    store: Arc<dyn ProfileStore>,
    retry: RetryPolicy,
}

impl InteractionRecorder {
    pub fn new(store: Arc<dyn ProfileStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Record that `viewer` loaded the profile at `key`.
    ///
    /// Fails with [`TrackerError::NotFound`] if the profile does not exist
    /// (no viewer record is created), and with [`TrackerError::Contention`]
    /// once the retry budget is spent on conflicting commits.
    pub fn record(&self, key: &ProfileKey, viewer: &ViewerId) -> TrackerResult<Interaction> {
        let budget = self.retry.max_attempts.max(1);

        for attempt in 1..=budget {
            let mut first_view = false;
            let result = self.store.atomically(key, viewer, &mut |snapshot: &TxnSnapshot| {
                first_view = !snapshot.viewer_seen();
                plan_interaction(snapshot, Utc::now())
            });

            match result {
                Ok(profile) => {
                    debug!(
                        profile = %key,
                        viewer = %viewer,
                        attempt,
                        first_view,
                        total = profile.total_interactions,
                        unique = profile.unique_viewers,
                        "interaction recorded"
                    );
                    return Ok(Interaction {
                        profile,
                        first_view,
                        attempts: attempt,
                    });
                }
                Err(StoreError::Conflict(_)) => {
                    debug!(profile = %key, attempt, "interaction commit conflicted; retrying");
                    thread::yield_now();
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(profile = %key, attempts = budget, "interaction retry budget exhausted");
        Err(TrackerError::Contention {
            key: key.clone(),
            attempts: budget,
        })
    }
}

impl std::fmt::Debug for InteractionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionRecorder")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_store::{InMemoryProfileStore, StoreResult};
    use persona_types::InteractionCounters;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Barrier;

    fn key(s: &str) -> ProfileKey {
        ProfileKey::parse(s).unwrap()
    }

    fn viewer(s: &str) -> ViewerId {
        ViewerId::new(s).unwrap()
    }

    fn store_with(k: &str) -> Arc<InMemoryProfileStore> {
        let store = Arc::new(InMemoryProfileStore::new());
        store
            .create(Profile::new(key(k), None, json!({ "name": "lamp" }), Utc::now()))
            .unwrap();
        store
    }

    fn counters(store: &InMemoryProfileStore, k: &str) -> InteractionCounters {
        store.get(&key(k)).unwrap().counters()
    }

    /// Wraps a store and forces the first `conflicts` commits to conflict.
    struct ConflictingStore {
        inner: InMemoryProfileStore,
        conflicts: AtomicU32,
    }

    impl ConflictingStore {
        fn new(inner: InMemoryProfileStore, conflicts: u32) -> Self {
            Self {
                inner,
                conflicts: AtomicU32::new(conflicts),
            }
        }
    }

    impl ProfileStore for ConflictingStore {
        fn create(&self, profile: Profile) -> StoreResult<Profile> {
            self.inner.create(profile)
        }
        fn get(&self, key: &ProfileKey) -> StoreResult<Profile> {
            self.inner.get(key)
        }
        fn viewer(&self, key: &ProfileKey, viewer: &ViewerId) -> StoreResult<Option<ViewerRecord>> {
            self.inner.viewer(key, viewer)
        }
        fn viewer_count(&self, key: &ProfileKey) -> StoreResult<u64> {
            self.inner.viewer_count(key)
        }
        fn list_by_owner(&self, owner: &str) -> StoreResult<Vec<Profile>> {
            self.inner.list_by_owner(owner)
        }
        fn snapshot(&self, key: &ProfileKey, viewer: &ViewerId) -> StoreResult<TxnSnapshot> {
            self.inner.snapshot(key, viewer)
        }
        fn commit(&self, snapshot: &TxnSnapshot, write: TxnWrite) -> StoreResult<Profile> {
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Conflict(snapshot.key().clone()));
            }
            self.inner.commit(snapshot, write)
        }
    }

    fn conflicting(k: &str, conflicts: u32) -> Arc<ConflictingStore> {
        let inner = InMemoryProfileStore::new();
        inner
            .create(Profile::new(key(k), None, json!({}), Utc::now()))
            .unwrap();
        Arc::new(ConflictingStore::new(inner, conflicts))
    }

    // -----------------------------------------------------------------------
    // Counting policy
    // -----------------------------------------------------------------------

    #[test]
    fn lamp_scenario() {
        let store = store_with("p1");
        let recorder = InteractionRecorder::new(store.clone(), RetryPolicy::default());
        assert_eq!(counters(&store, "p1"), InteractionCounters::new(0, 0));

        let first = recorder.record(&key("p1"), &viewer("u1")).unwrap();
        assert!(first.first_view);
        assert_eq!(first.profile.counters(), InteractionCounters::new(1, 1));

        let again = recorder.record(&key("p1"), &viewer("u1")).unwrap();
        assert!(!again.first_view);
        assert_eq!(again.profile.counters(), InteractionCounters::new(2, 1));

        let other = recorder.record(&key("p1"), &viewer("u2")).unwrap();
        assert!(other.first_view);
        assert_eq!(other.profile.counters(), InteractionCounters::new(3, 2));

        assert_eq!(counters(&store, "p1"), InteractionCounters::new(3, 2));
        assert_eq!(store.viewer_count(&key("p1")).unwrap(), 2);
    }

    #[test]
    fn repeat_viewer_only_bumps_total() {
        let store = store_with("p1");
        let recorder = InteractionRecorder::new(store.clone(), RetryPolicy::default());
        recorder.record(&key("p1"), &viewer("u1")).unwrap();
        recorder.record(&key("p1"), &viewer("u1")).unwrap();
        assert_eq!(counters(&store, "p1"), InteractionCounters::new(2, 1));
    }

    #[test]
    fn first_seen_is_stable_across_repeat_views() {
        let store = store_with("p1");
        let recorder = InteractionRecorder::new(store.clone(), RetryPolicy::default());
        recorder.record(&key("p1"), &viewer("u1")).unwrap();
        let before = store.viewer(&key("p1"), &viewer("u1")).unwrap().unwrap();
        recorder.record(&key("p1"), &viewer("u1")).unwrap();
        let after = store.viewer(&key("p1"), &viewer("u1")).unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn last_updated_advances_created_at_does_not() {
        let store = store_with("p1");
        let created = store.get(&key("p1")).unwrap();
        let recorder = InteractionRecorder::new(store.clone(), RetryPolicy::default());
        let p = recorder.record(&key("p1"), &viewer("u1")).unwrap().profile;
        assert_eq!(p.created_at, created.created_at);
        assert!(p.last_updated >= created.last_updated);
    }

    #[test]
    fn missing_profile_is_not_found_and_leaves_no_record() {
        let store = store_with("p1");
        let recorder = InteractionRecorder::new(store.clone(), RetryPolicy::default());
        let err = recorder.record(&key("ghost"), &viewer("u1")).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(k) if k == key("ghost")));
        assert!(matches!(
            store.viewer(&key("ghost"), &viewer("u1")),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(counters(&store, "p1"), InteractionCounters::new(0, 0));
    }

    #[test]
    fn plan_for_seen_viewer_has_no_record() {
        let store = store_with("p1");
        let recorder = InteractionRecorder::new(store.clone(), RetryPolicy::default());
        recorder.record(&key("p1"), &viewer("u1")).unwrap();

        let snap = store.snapshot(&key("p1"), &viewer("u1")).unwrap();
        let write = plan_interaction(&snap, Utc::now());
        assert!(write.new_viewer.is_none());
        assert_eq!(
            write.profile.unwrap().counters(),
            InteractionCounters::new(2, 1)
        );
    }

    // -----------------------------------------------------------------------
    // Retries
    // -----------------------------------------------------------------------

    #[test]
    fn conflicts_within_budget_are_retried() {
        let store = conflicting("p1", 3);
        let recorder = InteractionRecorder::new(store.clone(), RetryPolicy::new(4));
        let outcome = recorder.record(&key("p1"), &viewer("u1")).unwrap();
        assert_eq!(outcome.attempts, 4);
        assert!(outcome.first_view);
        assert_eq!(
            store.get(&key("p1")).unwrap().counters(),
            InteractionCounters::new(1, 1)
        );
    }

    #[test]
    fn exhausted_budget_is_contention_with_no_partial_state() {
        let store = conflicting("p1", 10);
        let recorder = InteractionRecorder::new(store.clone(), RetryPolicy::new(3));
        let err = recorder.record(&key("p1"), &viewer("u1")).unwrap_err();
        assert!(matches!(err, TrackerError::Contention { attempts: 3, .. }));
        assert_eq!(
            store.get(&key("p1")).unwrap().counters(),
            InteractionCounters::new(0, 0)
        );
        assert!(store.viewer(&key("p1"), &viewer("u1")).unwrap().is_none());
    }

    #[test]
    fn zero_budget_still_makes_one_attempt() {
        let store = store_with("p1");
        let recorder = InteractionRecorder::new(store.clone(), RetryPolicy { max_attempts: 0 });
        assert_eq!(recorder.record(&key("p1"), &viewer("u1")).unwrap().attempts, 1);
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    fn run_concurrently(store: Arc<InMemoryProfileStore>, viewers: Vec<ViewerId>) -> Vec<Interaction> {
        let recorder = InteractionRecorder::new(store, RetryPolicy::new(viewers.len() as u32 + 1));
        let barrier = Arc::new(Barrier::new(viewers.len()));
        let handles: Vec<_> = viewers
            .into_iter()
            .map(|v| {
                let recorder = recorder.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    recorder.record(&key("p1"), &v).unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect()
    }

    #[test]
    fn concurrent_same_viewer_counts_once() {
        const N: usize = 16;
        let store = store_with("p1");
        let outcomes = run_concurrently(store.clone(), vec![viewer("u1"); N]);

        assert_eq!(outcomes.iter().filter(|o| o.first_view).count(), 1);
        assert_eq!(counters(&store, "p1"), InteractionCounters::new(N as u64, 1));
        assert_eq!(store.viewer_count(&key("p1")).unwrap(), 1);
    }

    #[test]
    fn concurrent_distinct_viewers_each_count() {
        const N: usize = 16;
        let store = store_with("p1");
        let viewers = (0..N).map(|i| viewer(&format!("u{i}"))).collect();
        let outcomes = run_concurrently(store.clone(), viewers);

        assert!(outcomes.iter().all(|o| o.first_view));
        assert_eq!(
            counters(&store, "p1"),
            InteractionCounters::new(N as u64, N as u64)
        );
        assert_eq!(store.viewer_count(&key("p1")).unwrap(), N as u64);
    }

    #[test]
    fn concurrent_mixed_viewers_keep_invariant() {
        let store = store_with("p1");
        let viewers: Vec<ViewerId> = (0..24).map(|i| viewer(&format!("u{}", i % 5))).collect();
        run_concurrently(store.clone(), viewers);

        let p = store.get(&key("p1")).unwrap();
        assert_eq!(p.counters(), InteractionCounters::new(24, 5));
        assert_eq!(store.viewer_count(&key("p1")).unwrap(), p.unique_viewers);
    }

    // -----------------------------------------------------------------------
    // Properties over arbitrary sequences
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn sequential_counts_match_sequence(ids in proptest::collection::vec(0u8..6, 0..40)) {
            let store = store_with("p1");
            let recorder = InteractionRecorder::new(store.clone(), RetryPolicy::default());
            for id in &ids {
                recorder.record(&key("p1"), &viewer(&format!("v{id}"))).unwrap();
            }

            let distinct: HashSet<u8> = ids.iter().copied().collect();
            let p = store.get(&key("p1")).unwrap();
            prop_assert_eq!(p.total_interactions, ids.len() as u64);
            prop_assert_eq!(p.unique_viewers, distinct.len() as u64);
            prop_assert_eq!(store.viewer_count(&key("p1")).unwrap(), p.unique_viewers);
        }

        #[test]
        fn total_never_decreases(ids in proptest::collection::vec(0u8..4, 1..20)) {
            let store = store_with("p1");
            let recorder = InteractionRecorder::new(store.clone(), RetryPolicy::default());
            let mut last = 0;
            for id in &ids {
                let total = recorder
                    .record(&key("p1"), &viewer(&format!("v{id}")))
                    .unwrap()
                    .profile
                    .total_interactions;
                prop_assert!(total > last);
                last = total;
            }
        }
    }
}
