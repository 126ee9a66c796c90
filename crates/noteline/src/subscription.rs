//! Live view of a user's note collection.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identity::UserId;
use crate::note::NoteCollection;
use crate::repository::read_collection;
use crate::store::{DocumentStore, Watch, WatchEvent};

/// A cancellable stream of full collection snapshots.
///
/// Each call to [`next`](Subscription::next) yields the complete current
/// collection; consumers replace whatever they showed before. Changes that
/// pile up between two calls are folded into a single snapshot.
///
/// The subscription ends after a store failure, which is reported once as
/// [`Error::ObservationFailed`], or after [`cancel`](Subscription::cancel).
/// Dropping the subscription cancels it.
#[derive(Debug)]
pub struct Subscription {
    user: UserId,
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
    watch: Option<Watch>,
    /// A snapshot is owed to the consumer.
    pending: bool,
}

enum Wake {
    Changed,
    Failed(String),
}

impl Subscription {
    pub(crate) fn new(
        user: UserId,
        store: Arc<dyn DocumentStore>,
        timeout: Duration,
        watch: Watch,
    ) -> Self {
        Self {
            user,
            store,
            timeout,
            watch: Some(watch),
            pending: true,
        }
    }

    /// The user whose notes are observed.
    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Check whether the subscription can still yield snapshots.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.watch.is_some()
    }

    /// Wait for the next snapshot.
    ///
    /// The first call returns immediately with the current collection.
    /// Returns `None` once the subscription has ended.
    ///
    /// This method is cancel-safe: if the returned future is dropped before
    /// it completes, a change it had already picked up is delivered by the
    /// next call.
    pub async fn next(&mut self) -> Option<Result<NoteCollection>> {
        let watch = self.watch.as_mut()?;

        if !self.pending {
            let wake = match watch.changed().await {
                Some(WatchEvent::Changed { .. }) => Wake::Changed,
                Some(WatchEvent::Failed { reason }) => Wake::Failed(reason),
                None => Wake::Failed("watch channel closed".to_string()),
            };
            if let Wake::Failed(reason) = wake {
                return Some(Err(self.terminate(reason)));
            }
            self.pending = true;
        }

        // Everything queued so far is covered by the read below
        if let Some(WatchEvent::Failed { reason }) = watch.drain() {
            return Some(Err(self.terminate(reason)));
        }

        let partition = watch.root().to_string();
        match read_collection(self.store.as_ref(), self.timeout, &partition).await {
            Ok(notes) => {
                self.pending = false;
                debug!(
                    "Snapshot of {} note(s) for user {}",
                    notes.len(),
                    self.user
                );
                Some(Ok(notes))
            }
            Err(e) => Some(Err(self.terminate(e.to_string()))),
        }
    }

    /// Stop observing.
    ///
    /// The store watch is deregistered before this returns.
    pub fn cancel(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.watch.take().is_some() {
            debug!("Subscription for user {} closed", self.user);
        }
    }

    fn terminate(&mut self, reason: String) -> Error {
        warn!("Subscription for user {} failed: {}", self.user, reason);
        self.close();
        Error::observation_failed(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::NoteDraft;
    use crate::repository::NoteRepository;
    use crate::store::{MemoryStore, StoreResult};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    const TICK: Duration = Duration::from_millis(50);

    /// Memory store whose collection reads take a while.
    #[derive(Debug)]
    struct SlowReads {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait]
    impl DocumentStore for SlowReads {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn exists(&self, path: &str) -> StoreResult<bool> {
            self.inner.exists(path).await
        }

        async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
            self.inner.get(path).await
        }

        async fn set(&self, path: &str, value: Value) -> StoreResult<()> {
            self.inner.set(path, value).await
        }

        async fn create_if_absent(&self, path: &str, value: Value) -> StoreResult<bool> {
            self.inner.create_if_absent(path, value).await
        }

        async fn remove(&self, path: &str) -> StoreResult<()> {
            self.inner.remove(path).await
        }

        async fn children(&self, path: &str) -> StoreResult<Vec<(String, Value)>> {
            tokio::time::sleep(self.delay).await;
            self.inner.children(path).await
        }

        fn watch(&self, path: &str) -> StoreResult<Watch> {
            self.inner.watch(path)
        }
    }

    fn setup() -> (MemoryStore, NoteRepository, UserId) {
        crate::logging::init_test_logging();
        let store = MemoryStore::new();
        let repo = NoteRepository::new(Arc::new(store.clone()), Duration::from_secs(1));
        (store, repo, UserId::parse("1234").unwrap())
    }

    async fn next_snapshot(sub: &mut Subscription) -> NoteCollection {
        tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .expect("timed out waiting for snapshot")
            .expect("subscription ended")
            .expect("snapshot failed")
    }

    #[tokio::test]
    async fn test_first_snapshot_is_current_state() {
        let (_store, repo, user) = setup();
        repo.create(&user, &NoteDraft::new("Existing", ""))
            .await
            .unwrap();

        let mut sub = repo.subscribe(&user).unwrap();
        assert_eq!(sub.user(), &user);
        let snapshot = next_snapshot(&mut sub).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].title, "Existing");
    }

    #[tokio::test]
    async fn test_snapshots_follow_changes() {
        let (_store, repo, user) = setup();
        let mut sub = repo.subscribe(&user).unwrap();
        assert!(next_snapshot(&mut sub).await.is_empty());

        let id = repo
            .create(&user, &NoteDraft::new("A", ""))
            .await
            .unwrap();
        let snapshot = next_snapshot(&mut sub).await;
        assert_eq!(snapshot.len(), 1);

        repo.update(&user, &id, &NoteDraft::new("A2", "body"))
            .await
            .unwrap();
        let snapshot = next_snapshot(&mut sub).await;
        assert_eq!(snapshot[0].title, "A2");

        repo.delete(&user, &id).await.unwrap();
        assert!(next_snapshot(&mut sub).await.is_empty());
    }

    #[tokio::test]
    async fn test_pending_changes_coalesce() {
        let (_store, repo, user) = setup();
        let mut sub = repo.subscribe(&user).unwrap();
        next_snapshot(&mut sub).await;

        for title in ["one", "two", "three"] {
            repo.create(&user, &NoteDraft::new(title, "")).await.unwrap();
        }

        assert_eq!(next_snapshot(&mut sub).await.len(), 3);
        assert!(tokio::time::timeout(TICK, sub.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_other_partitions_do_not_wake() {
        let (_store, repo, user) = setup();
        let mut sub = repo.subscribe(&user).unwrap();
        next_snapshot(&mut sub).await;

        let other = UserId::parse("9999").unwrap();
        repo.create(&other, &NoteDraft::new("elsewhere", ""))
            .await
            .unwrap();

        assert!(tokio::time::timeout(TICK, sub.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_record_is_dropped_not_fatal() {
        let (store, repo, user) = setup();
        let mut sub = repo.subscribe(&user).unwrap();
        next_snapshot(&mut sub).await;

        store
            .set("notes/1234/manual", json!({"content": "missing title"}))
            .await
            .unwrap();
        assert!(next_snapshot(&mut sub).await.is_empty());
        assert!(sub.is_active());

        repo.create(&user, &NoteDraft::new("Good", ""))
            .await
            .unwrap();
        let snapshot = next_snapshot(&mut sub).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].title, "Good");
    }

    #[tokio::test]
    async fn test_cancel_deregisters_watch() {
        let (store, repo, user) = setup();
        let mut sub = repo.subscribe(&user).unwrap();
        next_snapshot(&mut sub).await;
        assert_eq!(store.active_watches(), 1);

        sub.cancel();
        assert_eq!(store.active_watches(), 0);

        repo.create(&user, &NoteDraft::new("after", ""))
            .await
            .unwrap();
        assert_eq!(store.active_watches(), 0);
    }

    #[tokio::test]
    async fn test_drop_deregisters_watch() {
        let (store, repo, user) = setup();
        {
            let _sub = repo.subscribe(&user).unwrap();
            assert_eq!(store.active_watches(), 1);
        }
        assert_eq!(store.active_watches(), 0);
    }

    #[tokio::test]
    async fn test_broken_watch_ends_stream() {
        let (store, repo, user) = setup();
        let mut sub = repo.subscribe(&user).unwrap();
        next_snapshot(&mut sub).await;

        store.break_watches("permission revoked");
        let err = sub.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ObservationFailed { .. }));
        assert!(err.to_string().contains("permission revoked"));

        assert!(!sub.is_active());
        assert!(sub.next().await.is_none());
        assert_eq!(store.active_watches(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_coalesced_away() {
        let (store, repo, user) = setup();
        let mut sub = repo.subscribe(&user).unwrap();
        next_snapshot(&mut sub).await;

        repo.create(&user, &NoteDraft::new("x", "")).await.unwrap();
        store.break_watches("gone");

        let err = sub.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ObservationFailed { .. }));
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_read_failure_ends_stream() {
        let (store, repo, user) = setup();
        let mut sub = repo.subscribe(&user).unwrap();
        next_snapshot(&mut sub).await;

        repo.create(&user, &NoteDraft::new("x", "")).await.unwrap();
        store.set_available(false);

        let err = sub.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ObservationFailed { .. }));
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_next_abandoned_mid_read_delivers_later() {
        crate::logging::init_test_logging();
        let store = SlowReads {
            inner: MemoryStore::new(),
            delay: Duration::from_millis(300),
        };
        let repo = NoteRepository::new(Arc::new(store), Duration::from_secs(2));
        let user = UserId::parse("1234").unwrap();
        let mut sub = repo.subscribe(&user).unwrap();

        // Interrupted first read still owes the initial snapshot
        assert!(tokio::time::timeout(TICK, sub.next()).await.is_err());
        assert!(next_snapshot(&mut sub).await.is_empty());

        repo.create(&user, &NoteDraft::new("slow", ""))
            .await
            .unwrap();
        assert!(tokio::time::timeout(TICK, sub.next()).await.is_err());

        let snapshot = next_snapshot(&mut sub).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].title, "slow");
        assert!(sub.is_active());
    }
}
