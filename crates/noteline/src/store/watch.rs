//! Change notification for document store subtrees.
//!
//! A [`WatchRegistry`] is shared by a store backend and every [`Watch`] it
//! hands out. Writers call [`WatchRegistry::notify`] after a write commits;
//! each watch whose root overlaps the written path receives a
//! [`WatchEvent::Changed`]. Dropping a watch deregisters it immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::path;

/// A notification delivered to a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Something at or below the watched root changed.
    Changed {
        /// The path that was written or removed.
        path: String,
    },

    /// The store can no longer observe this subtree.
    Failed {
        /// Why observation stopped.
        reason: String,
    },
}

#[derive(Debug)]
struct Watcher {
    root: String,
    tx: mpsc::UnboundedSender<WatchEvent>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    watchers: HashMap<u64, Watcher>,
}

/// The set of live watches for one store.
///
/// Cloning the registry shares the same set.
#[derive(Debug, Clone, Default)]
pub struct WatchRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl WatchRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a watch on `root` and everything beneath it.
    #[must_use]
    pub fn register(&self, root: &str) -> Watch {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.watchers.insert(
            id,
            Watcher {
                root: root.to_string(),
                tx,
            },
        );
        debug!("Registered watch {} on {}", id, root);

        Watch {
            id,
            root: root.to_string(),
            rx,
            registry: self.clone(),
        }
    }

    fn deregister(&self, id: u64) {
        if self.lock().watchers.remove(&id).is_some() {
            debug!("Deregistered watch {}", id);
        }
    }

    /// Notify every watch affected by a change at `changed`.
    pub fn notify(&self, changed: &str) {
        let inner = self.lock();
        for (id, watcher) in &inner.watchers {
            if path::overlaps(changed, &watcher.root) {
                trace!("Notifying watch {} of change at {}", id, changed);
                let _ = watcher.tx.send(WatchEvent::Changed {
                    path: changed.to_string(),
                });
            }
        }
    }

    /// Tell every live watch that observation has failed.
    pub fn fail_all(&self, reason: &str) {
        let inner = self.lock();
        if !inner.watchers.is_empty() {
            warn!(
                "Failing {} active watch(es): {}",
                inner.watchers.len(),
                reason
            );
        }
        for watcher in inner.watchers.values() {
            let _ = watcher.tx.send(WatchEvent::Failed {
                reason: reason.to_string(),
            });
        }
    }

    /// Number of watches currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().watchers.len()
    }

    /// Check whether no watches are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A registered watch on a store subtree.
///
/// Events queue until read. Dropping the watch removes it from the registry
/// before `drop` returns, so no further events are produced for it.
#[derive(Debug)]
pub struct Watch {
    id: u64,
    root: String,
    rx: mpsc::UnboundedReceiver<WatchEvent>,
    registry: WatchRegistry,
}

impl Watch {
    /// The watched root path.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Wait for the next event.
    ///
    /// Returns `None` only if the registry dropped this watch's sender.
    pub async fn changed(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    /// Discard queued `Changed` events.
    ///
    /// Returns the first queued `Failed` event, if any, since that one must
    /// not be coalesced away.
    pub fn drain(&mut self) -> Option<WatchEvent> {
        while let Ok(event) = self.rx.try_recv() {
            if matches!(event, WatchEvent::Failed { .. }) {
                return Some(event);
            }
        }
        None
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}
