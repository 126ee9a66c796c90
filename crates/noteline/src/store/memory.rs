//! In-process document store.
//!
//! Keeps documents in a `BTreeMap` keyed by path. Besides serving tests and
//! `--ephemeral` runs it can simulate an unreachable backend
//! ([`MemoryStore::set_available`]) and a severed watch channel
//! ([`MemoryStore::break_watches`]).

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::path;
use super::watch::{Watch, WatchRegistry};
use super::{DocumentStore, StoreError, StoreResult};

#[derive(Debug)]
struct Inner {
    documents: Mutex<BTreeMap<String, Value>>,
    watches: WatchRegistry,
    available: AtomicBool,
    writes: AtomicU64,
}

/// A document store held entirely in memory.
///
/// Cloning the store shares the same documents and watches.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                documents: Mutex::new(BTreeMap::new()),
                watches: WatchRegistry::new(),
                available: AtomicBool::new(true),
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Make every request succeed or fail with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Deliver a failure to every active watch.
    pub fn break_watches(&self, reason: &str) {
        self.inner.watches.fail_all(reason);
    }

    /// Number of watches currently registered.
    #[must_use]
    pub fn active_watches(&self) -> usize {
        self.inner.watches.len()
    }

    /// Number of writes (`set`, successful `create_if_absent`, effective
    /// `remove`) applied so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }

    fn documents(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.inner
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn written(&self, path: &str) {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.watches.notify(path);
    }
}

fn subtree(documents: &BTreeMap<String, Value>, root: &str) -> Vec<(String, Value)> {
    let (lower, upper) = path::descendant_range(root);
    let mut entries: Vec<(String, Value)> = documents
        .get(root)
        .map(|value| (root.to_string(), value.clone()))
        .into_iter()
        .collect();
    entries.extend(
        documents
            .range::<String, _>((Bound::Included(&lower), Bound::Excluded(&upper)))
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    entries
}

fn has_subtree(documents: &BTreeMap<String, Value>, root: &str) -> bool {
    let (lower, upper) = path::descendant_range(root);
    documents.contains_key(root)
        || documents
            .range::<String, _>((Bound::Included(&lower), Bound::Excluded(&upper)))
            .next()
            .is_some()
}

/// Remove `root` and its descendants. Returns how many entries went away.
fn remove_subtree(documents: &mut BTreeMap<String, Value>, root: &str) -> usize {
    let doomed: Vec<String> = subtree(documents, root).into_iter().map(|(k, _)| k).collect();
    for key in &doomed {
        documents.remove(key);
    }
    doomed.len()
}

fn insert(documents: &mut BTreeMap<String, Value>, target: &str, value: Value) {
    remove_subtree(documents, target);
    for ancestor in path::ancestors(target) {
        documents.remove(ancestor);
    }
    documents.insert(target.to_string(), value);
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn exists(&self, target: &str) -> StoreResult<bool> {
        self.check_available()?;
        path::validate(target)?;
        Ok(has_subtree(&self.documents(), target))
    }

    async fn get(&self, target: &str) -> StoreResult<Option<Value>> {
        self.check_available()?;
        path::validate(target)?;
        let entries = subtree(&self.documents(), target);
        Ok(path::assemble(target, entries))
    }

    async fn set(&self, target: &str, value: Value) -> StoreResult<()> {
        self.check_available()?;
        path::validate(target)?;
        insert(&mut self.documents(), target, value);
        debug!("Set {}", target);
        self.written(target);
        Ok(())
    }

    async fn create_if_absent(&self, target: &str, value: Value) -> StoreResult<bool> {
        self.check_available()?;
        path::validate(target)?;
        {
            let mut documents = self.documents();
            if has_subtree(&documents, target) {
                return Ok(false);
            }
            insert(&mut documents, target, value);
        }
        debug!("Created {}", target);
        self.written(target);
        Ok(true)
    }

    async fn remove(&self, target: &str) -> StoreResult<()> {
        self.check_available()?;
        path::validate(target)?;
        let removed = remove_subtree(&mut self.documents(), target);
        if removed > 0 {
            debug!("Removed {} ({} entries)", target, removed);
            self.written(target);
        }
        Ok(())
    }

    async fn children(&self, target: &str) -> StoreResult<Vec<(String, Value)>> {
        self.check_available()?;
        path::validate(target)?;
        let entries = subtree(&self.documents(), target);
        Ok(path::group_children(target, entries))
    }

    fn watch(&self, target: &str) -> StoreResult<Watch> {
        self.check_available()?;
        path::validate(target)?;
        Ok(self.inner.watches.register(target))
    }
}
