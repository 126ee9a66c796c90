//! Document store layer for noteline.
//!
//! This module defines the [`DocumentStore`] contract the identity gate and
//! note repository are written against: a key-path addressed store of JSON
//! values with existence checks, full-value reads and writes, removal, child
//! enumeration and subtree change notification. Two backends implement it:
//! an in-process [`MemoryStore`] and a `SQLite`-backed [`SqliteStore`].

pub mod memory;
pub mod migrations;
pub mod path;
pub mod schema;
pub mod sqlite;
pub mod watch;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, StoreBackend};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use watch::{Watch, WatchEvent, WatchRegistry};

/// Errors raised by a document store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend cannot be reached.
    #[error("backend unreachable: {0}")]
    Unavailable(String),

    /// The request did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The path is not a valid document path.
    #[error("invalid document path '{0}'")]
    InvalidPath(String),

    /// The `SQLite` backend reported an error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking backend task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A key-path addressed JSON document store with change notification.
///
/// Values written with [`set`](DocumentStore::set) replace everything at and
/// beneath the path. Reads of an interior path see the values beneath it
/// assembled into nested objects.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Short backend name for logging.
    fn name(&self) -> &'static str;

    /// Check whether any value exists at or beneath `path`.
    async fn exists(&self, path: &str) -> StoreResult<bool>;

    /// Read the value visible at `path`.
    async fn get(&self, path: &str) -> StoreResult<Option<Value>>;

    /// Replace the value at `path`.
    async fn set(&self, path: &str, value: Value) -> StoreResult<()>;

    /// Write `value` at `path` only if nothing exists there yet.
    ///
    /// The check and the write happen atomically. Returns `true` if the
    /// value was written.
    async fn create_if_absent(&self, path: &str, value: Value) -> StoreResult<bool>;

    /// Remove the value at `path` and everything beneath it.
    ///
    /// Removing an absent path succeeds without notifying watchers.
    async fn remove(&self, path: &str) -> StoreResult<()>;

    /// List the direct children of `path` in key order.
    async fn children(&self, path: &str) -> StoreResult<Vec<(String, Value)>>;

    /// Start watching `path` and everything beneath it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot observe the path.
    fn watch(&self, path: &str) -> StoreResult<Watch>;
}

/// Run a store request, failing with [`StoreError::Timeout`] if it takes
/// longer than `limit`.
///
/// # Errors
///
/// Returns the request's own error, or a timeout.
pub async fn bounded<T, F>(limit: Duration, request: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(limit, request)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

/// Open the store backend selected by the configuration.
///
/// # Errors
///
/// Returns an error if the `SQLite` database cannot be opened.
pub fn open_store(config: &Config) -> crate::Result<Arc<dyn DocumentStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open(config.database_path())?)),
    }
}
