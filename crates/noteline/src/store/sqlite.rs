//! `SQLite`-backed document store.
//!
//! Each stored value is one row keyed by its full path, serialized as JSON
//! text. Requests run on tokio's blocking pool; watches are served from an
//! in-process [`WatchRegistry`] that the blocking task notifies right after
//! each commit, so a write whose caller stopped waiting is still observed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};
use serde_json::Value;
use tracing::{debug, info};

use super::migrations;
use super::path;
use super::watch::{Watch, WatchRegistry};
use super::{DocumentStore, StoreError, StoreResult};
use crate::error::{Error, Result};

/// How long a request waits for a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A document store persisted in a `SQLite` database.
///
/// Cloning the store shares the connection and watches.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Arc<Mutex<Connection>>,
    /// Active subtree watches.
    watches: WatchRegistry,
}

impl SqliteStore {
    /// Open or create a document database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrations::initialize_schema(&conn)?;

        info!("Document store opened at {}", path.display());
        Ok(Self::from_connection(path, conn))
    }

    /// Create an in-memory database, mostly for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self::from_connection(PathBuf::from(":memory:"), conn))
    }

    fn from_connection(path: PathBuf, conn: Connection) -> Self {
        Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
            watches: WatchRegistry::new(),
        }
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of watches currently registered.
    #[must_use]
    pub fn active_watches(&self) -> usize {
        self.watches.len()
    }

    /// Count stored rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count)
    }

    async fn run<T, F>(&self, request: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            request(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

const SUBTREE_FILTER: &str = "path = ?1 OR (path >= ?2 AND path < ?3)";

fn load_subtree(conn: &Connection, root: &str) -> StoreResult<Vec<(String, Value)>> {
    let (lower, upper) = path::descendant_range(root);
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT path, value FROM documents WHERE {SUBTREE_FILTER} ORDER BY path"
    ))?;

    let rows = stmt
        .query_map(params![root, lower, upper], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(path, raw)| Ok((path, serde_json::from_str(&raw)?)))
        .collect()
}

fn subtree_exists(conn: &Connection, root: &str) -> StoreResult<bool> {
    let (lower, upper) = path::descendant_range(root);
    let exists: bool = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM documents WHERE {SUBTREE_FILTER})"),
        params![root, lower, upper],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn delete_subtree(conn: &Connection, root: &str) -> StoreResult<usize> {
    let (lower, upper) = path::descendant_range(root);
    let affected = conn.execute(
        &format!("DELETE FROM documents WHERE {SUBTREE_FILTER}"),
        params![root, lower, upper],
    )?;
    Ok(affected)
}

fn write(conn: &Connection, target: &str, raw: &str) -> StoreResult<()> {
    delete_subtree(conn, target)?;
    for ancestor in path::ancestors(target) {
        conn.execute("DELETE FROM documents WHERE path = ?1", [ancestor])?;
    }
    conn.execute(
        "INSERT INTO documents (path, value, updated_at) VALUES (?1, ?2, ?3)",
        params![target, raw, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn exists(&self, target: &str) -> StoreResult<bool> {
        path::validate(target)?;
        let target = target.to_string();
        self.run(move |conn| subtree_exists(conn, &target)).await
    }

    async fn get(&self, target: &str) -> StoreResult<Option<Value>> {
        path::validate(target)?;
        let root = target.to_string();
        let entries = self.run(move |conn| load_subtree(conn, &root)).await?;
        Ok(path::assemble(target, entries))
    }

    async fn set(&self, target: &str, value: Value) -> StoreResult<()> {
        path::validate(target)?;
        let raw = serde_json::to_string(&value)?;
        let owned = target.to_string();
        let watches = self.watches.clone();
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            write(&tx, &owned, &raw)?;
            tx.commit()?;
            watches.notify(&owned);
            Ok(())
        })
        .await?;

        debug!("Set {}", target);
        Ok(())
    }

    async fn create_if_absent(&self, target: &str, value: Value) -> StoreResult<bool> {
        path::validate(target)?;
        let raw = serde_json::to_string(&value)?;
        let owned = target.to_string();
        let watches = self.watches.clone();
        let created = self
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                if subtree_exists(&tx, &owned)? {
                    return Ok(false);
                }
                write(&tx, &owned, &raw)?;
                tx.commit()?;
                watches.notify(&owned);
                Ok(true)
            })
            .await?;

        if created {
            debug!("Created {}", target);
        }
        Ok(created)
    }

    async fn remove(&self, target: &str) -> StoreResult<()> {
        path::validate(target)?;
        let owned = target.to_string();
        let watches = self.watches.clone();
        let removed = self
            .run(move |conn| {
                let removed = delete_subtree(conn, &owned)?;
                if removed > 0 {
                    watches.notify(&owned);
                }
                Ok(removed)
            })
            .await?;

        if removed > 0 {
            debug!("Removed {} ({} rows)", target, removed);
        }
        Ok(())
    }

    async fn children(&self, target: &str) -> StoreResult<Vec<(String, Value)>> {
        path::validate(target)?;
        let root = target.to_string();
        let entries = self.run(move |conn| load_subtree(conn, &root)).await?;
        Ok(path::group_children(target, entries))
    }

    fn watch(&self, target: &str) -> StoreResult<Watch> {
        path::validate(target)?;
        Ok(self.watches.register(target))
    }
}
