//! Schema versioning for the `SQLite` document store.
//!
//! The version lives in the `metadata` table. Each entry of [`MIGRATIONS`]
//! moves the schema up by one version and runs in its own transaction.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{Error, Result};

use super::schema::{CREATE_DOCUMENTS_TABLE, CREATE_METADATA_TABLE};

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Ordered migration steps; step `i` upgrades version `i` to `i + 1`.
const MIGRATIONS: &[&str] = &[CREATE_DOCUMENTS_TABLE];

/// The schema version produced by running every migration.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const CURRENT_VERSION: i32 = MIGRATIONS.len() as i32;

/// Bring the database up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns [`Error::DatabaseMigration`] if the stored version is unreadable
/// or newer than this build understands, and a database error if a step
/// fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_METADATA_TABLE)?;

    let found = stored_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {found} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for (version, step) in (found..CURRENT_VERSION).zip(&MIGRATIONS[to_index(found)..]) {
        apply(conn, version + 1, step)?;
    }
    Ok(())
}

fn to_index(version: i32) -> usize {
    usize::try_from(version).unwrap_or(0)
}

/// Read the stored version; a database without one is at version 0.
fn stored_version(conn: &Connection) -> Result<i32> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        None => Ok(0),
        Some(value) => match value.parse::<i32>() {
            Ok(version) if version >= 0 => Ok(version),
            _ => Err(Error::DatabaseMigration {
                message: format!("invalid schema version: {value}"),
            }),
        },
    }
}

fn apply(conn: &Connection, version: i32, step: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(step)?;
    tx.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    tx.commit()?;
    info!("Migrated document store schema to version {}", version);
    Ok(())
}
