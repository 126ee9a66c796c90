//! `SQLite` schema definitions for the document store.
//!
//! Statements are applied by the migrations in [`super::migrations`].

/// SQL statement to create the documents table.
///
/// One row per stored value. `path` is the full document path; descendant
/// lookups are range scans over the primary key.
pub const CREATE_DOCUMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    path TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
) WITHOUT ROWID
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";
