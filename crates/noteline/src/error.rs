//! Error types for noteline.
//!
//! This module defines the crate-wide error type. Expected outcomes such as a
//! malformed user id or a missing note are ordinary variants here; transport
//! failures from the document store arrive wrapped in [`Error::StoreUnavailable`].

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// The main error type for noteline operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Identity Errors ===
    /// The candidate user id is not exactly four decimal digits.
    #[error("invalid user id '{candidate}': expected exactly 4 digits")]
    InvalidFormat {
        /// The rejected candidate.
        candidate: String,
    },

    // === Note Errors ===
    /// A caller-supplied key cannot be used as a document path segment.
    #[error("invalid note key '{key}'")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },

    /// The requested note is absent or its stored value is not a note record.
    #[error("note not found: {note_id}")]
    NotFound {
        /// Id of the note that was requested.
        note_id: String,
    },

    /// A live subscription was terminated by the store.
    #[error("observation failed: {message}")]
    ObservationFailed {
        /// Description of what went wrong.
        message: String,
    },

    // === Store Errors ===
    /// A request to the document store failed or timed out.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A query issued while preparing the database failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// Copying an image into the blob directory failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file being read or written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// A specialized Result type for noteline operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an I/O error for the given path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an observation failure.
    #[must_use]
    pub fn observation_failed(message: impl Into<String>) -> Self {
        Self::ObservationFailed {
            message: message.into(),
        }
    }

    /// Check if this error means the requested note does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a local file failure.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::DirectoryCreate { .. })
    }

    /// Check if this error is a rejected user id.
    #[must_use]
    pub fn is_invalid_format(&self) -> bool {
        matches!(self, Self::InvalidFormat { .. })
    }

    /// Check if this error came from the store transport.
    ///
    /// Transport failures are terminal for the single operation that hit them;
    /// the caller decides whether to try again.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::ObservationFailed { .. }
        )
    }
}
