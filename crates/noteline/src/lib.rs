//! `noteline` - Per-user notes over a document store
//!
//! This library admits users by a four-digit id, keeps each user's notes in
//! their own partition of a document store, streams live snapshots of that
//! partition, and copies attached images into a local blob directory.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod app;
pub mod blob;
pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod note;
pub mod repository;
pub mod store;
pub mod subscription;

pub use app::Services;
pub use blob::BlobStore;
pub use config::Config;
pub use error::{Error, Result};
pub use identity::{Admission, IdentityGate, UserId};
pub use logging::init_logging;
pub use note::{Note, NoteCollection, NoteDraft, NoteId};
pub use repository::NoteRepository;
pub use store::{DocumentStore, MemoryStore, SqliteStore};
pub use subscription::Subscription;
