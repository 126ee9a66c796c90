//! Note repository.
//!
//! Reads and writes note records under `notes/{user}` and hands out live
//! [`Subscription`]s over a user's whole collection.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::identity::UserId;
use crate::note::{Note, NoteCollection, NoteDraft, NoteId};
use crate::store::{self, path, DocumentStore};
use crate::subscription::Subscription;

/// Root path holding every user's notes.
pub const NOTES_ROOT: &str = "notes";

/// Path of a user's note partition.
#[must_use]
pub fn partition_path(user: &UserId) -> String {
    path::join(NOTES_ROOT, user.as_str())
}

fn note_path(user: &UserId, note_id: &NoteId) -> String {
    path::join(&partition_path(user), note_id.as_str())
}

/// Read every note in `partition`, dropping records that do not decode.
pub(crate) async fn read_collection(
    store: &dyn DocumentStore,
    timeout: Duration,
    partition: &str,
) -> Result<NoteCollection> {
    let children = store::bounded(timeout, store.children(partition)).await?;
    let total = children.len();

    let notes: NoteCollection = children
        .into_iter()
        .filter_map(|(key, value)| {
            let Ok(id) = NoteId::parse(&key) else {
                debug!("Skipping child with unusable key {:?}", key);
                return None;
            };
            let decoded = Note::decode(id, value);
            if decoded.is_none() {
                debug!("Skipping malformed note record {}/{}", partition, key);
            }
            decoded
        })
        .collect();

    if notes.len() < total {
        debug!(
            "Read {} of {} records under {}",
            notes.len(),
            total,
            partition
        );
    }
    Ok(notes)
}

/// Create, read, update and delete notes, and watch a user's collection.
#[derive(Debug, Clone)]
pub struct NoteRepository {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl NoteRepository {
    /// Create a repository over `store`, bounding each request by `timeout`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Store a new note and return its generated id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the write fails or times out.
    pub async fn create(&self, user: &UserId, draft: &NoteDraft) -> Result<NoteId> {
        let note_id = NoteId::generate();
        let target = note_path(user, &note_id);
        store::bounded(self.timeout, self.store.set(&target, draft.to_record())).await?;
        debug!("Created note {} for user {}", note_id, user);
        Ok(note_id)
    }

    /// Replace the note at `note_id` with `draft`.
    ///
    /// There is no existence check: updating an id that does not exist yet
    /// creates it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the write fails or times out.
    pub async fn update(&self, user: &UserId, note_id: &NoteId, draft: &NoteDraft) -> Result<()> {
        let target = note_path(user, note_id);
        store::bounded(self.timeout, self.store.set(&target, draft.to_record())).await?;
        debug!("Updated note {} for user {}", note_id, user);
        Ok(())
    }

    /// Delete a note. Deleting a missing note is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the removal fails or times out.
    pub async fn delete(&self, user: &UserId, note_id: &NoteId) -> Result<()> {
        let target = note_path(user, note_id);
        store::bounded(self.timeout, self.store.remove(&target)).await?;
        debug!("Deleted note {} for user {}", note_id, user);
        Ok(())
    }

    /// Fetch one note.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no record at `note_id` or the
    /// record is malformed, and [`Error::StoreUnavailable`] if the read fails.
    pub async fn get(&self, user: &UserId, note_id: &NoteId) -> Result<Note> {
        let target = note_path(user, note_id);
        let value = store::bounded(self.timeout, self.store.get(&target)).await?;

        value
            .and_then(|value| Note::decode(note_id.clone(), value))
            .ok_or_else(|| Error::NotFound {
                note_id: note_id.to_string(),
            })
    }

    /// Read the user's current collection once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the read fails.
    pub async fn list(&self, user: &UserId) -> Result<NoteCollection> {
        read_collection(self.store.as_ref(), self.timeout, &partition_path(user)).await
    }

    /// Watch the user's collection.
    ///
    /// The returned subscription yields the current snapshot first and a
    /// fresh snapshot after every change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ObservationFailed`] if the store refuses the watch.
    pub fn subscribe(&self, user: &UserId) -> Result<Subscription> {
        let partition = partition_path(user);
        let watch = self
            .store
            .watch(&partition)
            .map_err(|e| Error::observation_failed(e.to_string()))?;
        debug!("Subscribed to notes of user {}", user);
        Ok(Subscription::new(
            user.clone(),
            Arc::clone(&self.store),
            self.timeout,
            watch,
        ))
    }
}
