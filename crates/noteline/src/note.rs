//! Note types and their stored record shape.
//!
//! A note is stored at `notes/{user}/{note}` as a JSON object
//! `{"title", "content", "imagePath"}`. Decoding is lenient about absent
//! `content` and `imagePath` (they default to empty) but rejects records
//! without a string `title` or with fields of the wrong type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::store::path;

/// Identifier of a note within a user's partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteId(String);

impl NoteId {
    /// Generate a fresh, time-sortable id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Accept an id supplied by a caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if `key` cannot be a path segment.
    pub fn parse(key: &str) -> Result<Self> {
        if path::is_valid_key(key) {
            Ok(Self(key.to_string()))
        } else {
            Err(Error::InvalidKey {
                key: key.to_string(),
            })
        }
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NoteId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<NoteId> for String {
    fn from(id: NoteId) -> Self {
        id.0
    }
}

/// The writable content of a note.
///
/// Every write replaces all three fields at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDraft {
    /// Note title.
    pub title: String,
    /// Note body.
    pub content: String,
    /// Absolute path of an attached local image; empty when there is none.
    pub image_path: String,
}

impl NoteDraft {
    /// Create a draft without an image.
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            image_path: String::new(),
        }
    }

    /// Attach an image path.
    #[must_use]
    pub fn with_image(mut self, image_path: impl Into<String>) -> Self {
        self.image_path = image_path.into();
        self
    }

    /// Check whether an image is attached.
    #[must_use]
    pub fn has_image(&self) -> bool {
        !self.image_path.is_empty()
    }

    pub(crate) fn to_record(&self) -> Value {
        serde_json::json!({
            "title": self.title,
            "content": self.content,
            "imagePath": self.image_path,
        })
    }
}

/// A stored note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Key of the note within its user's partition.
    pub id: NoteId,
    /// Note title.
    pub title: String,
    /// Note body.
    pub content: String,
    /// Absolute path of an attached local image; empty when there is none.
    pub image_path: String,
}

/// The full set of a user's notes, ordered by key.
pub type NoteCollection = Vec<Note>;

#[derive(Deserialize)]
struct StoredNote {
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default, rename = "imagePath")]
    image_path: String,
}

impl Note {
    /// Decode a stored value, returning `None` if it is not a note record.
    #[must_use]
    pub fn decode(id: NoteId, value: Value) -> Option<Self> {
        let stored: StoredNote = serde_json::from_value(value).ok()?;
        Some(Self {
            id,
            title: stored.title,
            content: stored.content,
            image_path: stored.image_path,
        })
    }

    /// The note's content as a draft, ready for editing.
    #[must_use]
    pub fn to_draft(&self) -> NoteDraft {
        NoteDraft {
            title: self.title.clone(),
            content: self.content.clone(),
            image_path: self.image_path.clone(),
        }
    }

    /// Check whether an image is attached.
    #[must_use]
    pub fn has_image(&self) -> bool {
        !self.image_path.is_empty()
    }
}
