//! User identity gate.
//!
//! A user is identified by a four-digit id that doubles as the partition key
//! for their notes. Admitting an id logs the user in, registering the id on
//! first sight; there is no separate sign-up step and no credential beyond
//! the id itself.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::store::{self, path, DocumentStore};

/// Root path holding one presence marker per registered user.
pub const USERS_ROOT: &str = "users";

fn user_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{4}$").expect("Invalid regex pattern"))
}

/// A validated four-digit user id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validate a candidate id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] unless `candidate` is exactly four
    /// ASCII decimal digits.
    pub fn parse(candidate: &str) -> Result<Self> {
        if user_id_pattern().is_match(candidate) {
            Ok(Self(candidate.to_string()))
        } else {
            Err(Error::InvalidFormat {
                candidate: candidate.to_string(),
            })
        }
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of this user's registration marker.
    #[must_use]
    pub fn marker_path(&self) -> String {
        path::join(USERS_ROOT, &self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Outcome of a successful admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The id was already registered.
    Returning(UserId),
    /// The id was registered by this call.
    Registered(UserId),
}

impl Admission {
    /// The admitted user.
    #[must_use]
    pub fn user(&self) -> &UserId {
        match self {
            Self::Returning(user) | Self::Registered(user) => user,
        }
    }

    /// Consume the admission, keeping the user id.
    #[must_use]
    pub fn into_user(self) -> UserId {
        match self {
            Self::Returning(user) | Self::Registered(user) => user,
        }
    }

    /// Check whether this admission registered a new user.
    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Registered(_))
    }
}

/// Admits users against the document store.
#[derive(Debug, Clone)]
pub struct IdentityGate {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl IdentityGate {
    /// Create a gate over `store`, bounding each request by `timeout`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Admit a candidate id, registering it if it is new.
    ///
    /// The existence check and the registration write are one atomic
    /// `create_if_absent`, so concurrent admits of the same id register it
    /// once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] for a malformed id (without touching
    /// the store) and [`Error::StoreUnavailable`] if the store request fails
    /// or times out.
    pub async fn admit(&self, candidate: &str) -> Result<Admission> {
        let user = UserId::parse(candidate)?;
        let marker = user.marker_path();

        let created = store::bounded(
            self.timeout,
            self.store.create_if_absent(&marker, Value::Bool(true)),
        )
        .await?;

        if created {
            info!("Registered new user {}", user);
            Ok(Admission::Registered(user))
        } else {
            debug!("User {} logged in", user);
            Ok(Admission::Returning(user))
        }
    }

    /// Check whether `user` has been registered, without registering it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the store request fails.
    pub async fn is_registered(&self, user: &UserId) -> Result<bool> {
        let exists = store::bounded(self.timeout, self.store.exists(&user.marker_path())).await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn create_gate() -> (MemoryStore, IdentityGate) {
        let store = MemoryStore::new();
        let gate = IdentityGate::new(Arc::new(store.clone()), Duration::from_secs(1));
        (store, gate)
    }

    #[test]
    fn test_parse_valid_ids() {
        for candidate in ["0000", "1234", "9999", "0420"] {
            let id = UserId::parse(candidate).unwrap();
            assert_eq!(id.as_str(), candidate);
            assert_eq!(id.to_string(), candidate);
        }
    }

    #[test]
    fn test_parse_invalid_ids() {
        for candidate in [
            "", "123", "12345", "12a4", "abcd", " 1234", "1234\n", "12.4", "-123", "١٢٣٤",
        ] {
            let err = UserId::parse(candidate).unwrap_err();
            assert!(err.is_invalid_format(), "accepted {candidate:?}");
        }
    }

    #[test]
    fn test_from_str_and_as_ref() {
        let id: UserId = "4321".parse().unwrap();
        assert_eq!(id.as_ref(), "4321");
        assert_eq!(id.marker_path(), "users/4321");
    }

    #[test]
    fn test_serde_validates() {
        let id: UserId = serde_json::from_str("\"1234\"").unwrap();
        assert_eq!(id.as_str(), "1234");
        assert!(serde_json::from_str::<UserId>("\"12\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"1234\"");
    }

    #[tokio::test]
    async fn test_admit_registers_once() {
        let (store, gate) = create_gate();

        let first = gate.admit("1234").await.unwrap();
        assert!(first.is_new());
        assert_eq!(first.user().as_str(), "1234");

        let second = gate.admit("1234").await.unwrap();
        assert!(!second.is_new());
        assert_eq!(second.into_user().as_str(), "1234");

        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_admit_invalid_does_not_touch_store() {
        let (store, gate) = create_gate();
        store.set_available(false);

        let err = gate.admit("12x4").await.unwrap_err();
        assert!(err.is_invalid_format());
    }

    #[tokio::test]
    async fn test_admit_store_unavailable() {
        let (store, gate) = create_gate();
        store.set_available(false);

        let err = gate.admit("1234").await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_is_registered() {
        let (_store, gate) = create_gate();
        let user = UserId::parse("5555").unwrap();

        assert!(!gate.is_registered(&user).await.unwrap());
        gate.admit("5555").await.unwrap();
        assert!(gate.is_registered(&user).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_admits_register_once() {
        let (store, gate) = create_gate();

        let (a, b) = tokio::join!(gate.admit("7777"), gate.admit("7777"));
        let admissions = [a.unwrap(), b.unwrap()];
        assert_eq!(admissions.iter().filter(|a| a.is_new()).count(), 1);
        assert_eq!(store.write_count(), 1);
    }
}
