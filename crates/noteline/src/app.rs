//! Wiring of the services over one configured store.

use std::sync::Arc;

use crate::blob::BlobStore;
use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::identity::IdentityGate;
use crate::repository::NoteRepository;
use crate::store::{self, DocumentStore};

/// The identity gate, note repository and blob store sharing one store.
#[derive(Debug, Clone)]
pub struct Services {
    /// Admits users.
    pub identity: IdentityGate,
    /// Reads, writes and watches notes.
    pub notes: NoteRepository,
    /// Copies images into the local blob directory.
    pub blobs: BlobStore,
}

impl Services {
    /// Build the services over an already opened store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        let timeout = config.request_timeout();
        Self {
            identity: IdentityGate::new(Arc::clone(&store), timeout),
            notes: NoteRepository::new(store, timeout),
            blobs: BlobStore::from_config(config),
        }
    }

    /// Open the configured store and build the services over it.
    ///
    /// With `ephemeral` set the memory backend is used regardless of the
    /// configured one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn from_config(config: &Config, ephemeral: bool) -> Result<Self> {
        let store = if ephemeral {
            let mut config = config.clone();
            config.store.backend = StoreBackend::Memory;
            store::open_store(&config)?
        } else {
            store::open_store(config)?
        };
        Ok(Self::new(store, config))
    }
}
