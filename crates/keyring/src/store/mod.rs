//! Key storage interface consumed by the key-ring builder.
//!
//! A [`KeyStore`] is the durable source of truth for keys. The builder only
//! lists keys, asks for new ones, and watches an [`InvalidationSignal`] that
//! the store fires whenever its key set changes.
//!
//! [`InMemoryKeyStore`] is a non-durable implementation for single-node use
//! and tests.

pub mod memory;

pub use memory::InMemoryKeyStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::keys::{InvalidationSignal, Key, KeyError, KeyId};

/// Errors produced by a key store.
#[derive(Debug, Clone, Error)]
pub enum KeyStoreError {
    /// The backing store could not be reached or failed the operation.
    #[error("key store unavailable: {0}")]
    Unavailable(String),

    /// No key with the given id exists.
    #[error("key not found: {0}")]
    NotFound(KeyId),

    /// The store refused to create a key with the requested window.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),
}

/// Durable source of keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Every key the store knows about, revoked and expired ones included.
    async fn list_all_keys(&self) -> Result<Vec<Key>, KeyStoreError>;

    /// Create and persist a key valid from `activates_at` until `expires_at`.
    async fn create_key(
        &self,
        activates_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Key, KeyStoreError>;

    /// A signal that fires on the next change to the key set.
    ///
    /// Callers fetch the signal before listing keys so that a change racing
    /// with the listing is never missed.
    fn invalidation_signal(&self) -> InvalidationSignal;
}
