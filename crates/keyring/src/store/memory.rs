//! [`InMemoryKeyStore`]: process-local, non-durable [`KeyStore`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::info;

use super::{KeyStore, KeyStoreError};
use crate::keys::{AlgorithmDescriptor, InvalidationSignal, Key, KeyId};

#[derive(Debug, Default)]
struct StoreState {
    keys: Vec<Key>,
    signal: InvalidationSignal,
}

impl StoreState {
    /// Fire the outstanding signal and arm a fresh one for the next change.
    fn publish_change(&mut self) {
        let previous = std::mem::take(&mut self.signal);
        previous.fire();
    }
}

/// Thread-safe key store holding keys in process memory.
///
/// Generated keys carry fresh AES-256-GCM-SIV material. Every mutation fires
/// the current [`InvalidationSignal`], so cached key rings built from the old
/// key set go stale immediately.
#[derive(Clone, Debug, Default)]
pub struct InMemoryKeyStore {
    inner: Arc<Mutex<StoreState>>,
}

impl InMemoryKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing key to the store.
    pub fn insert_key(&self, key: Key) {
        let mut state = self.inner.lock();
        state.keys.push(key);
        state.publish_change();
    }

    /// Mark a key as revoked.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::NotFound`] if no key has the given id.
    pub fn revoke_key(&self, id: KeyId) -> Result<(), KeyStoreError> {
        let mut state = self.inner.lock();
        let slot = state
            .keys
            .iter_mut()
            .find(|k| k.id() == id)
            .ok_or(KeyStoreError::NotFound(id))?;
        *slot = slot.clone().into_revoked();
        state.publish_change();
        info!(key_id = %id, "key revoked");
        Ok(())
    }

    /// Number of keys held, revoked ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().keys.is_empty()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn list_all_keys(&self) -> Result<Vec<Key>, KeyStoreError> {
        Ok(self.inner.lock().keys.clone())
    }

    async fn create_key(
        &self,
        activates_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Key, KeyStoreError> {
        let key = Key::new(
            KeyId::new(),
            Utc::now(),
            activates_at,
            expires_at,
            AlgorithmDescriptor::generate(),
        )?;
        self.insert_key(key.clone());
        info!(
            key_id = %key.id(),
            activates_at = %activates_at,
            expires_at = %expires_at,
            "key created"
        );
        Ok(key)
    }

    fn invalidation_signal(&self) -> InvalidationSignal {
        self.inner.lock().signal.clone()
    }
}
