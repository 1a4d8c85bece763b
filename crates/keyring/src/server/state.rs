//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::KeyManagementOptions;
use crate::provider::{KeyRingBuilder, KeyRingCache};
use crate::resolver::DefaultKeyPolicy;
use crate::store::InMemoryKeyStore;

/// Application state shared across all request handlers.
///
/// Cloning is cheap: the cache is `Arc`-backed and clones share one slot.
#[derive(Clone)]
pub struct AppState {
    /// The current key-ring snapshot and its rebuild machinery.
    pub key_ring: KeyRingCache,
}

impl AppState {
    pub fn new(key_ring: KeyRingCache) -> Self {
        Self { key_ring }
    }
}

impl Default for AppState {
    /// An unprimed cache over an empty in-memory store, suitable for tests.
    fn default() -> Self {
        let builder = KeyRingBuilder::new(
            Arc::new(InMemoryKeyStore::new()),
            Arc::new(DefaultKeyPolicy::default()),
            KeyManagementOptions::default(),
        );
        Self::new(KeyRingCache::new(Arc::new(builder)))
    }
}
