//! [`KeyRing`] snapshots and their cache envelope, [`CacheableKeyRing`].

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};

use super::{InvalidationSignal, Key, KeyId};

/// Immutable set of keys with one designated default key.
///
/// The default key is always a member of the set.
#[derive(Debug)]
pub struct KeyRing {
    default_key_id: KeyId,
    keys: HashMap<KeyId, Key>,
}

impl KeyRing {
    /// Build a ring from its default key and the full key set.
    ///
    /// The default key is inserted if `all_keys` does not already contain it.
    /// When `all_keys` holds several entries with one id, the last one wins.
    pub fn new(default_key: Key, all_keys: impl IntoIterator<Item = Key>) -> Self {
        let default_key_id = default_key.id();
        let mut keys: HashMap<KeyId, Key> = all_keys.into_iter().map(|k| (k.id(), k)).collect();
        keys.entry(default_key_id).or_insert(default_key);
        Self {
            default_key_id,
            keys,
        }
    }

    pub fn default_key_id(&self) -> KeyId {
        self.default_key_id
    }

    pub fn default_key(&self) -> &Key {
        // Construction guarantees membership.
        &self.keys[&self.default_key_id]
    }

    /// Look up a key by id, e.g. to unprotect a payload written under an older key.
    pub fn get(&self, id: &KeyId) -> Option<&Key> {
        self.keys.get(id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys ordered by activation, ties broken by id.
    pub fn keys_by_activation(&self) -> Vec<&Key> {
        let mut keys: Vec<&Key> = self.keys.values().collect();
        keys.sort_by_key(|k| (k.activates_at(), k.id()));
        keys
    }
}

/// A [`KeyRing`] together with the conditions under which it goes stale.
#[derive(Debug, Clone)]
pub struct CacheableKeyRing {
    key_ring: Arc<KeyRing>,
    expires_at: DateTime<Utc>,
    signal: InvalidationSignal,
}

impl CacheableKeyRing {
    pub fn new(key_ring: KeyRing, expires_at: DateTime<Utc>, signal: InvalidationSignal) -> Self {
        Self {
            key_ring: Arc::new(key_ring),
            expires_at,
            signal,
        }
    }

    /// Shared handle to the ring; every caller served from this entry gets the same instance.
    pub fn key_ring(&self) -> Arc<KeyRing> {
        Arc::clone(&self.key_ring)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn signal(&self) -> &InvalidationSignal {
        &self.signal
    }

    /// Valid at `now` iff `now` precedes the expiration and the signal has not fired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at && !self.signal.is_fired()
    }
}
