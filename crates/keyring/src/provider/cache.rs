//! [`KeyRingCache`]: the current key-ring snapshot, refreshed on demand.
//!
//! Reads of a valid snapshot are lock-free. Rebuilds are serialised by one
//! async mutex:
//!
//! - With nothing cached, callers queue on the mutex; the first one builds and
//!   the rest receive its result.
//! - With a stale snapshot, one caller rebuilds while everyone else keeps
//!   receiving the stale ring instead of waiting.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::{CacheableKeyRingProvider, KeyRingError};
use crate::keys::{CacheableKeyRing, KeyRing};

/// Shared cache of the current [`CacheableKeyRing`].
///
/// Cheap to clone; clones share the same slot.
#[derive(Clone)]
pub struct KeyRingCache {
    slot: Arc<ArcSwapOption<CacheableKeyRing>>,
    rebuild: Arc<Mutex<()>>,
    /// Bumped on every install.
    installs: Arc<watch::Sender<u64>>,
    provider: Arc<dyn CacheableKeyRingProvider>,
}

impl KeyRingCache {
    /// Create an empty cache over `provider`. Nothing is built until first use.
    pub fn new(provider: Arc<dyn CacheableKeyRingProvider>) -> Self {
        Self {
            slot: Arc::new(ArcSwapOption::empty()),
            rebuild: Arc::new(Mutex::new(())),
            installs: Arc::new(watch::Sender::new(0)),
            provider,
        }
    }

    /// A receiver that changes whenever a new snapshot is installed, by any caller.
    pub fn subscribe_installs(&self) -> watch::Receiver<u64> {
        self.installs.subscribe()
    }

    /// Whether a snapshot has ever been built.
    pub fn is_ready(&self) -> bool {
        self.slot.load().is_some()
    }

    /// The cached entry, valid or not, without triggering a rebuild.
    pub fn cached(&self) -> Option<Arc<CacheableKeyRing>> {
        self.slot.load_full()
    }

    /// The key ring in effect at `now`.
    ///
    /// Returns the cached ring while it is valid unless `force_refresh` is set.
    /// Otherwise a rebuild is attempted; if another caller is already
    /// rebuilding, the stale ring is returned immediately.
    ///
    /// # Errors
    ///
    /// Returns the provider's error when this call performed a rebuild and it
    /// failed. The cached snapshot is left untouched in that case.
    pub async fn get_current_key_ring(
        &self,
        now: DateTime<Utc>,
        force_refresh: bool,
    ) -> Result<Arc<KeyRing>, KeyRingError> {
        match self.slot.load_full() {
            None => self.build_first(now).await,
            Some(entry) if !force_refresh && entry.is_valid(now) => Ok(entry.key_ring()),
            Some(stale) => self.refresh_or_serve_stale(now, force_refresh, stale).await,
        }
    }

    async fn build_first(&self, now: DateTime<Utc>) -> Result<Arc<KeyRing>, KeyRingError> {
        let _guard = self.rebuild.lock().await;
        // Whoever held the lock before us may have filled the slot.
        if let Some(entry) = self.slot.load_full() {
            return Ok(entry.key_ring());
        }

        match self.provider.build(now).await {
            Ok(entry) => {
                info!(
                    default_key_id = %entry.key_ring().default_key_id(),
                    expires_at = %entry.expires_at(),
                    "key ring loaded"
                );
                Ok(self.install(entry))
            }
            Err(e) => {
                warn!(error = %e, "initial key ring build failed");
                Err(e)
            }
        }
    }

    async fn refresh_or_serve_stale(
        &self,
        now: DateTime<Utc>,
        force_refresh: bool,
        stale: Arc<CacheableKeyRing>,
    ) -> Result<Arc<KeyRing>, KeyRingError> {
        let Ok(_guard) = self.rebuild.try_lock() else {
            debug!("key ring rebuild in progress; serving previous key ring");
            return Ok(stale.key_ring());
        };

        if !force_refresh {
            if let Some(entry) = self.slot.load_full() {
                if entry.is_valid(now) {
                    return Ok(entry.key_ring());
                }
            }
        }

        match self.provider.build(now).await {
            Ok(entry) => {
                let previous = stale.key_ring().default_key_id();
                let current = entry.key_ring().default_key_id();
                if previous == current {
                    debug!(
                        default_key_id = %current,
                        expires_at = %entry.expires_at(),
                        "key ring refreshed"
                    );
                } else {
                    info!(
                        previous_default_key_id = %previous,
                        default_key_id = %current,
                        "default key changed"
                    );
                }
                Ok(self.install(entry))
            }
            Err(e) => {
                warn!(error = %e, "key ring refresh failed; previous key ring retained");
                Err(e)
            }
        }
    }

    fn install(&self, entry: CacheableKeyRing) -> Arc<KeyRing> {
        let ring = entry.key_ring();
        self.slot.store(Some(Arc::new(entry)));
        self.installs.send_modify(|generation| *generation += 1);
        ring
    }
}
