//! Key-ring construction, caching, and background refresh.
//!
//! # Lifecycle
//!
//! 1. [`KeyRingBuilder`] lists keys from the [`KeyStore`](crate::store::KeyStore),
//!    asks the resolver for a default key, generates a successor when the
//!    policy asks for one, and returns a [`CacheableKeyRing`] with a jittered
//!    expiration.
//! 2. [`KeyRingCache`] holds the latest snapshot and hands the same
//!    `Arc<KeyRing>` to every caller until it expires or the store fires its
//!    invalidation signal. At most one rebuild runs at a time; while one is in
//!    flight other callers keep receiving the previous ring.
//! 3. [`refresh_task`] polls the cache on an interval and as soon as the
//!    store signals a change, so request paths rarely pay for a rebuild.
//!
//! # Failure handling
//!
//! A failed rebuild is reported to the caller that attempted it. The previous
//! snapshot stays in place for everyone else.

pub mod builder;
pub mod cache;

pub use builder::KeyRingBuilder;
pub use cache::KeyRingCache;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::keys::CacheableKeyRing;
use crate::resolver::ResolverError;
use crate::store::KeyStoreError;

/// Errors produced while building or serving a key ring.
#[derive(Debug, Clone, Error)]
pub enum KeyRingError {
    /// Nothing can serve as default key and the builder may not create one.
    #[error("no usable default key was found and automatic key generation is disabled")]
    NoDefaultKey,

    /// The key store failed; its error is passed through unchanged.
    #[error(transparent)]
    Store(#[from] KeyStoreError),

    /// The default-key resolver failed; its error is passed through unchanged.
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

/// Produces fresh key-ring snapshots for [`KeyRingCache`].
#[async_trait]
pub trait CacheableKeyRingProvider: Send + Sync {
    /// Build a snapshot as of `now`.
    async fn build(&self, now: DateTime<Utc>) -> Result<CacheableKeyRing, KeyRingError>;
}

/// Spawn a background task that keeps `cache` fresh.
///
/// The task wakes every `interval`, early when the cached snapshot's
/// invalidation signal fires, and whenever another caller installs a new
/// snapshot so that it watches that snapshot's signal from then on. On each
/// wake-up it asks the cache for the current ring; the cache decides whether
/// a rebuild is due. The first interval wake-up happens after one full
/// interval since startup is expected to have primed the cache. A failed
/// refresh is logged and the previous ring is retained.
pub fn refresh_task(
    cache: KeyRingCache,
    interval: std::time::Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        // First tick fires immediately; skip it so we don't rebuild right after priming.
        ticker.tick().await;
        let mut installs = cache.subscribe_installs();
        // Snapshot whose fired signal we could not act on: the rebuild failed
        // or another caller holds the rebuild lock.
        let mut stalled_on: Option<Arc<CacheableKeyRing>> = None;
        loop {
            installs.borrow_and_update();
            let pending_change = cache
                .cached()
                .filter(|entry| !stalled_on.as_ref().is_some_and(|s| Arc::ptr_eq(s, entry)))
                .map(|entry| entry.signal().clone());
            let changed = async move {
                match pending_change {
                    Some(signal) => signal.fired().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("key ring refresh task stopped");
                    return;
                }
                _ = ticker.tick() => {}
                _ = changed => debug!("key store changed; refreshing key ring"),
                Ok(()) = installs.changed() => debug!("key ring replaced by another caller"),
            }

            match cache.get_current_key_ring(Utc::now(), false).await {
                Ok(ring) => {
                    stalled_on = cache.cached().filter(|entry| entry.signal().is_fired());
                    debug!(default_key_id = %ring.default_key_id(), "key ring checked");
                }
                Err(e) => {
                    stalled_on = cache.cached();
                    warn!(error = %e, "key ring refresh failed; retaining previous key ring");
                }
            }
        }
    })
}
