//! [`KeyRingBuilder`]: turns the key store's contents into a cacheable snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use super::{CacheableKeyRingProvider, KeyRingError};
use crate::config::KeyManagementOptions;
use crate::keys::{CacheableKeyRing, InvalidationSignal, Key, KeyRing};
use crate::resolver::{DefaultKeyResolution, DefaultKeyResolver};
use crate::store::KeyStore;

/// Lower bound of the random factor applied to the refresh period.
const MIN_JITTER_FACTOR: f64 = 0.8;

/// One look at the store: the signal fetched first, then the keys it covers.
struct Evaluation {
    signal: InvalidationSignal,
    keys: Vec<Key>,
    resolution: DefaultKeyResolution,
}

/// Builds key-ring snapshots from a [`KeyStore`] and a [`DefaultKeyResolver`].
///
/// A build creates at most one key, however often the resolver asks.
pub struct KeyRingBuilder {
    store: Arc<dyn KeyStore>,
    resolver: Arc<dyn DefaultKeyResolver>,
    options: KeyManagementOptions,
}

impl KeyRingBuilder {
    pub fn new(
        store: Arc<dyn KeyStore>,
        resolver: Arc<dyn DefaultKeyResolver>,
        options: KeyManagementOptions,
    ) -> Self {
        Self {
            store,
            resolver,
            options,
        }
    }

    /// Build a snapshot as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyRingError::NoDefaultKey`] when no key can serve as default
    /// and generation is disabled, or the store's / resolver's error unchanged.
    pub async fn build(&self, now: DateTime<Utc>) -> Result<CacheableKeyRing, KeyRingError> {
        let mut evaluation = self.evaluate(now).await?;
        let mut generated = None;

        if evaluation.resolution.should_generate_new_key() {
            if self.options.auto_generate_keys {
                // A successor takes over exactly when the current default lapses.
                let activates_at = evaluation
                    .resolution
                    .default_key()
                    .map_or(now, Key::expires_at);
                let expires_at = saturating_add(activates_at, self.options.new_key_lifetime);
                let key = self.store.create_key(activates_at, expires_at).await?;
                info!(
                    key_id = %key.id(),
                    activates_at = %activates_at,
                    expires_at = %expires_at,
                    "generated new key"
                );
                generated = Some(key);
                evaluation = self.evaluate(now).await?;
                if evaluation.resolution.should_generate_new_key() {
                    debug!("policy still requests a new key; generating at most one per build");
                }
            } else {
                warn!("policy requests a new key but automatic key generation is disabled");
            }
        }

        let Evaluation {
            signal,
            keys,
            resolution,
        } = evaluation;

        let default_key = match resolution {
            DefaultKeyResolution::UseDefault { key, .. } => key,
            DefaultKeyResolution::UseFallback(key) => {
                warn!(key_id = %key.id(), "no default key available; using fallback key");
                key
            }
            DefaultKeyResolution::RequiresGeneration => {
                generated.ok_or(KeyRingError::NoDefaultKey)?
            }
        };

        let expires_at = self.cache_expiration(now, &default_key, &keys)?;
        debug!(
            default_key_id = %default_key.id(),
            key_count = keys.len(),
            expires_at = %expires_at,
            "key ring built"
        );
        Ok(CacheableKeyRing::new(
            KeyRing::new(default_key, keys),
            expires_at,
            signal,
        ))
    }

    async fn evaluate(&self, now: DateTime<Utc>) -> Result<Evaluation, KeyRingError> {
        let signal = self.store.invalidation_signal();
        let keys = self.store.list_all_keys().await?;
        let resolution = self.resolver.resolve(now, &keys)?;
        Ok(Evaluation {
            signal,
            keys,
            resolution,
        })
    }

    /// When the snapshot built at `now` around `default_key` must be rebuilt.
    fn cache_expiration(
        &self,
        now: DateTime<Utc>,
        default_key: &Key,
        keys: &[Key],
    ) -> Result<DateTime<Utc>, KeyRingError> {
        let refresh_period = self.options.key_ring_refresh_period;
        let next_refresh = saturating_add(now, jittered(refresh_period));

        let horizon = refresh_period
            .checked_add(&self.options.key_propagation_window)
            .unwrap_or(TimeDelta::MAX);
        let key_expires_at = default_key.expires_at();

        // An already-lapsed default (only reachable via a fallback) must not
        // make the snapshot expire on arrival.
        if key_expires_at <= now || key_expires_at > saturating_add(now, horizon) {
            return Ok(next_refresh);
        }

        let lookahead = self.resolver.resolve(key_expires_at, keys)?;
        let successor = lookahead
            .default_key()
            .filter(|k| k.id() != default_key.id());

        match successor {
            Some(successor) => {
                debug!(
                    default_key_id = %default_key.id(),
                    successor_key_id = %successor.id(),
                    "successor key ready for default key expiration"
                );
                Ok(next_refresh.min(key_expires_at))
            }
            None => {
                // Rebuild no later than the key's own expiration so the next
                // build can generate a successor. Never extend past the
                // jittered refresh.
                info!(
                    default_key_id = %default_key.id(),
                    expires_at = %key_expires_at,
                    "no successor for expiring default key; shortening key ring lifetime"
                );
                Ok(key_expires_at.min(next_refresh))
            }
        }
    }
}

#[async_trait]
impl CacheableKeyRingProvider for KeyRingBuilder {
    async fn build(&self, now: DateTime<Utc>) -> Result<CacheableKeyRing, KeyRingError> {
        KeyRingBuilder::build(self, now).await
    }
}

/// `period` scaled by a uniform factor in `[0.8, 1.0]`.
fn jittered(period: TimeDelta) -> TimeDelta {
    let factor = rand::thread_rng().gen_range(MIN_JITTER_FACTOR..=1.0);
    TimeDelta::milliseconds((period.num_milliseconds() as f64 * factor) as i64)
}

fn saturating_add(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
