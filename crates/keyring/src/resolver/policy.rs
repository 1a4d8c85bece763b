//! [`DefaultKeyPolicy`]: the stock default-key resolver.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use super::{DefaultKeyResolution, DefaultKeyResolver, ResolverError};
use crate::keys::Key;

/// Default assumed time for a new key to reach every node (48 hours).
pub const DEFAULT_PROPAGATION_WINDOW: TimeDelta = TimeDelta::hours(48);

/// Default tolerated clock difference between nodes sharing a store (5 minutes).
pub const DEFAULT_MAX_CLOCK_SKEW: TimeDelta = TimeDelta::minutes(5);

/// Chooses the most recently activated usable key as default.
///
/// # Selection
///
/// 1. The preferred key is the one with the latest activation among keys
///    activated by `now + max_clock_skew` (ties go to the smaller id).
/// 2. If it is neither revoked nor expired it becomes the default. A new key
///    is advised when it expires within the propagation window and no
///    successor is lined up.
/// 3. Otherwise a fallback is searched for: the newest non-revoked key created
///    at least one propagation window ago, else the oldest non-revoked key.
///    Fallbacks may be expired.
#[derive(Debug, Clone)]
pub struct DefaultKeyPolicy {
    propagation_window: TimeDelta,
    max_clock_skew: TimeDelta,
}

impl DefaultKeyPolicy {
    pub fn new(propagation_window: TimeDelta, max_clock_skew: TimeDelta) -> Self {
        Self {
            propagation_window,
            max_clock_skew,
        }
    }

    fn preferred_default<'a>(&self, now: DateTime<Utc>, keys: &'a [Key]) -> Option<&'a Key> {
        keys.iter()
            .filter(|k| k.activates_at() <= later(now, self.max_clock_skew))
            .max_by(|a, b| {
                a.activates_at()
                    .cmp(&b.activates_at())
                    .then_with(|| b.id().cmp(&a.id()))
            })
    }

    /// Is there another key ready to take over when `current` expires?
    fn has_successor(&self, current: &Key, keys: &[Key]) -> bool {
        keys.iter().any(|k| {
            k.id() != current.id()
                && !k.is_revoked()
                && k.activates_at() <= later(current.expires_at(), self.max_clock_skew)
                && k.expires_at() > current.expires_at()
        })
    }

    fn fallback<'a>(&self, now: DateTime<Utc>, keys: &'a [Key]) -> Option<&'a Key> {
        let propagated_before = now
            .checked_sub_signed(self.propagation_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut propagated: Vec<&Key> = keys
            .iter()
            .filter(|k| k.created_at() <= propagated_before)
            .collect();
        propagated.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        let mut oldest_first: Vec<&Key> = keys.iter().collect();
        oldest_first.sort_by_key(|k| k.created_at());

        propagated
            .into_iter()
            .chain(oldest_first)
            .find(|k| !k.is_revoked())
    }
}

impl Default for DefaultKeyPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PROPAGATION_WINDOW, DEFAULT_MAX_CLOCK_SKEW)
    }
}

impl DefaultKeyResolver for DefaultKeyPolicy {
    fn resolve(
        &self,
        now: DateTime<Utc>,
        keys: &[Key],
    ) -> Result<DefaultKeyResolution, ResolverError> {
        if let Some(preferred) = self.preferred_default(now, keys) {
            if preferred.is_revoked() || preferred.is_expired(now) {
                debug!(
                    key_id = %preferred.id(),
                    revoked = preferred.is_revoked(),
                    "key is no longer under consideration as default"
                );
            } else {
                let expiring_soon = preferred.expires_at() < later(now, self.propagation_window);
                let should_generate_new_key = expiring_soon && !self.has_successor(preferred, keys);
                return Ok(DefaultKeyResolution::UseDefault {
                    key: preferred.clone(),
                    should_generate_new_key,
                });
            }
        }

        Ok(match self.fallback(now, keys) {
            Some(key) => DefaultKeyResolution::UseFallback(key.clone()),
            None => DefaultKeyResolution::RequiresGeneration,
        })
    }
}

/// `at + delta`, saturating at the end of representable time.
fn later(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{AlgorithmDescriptor, KeyId};
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn key(created: DateTime<Utc>, activation: DateTime<Utc>, expiration: DateTime<Utc>) -> Key {
        Key::new(
            KeyId::new(),
            created,
            activation,
            expiration,
            AlgorithmDescriptor::generate(),
        )
        .unwrap()
    }

    fn yearly_pair() -> (Key, Key) {
        let k1 = key(at(2015, 2, 1, 0), at(2015, 3, 1, 0), at(2016, 3, 1, 0));
        let k2 = key(at(2015, 2, 1, 0), at(2016, 3, 1, 0), at(2017, 3, 1, 0));
        (k1, k2)
    }

    fn expect_default(resolution: DefaultKeyResolution) -> (Key, bool) {
        match resolution {
            DefaultKeyResolution::UseDefault {
                key,
                should_generate_new_key,
            } => (key, should_generate_new_key),
            other => panic!("expected a default key, got {other:?}"),
        }
    }

    #[test]
    fn empty_key_set_requires_generation() {
        let resolution = DefaultKeyPolicy::default()
            .resolve(at(2015, 3, 1, 0), &[])
            .unwrap();
        assert!(matches!(resolution, DefaultKeyResolution::RequiresGeneration));
    }

    #[test]
    fn picks_active_key_without_generation() {
        let (k1, k2) = yearly_pair();
        let (chosen, generate) = expect_default(
            DefaultKeyPolicy::default()
                .resolve(at(2015, 3, 1, 0), &[k1.clone(), k2])
                .unwrap(),
        );
        assert_eq!(chosen.id(), k1.id());
        assert!(!generate);
    }

    #[test]
    fn picks_successor_once_activated() {
        let (k1, k2) = yearly_pair();
        let (chosen, _) = expect_default(
            DefaultKeyPolicy::default()
                .resolve(at(2016, 3, 1, 0), &[k1, k2.clone()])
                .unwrap(),
        );
        assert_eq!(chosen.id(), k2.id());
    }

    #[test]
    fn clock_skew_allows_slightly_future_activation() {
        let (k1, k2) = yearly_pair();
        let just_before = at(2016, 3, 1, 0) - TimeDelta::minutes(2);
        let (chosen, _) = expect_default(
            DefaultKeyPolicy::default()
                .resolve(just_before, &[k1, k2.clone()])
                .unwrap(),
        );
        assert_eq!(chosen.id(), k2.id());
    }

    #[test]
    fn expiring_key_with_successor_needs_no_generation() {
        let (k1, k2) = yearly_pair();
        let (chosen, generate) = expect_default(
            DefaultKeyPolicy::default()
                .resolve(at(2016, 2, 29, 20), &[k1.clone(), k2])
                .unwrap(),
        );
        assert_eq!(chosen.id(), k1.id());
        assert!(!generate);
    }

    #[test]
    fn expiring_key_without_successor_requests_generation() {
        let (k1, _) = yearly_pair();
        let (chosen, generate) = expect_default(
            DefaultKeyPolicy::default()
                .resolve(at(2016, 2, 28, 12), &[k1.clone()])
                .unwrap(),
        );
        assert_eq!(chosen.id(), k1.id());
        assert!(generate);
    }

    #[test]
    fn revoked_successor_does_not_count() {
        let (k1, k2) = yearly_pair();
        let (_, generate) = expect_default(
            DefaultKeyPolicy::default()
                .resolve(at(2016, 2, 28, 12), &[k1, k2.into_revoked()])
                .unwrap(),
        );
        assert!(generate);
    }

    #[test]
    fn revoked_default_falls_back_to_propagated_key() {
        let old = key(at(2014, 1, 1, 0), at(2014, 1, 1, 0), at(2015, 1, 1, 0));
        let revoked =
            key(at(2015, 2, 1, 0), at(2015, 2, 1, 0), at(2016, 2, 1, 0)).into_revoked();
        let resolution = DefaultKeyPolicy::default()
            .resolve(at(2015, 3, 1, 0), &[old.clone(), revoked])
            .unwrap();
        match resolution {
            DefaultKeyResolution::UseFallback(key) => assert_eq!(key.id(), old.id()),
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn fallback_prefers_newest_propagated_key() {
        let older = key(at(2014, 1, 1, 0), at(2014, 1, 1, 0), at(2014, 6, 1, 0));
        let newer = key(at(2014, 6, 1, 0), at(2014, 6, 1, 0), at(2015, 1, 1, 0));
        let resolution = DefaultKeyPolicy::default()
            .resolve(at(2015, 3, 1, 0), &[older, newer.clone()])
            .unwrap();
        assert_eq!(resolution.fallback_key().map(Key::id), Some(newer.id()));
    }

    #[test]
    fn fallback_uses_oldest_unpropagated_key_as_last_resort() {
        let now = at(2015, 3, 1, 0);
        let a = key(
            now - TimeDelta::hours(2),
            now - TimeDelta::hours(2),
            now - TimeDelta::hours(1),
        );
        let b = key(
            now - TimeDelta::hours(1),
            now - TimeDelta::hours(1),
            now - TimeDelta::minutes(30),
        );
        let resolution = DefaultKeyPolicy::default()
            .resolve(now, &[b, a.clone()])
            .unwrap();
        assert_eq!(resolution.fallback_key().map(Key::id), Some(a.id()));
    }

    #[test]
    fn only_revoked_keys_requires_generation() {
        let revoked =
            key(at(2015, 2, 1, 0), at(2015, 2, 1, 0), at(2016, 2, 1, 0)).into_revoked();
        let resolution = DefaultKeyPolicy::default()
            .resolve(at(2015, 3, 1, 0), &[revoked])
            .unwrap();
        assert!(matches!(resolution, DefaultKeyResolution::RequiresGeneration));
    }
}
