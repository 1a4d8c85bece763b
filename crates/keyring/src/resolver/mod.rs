//! Default-key selection policy.
//!
//! The key-ring builder asks a [`DefaultKeyResolver`] which key should be the
//! default at a given instant. The resolver sees every key the store returned,
//! revoked ones included; any exclusion is the resolver's decision.
//!
//! [`DefaultKeyPolicy`] is the stock implementation.

pub mod policy;

pub use policy::DefaultKeyPolicy;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::keys::Key;

/// A resolver failed to evaluate the key set.
#[derive(Debug, Clone, Error)]
#[error("default key resolution failed: {0}")]
pub struct ResolverError(pub String);

/// Outcome of evaluating the key set at one instant.
#[derive(Debug, Clone)]
pub enum DefaultKeyResolution {
    /// `key` is the default. `should_generate_new_key` reports that no
    /// successor exists for when it lapses.
    UseDefault {
        key: Key,
        should_generate_new_key: bool,
    },
    /// No key qualifies as default but `0` can still protect payloads.
    UseFallback(Key),
    /// Nothing usable exists.
    RequiresGeneration,
}

impl DefaultKeyResolution {
    /// Whether the resolver advises generating a new key.
    pub fn should_generate_new_key(&self) -> bool {
        match self {
            DefaultKeyResolution::UseDefault {
                should_generate_new_key,
                ..
            } => *should_generate_new_key,
            DefaultKeyResolution::UseFallback(_) | DefaultKeyResolution::RequiresGeneration => true,
        }
    }

    /// The chosen default key, if any. A fallback is not a default.
    pub fn default_key(&self) -> Option<&Key> {
        match self {
            DefaultKeyResolution::UseDefault { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn fallback_key(&self) -> Option<&Key> {
        match self {
            DefaultKeyResolution::UseFallback(key) => Some(key),
            _ => None,
        }
    }
}

/// Decides the default key for an instant.
#[cfg_attr(test, mockall::automock)]
pub trait DefaultKeyResolver: Send + Sync {
    /// Evaluate `keys` at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] if the key set cannot be evaluated.
    fn resolve(
        &self,
        now: DateTime<Utc>,
        keys: &[Key],
    ) -> Result<DefaultKeyResolution, ResolverError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{AlgorithmDescriptor, KeyId};
    use chrono::{TimeDelta, TimeZone};

    fn key() -> Key {
        let at = Utc.with_ymd_and_hms(2015, 3, 1, 0, 0, 0).unwrap();
        Key::new(
            KeyId::new(),
            at,
            at,
            at + TimeDelta::days(1),
            AlgorithmDescriptor::generate(),
        )
        .unwrap()
    }

    #[test]
    fn generation_advice_per_variant() {
        let quiet = DefaultKeyResolution::UseDefault {
            key: key(),
            should_generate_new_key: false,
        };
        let expiring = DefaultKeyResolution::UseDefault {
            key: key(),
            should_generate_new_key: true,
        };
        assert!(!quiet.should_generate_new_key());
        assert!(expiring.should_generate_new_key());
        assert!(DefaultKeyResolution::UseFallback(key()).should_generate_new_key());
        assert!(DefaultKeyResolution::RequiresGeneration.should_generate_new_key());
    }

    #[test]
    fn fallback_is_not_reported_as_default() {
        let resolution = DefaultKeyResolution::UseFallback(key());
        assert!(resolution.default_key().is_none());
        assert!(resolution.fallback_key().is_some());
    }
}
