//! Key-ring data model: keys, key-ring snapshots, and invalidation signals.
//!
//! # Invariants
//!
//! - A [`Key`] never changes once created; revocation produces a new value.
//! - A [`KeyRing`] always contains its default key.
//! - A [`CacheableKeyRing`] is valid only before its expiration instant and
//!   only while its [`InvalidationSignal`] has not fired.
//! - Key material is zeroed on drop and never rendered by `Debug`.

pub mod key;
pub mod ring;
pub mod signal;

pub use key::{AlgorithmDescriptor, Key, KeyError, KeyId, KeyMaterial};
pub use ring::{CacheableKeyRing, KeyRing};
pub use signal::InvalidationSignal;
