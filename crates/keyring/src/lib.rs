//! Key-ring lifecycle core.
//!
//! Maintains the set of keys used to protect data, decides which key is the
//! default at any instant, generates successors before the default lapses,
//! and serves cached key-ring snapshots to concurrent callers.
//!
//! # Layout
//!
//! - [`keys`]: key records, key-ring snapshots, invalidation signals.
//! - [`resolver`]: default-key selection.
//! - [`store`]: the key storage interface and an in-memory implementation.
//! - [`provider`]: snapshot building, caching, and background refresh.
//! - [`server`]: HTTP surface used by the `keyring-svc` binary.

pub mod config;
pub mod keys;
pub mod provider;
pub mod resolver;
pub mod server;
pub mod store;
pub mod telemetry;

pub use config::{Config, KeyManagementOptions};
pub use keys::{CacheableKeyRing, InvalidationSignal, Key, KeyId, KeyRing};
pub use provider::{CacheableKeyRingProvider, KeyRingBuilder, KeyRingCache, KeyRingError};
pub use resolver::{DefaultKeyPolicy, DefaultKeyResolution, DefaultKeyResolver};
pub use store::{InMemoryKeyStore, KeyStore, KeyStoreError};
