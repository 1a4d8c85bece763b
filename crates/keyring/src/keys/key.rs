//! [`Key`]: immutable record of one key's lifecycle window and material.

use std::{fmt, sync::Arc};

use aes_gcm_siv::aead::{rand_core::RngCore, OsRng};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Byte length of generated key material (AES-256).
pub const KEY_LEN: usize = 32;

/// Algorithm name recorded on keys generated by this crate.
pub const DEFAULT_ALGORITHM: &str = "AES-256-GCM-SIV";

/// Number of digest bytes shown in a key fingerprint.
const FINGERPRINT_LEN: usize = 8;

/// Errors produced when constructing a [`Key`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    /// The activation instant falls after the expiration instant.
    #[error("key activation {activation} is after its expiration {expiration}")]
    InvalidWindow {
        activation: DateTime<Utc>,
        expiration: DateTime<Utc>,
    },
}

/// Unique identifier of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(Uuid);

impl KeyId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for KeyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Secret key bytes.
///
/// The buffer is overwritten with zeroes on drop and never printed.
pub struct KeyMaterial(Box<[u8]>);

impl KeyMaterial {
    /// Take ownership of existing key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    /// Generate [`KEY_LEN`] bytes from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut buf = vec![0u8; KEY_LEN].into_boxed_slice();
        OsRng.fill_bytes(&mut buf);
        Self(buf)
    }

    /// Borrow the raw key bytes.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Opaque description of how a key is used: an algorithm name plus its material.
///
/// The key-ring core never looks inside; encryptor construction belongs to
/// whoever consumes the ring.
#[derive(Debug)]
pub struct AlgorithmDescriptor {
    algorithm: String,
    material: KeyMaterial,
}

impl AlgorithmDescriptor {
    pub fn new(algorithm: impl Into<String>, material: KeyMaterial) -> Self {
        Self {
            algorithm: algorithm.into(),
            material,
        }
    }

    /// Descriptor for a freshly generated [`DEFAULT_ALGORITHM`] key.
    pub fn generate() -> Self {
        Self::new(DEFAULT_ALGORITHM, KeyMaterial::generate())
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Short, non-reversible fingerprint of the material, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.material.expose());
        URL_SAFE_NO_PAD.encode(&digest[..FINGERPRINT_LEN])
    }
}

/// One key's lifecycle window and material descriptor.
///
/// Keys are immutable. Revocation yields a new value via [`Key::into_revoked`];
/// the descriptor is shared between the two values rather than copied.
#[derive(Debug, Clone)]
pub struct Key {
    id: KeyId,
    created_at: DateTime<Utc>,
    activates_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
    descriptor: Arc<AlgorithmDescriptor>,
}

impl Key {
    /// Build a key, enforcing `activates_at <= expires_at`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidWindow`] if the window is inverted.
    pub fn new(
        id: KeyId,
        created_at: DateTime<Utc>,
        activates_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        descriptor: AlgorithmDescriptor,
    ) -> Result<Self, KeyError> {
        if activates_at > expires_at {
            return Err(KeyError::InvalidWindow {
                activation: activates_at,
                expiration: expires_at,
            });
        }
        Ok(Self {
            id,
            created_at,
            activates_at,
            expires_at,
            revoked: false,
            descriptor: Arc::new(descriptor),
        })
    }

    pub fn id(&self) -> KeyId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn activates_at(&self) -> DateTime<Utc> {
        self.activates_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// A key is expired at `now` once its expiration instant has been reached.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn descriptor(&self) -> &AlgorithmDescriptor {
        &self.descriptor
    }

    /// The revoked form of this key.
    pub fn into_revoked(self) -> Self {
        Self {
            revoked: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn rejects_activation_after_expiration() {
        let err = Key::new(
            KeyId::new(),
            at(2015, 1, 1),
            at(2016, 1, 1),
            at(2015, 6, 1),
            AlgorithmDescriptor::generate(),
        )
        .unwrap_err();
        assert!(matches!(err, KeyError::InvalidWindow { .. }));
    }

    #[test]
    fn zero_length_window_is_allowed() {
        let key = Key::new(
            KeyId::new(),
            at(2015, 1, 1),
            at(2015, 1, 1),
            at(2015, 1, 1),
            AlgorithmDescriptor::generate(),
        )
        .unwrap();
        assert!(key.is_expired(at(2015, 1, 1)));
    }

    #[test]
    fn expiry_is_inclusive_of_the_expiration_instant() {
        let key = Key::new(
            KeyId::new(),
            at(2015, 1, 1),
            at(2015, 1, 1),
            at(2016, 1, 1),
            AlgorithmDescriptor::generate(),
        )
        .unwrap();
        assert!(!key.is_expired(at(2016, 1, 1) - TimeDelta::seconds(1)));
        assert!(key.is_expired(at(2016, 1, 1)));
    }

    #[test]
    fn revocation_keeps_identity_and_descriptor() {
        let key = Key::new(
            KeyId::new(),
            at(2015, 1, 1),
            at(2015, 1, 1),
            at(2016, 1, 1),
            AlgorithmDescriptor::generate(),
        )
        .unwrap();
        let fingerprint = key.descriptor().fingerprint();
        let revoked = key.clone().into_revoked();
        assert!(revoked.is_revoked());
        assert!(!key.is_revoked());
        assert_eq!(revoked.id(), key.id());
        assert_eq!(revoked.descriptor().fingerprint(), fingerprint);
    }

    #[test]
    fn generated_material_has_expected_length() {
        let material = KeyMaterial::generate();
        assert_eq!(material.expose().len(), KEY_LEN);
    }

    #[test]
    fn material_redacted_in_debug() {
        let descriptor = AlgorithmDescriptor::new("test", KeyMaterial::from_bytes(&[0xFF; 4]));
        let rendered = format!("{descriptor:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("255"));
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = AlgorithmDescriptor::new("test", KeyMaterial::from_bytes(&[0x42; KEY_LEN]));
        let b = AlgorithmDescriptor::new("test", KeyMaterial::from_bytes(&[0x42; KEY_LEN]));
        assert_eq!(a.fingerprint(), b.fingerprint());
        // 8 bytes -> 11 base64url characters without padding
        assert_eq!(a.fingerprint().len(), 11);
    }
}
