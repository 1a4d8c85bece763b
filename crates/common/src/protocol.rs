//! Request and response types exposed by the key-ring service.
//!
//! These types are serialised as JSON over the service's HTTP API. They carry
//! key metadata only; key material never appears on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Key ring
// ---------------------------------------------------------------------------

/// Non-secret summary of a single key in the ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySummary {
    /// Key identifier.
    pub id: String,
    /// When the key was created by the key store.
    pub created_at: DateTime<Utc>,
    /// When the key becomes eligible to be the default key.
    pub activates_at: DateTime<Utc>,
    /// When the key stops being usable for new payloads.
    pub expires_at: DateTime<Utc>,
    /// Whether the key has been revoked.
    pub revoked: bool,
    /// Algorithm named by the key's descriptor (e.g. `"AES-256-GCM-SIV"`).
    pub algorithm: String,
    /// Short fingerprint of the key material, for operator correlation.
    pub fingerprint: String,
}

/// Response body for `GET /keyring` and `POST /keyring/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRingResponse {
    /// Identifier of the key used for new encryption operations.
    pub default_key_id: String,
    /// Every key in the ring, ordered by activation.
    pub keys: Vec<KeySummary>,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"service_unavailable"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether a key ring has been built and cached.
    pub key_ring_ready: bool,
    /// Default key of the cached ring, if any.
    pub default_key_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_ring_response_serialises_rfc3339_instants() {
        let at = Utc.with_ymd_and_hms(2015, 3, 1, 0, 0, 0).unwrap();
        let resp = KeyRingResponse {
            default_key_id: "k1".into(),
            keys: vec![KeySummary {
                id: "k1".into(),
                created_at: at,
                activates_at: at,
                expires_at: at,
                revoked: false,
                algorithm: "AES-256-GCM-SIV".into(),
                fingerprint: "abc".into(),
            }],
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["keys"][0]["activates_at"], "2015-03-01T00:00:00Z");
        assert_eq!(json["default_key_id"], "k1");
    }

    #[test]
    fn error_response_new() {
        let e = ErrorResponse::new("service_unavailable", "key store unavailable");
        assert_eq!(e.code, "service_unavailable");
        assert!(e.message.contains("key store"));
    }

    #[test]
    fn degraded_health_has_null_default_key() {
        let h = HealthResponse {
            status: "degraded".into(),
            key_ring_ready: false,
            default_key_id: None,
        };
        let json = serde_json::to_value(&h).unwrap();
        assert_eq!(json["key_ring_ready"], false);
        assert!(json["default_key_id"].is_null());
    }
}
