//! Axum request handlers for all service endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use common::protocol::{ErrorResponse, HealthResponse, KeyRingResponse, KeySummary};
use common::ServiceError;
use tracing::{info, warn};

use super::state::AppState;
use crate::keys::{Key, KeyRing};
use crate::provider::KeyRingError;

/// `GET /health` — liveness and readiness check.
///
/// Returns `200 OK` once a key ring has been built and cached.
/// Returns `503 Service Unavailable` otherwise. Never triggers a rebuild.
pub async fn health(State(state): State<AppState>) -> Response {
    let cached = state.key_ring.cached();
    let key_ring_ready = cached.is_some();

    let (status_code, status_str) = if key_ring_ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status_str.into(),
        key_ring_ready,
        default_key_id: cached.map(|entry| entry.key_ring().default_key_id().to_string()),
    };
    (status_code, Json(body)).into_response()
}

/// `GET /keyring` — metadata of the key ring currently in effect.
///
/// Rebuilds the ring first if the cached one is stale.
pub async fn key_ring(State(state): State<AppState>) -> Response {
    match state.key_ring.get_current_key_ring(Utc::now(), false).await {
        Ok(ring) => (StatusCode::OK, Json(to_response(&ring))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /keyring/refresh` — rebuild the key ring even if the cached one is valid.
///
/// If another rebuild is already running, the ring being replaced is returned.
pub async fn refresh_key_ring(State(state): State<AppState>) -> Response {
    match state.key_ring.get_current_key_ring(Utc::now(), true).await {
        Ok(ring) => {
            info!(default_key_id = %ring.default_key_id(), "key ring refresh requested");
            (StatusCode::OK, Json(to_response(&ring))).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

impl From<&KeyRingError> for ServiceError {
    fn from(e: &KeyRingError) -> Self {
        match e {
            KeyRingError::NoDefaultKey => ServiceError::Internal(e.to_string()),
            KeyRingError::Store(_) | KeyRingError::Resolver(_) => {
                ServiceError::Unavailable(e.to_string())
            }
        }
    }
}

fn error_response(e: &KeyRingError) -> Response {
    warn!(error = %e, "key ring unavailable");
    let err = ServiceError::from(e);
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorResponse::new(err.code(), "key ring unavailable");
    (status, Json(body)).into_response()
}

fn to_response(ring: &KeyRing) -> KeyRingResponse {
    KeyRingResponse {
        default_key_id: ring.default_key_id().to_string(),
        keys: ring.keys_by_activation().into_iter().map(summarise).collect(),
    }
}

fn summarise(key: &Key) -> KeySummary {
    KeySummary {
        id: key.id().to_string(),
        created_at: key.created_at(),
        activates_at: key.activates_at(),
        expires_at: key.expires_at(),
        revoked: key.is_revoked(),
        algorithm: key.descriptor().algorithm().to_owned(),
        fingerprint: key.descriptor().fingerprint(),
    }
}
