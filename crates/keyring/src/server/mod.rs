//! Axum HTTP server, routing, and middleware.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared middleware.
//! - Inject shared application state (`AppState`) into handlers.
//! - Expose key-ring metadata; key material never leaves the process.

pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
