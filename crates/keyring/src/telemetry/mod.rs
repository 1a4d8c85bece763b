//! Tracing setup: structured JSON logs, optionally exporting spans over OTLP.
//!
//! # Telemetry invariants
//!
//! - **No key material** may appear in any span attribute or log field. Keys
//!   are identified by id, and by fingerprint where the material matters.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   overrides it when set.

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
