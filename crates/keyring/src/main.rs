//! `keyring-svc` — key-ring service binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing + optional OTLP).
//! 3. Build the key store, default-key policy, key-ring builder and cache.
//! 4. Prime the cache; startup fails if no key ring can be built.
//! 5. Spawn the background key-ring refresh task.
//! 6. Build the Axum router and serve until Ctrl-C.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use keyring::config::Config;
use keyring::provider::{self, KeyRingBuilder, KeyRingCache};
use keyring::resolver::DefaultKeyPolicy;
use keyring::server::{self, state::AppState};
use keyring::store::InMemoryKeyStore;
use keyring::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        auto_generate_keys = cfg.auto_generate_keys,
        "keyring-svc starting"
    );

    // -----------------------------------------------------------------------
    // 3. Key-ring components
    // -----------------------------------------------------------------------
    let store = Arc::new(InMemoryKeyStore::new());
    let options = cfg.key_management();
    let policy = Arc::new(DefaultKeyPolicy::new(
        options.key_propagation_window,
        cfg.max_clock_skew(),
    ));
    let builder = KeyRingBuilder::new(store, policy, options);
    let cache = KeyRingCache::new(Arc::new(builder));

    // -----------------------------------------------------------------------
    // 4. Initial key ring
    // -----------------------------------------------------------------------
    let ring = cache
        .get_current_key_ring(Utc::now(), false)
        .await
        .context("failed to build initial key ring")?;
    info!(
        default_key_id = %ring.default_key_id(),
        key_count = ring.len(),
        "initial key ring ready"
    );

    // -----------------------------------------------------------------------
    // 5. Background tasks
    // -----------------------------------------------------------------------
    let shutdown = CancellationToken::new();
    let refresh = provider::refresh_task(
        cache.clone(),
        Duration::from_secs(cfg.key_ring_poll_interval_secs),
        shutdown.clone(),
    );

    // -----------------------------------------------------------------------
    // 6. HTTP server
    // -----------------------------------------------------------------------
    let router = server::router::build(AppState::new(cache));

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    refresh.await.context("key ring refresh task panicked")?;
    telemetry::shutdown_telemetry();
    info!("keyring-svc stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C; shutting down");
    }
    info!("shutdown signal received");
}
