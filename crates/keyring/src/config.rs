//! Configuration loading and validation for the key-ring service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is invalid.

use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::Deserialize;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Shortest lifetime accepted for newly generated keys.
const MIN_NEW_KEY_LIFETIME_SECS: u64 = 7 * SECS_PER_DAY;

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP endpoint for span export. Spans are only logged locally when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Whether the service may create keys when the policy asks for one.
    #[serde(default = "default_auto_generate_keys")]
    pub auto_generate_keys: bool,

    /// Nominal lifetime (seconds) of a cached key ring before it is rebuilt.
    #[serde(default = "default_key_ring_refresh_period")]
    pub key_ring_refresh_period_secs: u64,

    /// Assumed time (seconds) for a new key to reach every node sharing the store.
    #[serde(default = "default_key_propagation_window")]
    pub key_propagation_window_secs: u64,

    /// Lifetime (seconds) given to newly generated keys.
    #[serde(default = "default_new_key_lifetime")]
    pub new_key_lifetime_secs: u64,

    /// Tolerated clock difference (seconds) between nodes when picking the default key.
    #[serde(default = "default_max_clock_skew")]
    pub max_clock_skew_secs: u64,

    /// How often (seconds) the background task checks whether the key ring is stale.
    #[serde(default = "default_key_ring_poll_interval")]
    pub key_ring_poll_interval_secs: u64,
}

fn default_listen_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".into()
}
fn default_auto_generate_keys() -> bool {
    true
}
fn default_key_ring_refresh_period() -> u64 {
    SECS_PER_DAY
}
fn default_key_propagation_window() -> u64 {
    2 * SECS_PER_DAY
}
fn default_new_key_lifetime() -> u64 {
    90 * SECS_PER_DAY
}
fn default_max_clock_skew() -> u64 {
    300
}
fn default_key_ring_poll_interval() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            log_level: default_log_level(),
            otel_exporter_otlp_endpoint: None,
            auto_generate_keys: default_auto_generate_keys(),
            key_ring_refresh_period_secs: default_key_ring_refresh_period(),
            key_propagation_window_secs: default_key_propagation_window(),
            new_key_lifetime_secs: default_new_key_lifetime(),
            max_clock_skew_secs: default_max_clock_skew(),
            key_ring_poll_interval_secs: default_key_ring_poll_interval(),
        }
    }
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.key_ring_refresh_period_secs == 0 {
            anyhow::bail!("KEY_RING_REFRESH_PERIOD_SECS must be > 0");
        }
        if self.key_ring_poll_interval_secs == 0 {
            anyhow::bail!("KEY_RING_POLL_INTERVAL_SECS must be > 0");
        }
        if self.new_key_lifetime_secs < MIN_NEW_KEY_LIFETIME_SECS {
            anyhow::bail!("NEW_KEY_LIFETIME_SECS must be at least {MIN_NEW_KEY_LIFETIME_SECS}");
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            if endpoint.trim().is_empty() {
                anyhow::bail!("OTEL_EXPORTER_OTLP_ENDPOINT must not be empty when set");
            }
        }
        Ok(())
    }

    /// Key-management settings consumed by the key-ring builder.
    pub fn key_management(&self) -> KeyManagementOptions {
        KeyManagementOptions {
            auto_generate_keys: self.auto_generate_keys,
            key_ring_refresh_period: secs(self.key_ring_refresh_period_secs),
            key_propagation_window: secs(self.key_propagation_window_secs),
            new_key_lifetime: secs(self.new_key_lifetime_secs),
        }
    }

    pub fn max_clock_skew(&self) -> TimeDelta {
        secs(self.max_clock_skew_secs)
    }
}

fn secs(value: u64) -> TimeDelta {
    // TimeDelta is bounded by i64::MAX milliseconds.
    let max = i64::MAX / 1_000;
    TimeDelta::seconds(i64::try_from(value).map_or(max, |v| v.min(max)))
}

/// Read-only key-management settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyManagementOptions {
    /// Create keys when the policy reports that one is needed.
    pub auto_generate_keys: bool,
    /// Nominal lifetime of a cached key ring; jittered down by up to 20%.
    pub key_ring_refresh_period: TimeDelta,
    /// Horizon within which an expiring default key triggers proactive rotation.
    pub key_propagation_window: TimeDelta,
    /// Lifetime given to newly generated keys.
    pub new_key_lifetime: TimeDelta,
}

impl Default for KeyManagementOptions {
    fn default() -> Self {
        Config::default().key_management()
    }
}
