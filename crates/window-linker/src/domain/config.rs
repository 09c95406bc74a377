//! Linker configuration with validation.

use crate::domain::types::TargetOrigin;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default wait for a response before `send` rejects.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Instance-wide configuration, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Emit verbose per-message diagnostics. No protocol effect.
    pub enable_debug_log: bool,
    /// Timeout used when `SendOptions` does not set one
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
    /// Reclamation of timed-out pending entries
    pub sweep: SweepConfig,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            enable_debug_log: false,
            default_timeout: DEFAULT_TIMEOUT,
            sweep: SweepConfig::default(),
        }
    }
}

impl LinkerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `WINDOW_LINKER_DEBUG_LOG`: Enable debug diagnostics (default: false)
    /// - `WINDOW_LINKER_TIMEOUT_MS`: Default send timeout (default: 30000)
    /// - `WINDOW_LINKER_SWEEP_INTERVAL_MS`: Sweep period, `0` disables (default: 10000)
    /// - `WINDOW_LINKER_TIMED_OUT_RETENTION_MS`: Grace period for late responses (default: 60000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let sweep_interval = env_millis("WINDOW_LINKER_SWEEP_INTERVAL_MS");

        Self {
            enable_debug_log: env::var("WINDOW_LINKER_DEBUG_LOG")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.enable_debug_log),

            default_timeout: env_millis("WINDOW_LINKER_TIMEOUT_MS")
                .unwrap_or(defaults.default_timeout),

            sweep: SweepConfig {
                enabled: sweep_interval.map_or(defaults.sweep.enabled, |d| !d.is_zero()),
                interval: sweep_interval
                    .filter(|d| !d.is_zero())
                    .unwrap_or(defaults.sweep.interval),
                retention: env_millis("WINDOW_LINKER_TIMED_OUT_RETENTION_MS")
                    .unwrap_or(defaults.sweep.retention),
            },
        }
    }

    /// Enable or disable debug diagnostics.
    pub fn with_debug_log(mut self, enabled: bool) -> Self {
        self.enable_debug_log = enabled;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "default_timeout cannot be 0".into(),
            ));
        }

        if self.sweep.enabled && self.sweep.interval.is_zero() {
            return Err(ConfigError::InvalidSweep(
                "sweep interval cannot be 0 while sweeping is enabled".into(),
            ));
        }

        Ok(())
    }
}

/// Background reclamation of entries whose timeout fired but whose late
/// response never arrived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Spawn the sweep task from `init()`
    pub enabled: bool,
    /// How often to scan
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// How long a timed-out entry waits for its late response
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(10),
            retention: Duration::from_secs(60),
        }
    }
}

/// Per-call options for `send`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Overrides `LinkerConfig::default_timeout`
    pub timeout: Option<Duration>,
    /// Fire and forget: resolve immediately, never wait for a response
    pub ignore_return: bool,
    /// Delivery constraint handed to the transport
    pub target_origin: TargetOrigin,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn ignore_return(mut self) -> Self {
        self.ignore_return = true;
        self
    }

    pub fn with_target_origin(mut self, origin: impl Into<TargetOrigin>) -> Self {
        self.target_origin = origin.into();
        self
    }

    /// Timeout for this call, falling back to the instance default.
    pub fn effective_timeout(&self, config: &LinkerConfig) -> Duration {
        self.timeout.unwrap_or(config.default_timeout)
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Invalid sweep settings
    #[error("invalid sweep: {0}")]
    InvalidSweep(String),
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs)
                .ok_or("invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid duration format")
        }
    }
}
