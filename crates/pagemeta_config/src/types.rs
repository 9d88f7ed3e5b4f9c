//! Configuration types deserialized from `pagemeta.toml`.

use serde::Deserialize;
use std::time::Duration;

/// Default minimum time between two source freshness checks of the same page.
pub const DEFAULT_RELOAD_INTERVAL_MS: u64 = 5000;

/// Default tolerance when comparing modification times.
///
/// Archive extraction and file copies round timestamps, usually to whole
/// seconds, so two readings of the same source can differ slightly.
pub const DEFAULT_RELOAD_GRANULARITY_MS: u64 = 2000;

/// Default timeout for a single remote metadata request.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// The top-level configuration parsed from `pagemeta.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct PagemetaConfig {
    /// Staleness check tunables.
    #[serde(default)]
    pub reload: ReloadConfig,
    /// Settings for probing remote resources.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// The `[reload]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ReloadConfig {
    /// Minimum milliseconds between two freshness checks of one page.
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
    /// Modification-time differences up to this many milliseconds are ignored.
    #[serde(default = "default_granularity")]
    pub granularity_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_RELOAD_INTERVAL_MS,
            granularity_ms: DEFAULT_RELOAD_GRANULARITY_MS,
        }
    }
}

/// The `[connection]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Timeout in milliseconds for one metadata request to a remote resource.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

fn default_interval() -> u64 {
    DEFAULT_RELOAD_INTERVAL_MS
}

fn default_granularity() -> u64 {
    DEFAULT_RELOAD_GRANULARITY_MS
}

fn default_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Runtime form of [`ReloadConfig`] handed to each staleness cache.
///
/// Values are fixed once a cache is built; there is no hot reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSettings {
    /// How long a staleness outcome stays valid.
    pub check_interval: Duration,
    /// Tolerance in milliseconds for modification-time comparison.
    pub granularity_ms: i64,
}

impl ReloadSettings {
    /// Creates settings from explicit millisecond values.
    pub fn new(interval_ms: u64, granularity_ms: u64) -> Self {
        Self {
            check_interval: Duration::from_millis(interval_ms),
            granularity_ms: i64::try_from(granularity_ms).unwrap_or(i64::MAX),
        }
    }
}

impl Default for ReloadSettings {
    fn default() -> Self {
        Self::new(DEFAULT_RELOAD_INTERVAL_MS, DEFAULT_RELOAD_GRANULARITY_MS)
    }
}

impl From<&ReloadConfig> for ReloadSettings {
    fn from(config: &ReloadConfig) -> Self {
        Self::new(config.interval_ms, config.granularity_ms)
    }
}
