//! Configuration file loading, environment overrides and validation.

use crate::error::ConfigError;
use crate::types::{PagemetaConfig, ReloadSettings};
use std::path::Path;
use std::sync::OnceLock;

/// Name of the configuration file inside a project directory.
pub const CONFIG_FILE: &str = "pagemeta.toml";

/// Environment variable overriding `reload.interval_ms`.
pub const RELOAD_INTERVAL_VAR: &str = "PAGEMETA_RELOAD_INTERVAL";

/// Environment variable overriding `reload.granularity_ms`.
pub const RELOAD_GRANULARITY_VAR: &str = "PAGEMETA_RELOAD_GRANULARITY";

/// Loads and validates `pagemeta.toml` from a project directory.
///
/// A missing file is not an error: the defaults apply.
pub fn load_config(project_dir: &Path) -> Result<PagemetaConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(PagemetaConfig::default());
    }
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `pagemeta.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<PagemetaConfig, ConfigError> {
    let config: PagemetaConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Applies reload overrides taken from `lookup` (normally the process environment).
pub fn apply_env_overrides(
    config: &mut PagemetaConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(v) = parse_override(&lookup, RELOAD_INTERVAL_VAR)? {
        config.reload.interval_ms = v;
    }
    if let Some(v) = parse_override(&lookup, RELOAD_GRANULARITY_VAR)? {
        config.reload.granularity_ms = v;
    }
    Ok(())
}

fn parse_override(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidOverride {
                var: var.to_string(),
                value: raw,
            }),
    }
}

/// Validates configuration values that serde cannot check.
fn validate_config(config: &PagemetaConfig) -> Result<(), ConfigError> {
    if config.connection.timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "connection.timeout_ms must be positive".to_string(),
        ));
    }
    if i64::try_from(config.reload.granularity_ms).is_err() {
        return Err(ConfigError::ValidationError(
            "reload.granularity_ms is out of range".to_string(),
        ));
    }
    Ok(())
}

impl ReloadSettings {
    /// Builds settings from the defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = PagemetaConfig::default();
        apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
        Ok(Self::from(&config.reload))
    }

    /// Returns the process-wide settings, read from the environment on first use.
    ///
    /// Malformed overrides are logged and the defaults used instead.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<ReloadSettings> = OnceLock::new();
        *GLOBAL.get_or_init(|| {
            Self::from_env().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring reload overrides");
                Self::default()
            })
        })
    }
}
