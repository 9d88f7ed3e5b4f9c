//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a `pagemeta.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// An environment override could not be parsed as a number.
    #[error("invalid value '{value}' for {var}")]
    InvalidOverride {
        /// The environment variable name.
        var: String,
        /// The raw value found in the environment.
        value: String,
    },

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}
