//! Parsing and validation of `pagemeta.toml` configuration files.
//!
//! This crate reads the reload tunables that govern page staleness checks and
//! produces a strongly-typed [`PagemetaConfig`], with environment overrides and
//! a process-wide [`ReloadSettings`] snapshot.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{apply_env_overrides, load_config, load_config_from_str};
pub use types::*;
