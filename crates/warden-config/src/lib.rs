//! Configuration system for the Warden session directory.
//!
//! Provides TOML-based configuration with:
//! - Backing store connection settings (`[redis]`)
//! - Directory namespace, record TTL and reconciliation cadence (`[directory]`)
//! - Log filtering and optional rotating JSON log files (`[logging]`)
//! - Config file layering (XDG user config + project-local overrides)
//! - Environment variable overrides for deployment secrets

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, apply_env, apply_env_from, load_config, load_config_file,
    load_config_with_options, save_config, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
