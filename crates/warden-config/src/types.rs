//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [redis]                  # backing store connection
//! [directory]              # namespace, TTL, reconciliation
//! [logging]                # console filter and log files
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default values shared by the config sections.
pub mod defaults {
    pub const REDIS_URL: &str = "redis://127.0.0.1:6379";
    pub const PREFIX: &str = "warden:session:";
    pub const TTL_SECS: u64 = 3600;
    pub const RECONCILE_INTERVAL_SECS: u64 = 60;
    pub const OP_TIMEOUT_MS: u64 = 2000;
    pub const SCAN_COUNT: usize = 100;
    pub const LOG_FILTER: &str = "warden=info,warden_session=info,warn";
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged section by section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Backing store connection.
    pub redis: Option<RedisConfig>,

    /// Session directory behaviour.
    pub directory: Option<DirectoryConfig>,

    /// Logging.
    pub logging: Option<LoggingConfig>,
}

impl WardenConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one. Sections present in `other`
    /// replace the corresponding sections here.
    pub fn merge(&mut self, other: WardenConfig) {
        if other.redis.is_some() {
            self.redis = other.redis;
        }
        if other.directory.is_some() {
            self.directory = other.directory;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Redis section, or its defaults.
    pub fn redis(&self) -> RedisConfig {
        self.redis.clone().unwrap_or_default()
    }

    /// Directory section, or its defaults.
    pub fn directory(&self) -> DirectoryConfig {
        self.directory.clone().unwrap_or_default()
    }

    /// Logging section, or its defaults.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Reject values the directory cannot run with.
    pub fn validate(&self) -> Result<()> {
        let redis = self.redis();
        if redis.url.trim().is_empty() {
            return Err(invalid("redis.url", "must not be empty"));
        }

        let directory = self.directory();
        if directory.prefix.is_empty() {
            return Err(invalid(
                "directory.prefix",
                "must not be empty; an empty prefix would scan the whole keyspace",
            ));
        }
        if directory.reconcile_interval_secs == 0 {
            return Err(invalid("directory.reconcile_interval_secs", "must be at least 1"));
        }
        if directory.op_timeout_ms == 0 {
            return Err(invalid("directory.op_timeout_ms", "must be at least 1"));
        }
        if directory.scan_count == 0 {
            return Err(invalid("directory.scan_count", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Redis Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Backing store connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URL.
    pub url: String,
    /// Username, overriding any in the URL.
    pub username: Option<String>,
    /// Password, overriding any in the URL. Prefer `WARDEN_REDIS_PASSWORD`.
    pub password: Option<String>,
    /// Database index, overriding any in the URL.
    pub db: Option<i64>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: defaults::REDIS_URL.to_string(),
            username: None,
            password: None,
            db: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Directory Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session directory settings.
///
/// ```toml
/// [directory]
/// prefix = "mcp:session:"
/// ttl_secs = 3600             # 0 = records never expire
/// reconcile_interval_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Namespace prefix for backing store keys.
    pub prefix: String,
    /// Record time-to-live in seconds.
    pub ttl_secs: u64,
    /// Seconds between reconciliation passes.
    pub reconcile_interval_secs: u64,
    /// Whether to run the background reconciler.
    pub enable_reconciler: bool,
    /// Deadline for a single backing store call, in milliseconds.
    pub op_timeout_ms: u64,
    /// Keys requested per scan page.
    pub scan_count: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            prefix: defaults::PREFIX.to_string(),
            ttl_secs: defaults::TTL_SECS,
            reconcile_interval_secs: defaults::RECONCILE_INTERVAL_SECS,
            enable_reconciler: true,
            op_timeout_ms: defaults::OP_TIMEOUT_MS,
            scan_count: defaults::SCAN_COUNT,
        }
    }
}

impl DirectoryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive for console output.
    pub filter: String,
    /// Emit console logs as JSON.
    pub json: bool,
    /// Directory for daily-rotated JSON log files. Disabled when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: defaults::LOG_FILTER.to_string(),
            json: false,
            log_dir: None,
        }
    }
}
