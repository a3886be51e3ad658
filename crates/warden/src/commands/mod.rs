//! CLI command handlers.

pub mod claim;
pub mod config;
pub mod get;
pub mod list;
pub mod ping;
pub mod take;

use anyhow::{Context as _, Result};
use warden_config::{ConfigSource, WardenConfig};
use warden_session::{
    DirectoryConfig, DistributedSessionStore, RedisBackend, RedisOptions, Session,
};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Fully resolved configuration.
    pub config: WardenConfig,
    /// Config files that were consulted.
    pub sources: Vec<ConfigSource>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// A session created from the command line.
///
/// It has no delivery channels; it only carries the identifier that gets
/// recorded in the backing store.
#[derive(Debug)]
pub struct CliSession {
    id: String,
}

impl CliSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Session for CliSession {
    fn session_id(&self) -> &str {
        &self.id
    }
}

pub type Directory = DistributedSessionStore<CliSession, RedisBackend>;

impl Context {
    pub fn redis_options(&self) -> RedisOptions {
        let redis = self.config.redis();
        let mut options = RedisOptions::new(redis.url);
        if let Some(username) = redis.username {
            options = options.with_username(username);
        }
        if let Some(password) = redis.password {
            options = options.with_password(password);
        }
        if let Some(db) = redis.db {
            options = options.with_db(db);
        }
        options
    }

    /// Directory settings for a one-shot command. The reconciler stays off:
    /// a single invocation never holds local sessions long enough to go stale.
    pub fn directory_config(&self) -> DirectoryConfig {
        let section = self.config.directory();
        DirectoryConfig::new()
            .with_prefix(section.prefix.clone())
            .with_ttl(section.ttl())
            .with_reconcile_interval(section.reconcile_interval())
            .with_op_timeout(section.op_timeout())
            .with_scan_count(section.scan_count)
            .with_reconciler(false)
    }

    /// Connect to the backing store.
    pub async fn backend(&self) -> Result<RedisBackend> {
        let options = self.redis_options();
        let timeout = self.config.directory().op_timeout();
        tracing::debug!(url = %redact_url(&options.url), "Connecting to backing store");

        match tokio::time::timeout(timeout, RedisBackend::connect(&options)).await {
            Ok(backend) => backend
                .with_context(|| format!("failed to connect to {}", redact_url(&options.url))),
            Err(_) => anyhow::bail!(
                "failed to connect to {}: timed out after {:?}",
                redact_url(&options.url),
                timeout
            ),
        }
    }

    /// Connect and build a directory over the configured namespace.
    pub async fn directory(&self) -> Result<Directory> {
        let backend = self.backend().await?;
        Ok(Directory::new(backend, self.directory_config()))
    }
}

/// Hide any password embedded in a connection URL.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((userinfo, host)) => match userinfo.split_once(':') {
            Some((user, _password)) => format!("{}://{}:****@{}", scheme, user, host),
            None => url.to_string(),
        },
        None => url.to_string(),
    }
}
