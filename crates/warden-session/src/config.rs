//! Configuration for the distributed session directory.

use std::time::Duration;

/// Default namespace prefix for backing store records.
pub const DEFAULT_PREFIX: &str = "warden:session:";

/// Default time-to-live for backing store records.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default interval between reconciliation passes.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Default deadline for a single backing store call.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Default number of keys requested per scan page.
pub const DEFAULT_SCAN_COUNT: usize = 100;

/// Configuration for a [`DistributedSessionStore`](crate::DistributedSessionStore).
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Prefix prepended to every client key in the backing store.
    pub prefix: String,

    /// Time-to-live for backing store records.
    /// `Duration::ZERO` stores records without expiry.
    pub ttl: Duration,

    /// Interval between reconciliation passes.
    pub reconcile_interval: Duration,

    /// Whether `start_reconciler` spawns the background loop.
    pub enable_reconciler: bool,

    /// Deadline applied to every backing store call.
    pub op_timeout: Duration,

    /// Number of keys requested per scan page.
    pub scan_count: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            ttl: DEFAULT_TTL,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            enable_reconciler: true,
            op_timeout: DEFAULT_OP_TIMEOUT,
            scan_count: DEFAULT_SCAN_COUNT,
        }
    }
}

impl DirectoryConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key namespace prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the record time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Store records without expiry.
    pub fn without_ttl(mut self) -> Self {
        self.ttl = Duration::ZERO;
        self
    }

    /// Set the reconciliation interval.
    pub fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }

    /// Enable or disable the background reconciler.
    pub fn with_reconciler(mut self, enabled: bool) -> Self {
        self.enable_reconciler = enabled;
        self
    }

    /// Set the per-call backing store deadline.
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Set the scan page size hint. Zero is bumped to one.
    pub fn with_scan_count(mut self, count: usize) -> Self {
        self.scan_count = count.max(1);
        self
    }

    /// Namespaced backing store key for a client key.
    pub fn record_key(&self, client_key: &str) -> String {
        format!("{}{}", self.prefix, client_key)
    }

    /// Client key for a namespaced backing store key, if it carries the prefix.
    pub fn client_key<'a>(&self, record_key: &'a str) -> Option<&'a str> {
        record_key.strip_prefix(self.prefix.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DirectoryConfig::default();
        assert_eq!(config.prefix, DEFAULT_PREFIX);
        assert_eq!(config.ttl, DEFAULT_TTL);
        assert_eq!(config.reconcile_interval, DEFAULT_RECONCILE_INTERVAL);
        assert!(config.enable_reconciler);
        assert_eq!(config.scan_count, DEFAULT_SCAN_COUNT);
    }

    #[test]
    fn test_builder() {
        let config = DirectoryConfig::new()
            .with_prefix("mcp:")
            .without_ttl()
            .with_reconcile_interval(Duration::from_secs(5))
            .with_reconciler(false)
            .with_op_timeout(Duration::from_millis(250))
            .with_scan_count(0);

        assert_eq!(config.prefix, "mcp:");
        assert_eq!(config.ttl, Duration::ZERO);
        assert_eq!(config.reconcile_interval, Duration::from_secs(5));
        assert!(!config.enable_reconciler);
        assert_eq!(config.op_timeout, Duration::from_millis(250));
        assert_eq!(config.scan_count, 1);
    }

    #[test]
    fn test_record_key_round_trip() {
        let config = DirectoryConfig::new().with_prefix("p:");
        let record = config.record_key("abc");
        assert_eq!(record, "p:abc");
        assert_eq!(config.client_key(&record), Some("abc"));
        assert_eq!(config.client_key("other:abc"), None);
    }
}
