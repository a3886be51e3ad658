//! Backing store adapters.
//!
//! The directory only needs a handful of primitives from the shared store:
//! a plain get, an atomic set-if-absent with expiry, an atomic
//! get-and-delete, and a cursor-based key scan. [`SessionBackend`] captures
//! exactly that, so any store offering these semantics can back a
//! [`DistributedSessionStore`](crate::DistributedSessionStore).

pub mod memory;
pub mod redis;
#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// One page of a cursor-based key scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to pass to the next call. Zero means the scan is complete.
    pub cursor: u64,

    /// Keys matching the pattern in this page.
    pub keys: Vec<String>,
}

/// Primitives required from the shared backing store.
///
/// All implementations must be safe for concurrent use by every directory
/// operation and the reconciler.
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Create `key` with `value` and `ttl` unless it already exists.
    ///
    /// Returns true iff this call created the record. A zero `ttl` stores
    /// the record without expiry.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Read and delete `key` as a single atomic unit.
    async fn take(&self, key: &str) -> Result<Option<String>>;

    /// Fetch one page of keys matching a glob `pattern`, starting at `cursor`.
    ///
    /// Scans are weakly consistent: keys created or deleted while a scan is
    /// in progress may be missed, and a key may be returned more than once.
    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage>;

    /// Read several keys at once. Values line up with `keys`.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }
}

/// Escape glob metacharacters so `prefix` matches literally.
pub fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Scan pattern matching every key under `prefix`.
pub fn prefix_pattern(prefix: &str) -> String {
    format!("{}*", escape_glob(prefix))
}
