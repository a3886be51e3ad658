//! Backends with injected faults and delays for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::memory::MemoryBackend;
use super::{ScanPage, SessionBackend};
use crate::error::{Error, Result};

fn refused() -> Error {
    Error::Backend("connection refused".into())
}

/// Backend whose every call fails.
pub(crate) struct BrokenBackend;

#[async_trait]
impl SessionBackend for BrokenBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(refused())
    }

    async fn set_if_absent(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<bool> {
        Err(refused())
    }

    async fn take(&self, _key: &str) -> Result<Option<String>> {
        Err(refused())
    }

    async fn scan(&self, _pattern: &str, _cursor: u64, _count: usize) -> Result<ScanPage> {
        Err(refused())
    }
}

/// Backend whose every call hangs.
pub(crate) struct StalledBackend;

#[async_trait]
impl SessionBackend for StalledBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        std::future::pending().await
    }

    async fn set_if_absent(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<bool> {
        std::future::pending().await
    }

    async fn take(&self, _key: &str) -> Result<Option<String>> {
        std::future::pending().await
    }

    async fn scan(&self, _pattern: &str, _cursor: u64, _count: usize) -> Result<ScanPage> {
        std::future::pending().await
    }
}

/// Memory backend that sleeps after each call has taken effect, so the
/// reply reaches the caller late.
#[derive(Default)]
pub(crate) struct SlowBackend {
    pub inner: MemoryBackend,
    pub get_delay: Duration,
    pub set_delay: Duration,
    pub scan_delay: Duration,
}

#[async_trait]
impl SessionBackend for SlowBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.inner.get(key).await;
        tokio::time::sleep(self.get_delay).await;
        value
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let claimed = self.inner.set_if_absent(key, value, ttl).await;
        tokio::time::sleep(self.set_delay).await;
        claimed
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        self.inner.take(key).await
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage> {
        let page = self.inner.scan(pattern, cursor, count).await;
        tokio::time::sleep(self.scan_delay).await;
        page
    }
}

/// Memory backend whose first `n` scans fail.
pub(crate) struct FlakyBackend {
    pub inner: MemoryBackend,
    scan_failures: AtomicUsize,
}

impl FlakyBackend {
    pub fn new(scan_failures: usize) -> Self {
        Self {
            inner: MemoryBackend::new(),
            scan_failures: AtomicUsize::new(scan_failures),
        }
    }

    /// Scans still due to fail.
    pub fn pending_failures(&self) -> usize {
        self.scan_failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionBackend for FlakyBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        self.inner.take(key).await
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage> {
        let failing = self
            .scan_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(refused());
        }
        self.inner.scan(pattern, cursor, count).await
    }
}
