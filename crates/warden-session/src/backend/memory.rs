//! In-process backing store with expiry.
//!
//! Behaves like the subset of Redis the directory relies on: records expire
//! after their TTL, `set_if_absent` and `take` are atomic, and scans walk
//! the key space with a cursor. Sharing one `MemoryBackend` between several
//! directories simulates several server processes on one host.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use glob::Pattern;
use parking_lot::Mutex;

use super::{ScanPage, SessionBackend};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct Record {
    value: String,
    expires_at: Option<Instant>,
}

impl Record {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: (!ttl.is_zero()).then(|| Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Backing store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<BTreeMap<String, Record>>,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a record directly, replacing any existing one.
    pub fn insert(&self, key: impl Into<String>, value: &str, ttl: Duration) {
        self.records.lock().insert(key.into(), Record::new(value, ttl));
    }

    /// Delete a record directly. Returns whether a live record was removed.
    pub fn remove(&self, key: &str) -> bool {
        let now = Instant::now();
        self.records
            .lock()
            .remove(key)
            .is_some_and(|record| !record.is_expired(now))
    }

    /// Whether a live record exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.records
            .lock()
            .get(key)
            .is_some_and(|record| !record.is_expired(now))
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.records
            .lock()
            .values()
            .filter(|record| !record.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(records: &mut BTreeMap<String, Record>, now: Instant) {
        records.retain(|_, record| !record.is_expired(now));
    }
}

/// Compile a Redis-style scan pattern.
///
/// Redis escapes a metacharacter with a backslash; `glob` has no escape
/// character and matches one literally when it is wrapped in brackets.
fn compile_pattern(pattern: &str) -> Result<Pattern> {
    let mut translated = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            translated.push(c);
            continue;
        }
        match chars.next() {
            Some(escaped @ ('*' | '?' | '[' | ']')) => {
                translated.push('[');
                translated.push(escaped);
                translated.push(']');
            }
            Some(escaped) => translated.push(escaped),
            None => translated.push('\\'),
        }
    }

    Pattern::new(&translated)
        .map_err(|e| Error::Backend(format!("invalid scan pattern '{}': {}", pattern, e)))
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut records = self.records.lock();
        match records.get(key) {
            Some(record) if record.is_expired(now) => {
                records.remove(key);
                Ok(None)
            }
            Some(record) => Ok(Some(record.value.clone())),
            None => Ok(None),
        }
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut records = self.records.lock();
        if records.get(key).is_some_and(|record| !record.is_expired(now)) {
            return Ok(false);
        }
        records.insert(key.to_string(), Record::new(value, ttl));
        Ok(true)
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let record = self.records.lock().remove(key);
        Ok(record
            .filter(|record| !record.is_expired(now))
            .map(|record| record.value))
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage> {
        let pattern = compile_pattern(pattern)?;
        let now = Instant::now();
        let mut records = self.records.lock();
        if cursor == 0 {
            Self::purge_expired(&mut records, now);
        }

        // The cursor is a position in key order, so records inserted or
        // removed mid-scan shift later pages, like a rehashing Redis scan.
        let start = usize::try_from(cursor).unwrap_or(usize::MAX);
        let mut examined = 0;
        let mut keys = Vec::new();
        for (key, record) in records.iter().skip(start).take(count.max(1)) {
            examined += 1;
            if !record.is_expired(now) && pattern.matches(key) {
                keys.push(key.clone());
            }
        }

        let next = start.saturating_add(examined);
        let cursor = if examined == 0 || next >= records.len() {
            0
        } else {
            next as u64
        };
        Ok(ScanPage { cursor, keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::prefix_pattern;

    async fn scan_all(backend: &MemoryBackend, pattern: &str, count: usize) -> Vec<String> {
        let mut cursor = 0;
        let mut keys = Vec::new();
        loop {
            let page = backend.scan(pattern, cursor, count).await.unwrap();
            keys.extend(page.keys);
            if page.cursor == 0 {
                break;
            }
            cursor = page.cursor;
        }
        keys
    }

    #[test]
    fn test_pattern_matches_prefix() {
        let pattern = compile_pattern(&prefix_pattern("sess:")).unwrap();
        assert!(pattern.matches("sess:abc"));
        assert!(pattern.matches("sess:"));
        assert!(!pattern.matches("other:abc"));
        assert!(!pattern.matches("sess"));
    }

    #[test]
    fn test_pattern_escapes_are_literal() {
        let pattern = compile_pattern(&prefix_pattern("s*[x]?:")).unwrap();
        assert!(pattern.matches("s*[x]?:key"));
        assert!(!pattern.matches("sab[x]c:key"));
        assert!(!pattern.matches("s*x?:key"));

        let slash = compile_pattern(&prefix_pattern("a\\b:")).unwrap();
        assert!(slash.matches("a\\b:key"));
    }

    #[test]
    fn test_pattern_wildcards() {
        let pattern = compile_pattern("a?c*").unwrap();
        assert!(pattern.matches("abc"));
        assert!(pattern.matches("abcdef"));
        assert!(!pattern.matches("ac"));
        assert!(compile_pattern("*").unwrap().matches(""));
    }

    #[tokio::test]
    async fn test_scan_escaped_prefix() {
        let backend = MemoryBackend::new();
        backend.insert("s*:1", "v", Duration::ZERO);
        backend.insert("sx:2", "v", Duration::ZERO);

        let keys = scan_all(&backend, &prefix_pattern("s*:"), 10).await;
        assert_eq!(keys, vec!["s*:1".to_string()]);
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let backend = MemoryBackend::new();
        assert!(backend.set_if_absent("k", "v1", Duration::ZERO).await.unwrap());
        assert!(!backend.set_if_absent("k", "v2", Duration::ZERO).await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn test_take_removes_record() {
        let backend = MemoryBackend::new();
        backend.insert("k", "v1", Duration::ZERO);

        assert_eq!(backend.take("k").await.unwrap(), Some("v1".to_string()));
        assert_eq!(backend.take("k").await.unwrap(), None);
        assert!(!backend.contains("k"));
    }

    #[tokio::test]
    async fn test_expiry() {
        let backend = MemoryBackend::new();
        backend.insert("k", "v1", Duration::from_millis(20));
        assert!(backend.contains("k"));

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(backend.set_if_absent("k", "v2", Duration::ZERO).await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_take_expired_is_none() {
        let backend = MemoryBackend::new();
        backend.insert("k", "v1", Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(backend.take("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scan_pages_cover_namespace() {
        let backend = MemoryBackend::new();
        for i in 0..25 {
            backend.insert(format!("sess:{:02}", i), "v", Duration::ZERO);
        }
        backend.insert("other:1", "v", Duration::ZERO);

        let mut keys = scan_all(&backend, &prefix_pattern("sess:"), 4).await;
        keys.sort();
        assert_eq!(keys.len(), 25);
        assert_eq!(keys[0], "sess:00");
        assert_eq!(keys[24], "sess:24");
    }

    #[tokio::test]
    async fn test_scan_empty_store() {
        let backend = MemoryBackend::new();
        let page = backend.scan("*", 0, 10).await.unwrap();
        assert_eq!(page, ScanPage::default());
    }

    #[tokio::test]
    async fn test_get_many_lines_up() {
        let backend = MemoryBackend::new();
        backend.insert("a", "1", Duration::ZERO);
        backend.insert("c", "3", Duration::ZERO);

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values = backend.get_many(&keys).await.unwrap();
        assert_eq!(values, vec![Some("1".to_string()), None, Some("3".to_string())]);
    }
}
