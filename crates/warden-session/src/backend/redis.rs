//! Redis backing store.

use std::time::Duration;

use async_trait::async_trait;
use redis::IntoConnectionInfo;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::{ScanPage, SessionBackend};
use crate::error::Result;

/// Connection settings for [`RedisBackend`].
#[derive(Debug, Clone)]
pub struct RedisOptions {
    /// Connection URL, e.g. `redis://127.0.0.1:6379`.
    pub url: String,

    /// Username overriding the one in the URL.
    pub username: Option<String>,

    /// Password overriding the one in the URL.
    pub password: Option<String>,

    /// Database index overriding the one in the URL.
    pub db: Option<i64>,
}

impl RedisOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            db: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_db(mut self, db: i64) -> Self {
        self.db = Some(db);
        self
    }
}

/// Backing store on a shared Redis server.
///
/// Holds a [`ConnectionManager`], which multiplexes one reconnecting
/// connection; every call works on a cheap clone of it.
#[derive(Clone)]
pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    /// Connect using `options`.
    pub async fn connect(options: &RedisOptions) -> Result<Self> {
        let mut info = options.url.as_str().into_connection_info()?;
        if let Some(ref username) = options.username {
            info.redis.username = Some(username.clone());
        }
        if let Some(ref password) = options.password {
            info.redis.password = Some(password.clone());
        }
        if let Some(db) = options.db {
            info.redis.db = db;
        }

        debug!(addr = ?info.addr, db = info.redis.db, "Connecting to Redis");
        let client = redis::Client::open(info)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }

    /// Wrap an existing connection manager.
    pub fn from_manager(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Round-trip a `PING`.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if !ttl.is_zero() {
            // PX takes whole milliseconds and rejects zero.
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(millis);
        }
        let reply: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(reply.is_some())
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let (value,): (Option<String>,) = redis::pipe()
            .atomic()
            .cmd("GET")
            .arg(key)
            .cmd("DEL")
            .arg(key)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage> {
        let mut conn = self.manager.clone();
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await?;
        Ok(ScanPage { cursor, keys })
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.manager.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::prefix_pattern;

    /// Connect to the server named by `WARDEN_TEST_REDIS_URL`, if any.
    async fn test_backend() -> Option<RedisBackend> {
        let url = std::env::var("WARDEN_TEST_REDIS_URL").ok()?;
        RedisBackend::connect(&RedisOptions::new(url)).await.ok()
    }

    #[test]
    fn test_options_builder() {
        let options = RedisOptions::new("redis://localhost:6379")
            .with_username("svc")
            .with_password("secret")
            .with_db(3);
        assert_eq!(options.username.as_deref(), Some("svc"));
        assert_eq!(options.password.as_deref(), Some("secret"));
        assert_eq!(options.db, Some(3));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let result = RedisBackend::connect(&RedisOptions::new("not a url")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore] // Needs WARDEN_TEST_REDIS_URL
    async fn test_redis_primitives() {
        let Some(backend) = test_backend().await else {
            return;
        };
        backend.ping().await.unwrap();

        let key = "warden-test:primitives:k1";
        let _ = backend.take(key).await.unwrap();

        assert!(backend.set_if_absent(key, "id-1", Duration::from_secs(30)).await.unwrap());
        assert!(!backend.set_if_absent(key, "id-2", Duration::from_secs(30)).await.unwrap());
        assert_eq!(backend.get(key).await.unwrap(), Some("id-1".to_string()));

        let values = backend
            .get_many(&[key.to_string(), "warden-test:primitives:missing".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some("id-1".to_string()), None]);

        assert_eq!(backend.take(key).await.unwrap(), Some("id-1".to_string()));
        assert_eq!(backend.get(key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Needs WARDEN_TEST_REDIS_URL
    async fn test_redis_scan_prefix() {
        let Some(backend) = test_backend().await else {
            return;
        };
        let prefix = "warden-test:scan:";
        for i in 0..5 {
            let key = format!("{}{}", prefix, i);
            let _ = backend.take(&key).await.unwrap();
            backend.set_if_absent(&key, "v", Duration::from_secs(30)).await.unwrap();
        }

        let pattern = prefix_pattern(prefix);
        let mut cursor = 0;
        let mut keys = std::collections::HashSet::new();
        loop {
            let page = backend.scan(&pattern, cursor, 2).await.unwrap();
            keys.extend(page.keys);
            if page.cursor == 0 {
                break;
            }
            cursor = page.cursor;
        }
        assert_eq!(keys.len(), 5);
    }
}
