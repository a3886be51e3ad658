//! Process-local session cache.

use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::trace;

use crate::error::Result;
use crate::handle::{Session, SessionHandle};
use crate::store::{SessionStore, Visitor};

/// In-process concurrent map from client key to session handle.
///
/// This is the fast path of every directory lookup. It never touches the
/// network and is safe for unsynchronized use from many tasks and threads:
/// the map is sharded internally, so callers need no lock of their own.
/// Clones share the same underlying map.
pub struct LocalSessionStore<S> {
    sessions: Arc<DashMap<String, SessionHandle<S>>>,
}

impl<S: Session> LocalSessionStore<S> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Number of cached sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether a client key is cached.
    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    /// Get the handle cached for a client key.
    pub fn get(&self, key: &str) -> Option<SessionHandle<S>> {
        let handle = self.sessions.get(key).map(|entry| entry.value().clone());
        if handle.is_some() {
            trace!(key = %key, "Session found in local cache");
        }
        handle
    }

    /// Remove and return the handle cached for a client key.
    pub fn take(&self, key: &str) -> Option<SessionHandle<S>> {
        self.sessions.remove(key).map(|(_, handle)| handle)
    }

    /// Insert `handle` unless the key is already cached.
    ///
    /// Returns the cached handle and whether it was already present. The
    /// check and the insert happen under the key's shard lock, so exactly
    /// one of several racing callers sees `false`.
    pub fn get_or_insert(&self, key: &str, handle: SessionHandle<S>) -> (SessionHandle<S>, bool) {
        match self.sessions.entry(key.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), true),
            Entry::Vacant(entry) => {
                entry.insert(handle.clone());
                (handle, false)
            }
        }
    }

    /// Insert or replace the handle for a client key. Last writer wins.
    pub fn insert(&self, key: &str, handle: SessionHandle<S>) -> Option<SessionHandle<S>> {
        trace!(key = %key, session_id = %handle.session_id(), "Session cached locally");
        self.sessions.insert(key.to_string(), handle)
    }

    /// Drop a client key from the cache.
    pub fn remove(&self, key: &str) -> bool {
        self.sessions.remove(key).is_some()
    }

    /// Keep only the entries for which `keep` returns true.
    ///
    /// Returns the number of entries removed.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&str, &SessionHandle<S>) -> bool,
    {
        let mut removed = 0;
        self.sessions.retain(|key, handle| {
            let kept = keep(key.as_str(), handle);
            if !kept {
                trace!(key = %key, session_id = %handle.session_id(), "Dropping local session");
                removed += 1;
            }
            kept
        });
        removed
    }

    /// Copy of every cached entry.
    pub fn snapshot(&self) -> Vec<(String, SessionHandle<S>)> {
        self.sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Cached client keys.
    pub fn keys(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Visit cached entries until the visitor breaks.
    ///
    /// The visitor runs over a snapshot taken up front, so it may call back
    /// into the cache without deadlocking on a shard lock.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &SessionHandle<S>) -> ControlFlow<()>,
    {
        for (key, handle) in self.snapshot() {
            if visit(&key, &handle).is_break() {
                break;
            }
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.sessions.clear();
    }
}

impl<S: Session> Default for LocalSessionStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for LocalSessionStore<S> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
        }
    }
}

#[async_trait]
impl<S: Session> SessionStore<S> for LocalSessionStore<S> {
    async fn load(&self, key: &str) -> Option<SessionHandle<S>> {
        self.get(key)
    }

    async fn load_and_delete(&self, key: &str) -> Option<SessionHandle<S>> {
        self.take(key)
    }

    async fn load_or_store(
        &self,
        key: &str,
        handle: SessionHandle<S>,
    ) -> Result<(SessionHandle<S>, bool)> {
        Ok(self.get_or_insert(key, handle))
    }

    async fn range(&self, visit: &mut Visitor<'_, S>) {
        self.for_each(|key, handle| visit(key, handle));
    }
}
