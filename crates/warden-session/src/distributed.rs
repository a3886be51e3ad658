//! Session directory shared by several server processes.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::backend::{SessionBackend, prefix_pattern};
use crate::config::DirectoryConfig;
use crate::error::{Error, Result};
use crate::handle::{Session, SessionHandle};
use crate::local::LocalSessionStore;
use crate::store::{SessionStore, Visitor};

/// How many times a create-if-absent claim is attempted when the existing
/// record disappears between the failed claim and the follow-up lookup.
const CLAIM_ATTEMPTS: usize = 3;

/// Session directory layering a [`LocalSessionStore`] over a shared backend.
///
/// The backend records `prefix + client_key -> session_id` with a TTL and is
/// the source of truth for whether a session exists anywhere. The local cache
/// holds the handles this process has seen, including live ones; entries whose
/// record has gone are dropped by [`reconcile_once`](Self::reconcile_once),
/// which a [`Reconciler`](crate::Reconciler) runs on an interval.
///
/// Backend failures and timeouts never escape the read paths: the session is
/// simply reported as unknown.
pub struct DistributedSessionStore<S, B> {
    pub(crate) backend: Arc<B>,
    pub(crate) local: LocalSessionStore<S>,
    pub(crate) config: DirectoryConfig,
    pub(crate) shutdown: CancellationToken,
}

impl<S: Session, B: SessionBackend> DistributedSessionStore<S, B> {
    /// Create a directory over `backend` with an empty local cache.
    pub fn new(backend: B, config: DirectoryConfig) -> Self {
        Self::with_backend(Arc::new(backend), config)
    }

    /// Create a directory over a backend shared with other directories.
    pub fn with_backend(backend: Arc<B>, config: DirectoryConfig) -> Self {
        Self {
            backend,
            local: LocalSessionStore::new(),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// The process-local cache.
    pub fn local(&self) -> &LocalSessionStore<S> {
        &self.local
    }

    /// Stop every reconciler started from this directory or its clones.
    pub fn shutdown(&self) {
        debug!(prefix = %self.config.prefix, "Shutting down session directory");
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Run a backend call under the configured deadline.
    pub(crate) async fn call<T, F>(&self, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.op_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.config.op_timeout)),
        }
    }

    /// Cache a stub for `session_id` under `key` unless the key is already
    /// cached, and return whichever handle ends up cached.
    ///
    /// A claim that completed while the backend was being read has cached its
    /// live handle, and that handle must not be replaced by a stub.
    fn rehydrate(&self, key: &str, session_id: String) -> SessionHandle<S> {
        let (handle, cached) = self.local.get_or_insert(key, SessionHandle::stub(session_id));
        if cached {
            trace!(
                key = %key,
                session_id = %handle.session_id(),
                "Session cached while fetching"
            );
        } else {
            debug!(
                key = %key,
                session_id = %handle.session_id(),
                "Rehydrated session from backend"
            );
        }
        handle
    }

    /// Fetch the identifier for a namespaced key and cache a stub for it.
    async fn fetch(&self, key: &str, record_key: &str) -> Option<SessionHandle<S>> {
        match self.call(self.backend.get(record_key)).await {
            Ok(Some(session_id)) => Some(self.rehydrate(key, session_id)),
            Ok(None) => {
                trace!(key = %key, "Session not found in backend");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Backend lookup failed, treating session as unknown");
                None
            }
        }
    }
}

impl<S, B> Clone for DistributedSessionStore<S, B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            local: self.local.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

#[async_trait]
impl<S: Session, B: SessionBackend> SessionStore<S> for DistributedSessionStore<S, B> {
    async fn load(&self, key: &str) -> Option<SessionHandle<S>> {
        if let Some(handle) = self.local.get(key) {
            return Some(handle);
        }

        let record_key = self.config.record_key(key);
        self.fetch(key, &record_key).await
    }

    async fn load_and_delete(&self, key: &str) -> Option<SessionHandle<S>> {
        let record_key = self.config.record_key(key);
        let session_id = match self.call(self.backend.take(&record_key)).await {
            Ok(Some(session_id)) => session_id,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Backend delete failed, treating session as unknown");
                return None;
            }
        };

        debug!(key = %key, session_id = %session_id, "Session removed from backend");

        // The local entry stays until reconciliation notices the record is
        // gone. A cached handle for the same session is preferred over a stub.
        match self.local.get(key) {
            Some(handle) if handle.session_id() == session_id => Some(handle),
            _ => {
                let stub = SessionHandle::stub(session_id);
                self.local.insert(key, stub.clone());
                Some(stub)
            }
        }
    }

    async fn load_or_store(
        &self,
        key: &str,
        handle: SessionHandle<S>,
    ) -> Result<(SessionHandle<S>, bool)> {
        let record_key = self.config.record_key(key);

        for attempt in 1..=CLAIM_ATTEMPTS {
            let claimed = self
                .call(
                    self.backend
                        .set_if_absent(&record_key, handle.session_id(), self.config.ttl),
                )
                .await
                .inspect_err(|e| {
                    warn!(key = %key, error = %e, "Backend claim failed");
                })?;

            if claimed {
                debug!(key = %key, session_id = %handle.session_id(), "Session claimed");
                self.local.insert(key, handle.clone());
                return Ok((handle, false));
            }

            if let Some(existing) = self.load(key).await {
                trace!(key = %key, session_id = %existing.session_id(), "Session already claimed");
                return Ok((existing, true));
            }

            debug!(key = %key, attempt, "Claimed record vanished before lookup, retrying");
        }

        Err(Error::Contended(key.to_string()))
    }

    async fn range(&self, visit: &mut Visitor<'_, S>) {
        let pattern = prefix_pattern(&self.config.prefix);
        let mut seen = HashSet::new();
        let mut cursor = 0;

        loop {
            let page = match self
                .call(self.backend.scan(&pattern, cursor, self.config.scan_count))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        prefix = %self.config.prefix,
                        error = %e,
                        "Backend scan failed, stopping iteration"
                    );
                    return;
                }
            };

            for record_key in &page.keys {
                let Some(key) = self.config.client_key(record_key) else {
                    continue;
                };
                if !seen.insert(key.to_string()) {
                    continue;
                }

                let handle = match self.local.get(key) {
                    Some(handle) => handle,
                    None => match self.fetch(key, record_key).await {
                        Some(handle) => handle,
                        None => continue,
                    },
                };

                if visit(key, &handle).is_break() {
                    return;
                }
            }

            if page.cursor == 0 {
                break;
            }
            cursor = page.cursor;
        }
    }
}
