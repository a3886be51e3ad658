//! Reconciliation of the local cache against the backing store.
//!
//! Another process may delete a session, or its record may simply expire;
//! either way this process still caches a handle for it. A reconciliation
//! pass collects every session identifier that currently has a backing
//! record and drops local entries whose identifier is not among them.
//!
//! The scan can take a while. Only entries that were already cached with the
//! same identifier when the pass began are candidates for removal, so a
//! session claimed or rehydrated during the scan survives until the next pass.
//!
//! Comparison is by session identifier, not by client key. This relies on a
//! client key never being reassigned to a different identifier between two
//! passes; if that happened, the older local entry would be dropped even
//! though the key is still claimed.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{SessionBackend, prefix_pattern};
use crate::distributed::DistributedSessionStore;
use crate::error::{Error, Result};
use crate::handle::Session;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Backing keys returned by the scan, duplicates included.
    pub scanned_keys: usize,

    /// Distinct session identifiers with a live backing record.
    pub valid_ids: usize,

    /// Local entries dropped.
    pub removed: usize,

    /// Wall time of the pass.
    pub elapsed: Duration,
}

impl<S: Session, B: SessionBackend> DistributedSessionStore<S, B> {
    /// Collect every session identifier currently recorded under the prefix.
    ///
    /// Fails if any scan page or value fetch fails; a partial set must never
    /// be used for pruning.
    pub async fn valid_session_ids(&self) -> Result<(HashSet<String>, usize)> {
        let pattern = prefix_pattern(&self.config.prefix);
        let mut ids = HashSet::new();
        let mut scanned = 0;
        let mut cursor = 0;

        loop {
            let page = self
                .call(self.backend.scan(&pattern, cursor, self.config.scan_count))
                .await?;
            scanned += page.keys.len();

            if !page.keys.is_empty() {
                let values = self.call(self.backend.get_many(&page.keys)).await?;
                ids.extend(values.into_iter().flatten());
            }

            if page.cursor == 0 {
                break;
            }
            cursor = page.cursor;
        }

        Ok((ids, scanned))
    }

    /// Run one reconciliation pass.
    ///
    /// Nothing is removed if the backend could not be walked completely.
    pub async fn reconcile_once(&self) -> Result<ReconcileReport> {
        let started = Instant::now();

        let candidates: HashMap<String, String> = self
            .local
            .snapshot()
            .into_iter()
            .map(|(key, handle)| (key, handle.session_id().to_string()))
            .collect();

        let (valid, scanned_keys) = self
            .valid_session_ids()
            .await
            .map_err(|e| Error::Reconcile(e.to_string()))?;

        let removed = self.local.retain(|key, handle| {
            let id = handle.session_id();
            valid.contains(id) || candidates.get(key).is_none_or(|cached| cached != id)
        });

        let report = ReconcileReport {
            scanned_keys,
            valid_ids: valid.len(),
            removed,
            elapsed: started.elapsed(),
        };

        if report.removed > 0 {
            info!(
                removed = report.removed,
                valid_ids = report.valid_ids,
                cached = self.local.len(),
                "Dropped stale local sessions"
            );
        } else {
            debug!(
                scanned_keys = report.scanned_keys,
                valid_ids = report.valid_ids,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Reconciliation pass complete"
            );
        }

        Ok(report)
    }

    /// Spawn the periodic reconciliation loop on the current tokio runtime.
    ///
    /// Returns `None` when the reconciler is disabled in the config. The loop
    /// stops when the returned handle is shut down or dropped, or when the
    /// directory is shut down.
    pub fn start_reconciler(&self) -> Option<Reconciler> {
        if !self.config.enable_reconciler {
            debug!(prefix = %self.config.prefix, "Reconciler disabled");
            return None;
        }

        let cancel = self.shutdown.child_token();
        let task = tokio::spawn(run_reconciler(self.clone(), cancel.clone()));
        debug!(
            prefix = %self.config.prefix,
            interval_ms = self.config.reconcile_interval.as_millis() as u64,
            "Reconciler started"
        );

        Some(Reconciler {
            cancel,
            task: Some(task),
        })
    }
}

async fn run_reconciler<S: Session, B: SessionBackend>(
    store: DistributedSessionStore<S, B>,
    cancel: CancellationToken,
) {
    let period = store.config.reconcile_interval;
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(prefix = %store.config.prefix, "Reconciler stopping");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = store.reconcile_once().await {
                    // Keep ticking; the next pass may find the backend healthy.
                    warn!(prefix = %store.config.prefix, error = %e, "Reconciliation pass failed");
                }
            }
        }
    }
}

/// Handle to a running reconciliation loop.
///
/// Dropping the handle cancels the loop without waiting for it.
pub struct Reconciler {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Reconciler {
    /// Signal the loop to stop without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Reconciler task ended abnormally");
        }
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::testing::{BrokenBackend, FlakyBackend, SlowBackend, StalledBackend};
    use crate::config::DirectoryConfig;
    use crate::handle::SessionHandle;
    use crate::store::SessionStore;
    use std::sync::Arc;

    struct TestSession {
        id: String,
    }

    impl Session for TestSession {
        fn session_id(&self) -> &str {
            &self.id
        }
    }

    fn live(id: &str) -> SessionHandle<TestSession> {
        SessionHandle::new(TestSession { id: id.to_string() })
    }

    fn directory(
        backend: Arc<MemoryBackend>,
    ) -> DistributedSessionStore<TestSession, MemoryBackend> {
        let config = DirectoryConfig::new()
            .with_prefix("rec:")
            .with_reconcile_interval(Duration::from_millis(20));
        DistributedSessionStore::with_backend(backend, config)
    }

    #[tokio::test]
    async fn test_reconcile_drops_deleted_sessions() {
        let backend = Arc::new(MemoryBackend::new());
        let store = directory(Arc::clone(&backend));

        store.load_or_store("a", live("id-a")).await.unwrap();
        store.load_or_store("b", live("id-b")).await.unwrap();
        backend.remove("rec:a");

        let report = store.reconcile_once().await.unwrap();
        assert_eq!(report.scanned_keys, 1);
        assert_eq!(report.valid_ids, 1);
        assert_eq!(report.removed, 1);
        assert!(!store.local().contains("a"));
        assert!(store.local().contains("b"));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let backend = Arc::new(MemoryBackend::new());
        let store = directory(Arc::clone(&backend));

        for i in 0..5 {
            store
                .load_or_store(&format!("k{}", i), live(&format!("id-{}", i)))
                .await
                .unwrap();
        }
        backend.remove("rec:k1");
        backend.remove("rec:k3");

        let first = store.reconcile_once().await.unwrap();
        assert_eq!(first.removed, 2);

        let second = store.reconcile_once().await.unwrap();
        assert_eq!(second.removed, 0);
        assert_eq!(store.local().len(), 3);
    }

    #[tokio::test]
    async fn test_reconcile_drops_expired_sessions() {
        let backend = Arc::new(MemoryBackend::new());
        let config = DirectoryConfig::new()
            .with_prefix("rec:")
            .with_ttl(Duration::from_millis(20));
        let store: DistributedSessionStore<TestSession, MemoryBackend> =
            DistributedSessionStore::with_backend(backend, config);

        store.load_or_store("short", live("id-short")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let report = store.reconcile_once().await.unwrap();
        assert_eq!(report.removed, 1);
        assert!(store.local().is_empty());
    }

    #[tokio::test]
    async fn test_background_loop_prunes_and_stops() {
        let backend = Arc::new(MemoryBackend::new());
        let store = directory(Arc::clone(&backend));

        store.load_or_store("a", live("id-a")).await.unwrap();
        backend.remove("rec:a");

        let reconciler = store.start_reconciler().unwrap();

        let mut pruned = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if store.local().is_empty() {
                pruned = true;
                break;
            }
        }
        assert!(pruned, "reconciler never dropped the stale entry");

        reconciler.shutdown().await;
    }

    #[tokio::test]
    async fn test_directory_shutdown_stops_loop() {
        let store = directory(Arc::new(MemoryBackend::new()));
        let reconciler = store.start_reconciler().unwrap();

        store.shutdown();
        for _ in 0..50 {
            if reconciler.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(reconciler.is_finished());
    }

    #[tokio::test]
    async fn test_claim_during_scan_survives() {
        let backend = SlowBackend {
            scan_delay: Duration::from_millis(100),
            ..Default::default()
        };
        let store: DistributedSessionStore<TestSession, SlowBackend> =
            DistributedSessionStore::new(backend, DirectoryConfig::new().with_prefix("rec:"));

        let reconciling = store.clone();
        let pass = tokio::spawn(async move { reconciling.reconcile_once().await });

        // The scan has already read the empty namespace when the claim lands.
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.load_or_store("k", live("x")).await.unwrap();

        let report = pass.await.unwrap().unwrap();
        assert_eq!(report.removed, 0);
        assert!(store.backend().inner.contains("rec:k"));
        assert!(store.local().get("k").unwrap().is_live());

        // The next pass sees the record and keeps the entry.
        let report = store.reconcile_once().await.unwrap();
        assert_eq!(report.removed, 0);
        assert!(store.local().contains("k"));
    }

    #[tokio::test]
    async fn test_failed_pass_removes_nothing() {
        let store: DistributedSessionStore<TestSession, BrokenBackend> =
            DistributedSessionStore::new(BrokenBackend, DirectoryConfig::new());
        store.local().insert("a", live("id-a"));
        store.local().insert("b", SessionHandle::stub("id-b"));

        let err = store.reconcile_once().await.unwrap_err();
        assert!(matches!(err, Error::Reconcile(_)));
        assert_eq!(store.local().len(), 2);
        assert!(store.local().get("a").unwrap().is_live());
    }

    #[tokio::test]
    async fn test_timed_out_pass_removes_nothing() {
        let config = DirectoryConfig::new().with_op_timeout(Duration::from_millis(20));
        let store: DistributedSessionStore<TestSession, StalledBackend> =
            DistributedSessionStore::new(StalledBackend, config);
        store.local().insert("a", live("id-a"));

        assert!(matches!(
            store.reconcile_once().await,
            Err(Error::Reconcile(_))
        ));
        assert!(store.local().contains("a"));
    }

    #[tokio::test]
    async fn test_failed_then_recovered_pass() {
        let store: DistributedSessionStore<TestSession, FlakyBackend> =
            DistributedSessionStore::new(FlakyBackend::new(1), DirectoryConfig::new());
        store.local().insert("stale", live("id-stale"));

        assert!(store.reconcile_once().await.is_err());
        assert!(store.local().contains("stale"));

        let report = store.reconcile_once().await.unwrap();
        assert_eq!(report.removed, 1);
        assert!(store.local().is_empty());
    }

    #[tokio::test]
    async fn test_loop_keeps_ticking_after_failed_pass() {
        let config = DirectoryConfig::new()
            .with_prefix("rec:")
            .with_reconcile_interval(Duration::from_millis(20));
        let store: DistributedSessionStore<TestSession, FlakyBackend> =
            DistributedSessionStore::new(FlakyBackend::new(1), config);
        store.local().insert("stale", live("id-stale"));

        let reconciler = store.start_reconciler().unwrap();

        let mut pruned = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if store.local().is_empty() {
                pruned = true;
                break;
            }
        }
        assert!(pruned, "reconciler stopped after the failed pass");
        assert_eq!(store.backend().pending_failures(), 0);
        assert!(!reconciler.is_finished());

        reconciler.shutdown().await;
    }

    #[tokio::test]
    async fn test_disabled_reconciler() {
        let config = DirectoryConfig::new().with_reconciler(false);
        let store: DistributedSessionStore<TestSession, MemoryBackend> =
            DistributedSessionStore::new(MemoryBackend::new(), config);
        assert!(store.start_reconciler().is_none());
    }
}
