//! The session store contract shared by local and distributed directories.

use std::ops::ControlFlow;

use async_trait::async_trait;

use crate::error::Result;
use crate::handle::{Session, SessionHandle};

/// Callback used by [`SessionStore::range`].
///
/// Return `ControlFlow::Break(())` to stop iterating.
pub type Visitor<'a, S> = dyn FnMut(&str, &SessionHandle<S>) -> ControlFlow<()> + Send + 'a;

/// Directory of client sessions keyed by client key.
///
/// Implementations must tolerate unsynchronized concurrent callers. A missing
/// session is a normal result and is reported as `None`.
#[async_trait]
pub trait SessionStore<S: Session>: Send + Sync {
    /// Look up the session for a client key.
    async fn load(&self, key: &str) -> Option<SessionHandle<S>>;

    /// Atomically remove the session for a client key and return it.
    async fn load_and_delete(&self, key: &str) -> Option<SessionHandle<S>>;

    /// Store `handle` under `key` unless a session is already present.
    ///
    /// Returns the canonical handle and whether one was already present.
    /// Of several concurrent callers for the same key, exactly one observes
    /// `false`.
    async fn load_or_store(
        &self,
        key: &str,
        handle: SessionHandle<S>,
    ) -> Result<(SessionHandle<S>, bool)>;

    /// Visit every session until the visitor breaks.
    ///
    /// Iteration is weak: sessions added or removed concurrently may or may
    /// not be visited.
    async fn range(&self, visit: &mut Visitor<'_, S>);
}
