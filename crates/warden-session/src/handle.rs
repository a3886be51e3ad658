//! Session handles.
//!
//! The transport layer owns live sessions: objects carrying event queues and
//! notification channels that cannot be written to a shared store. The
//! directory only ever replicates the session identifier, so a session it
//! rehydrates from the backing store comes back as a [`SessionHandle::Stub`].

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// A live client session owned by the transport layer.
pub trait Session: Send + Sync + 'static {
    /// Globally unique identifier assigned when the session was created.
    fn session_id(&self) -> &str;
}

/// Reference to a session held by the directory.
pub enum SessionHandle<S> {
    /// A session with live delivery channels.
    Live(Arc<S>),

    /// A session rebuilt from its identifier alone.
    Stub(String),
}

impl<S: Session> SessionHandle<S> {
    /// Wrap a live session.
    pub fn new(session: S) -> Self {
        SessionHandle::Live(Arc::new(session))
    }

    /// Build a stub handle carrying only an identifier.
    pub fn stub(session_id: impl Into<String>) -> Self {
        SessionHandle::Stub(session_id.into())
    }

    /// The session identifier.
    pub fn session_id(&self) -> &str {
        match self {
            SessionHandle::Live(session) => session.session_id(),
            SessionHandle::Stub(id) => id,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, SessionHandle::Live(_))
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, SessionHandle::Stub(_))
    }

    /// Borrow the live session.
    ///
    /// Fails with [`Error::StubHandle`] for a stub, which has nowhere to
    /// deliver events.
    pub fn as_live(&self) -> Result<&Arc<S>> {
        match self {
            SessionHandle::Live(session) => Ok(session),
            SessionHandle::Stub(id) => Err(Error::StubHandle(id.clone())),
        }
    }

    /// Take the live session out of the handle.
    pub fn into_live(self) -> Result<Arc<S>> {
        match self {
            SessionHandle::Live(session) => Ok(session),
            SessionHandle::Stub(id) => Err(Error::StubHandle(id)),
        }
    }

    /// Whether both handles refer to the same session identifier.
    pub fn same_session(&self, other: &SessionHandle<S>) -> bool {
        self.session_id() == other.session_id()
    }
}

impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        match self {
            SessionHandle::Live(session) => SessionHandle::Live(Arc::clone(session)),
            SessionHandle::Stub(id) => SessionHandle::Stub(id.clone()),
        }
    }
}

impl<S: Session> From<Arc<S>> for SessionHandle<S> {
    fn from(session: Arc<S>) -> Self {
        SessionHandle::Live(session)
    }
}

impl<S: Session> fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionHandle::Live(session) => {
                f.debug_tuple("Live").field(&session.session_id()).finish()
            }
            SessionHandle::Stub(id) => f.debug_tuple("Stub").field(id).finish(),
        }
    }
}
