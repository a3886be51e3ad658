//! Distributed session directory.
//!
//! This crate keeps a fast, process-local cache of live sessions coherent
//! with a shared backing store that records which session identifiers are
//! currently valid across every server process:
//! - [`LocalSessionStore`] is the in-process concurrent cache
//! - [`DistributedSessionStore`] layers that cache over a [`SessionBackend`]
//! - a background [`Reconciler`] drops local entries whose backing record
//!   expired or was deleted by another process
//!
//! Both stores implement [`SessionStore`], so callers do not care whether
//! they run single-process or distributed.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_session::{DirectoryConfig, DistributedSessionStore, RedisBackend, RedisOptions};
//!
//! let backend = RedisBackend::connect(&RedisOptions::new("redis://127.0.0.1:6379")).await?;
//! let config = DirectoryConfig::default()
//!     .with_prefix("mcp:session:")
//!     .with_reconcile_interval(Duration::from_secs(30));
//!
//! let store = DistributedSessionStore::new(backend, config);
//! let reconciler = store.start_reconciler();
//! ```

mod backend;
mod config;
mod distributed;
mod error;
mod handle;
mod local;
mod reconcile;
mod store;

pub use backend::memory::MemoryBackend;
pub use backend::redis::{RedisBackend, RedisOptions};
pub use backend::{ScanPage, SessionBackend, escape_glob, prefix_pattern};
pub use config::DirectoryConfig;
pub use distributed::DistributedSessionStore;
pub use error::{Error, Result};
pub use handle::{Session, SessionHandle};
pub use local::LocalSessionStore;
pub use reconcile::{ReconcileReport, Reconciler};
pub use store::{SessionStore, Visitor};
