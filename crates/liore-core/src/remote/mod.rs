//! Remote document store abstraction.
//!
//! The store is treated as an opaque collection of `{key, fields}` documents
//! with single-document reads and writes, atomic batches and a change feed.

mod firestore;
mod memory;
pub mod value;

pub use firestore::FirestoreRemote;
pub use memory::MemoryRemote;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

/// A document in the remote collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(key: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }
}

/// How a set operation treats fields it does not mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Present fields overwrite, absent fields are left untouched
    Merge,
    /// The document becomes exactly the given fields
    Overwrite,
}

/// One operation in an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    Set {
        key: String,
        fields: Map<String, Value>,
        mode: WriteMode,
    },
    Delete {
        key: String,
    },
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote store is misconfigured: {0}")]
    Misconfigured(String),
    #[error("Remote store is unavailable: {0}")]
    Unavailable(String),
    #[error("Remote store rejected the request: {0}")]
    Rejected(String),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid remote payload: {0}")]
    Payload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Item delivered by a change feed.
#[derive(Debug)]
pub enum WatchEvent {
    /// Complete collection contents after a change
    Snapshot(Vec<Document>),
    /// The feed hit an error; it keeps running
    Error(RemoteError),
}

/// Releases the remote side of a change feed when dropped.
pub struct WatchGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for WatchGuard {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("WatchGuard")
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// An active change feed. Dropping it stops the feed.
#[derive(Debug)]
pub struct RemoteWatch {
    events: mpsc::UnboundedReceiver<WatchEvent>,
    _guard: WatchGuard,
}

impl RemoteWatch {
    pub const fn new(events: mpsc::UnboundedReceiver<WatchEvent>, guard: WatchGuard) -> Self {
        Self {
            events,
            _guard: guard,
        }
    }

    /// Wait for the next event; `None` once the feed has shut down.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }
}

/// Operations the sync store needs from a hosted document collection.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Establish the connection (validate configuration, build clients)
    async fn connect(&self) -> RemoteResult<()>;

    /// Read every document in the collection
    async fn list(&self) -> RemoteResult<Vec<Document>>;

    /// Read one document
    async fn get(&self, key: &str) -> RemoteResult<Option<Document>>;

    /// Write one document
    async fn upsert(
        &self,
        key: &str,
        fields: Map<String, Value>,
        mode: WriteMode,
    ) -> RemoteResult<()>;

    /// Delete one document; deleting a missing document succeeds
    async fn delete(&self, key: &str) -> RemoteResult<()>;

    /// Apply all operations atomically
    async fn commit(&self, ops: Vec<BatchOp>) -> RemoteResult<()>;

    /// Cheap reachability check
    async fn probe(&self) -> RemoteResult<()>;

    /// Start a change feed delivering full snapshots after each change
    fn watch(&self) -> RemoteResult<RemoteWatch>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn watch_guard_releases_exactly_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let (_sender, receiver) = mpsc::unbounded_channel();

        let watch = RemoteWatch::new(
            receiver,
            WatchGuard::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(released.load(Ordering::SeqCst), 0);

        drop(watch);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
