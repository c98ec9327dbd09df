//! In-process remote store

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::{
    BatchOp, Document, RemoteError, RemoteResult, RemoteStore, RemoteWatch, WatchEvent, WatchGuard,
    WriteMode,
};

#[derive(Default)]
struct State {
    documents: BTreeMap<String, Map<String, Value>>,
    listeners: HashMap<u64, mpsc::UnboundedSender<WatchEvent>>,
    next_listener_id: u64,
    unreachable: bool,
    commits: usize,
}

impl State {
    fn snapshot(&self) -> Vec<Document> {
        self.documents
            .iter()
            .map(|(key, fields)| Document::new(key.clone(), fields.clone()))
            .collect()
    }

    fn ensure_reachable(&self) -> RemoteResult<()> {
        if self.unreachable {
            Err(RemoteError::Unavailable(
                "memory remote is offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn apply_set(&mut self, key: &str, fields: Map<String, Value>, mode: WriteMode) {
        match (mode, self.documents.get_mut(key)) {
            (WriteMode::Merge, Some(existing)) => existing.extend(fields),
            _ => {
                self.documents.insert(key.to_string(), fields);
            }
        }
    }

    /// Push the current contents to every live listener.
    fn broadcast(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.listeners
            .retain(|_, sender| sender.send(WatchEvent::Snapshot(snapshot.clone())).is_ok());
    }
}

/// Document collection held in memory.
///
/// Clones share the same collection, so a test can keep one handle to play
/// "another writer" while the store under test owns the other. Each
/// committed mutation produces exactly one snapshot on every change feed.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote pre-populated with `documents`
    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let remote = Self::new();
        {
            let mut state = remote.state();
            for document in documents {
                state.documents.insert(document.key, document.fields);
            }
        }
        remote
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent call fail as if the network were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Current contents, ordered by key
    pub fn documents(&self) -> Vec<Document> {
        self.state().snapshot()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state().documents.keys().cloned().collect()
    }

    /// Number of live change feeds
    pub fn listener_count(&self) -> usize {
        self.state()
            .listeners
            .values()
            .filter(|sender| !sender.is_closed())
            .count()
    }

    /// Number of batches committed so far
    pub fn commit_count(&self) -> usize {
        self.state().commits
    }

    /// Deliver an error on every change feed
    pub fn emit_listener_error(&self, message: &str) {
        self.state().listeners.retain(|_, sender| {
            sender
                .send(WatchEvent::Error(RemoteError::Unavailable(message.to_string())))
                .is_ok()
        });
    }
}

impl std::fmt::Debug for MemoryRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        formatter
            .debug_struct("MemoryRemote")
            .field("documents", &state.documents.len())
            .field("listeners", &state.listeners.len())
            .field("unreachable", &state.unreachable)
            .finish()
    }
}

impl RemoteStore for MemoryRemote {
    async fn connect(&self) -> RemoteResult<()> {
        self.state().ensure_reachable()
    }

    async fn list(&self) -> RemoteResult<Vec<Document>> {
        let state = self.state();
        state.ensure_reachable()?;
        Ok(state.snapshot())
    }

    async fn get(&self, key: &str) -> RemoteResult<Option<Document>> {
        let state = self.state();
        state.ensure_reachable()?;
        Ok(state
            .documents
            .get(key)
            .map(|fields| Document::new(key, fields.clone())))
    }

    async fn upsert(
        &self,
        key: &str,
        fields: Map<String, Value>,
        mode: WriteMode,
    ) -> RemoteResult<()> {
        let mut state = self.state();
        state.ensure_reachable()?;
        state.apply_set(key, fields, mode);
        state.broadcast();
        Ok(())
    }

    async fn delete(&self, key: &str) -> RemoteResult<()> {
        let mut state = self.state();
        state.ensure_reachable()?;
        if state.documents.remove(key).is_some() {
            state.broadcast();
        }
        Ok(())
    }

    async fn commit(&self, ops: Vec<BatchOp>) -> RemoteResult<()> {
        let mut state = self.state();
        state.ensure_reachable()?;
        for op in ops {
            match op {
                BatchOp::Set { key, fields, mode } => state.apply_set(&key, fields, mode),
                BatchOp::Delete { key } => {
                    state.documents.remove(&key);
                }
            }
        }
        state.commits += 1;
        state.broadcast();
        Ok(())
    }

    async fn probe(&self) -> RemoteResult<()> {
        self.state().ensure_reachable()
    }

    fn watch(&self) -> RemoteResult<RemoteWatch> {
        let mut state = self.state();
        state.ensure_reachable()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let listener_id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.insert(listener_id, sender);

        let weak: Weak<Mutex<State>> = Arc::downgrade(&self.state);
        let guard = WatchGuard::new(move || {
            if let Some(state) = weak.upgrade() {
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .listeners
                    .remove(&listener_id);
            }
        });

        Ok(RemoteWatch::new(receiver, guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn merge_keeps_untouched_fields_and_overwrite_drops_them() {
        let remote = MemoryRemote::new();
        remote
            .upsert("a", fields(json!({"x": 1, "y": 2})), WriteMode::Overwrite)
            .await
            .unwrap();

        remote
            .upsert("a", fields(json!({"y": 3})), WriteMode::Merge)
            .await
            .unwrap();
        let doc = remote.get("a").await.unwrap().unwrap();
        assert_eq!(Value::Object(doc.fields), json!({"x": 1, "y": 3}));

        remote
            .upsert("a", fields(json!({"z": 4})), WriteMode::Overwrite)
            .await
            .unwrap();
        let doc = remote.get("a").await.unwrap().unwrap();
        assert_eq!(Value::Object(doc.fields), json!({"z": 4}));
    }

    #[tokio::test]
    async fn unreachable_remote_fails_every_call() {
        let remote = MemoryRemote::new();
        remote.set_unreachable(true);

        assert!(remote.connect().await.is_err());
        assert!(remote.list().await.is_err());
        assert!(remote.delete("a").await.is_err());
        assert!(remote.watch().is_err());
    }

    #[tokio::test]
    async fn commit_emits_one_snapshot_per_batch() {
        let remote = MemoryRemote::new();
        let mut watch = remote.watch().unwrap();

        remote
            .commit(vec![
                BatchOp::Set {
                    key: "a".to_string(),
                    fields: Map::new(),
                    mode: WriteMode::Overwrite,
                },
                BatchOp::Set {
                    key: "b".to_string(),
                    fields: Map::new(),
                    mode: WriteMode::Overwrite,
                },
            ])
            .await
            .unwrap();

        let Some(WatchEvent::Snapshot(docs)) = watch.recv().await else {
            panic!("expected snapshot");
        };
        assert_eq!(docs.len(), 2);
        assert!(watch.events.try_recv().is_err());
        assert_eq!(remote.commit_count(), 1);
    }

    #[tokio::test]
    async fn dropping_watch_unregisters_listener() {
        let remote = MemoryRemote::new();
        let watch = remote.watch().unwrap();
        assert_eq!(remote.listener_count(), 1);

        drop(watch);
        assert_eq!(remote.listener_count(), 0);
    }
}
