//! Local-first synchronization of the owner list.
//!
//! [`SyncStore`] keeps the canonical in-memory record set and coordinates a
//! remote document store with a local cache:
//!
//! - reads prefer a non-empty remote collection and fall back to the cache;
//! - writes hit the cache first, then the remote on a best-effort basis, and
//!   report whether the remote confirmed them;
//! - a live subscription pushes full snapshots and refreshes the cache.
//!
//! Remote failures never escape as faults: they turn into `false`, a fallback
//! value, or an error that still carries what was applied locally.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::AbortHandle;

use crate::cache::{LocalCache, RecordCache, DEFAULT_CACHE_KEY};
use crate::clock::{Clock, SystemClock};
use crate::export::{parse_import, render_json_export};
use crate::models::{
    dedupe_by_id, normalize_record_set, remove_record, upsert_record, Owner, OwnerDraft, OwnerId,
};
use crate::notify::{Notifier, TracingNotifier};
use crate::remote::{
    BatchOp, Document, RemoteError, RemoteResult, RemoteStore, RemoteWatch, WatchEvent, WriteMode,
};
use crate::{Error, Result};


const MSG_SAVED: &str = "Changes saved! Everyone can now see the updated owners.";
const MSG_SAVED_LOCALLY: &str = "Saved locally only. Please check your internet connection.";
const MSG_OFFLINE_LOAD: &str = "Working offline: showing locally saved owners.";
const MSG_LISTENER_ERROR: &str = "Connection issue. Some updates may be delayed.";

type SharedRecords = Arc<RwLock<Option<Vec<Owner>>>>;

/// What the remote knows about an id missing from the local set.
enum RemoteLookup {
    Found(Owner),
    Absent,
    Unknown(String),
}

/// Result of a reachability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Live feed of full record-set snapshots.
///
/// Dropping the subscription stops the feed and releases the remote listener.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<Result<Vec<Owner>>>,
    handle: AbortHandle,
}

impl Subscription {
    /// Wait for the next snapshot. `None` once the feed has been torn down.
    pub async fn next(&mut self) -> Option<Result<Vec<Owner>>> {
        self.events.recv().await
    }

    /// Whether the feed is still running
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the feed
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Owner record set synchronized between a remote store and a local cache.
///
/// Construct one per collection at the composition root and share it by
/// reference. Mutating operations are queued behind a single write gate, so
/// overlapping calls run one at a time in arrival order.
pub struct SyncStore<R, C> {
    remote: R,
    cache: Arc<RecordCache<C>>,
    records: SharedRecords,
    initialized: AtomicBool,
    write_gate: Mutex<()>,
    subscription: StdMutex<Option<AbortHandle>>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl<R, C> SyncStore<R, C>
where
    R: RemoteStore,
    C: LocalCache,
{
    /// Store caching under the default `lioreStoryOwners` key
    pub fn new(remote: R, cache: C) -> Self {
        Self::with_cache_key(remote, cache, DEFAULT_CACHE_KEY)
    }

    pub fn with_cache_key(remote: R, cache: C, cache_key: impl Into<String>) -> Self {
        Self {
            remote,
            cache: Arc::new(RecordCache::new(cache, cache_key)),
            records: Arc::new(RwLock::new(None)),
            initialized: AtomicBool::new(false),
            write_gate: Mutex::new(()),
            subscription: StdMutex::new(None),
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub fn cache(&self) -> &RecordCache<C> {
        &self.cache
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// In-memory record set; `None` until something has been loaded or written.
    pub async fn records(&self) -> Option<Vec<Owner>> {
        self.records.read().await.clone()
    }

    /// Connect to the remote store. No-op once connected; a failed attempt is
    /// retried on the next call.
    pub async fn initialize(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        self.remote
            .connect()
            .await
            .map_err(|error| Error::Connection(error.to_string()))?;
        self.initialized.store(true, Ordering::Release);
        tracing::info!("Remote store initialized");
        Ok(())
    }

    async fn remote_ready(&self) -> bool {
        match self.initialize().await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("Remote store unavailable, continuing with local cache: {error}");
                false
            }
        }
    }

    /// Load the record set, preferring a non-empty remote collection.
    ///
    /// Never fails: an unreachable remote or an empty collection falls back
    /// to whatever the cache holds, possibly nothing.
    pub async fn load(&self) -> Vec<Owner> {
        let _gate = self.write_gate.lock().await;
        tracing::debug!("Loading owners");

        if self.remote_ready().await {
            match self.fetch_remote().await {
                Ok(owners) if !owners.is_empty() => {
                    tracing::info!(count = owners.len(), "Loaded owners from remote store");
                    self.replace_local(owners.clone()).await;
                    return owners;
                }
                Ok(_) => {
                    tracing::debug!("Remote collection is empty, checking local cache");
                    let owners = self.cache.read();
                    self.replace_local(owners.clone()).await;
                    return owners;
                }
                Err(error) => {
                    tracing::warn!("Remote load failed, using local cache: {error}");
                }
            }
        }

        let owners = self.cache.read();
        tracing::info!(count = owners.len(), "Using local cache fallback");
        *self.records.write().await = Some(owners.clone());
        self.notifier.warning(MSG_OFFLINE_LOAD);
        owners
    }

    /// Replace the whole record set.
    ///
    /// The cache is written first and unconditionally. The remote collection
    /// is then made equal to `records` in one batch: documents missing from
    /// `records` are deleted, every record is fully overwritten. Returns
    /// whether that batch committed.
    pub async fn save_all(&self, records: Vec<Owner>) -> bool {
        let _gate = self.write_gate.lock().await;
        let records = normalize_record_set(records, &self.clock.today_iso());
        tracing::debug!(count = records.len(), "Saving full owner set");

        self.replace_local(records.clone()).await;

        if !self.remote_ready().await {
            self.notifier.error(MSG_SAVED_LOCALLY);
            return false;
        }

        match self.replace_remote(&records).await {
            Ok(()) => {
                tracing::info!(count = records.len(), "Saved owners to remote store");
                self.notifier.success(MSG_SAVED);
                true
            }
            Err(error) => {
                tracing::error!("Remote save failed: {error}");
                self.notifier.error(MSG_SAVED_LOCALLY);
                false
            }
        }
    }

    async fn replace_remote(&self, records: &[Owner]) -> RemoteResult<()> {
        let new_keys: HashSet<&str> = records.iter().map(|owner| owner.id.as_str()).collect();
        let existing = self.remote.list().await?;

        let mut ops: Vec<BatchOp> = existing
            .into_iter()
            .filter(|document| !new_keys.contains(document.key.as_str()))
            .map(|document| {
                tracing::debug!(key = %document.key, "Deleting removed owner");
                BatchOp::Delete { key: document.key }
            })
            .collect();

        for owner in records {
            let fields = owner
                .to_document()
                .map_err(|error| RemoteError::Payload(error.to_string()))?;
            ops.push(BatchOp::Set {
                key: owner.id.to_string(),
                fields,
                mode: WriteMode::Overwrite,
            });
        }

        self.remote.commit(ops).await
    }

    /// Create or update a single owner.
    ///
    /// A draft without an id creates an owner with a fresh id and
    /// `date_added`; `last_updated` is always stamped. Only the fields present
    /// in the draft are merged into the remote document. The local set is
    /// updated even when the remote write fails, in which case the returned
    /// [`Error::Write`] carries the id. An id unknown locally is looked up
    /// remotely first; if that lookup fails nothing is written remotely.
    pub async fn save_one(&self, draft: OwnerDraft) -> Result<OwnerId> {
        let _gate = self.write_gate.lock().await;
        let today = self.clock.today_iso();
        let remote_ready = self.remote_ready().await;
        let known = self.current_records().await;

        // An id the remote could not confirm is neither stamped as new nor
        // written remotely.
        let mut unconfirmed: Option<String> = None;
        let (mut owner, created) = match draft.existing_id() {
            Some(id) => match known.iter().find(|owner| &owner.id == id) {
                Some(existing) => (existing.clone(), false),
                None => match self.lookup_remote_owner(id, remote_ready).await {
                    RemoteLookup::Found(existing) => (existing, false),
                    RemoteLookup::Absent => (blank_owner(id.clone(), &today), true),
                    RemoteLookup::Unknown(reason) => {
                        unconfirmed = Some(reason);
                        (blank_owner(id.clone(), &today), false)
                    }
                },
            },
            None => (blank_owner(unused_id(&known), &today), true),
        };
        owner.merge_draft(&draft);
        owner.last_updated.clone_from(&today);

        let id = owner.id.clone();
        tracing::debug!(%id, created, owner_name = %owner.owner_name, "Saving owner");
        self.update_local(|records| upsert_record(records, owner)).await;

        let action = if created { "added" } else { "updated" };
        let result = if let Some(reason) = unconfirmed {
            Err(reason)
        } else if remote_ready {
            let payload = draft.merge_payload(created.then_some(today.as_str()), &today);
            self.remote
                .upsert(id.as_str(), payload, WriteMode::Merge)
                .await
                .map_err(|error| error.to_string())
        } else {
            Err("remote store unavailable".to_string())
        };

        match result {
            Ok(()) => {
                tracing::info!(%id, "Owner {action} in remote store");
                self.notifier.success(&format!("Owner {action} successfully!"));
                Ok(id)
            }
            Err(reason) => {
                tracing::error!(%id, "Remote owner write failed: {reason}");
                self.notifier
                    .error(&format!("Owner {action} locally only: {reason}"));
                Err(Error::Write { id, reason })
            }
        }
    }

    async fn lookup_remote_owner(&self, id: &OwnerId, remote_ready: bool) -> RemoteLookup {
        if !remote_ready {
            return RemoteLookup::Unknown("remote store unavailable".to_string());
        }
        match self.remote.get(id.as_str()).await {
            Ok(Some(document)) => match Owner::from_document(&document.key, document.fields) {
                Ok(owner) => RemoteLookup::Found(owner),
                Err(error) => {
                    tracing::warn!(%id, "Remote owner is malformed: {error}");
                    RemoteLookup::Unknown(format!("remote owner is malformed: {error}"))
                }
            },
            Ok(None) => RemoteLookup::Absent,
            Err(error) => {
                tracing::warn!(%id, "Could not look up owner remotely: {error}");
                RemoteLookup::Unknown(format!("could not look up owner remotely: {error}"))
            }
        }
    }

    /// Delete one owner. Local removal always happens; returns whether the
    /// remote confirmed the deletion.
    pub async fn delete_one(&self, id: &OwnerId) -> bool {
        let _gate = self.write_gate.lock().await;
        tracing::debug!(%id, "Deleting owner");

        self.update_local(|records| {
            remove_record(records, id);
        })
        .await;

        if !self.remote_ready().await {
            self.notifier
                .error("Owner removed locally only. Please check your internet connection.");
            return false;
        }

        match self.remote.delete(id.as_str()).await {
            Ok(()) => {
                tracing::info!(%id, "Owner deleted from remote store");
                self.notifier.success("Owner deleted successfully!");
                true
            }
            Err(error) => {
                tracing::error!(%id, "Remote delete failed: {error}");
                self.notifier
                    .error(&format!("Owner removed locally only: {error}"));
                false
            }
        }
    }

    /// Remove every owner locally and remotely.
    pub async fn clear_all(&self) -> bool {
        let _gate = self.write_gate.lock().await;
        tracing::debug!("Clearing all owners");

        {
            let mut records = self.records.write().await;
            self.cache.clear();
            *records = Some(Vec::new());
        }

        if !self.remote_ready().await {
            self.notifier.error(MSG_SAVED_LOCALLY);
            return false;
        }

        let result = match self.remote.list().await {
            Ok(documents) => {
                let ops = documents
                    .into_iter()
                    .map(|document| BatchOp::Delete { key: document.key })
                    .collect();
                self.remote.commit(ops).await
            }
            Err(error) => Err(error),
        };

        match result {
            Ok(()) => {
                tracing::info!("Cleared remote collection");
                self.notifier.success("All data cleared successfully!");
                true
            }
            Err(error) => {
                tracing::error!("Failed to clear remote collection: {error}");
                self.notifier
                    .error(&format!("Failed to clear remote data: {error}"));
                false
            }
        }
    }

    /// Probe the remote store with a minimal read.
    pub async fn connection_status(&self) -> ConnectionStatus {
        if let Err(error) = self.initialize().await {
            return ConnectionStatus {
                connected: false,
                message: "Remote store is not reachable or not configured".to_string(),
                error: Some(error.to_string()),
            };
        }

        match self.remote.probe().await {
            Ok(()) => ConnectionStatus {
                connected: true,
                message: "Connected to remote store".to_string(),
                error: None,
            },
            Err(error) => ConnectionStatus {
                connected: false,
                message: "No internet connection".to_string(),
                error: Some(error.to_string()),
            },
        }
    }

    /// Serialize the current record set, loading it first if needed.
    pub async fn export_json(&self) -> Result<String> {
        let records = match self.records().await {
            Some(records) => records,
            None => self.load().await,
        };
        let rendered = render_json_export(&records)?;
        self.notifier
            .success(&format!("Exported {} owners successfully!", records.len()));
        Ok(rendered)
    }

    /// Replace everything with the owners in a backup.
    ///
    /// A payload that is not a JSON array of owners fails with
    /// [`Error::Format`] before anything is touched. Otherwise returns what
    /// [`Self::save_all`] returned.
    pub async fn import_json(&self, raw: &str) -> Result<bool> {
        let owners = match parse_import(raw) {
            Ok(owners) => owners,
            Err(error) => {
                tracing::error!("Import failed: {error}");
                self.notifier.error("Invalid backup file format");
                return Err(error);
            }
        };

        let count = owners.len();
        tracing::info!(count, "Importing owners from backup");
        let synced = self.save_all(owners).await;
        if synced {
            self.notifier
                .success(&format!("Imported {count} owners successfully!"));
        } else {
            self.notifier.error("Failed to import backup data");
        }
        Ok(synced)
    }

    /// Stop the active subscription, if any.
    pub fn unsubscribe(&self) {
        if let Some(handle) = self.subscription_slot().take() {
            handle.abort();
            tracing::info!("Live updates disconnected");
        }
    }

    fn subscription_slot(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_remote(&self) -> RemoteResult<Vec<Owner>> {
        owners_from_documents(self.remote.list().await?)
    }

    async fn current_records(&self) -> Vec<Owner> {
        match self.records.read().await.as_ref() {
            Some(records) => records.clone(),
            None => self.cache.read(),
        }
    }

    /// Overwrite the in-memory set and the cache in one step.
    async fn replace_local(&self, owners: Vec<Owner>) {
        let mut records = self.records.write().await;
        self.cache.write(&owners);
        *records = Some(owners);
    }

    /// Apply `change` to the in-memory set (seeded from the cache when
    /// nothing is loaded yet) and mirror the result to the cache.
    async fn update_local(&self, change: impl FnOnce(&mut Vec<Owner>)) {
        let mut records = self.records.write().await;
        let mut updated = records.take().unwrap_or_else(|| self.cache.read());
        change(&mut updated);
        self.cache.write(&updated);
        *records = Some(updated);
    }
}

impl<R, C> SyncStore<R, C>
where
    R: RemoteStore,
    C: LocalCache + Send + Sync + 'static,
{
    /// Start a live feed of full record-set snapshots.
    ///
    /// Any previous subscription of this store is torn down first. Each
    /// snapshot refreshes the in-memory set and the cache before it is
    /// delivered; feed errors arrive as [`Error::Listener`] items.
    pub async fn subscribe(&self) -> Result<Subscription> {
        self.unsubscribe();
        self.initialize().await?;

        let watch = self
            .remote
            .watch()
            .map_err(|error| Error::Listener(error.to_string()))?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(forward_snapshots(
            watch,
            Arc::clone(&self.cache),
            Arc::clone(&self.records),
            Arc::clone(&self.notifier),
            sender,
        ));

        let handle = task.abort_handle();
        *self.subscription_slot() = Some(handle.clone());
        tracing::info!("Live updates activated");

        Ok(Subscription {
            events: receiver,
            handle,
        })
    }
}

impl<R, C> Drop for SyncStore<R, C> {
    fn drop(&mut self) {
        let slot = self
            .subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

async fn forward_snapshots<C: LocalCache>(
    mut watch: RemoteWatch,
    cache: Arc<RecordCache<C>>,
    records: SharedRecords,
    notifier: Arc<dyn Notifier>,
    events: mpsc::UnboundedSender<Result<Vec<Owner>>>,
) {
    while let Some(event) = watch.recv().await {
        let item = match event {
            WatchEvent::Snapshot(documents) => match owners_from_documents(documents) {
                Ok(owners) => {
                    let mut current = records.write().await;
                    cache.write(&owners);
                    *current = Some(owners.clone());
                    tracing::debug!(count = owners.len(), "Live update received");
                    Ok(owners)
                }
                Err(error) => {
                    tracing::warn!("Discarding malformed live update: {error}");
                    Err(Error::Listener(error.to_string()))
                }
            },
            WatchEvent::Error(error) => {
                tracing::error!("Live update listener error: {error}");
                notifier.error(MSG_LISTENER_ERROR);
                Err(Error::Listener(error.to_string()))
            }
        };

        if events.send(item).is_err() {
            break;
        }
    }
    tracing::debug!("Live update forwarder stopped");
}

fn owners_from_documents(documents: Vec<Document>) -> RemoteResult<Vec<Owner>> {
    let owners = documents
        .into_iter()
        .map(|document| {
            Owner::from_document(&document.key, document.fields).map_err(|error| {
                RemoteError::Payload(format!("document {}: {error}", document.key))
            })
        })
        .collect::<RemoteResult<Vec<_>>>()?;
    Ok(dedupe_by_id(owners))
}

fn blank_owner(id: OwnerId, today: &str) -> Owner {
    Owner {
        id,
        owner_name: String::new(),
        date_added: today.to_string(),
        last_updated: today.to_string(),
        extra: serde_json::Map::new(),
    }
}

/// Generate an id not used by any known owner.
fn unused_id(known: &[Owner]) -> OwnerId {
    loop {
        let id = OwnerId::generate();
        if known.iter().all(|owner| owner.id != id) {
            return id;
        }
        tracing::warn!(%id, "Generated id collided with an existing owner, retrying");
    }
}
