//! # In-Memory Document Store
//!
//! A process-local [`DocumentStore`] used by the demo binary and the test
//! suites. It honours the full adapter contract, including owner scoping,
//! atomic batches and pushed windows, and can be told to misbehave.
//!
//! ## Fault injection
//!
//! - [`MemoryStore::set_available`]: every operation fails with `RemoteUnavailable`
//! - [`MemoryStore::fail_next`]: the next call of one operation fails with a given error
//! - [`MemoryStore::set_latency`]: an operation suspends for a while before running
//! - [`MemoryStore::break_watchers`]: every live window receives a `SubscriptionError`
//! - [`MemoryStore::set_validator`]: per-collection write validation

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{BatchWrite, DocumentStore, Document, Fields, SnapshotStream};
use crate::shared::error::{SyncError, SyncResult};
use crate::shared::lock;
use crate::shared::models::{OwnerId, RemoteRef};

/// Store operation, used to target injected faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Create,
    Update,
    Delete,
    Batch,
    Watch,
}

/// Write validator: `Err((field, message))` rejects the write
pub type Validator = Arc<dyn Fn(&Fields) -> Result<(), (String, String)> + Send + Sync>;

/// In-memory document store
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Documents per collection in creation order
    collections: HashMap<String, Vec<Document>>,
    watchers: Vec<Watcher>,
    validators: HashMap<String, Validator>,
    unavailable: bool,
    failures: HashMap<StoreOp, VecDeque<SyncError>>,
    latency: HashMap<StoreOp, Duration>,
    last_created_at: Option<DateTime<Utc>>,
}

struct Watcher {
    collection: String,
    owner: OwnerId,
    limit: usize,
    tx: mpsc::UnboundedSender<SyncResult<Vec<Document>>>,
}

/// A validated batch write waiting to be applied
enum Staged {
    Insert(OwnerId, Fields),
    Set(RemoteRef, Fields),
    Remove(RemoteRef),
}

impl Inner {
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created_at = match self.last_created_at {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(created_at);
        created_at
    }

    fn window(&self, collection: &str, owner: &OwnerId, limit: usize) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .rev()
                    .filter(|document| &document.owner == owner)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn find(&self, collection: &str, remote_ref: &RemoteRef) -> Option<&Document> {
        self.collections
            .get(collection)?
            .iter()
            .find(|document| &document.remote_ref == remote_ref)
    }

    fn validate(&self, collection: &str, fields: &Fields) -> SyncResult<()> {
        match self.validators.get(collection) {
            Some(validator) => {
                validator(fields).map_err(|(field, message)| SyncError::validation(field, message))
            }
            None => Ok(()),
        }
    }

    /// Fields of `remote_ref` after merging `patch`, validated
    fn merged(&self, collection: &str, remote_ref: &RemoteRef, patch: &Fields) -> SyncResult<Fields> {
        let document = self
            .find(collection, remote_ref)
            .ok_or_else(|| SyncError::validation("ref", format!("document {} not found", remote_ref)))?;
        let mut fields = document.fields.clone();
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }
        self.validate(collection, &fields)?;
        Ok(fields)
    }

    fn owner_of(&self, collection: &str, remote_ref: &RemoteRef) -> Option<OwnerId> {
        self.find(collection, remote_ref).map(|document| document.owner.clone())
    }

    fn set_fields(&mut self, collection: &str, remote_ref: &RemoteRef, fields: Fields) {
        if let Some(document) = self
            .collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|d| &d.remote_ref == remote_ref))
        {
            document.fields = fields;
        }
    }

    fn remove(&mut self, collection: &str, remote_ref: &RemoteRef) {
        if let Some(documents) = self.collections.get_mut(collection) {
            documents.retain(|document| &document.remote_ref != remote_ref);
        }
    }

    /// Push the current window to every live watcher of `collection`/`owner`
    fn publish(&mut self, collection: &str, owner: &OwnerId) {
        self.watchers.retain(|watcher| !watcher.tx.is_closed());

        let targets: Vec<(usize, usize)> = self
            .watchers
            .iter()
            .enumerate()
            .filter(|(_, w)| w.collection == collection && &w.owner == owner)
            .map(|(index, w)| (index, w.limit))
            .collect();

        for (index, limit) in targets {
            let window = self.window(collection, owner, limit);
            // a closed receiver is pruned on the next publish
            let _ = self.watchers[index].tx.send(Ok(window));
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle reachability of the store
    pub fn set_available(&self, available: bool) {
        lock(&self.inner).unavailable = !available;
    }

    /// Make the next call of `op` fail with `error`
    pub fn fail_next(&self, op: StoreOp, error: SyncError) {
        lock(&self.inner)
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Suspend every call of `op` for `latency` before it runs
    pub fn set_latency(&self, op: StoreOp, latency: Duration) {
        lock(&self.inner).latency.insert(op, latency);
    }

    pub fn set_validator(&self, collection: &str, validator: Validator) {
        lock(&self.inner)
            .validators
            .insert(collection.to_string(), validator);
    }

    /// Fail every live window with a `SubscriptionError` and close it
    pub fn break_watchers(&self, message: &str) {
        let mut inner = lock(&self.inner);
        for watcher in inner.watchers.drain(..) {
            let _ = watcher.tx.send(Err(SyncError::subscription(message)));
        }
    }

    /// Number of open windows on `collection`
    pub fn active_watchers(&self, collection: &str) -> usize {
        let mut inner = lock(&self.inner);
        inner.watchers.retain(|watcher| !watcher.tx.is_closed());
        inner
            .watchers
            .iter()
            .filter(|watcher| watcher.collection == collection)
            .count()
    }

    /// Snapshot of every document in `collection` owned by `owner`, oldest first
    pub fn documents(&self, collection: &str, owner: &OwnerId) -> Vec<Document> {
        lock(&self.inner)
            .collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| &document.owner == owner)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Insert a document directly, bypassing faults and latency
    pub fn seed(&self, collection: &str, owner: &OwnerId, fields: Fields) -> Document {
        let mut inner = lock(&self.inner);
        let document = Document {
            remote_ref: RemoteRef::new(Uuid::new_v4().simple().to_string()),
            owner: owner.clone(),
            created_at: inner.next_created_at(),
            fields,
        };
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        inner.publish(collection, owner);
        document
    }

    /// Apply injected latency, then injected failures
    async fn enter(&self, op: StoreOp) -> SyncResult<()> {
        let latency = lock(&self.inner).latency.get(&op).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut inner = lock(&self.inner);
        if inner.unavailable {
            return Err(SyncError::unavailable("memory store is offline"));
        }
        if let Some(error) = inner.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str, owner: &OwnerId) -> SyncResult<Vec<Document>> {
        self.enter(StoreOp::List).await?;
        Ok(self.documents(collection, owner))
    }

    async fn create(&self, collection: &str, owner: &OwnerId, fields: Fields) -> SyncResult<Document> {
        self.enter(StoreOp::Create).await?;

        let mut inner = lock(&self.inner);
        inner.validate(collection, &fields)?;

        let document = Document {
            remote_ref: RemoteRef::new(Uuid::new_v4().simple().to_string()),
            owner: owner.clone(),
            created_at: inner.next_created_at(),
            fields,
        };
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        inner.publish(collection, owner);

        tracing::debug!("[STORE] Created {}/{}", collection, document.remote_ref);
        Ok(document)
    }

    async fn update(&self, collection: &str, remote_ref: &RemoteRef, fields: Fields) -> SyncResult<()> {
        self.enter(StoreOp::Update).await?;

        let mut inner = lock(&self.inner);
        let merged = inner.merged(collection, remote_ref, &fields)?;
        let owner = inner.owner_of(collection, remote_ref);
        inner.set_fields(collection, remote_ref, merged);
        if let Some(owner) = owner {
            inner.publish(collection, &owner);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, remote_ref: &RemoteRef) -> SyncResult<()> {
        self.enter(StoreOp::Delete).await?;

        let mut inner = lock(&self.inner);
        if let Some(owner) = inner.owner_of(collection, remote_ref) {
            inner.remove(collection, remote_ref);
            inner.publish(collection, &owner);
        }
        Ok(())
    }

    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> SyncResult<()> {
        self.enter(StoreOp::Batch).await?;

        let mut inner = lock(&self.inner);

        // Validate everything before touching anything.
        let mut staged = Vec::with_capacity(writes.len());
        for write in &writes {
            let step = match write {
                BatchWrite::Create {
                    collection,
                    owner,
                    fields,
                } => {
                    inner.validate(collection, fields)?;
                    Staged::Insert(owner.clone(), fields.clone())
                }
                BatchWrite::Update {
                    collection,
                    remote_ref,
                    fields,
                } => Staged::Set(remote_ref.clone(), inner.merged(collection, remote_ref, fields)?),
                BatchWrite::Delete {
                    collection,
                    remote_ref,
                } => {
                    if inner.find(collection, remote_ref).is_none() {
                        return Err(SyncError::validation(
                            "ref",
                            format!("document {} not found", remote_ref),
                        ));
                    }
                    Staged::Remove(remote_ref.clone())
                }
            };
            staged.push((write.collection().to_string(), step));
        }

        let mut touched: Vec<(String, OwnerId)> = Vec::new();
        for (collection, step) in staged {
            let owner = match &step {
                Staged::Insert(owner, _) => Some(owner.clone()),
                Staged::Set(remote_ref, _) | Staged::Remove(remote_ref) => {
                    inner.owner_of(&collection, remote_ref)
                }
            };
            if let Some(owner) = owner {
                if !touched.iter().any(|(c, o)| c == &collection && o == &owner) {
                    touched.push((collection.clone(), owner));
                }
            }

            match step {
                Staged::Insert(owner, fields) => {
                    let document = Document {
                        remote_ref: RemoteRef::new(Uuid::new_v4().simple().to_string()),
                        owner,
                        created_at: inner.next_created_at(),
                        fields,
                    };
                    inner.collections.entry(collection).or_default().push(document);
                }
                Staged::Set(remote_ref, fields) => inner.set_fields(&collection, &remote_ref, fields),
                Staged::Remove(remote_ref) => inner.remove(&collection, &remote_ref),
            }
        }

        for (collection, owner) in touched {
            inner.publish(&collection, &owner);
        }

        tracing::debug!("[STORE] Committed batch of {} writes", writes.len());
        Ok(())
    }

    async fn watch_window(
        &self,
        collection: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> SyncResult<SnapshotStream> {
        self.enter(StoreOp::Watch).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = lock(&self.inner);
        let _ = tx.send(Ok(inner.window(collection, owner, limit)));
        inner.watchers.push(Watcher {
            collection: collection.to_string(),
            owner: owner.clone(),
            limit,
            tx,
        });

        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|snapshot| (snapshot, rx))
        });
        Ok(stream.boxed())
    }
}
