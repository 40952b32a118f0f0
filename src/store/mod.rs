//! # Remote Store Adapter
//!
//! Thin contract over a remote document store. Documents are JSON records
//! scoped to one owner and addressed by an opaque [`RemoteRef`] that only
//! the store assigns.
//!
//! ## Layers
//!
//! - [`DocumentStore`]: untyped, object-safe trait implemented by
//!   [`MemoryStore`] and [`HttpStore`]
//! - [`Collection`]: typed per-kind adapter used by the sync services.
//!   It assigns local ids, maps documents onto entities and collapses
//!   update/delete failures to `false`
//!
//! No caching happens at this level; every call goes to the store.

pub mod http;
pub mod memory;

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::shared::error::{SyncError, SyncResult};
use crate::shared::lock;
use crate::shared::models::{Entity, LocalId, LocalIdAllocator, OwnerId, RemoteRef};

pub use http::HttpStore;
pub use memory::{MemoryStore, StoreOp};

/// Document payload
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Full windows pushed by the store, newest first
pub type SnapshotStream = BoxStream<'static, SyncResult<Vec<Document>>>;

/// Field holding the local id inside a document
pub const LOCAL_ID_FIELD: &str = "id";

/// A stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "ref")]
    pub remote_ref: RemoteRef,
    #[serde(rename = "userId")]
    pub owner: OwnerId,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub fields: Fields,
}

impl Document {
    /// Deserialize the payload into `T`
    pub fn decode<T: DeserializeOwned>(&self) -> SyncResult<T> {
        Ok(serde_json::from_value(serde_json::Value::Object(
            self.fields.clone(),
        ))?)
    }

    /// Local id persisted with the document, if any
    pub fn local_id(&self) -> Option<LocalId> {
        self.fields
            .get(LOCAL_ID_FIELD)
            .and_then(serde_json::Value::as_i64)
            .map(LocalId)
    }
}

/// One write inside an atomic batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchWrite {
    /// New document; the store assigns its ref and timestamp
    Create {
        collection: String,
        owner: OwnerId,
        fields: Fields,
    },
    Update {
        collection: String,
        #[serde(rename = "ref")]
        remote_ref: RemoteRef,
        fields: Fields,
    },
    Delete {
        collection: String,
        #[serde(rename = "ref")]
        remote_ref: RemoteRef,
    },
}

impl BatchWrite {
    /// Target document; `None` for a create
    pub fn remote_ref(&self) -> Option<&RemoteRef> {
        match self {
            Self::Create { .. } => None,
            Self::Update { remote_ref, .. } | Self::Delete { remote_ref, .. } => Some(remote_ref),
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            Self::Create { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. } => collection,
        }
    }
}

/// Serialize `value` into a document payload
pub fn to_fields<T: Serialize>(value: &T) -> SyncResult<Fields> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(fields) => Ok(fields),
        other => Err(SyncError::serialization(format!(
            "expected an object payload, got {}",
            other
        ))),
    }
}

/// Remote document store contract
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents of `owner`, oldest first
    async fn list(&self, collection: &str, owner: &OwnerId) -> SyncResult<Vec<Document>>;

    /// Store a new document; the store assigns its ref and timestamp
    async fn create(&self, collection: &str, owner: &OwnerId, fields: Fields) -> SyncResult<Document>;

    /// Merge `fields` into an existing document
    async fn update(&self, collection: &str, remote_ref: &RemoteRef, fields: Fields) -> SyncResult<()>;

    async fn delete(&self, collection: &str, remote_ref: &RemoteRef) -> SyncResult<()>;

    /// Apply every write or none of them
    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> SyncResult<()>;

    /// Stream the `limit` newest documents of `owner`; the first item is the current window
    async fn watch_window(
        &self,
        collection: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> SyncResult<SnapshotStream>;
}

/// Typed adapter for one entity kind
pub struct Collection<E: Entity> {
    store: Arc<dyn DocumentStore>,
    ids: Arc<LocalIdAllocator>,
    /// Ids handed to documents stored without one, so they stay stable
    assigned: Mutex<HashMap<RemoteRef, LocalId>>,
    _kind: PhantomData<fn() -> E>,
}

impl<E: Entity> Collection<E> {
    pub fn new(store: Arc<dyn DocumentStore>, ids: Arc<LocalIdAllocator>) -> Self {
        Self {
            store,
            ids,
            assigned: Mutex::new(HashMap::new()),
            _kind: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn list(&self, owner: &OwnerId) -> SyncResult<Vec<E>> {
        let documents = self.store.list(E::COLLECTION, owner).await?;
        Ok(self.decode_all(&documents))
    }

    /// Map documents onto entities with unique local ids.
    ///
    /// Documents that fail to decode are skipped.
    pub fn decode_all(&self, documents: &[Document]) -> Vec<E> {
        let mut seen = HashSet::with_capacity(documents.len());
        let mut entities = Vec::with_capacity(documents.len());

        for document in documents {
            let local_id = match document.local_id() {
                Some(id) if !seen.contains(&id) => {
                    self.ids.observe(id);
                    id
                }
                _ => self.assigned_id(&document.remote_ref, &seen),
            };

            match E::from_document(local_id, document) {
                Ok(entity) => {
                    seen.insert(local_id);
                    entities.push(entity);
                }
                Err(e) => {
                    tracing::warn!(
                        "[STORE] Skipping undecodable document {} in {}: {}",
                        document.remote_ref,
                        E::COLLECTION,
                        e
                    );
                }
            }
        }

        entities
    }

    fn assigned_id(&self, remote_ref: &RemoteRef, seen: &HashSet<LocalId>) -> LocalId {
        let mut assigned = lock(&self.assigned);
        match assigned.get(remote_ref) {
            Some(id) if !seen.contains(id) => *id,
            _ => {
                let id = self.ids.next_id();
                assigned.insert(remote_ref.clone(), id);
                id
            }
        }
    }

    pub async fn create(&self, owner: &OwnerId, draft: &E::Draft) -> SyncResult<E> {
        let local_id = self.ids.next_id();
        let mut fields = to_fields(draft)?;
        fields.insert(LOCAL_ID_FIELD.to_string(), local_id.0.into());

        let document = self.store.create(E::COLLECTION, owner, fields).await?;
        E::from_document(local_id, &document)
    }

    /// Create every draft in one atomic batch.
    ///
    /// Either all documents exist afterwards or none do.
    pub async fn create_all(&self, owner: &OwnerId, drafts: &[E::Draft]) -> SyncResult<()> {
        let mut writes = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let mut fields = to_fields(draft)?;
            fields.insert(LOCAL_ID_FIELD.to_string(), self.ids.next_id().0.into());
            writes.push(BatchWrite::Create {
                collection: E::COLLECTION.to_string(),
                owner: owner.clone(),
                fields,
            });
        }
        self.store.commit_batch(writes).await
    }

    /// `false` when the store refused or could not be reached
    pub async fn update(&self, remote_ref: &RemoteRef, patch: &E::Patch) -> bool {
        let fields = match to_fields(patch) {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!("[STORE] Cannot encode patch for {}: {}", remote_ref, e);
                return false;
            }
        };
        match self.store.update(E::COLLECTION, remote_ref, fields).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("[STORE] Update of {}/{} failed: {}", E::COLLECTION, remote_ref, e);
                false
            }
        }
    }

    pub async fn delete(&self, remote_ref: &RemoteRef) -> bool {
        match self.store.delete(E::COLLECTION, remote_ref).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("[STORE] Delete of {}/{} failed: {}", E::COLLECTION, remote_ref, e);
                false
            }
        }
    }

    /// Drop ids remembered for documents stored without one
    pub fn forget_assigned(&self) {
        lock(&self.assigned).clear();
    }
}
