//! Domain models
//!
//! Identifiers, the [`Entity`] contract implemented by every synchronized
//! kind, and the concrete kinds themselves.

pub mod category;
pub mod notification;
pub mod product;
pub mod user;

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

use crate::shared::error::SyncResult;
use crate::store::Document;

pub use category::{Category, CategoryDraft, CategoryPatch};
pub use notification::{Notification, NotificationDraft, NotificationKind, NotificationPatch};
pub use product::{Product, ProductDraft, ProductPatch, StockStatus};
pub use user::{Role, User};

/// Domain-visible identifier, unique within one container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub i64);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle assigned by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteRef(String);

impl RemoteRef {
    /// Only store adapters mint remote refs.
    pub(crate) fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of the authenticated owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out local ids.
///
/// Seeded from the wall clock in milliseconds so ids stay distinct from
/// those persisted by earlier sessions, then strictly increasing.
#[derive(Debug)]
pub struct LocalIdAllocator {
    next: AtomicI64,
}

impl LocalIdAllocator {
    pub fn new() -> Self {
        Self::starting_at(chrono::Utc::now().timestamp_millis())
    }

    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }

    pub fn next_id(&self) -> LocalId {
        LocalId(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Make sure ids handed out later never collide with `id`.
    pub fn observe(&self, id: LocalId) {
        self.next.fetch_max(id.0.saturating_add(1), Ordering::SeqCst);
    }
}

impl Default for LocalIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A record kind mirrored from one remote collection.
pub trait Entity: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Fields supplied on creation
    type Draft: Serialize + fmt::Debug + Send + Sync;
    /// Partial update; absent fields are left untouched
    type Patch: Serialize + fmt::Debug + Send + Sync;

    /// Remote collection name
    const COLLECTION: &'static str;

    fn local_id(&self) -> LocalId;

    fn remote_ref(&self) -> &RemoteRef;

    /// Map a stored document onto the entity.
    fn from_document(local_id: LocalId, document: &Document) -> SyncResult<Self>;

    /// Apply a patch that the remote store already accepted.
    fn apply_patch(&mut self, patch: &Self::Patch);
}
