//! # Sync Service
//!
//! [`EntityService`] keeps one [`Container`] consistent with one remote
//! collection. Writes go to the store first; the container changes only
//! after the store accepted them, so a failed call leaves it untouched.
//!
//! ## Conflict policy
//!
//! `update` and `delete` patch the container locally instead of reloading.
//! A reload racing with them may land before or after; whichever commits
//! last wins. A local patch whose target was replaced in the meantime
//! (different remote ref, or gone) is discarded. Results arriving after
//! the owner changed are always discarded.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::container::{Container, PatchOutcome};
use crate::shared::error::{SyncError, SyncResult};
use crate::shared::lock;
use crate::shared::models::{Entity, LocalId, LocalIdAllocator, OwnerId};
use crate::store::{Collection, DocumentStore};

/// A per-owner component driven by the session lifecycle
#[async_trait]
pub trait SessionBound: Send + Sync {
    fn name(&self) -> &'static str;

    /// Bind to `owner`; returns `false` when already bound to it
    fn claim(&self, owner: &OwnerId) -> bool;

    /// Drop everything held for the current owner
    fn release(&self);

    /// Repopulate from the store; returns the number of entities loaded
    async fn reload(&self) -> SyncResult<usize>;
}

/// Sync service for one entity kind
pub struct EntityService<E: Entity> {
    name: &'static str,
    collection: Collection<E>,
    container: Container<E>,
    /// Local ids with a write in flight
    in_flight: Mutex<HashSet<LocalId>>,
    /// Created for an owner whose collection is empty
    defaults: Vec<E::Draft>,
}

/// Clears the in-flight mark when the operation ends, however it ends
struct InFlight<'a> {
    set: &'a Mutex<HashSet<LocalId>>,
    local_id: LocalId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.set).remove(&self.local_id);
    }
}

impl<E: Entity> EntityService<E> {
    pub fn new(name: &'static str, store: Arc<dyn DocumentStore>, ids: Arc<LocalIdAllocator>) -> Self {
        Self {
            name,
            collection: Collection::new(store, ids),
            container: Container::new(name),
            in_flight: Mutex::new(HashSet::new()),
            defaults: Vec::new(),
        }
    }

    /// Seed an empty collection with `drafts` on reload
    pub fn with_defaults(mut self, drafts: Vec<E::Draft>) -> Self {
        self.defaults = drafts;
        self
    }

    /// Read-only view of the container
    pub fn container(&self) -> &Container<E> {
        &self.container
    }

    pub fn all(&self) -> Arc<Vec<E>> {
        self.container.read()
    }

    pub fn get(&self, local_id: LocalId) -> Option<E> {
        self.container.get(local_id)
    }

    pub fn find_by(&self, predicate: impl Fn(&E) -> bool) -> Vec<E> {
        self.container
            .read()
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    pub fn is_pending(&self, local_id: LocalId) -> bool {
        lock(&self.in_flight).contains(&local_id)
    }

    fn owner(&self) -> SyncResult<OwnerId> {
        self.container.owner().ok_or(SyncError::NotAuthenticated)
    }

    fn begin(&self, local_id: LocalId) -> SyncResult<InFlight<'_>> {
        let mut in_flight = lock(&self.in_flight);
        if !in_flight.insert(local_id) {
            return Err(SyncError::OperationPending { local_id });
        }
        Ok(InFlight {
            set: &self.in_flight,
            local_id,
        })
    }

    fn session_changed(&self, owner: &OwnerId) -> bool {
        self.container.owner().as_ref() != Some(owner)
    }

    /// Create remotely, then append.
    pub async fn create(&self, draft: &E::Draft) -> SyncResult<E> {
        let owner = self.owner()?;
        let entity = self.collection.create(&owner, draft).await.map_err(|e| {
            tracing::warn!("[SYNC] {} create failed: {}", self.name, e);
            e
        })?;

        if self.container.append(&owner, entity.clone()) {
            tracing::info!("[SYNC] {} created {}", self.name, entity.local_id());
            return Ok(entity);
        }
        if self.session_changed(&owner) {
            tracing::warn!(
                "[SYNC] {} create for {} resolved after the session changed; discarding",
                self.name,
                owner
            );
            return Err(SyncError::SessionChanged);
        }
        // A concurrent reload already brought it in.
        Ok(entity)
    }

    /// Patch remotely, then apply `patch` to the local entry in place.
    ///
    /// Returns the entity as patched locally.
    pub async fn update(&self, local_id: LocalId, patch: E::Patch) -> SyncResult<E> {
        let owner = self.owner()?;
        let current = self.get(local_id).ok_or(SyncError::NotFound { local_id })?;
        let _guard = self.begin(local_id)?;

        if !self.collection.update(current.remote_ref(), &patch).await {
            return Err(SyncError::RemoteRejected { operation: "update" });
        }

        let mut patched = current.clone();
        patched.apply_patch(&patch);
        let outcome = self
            .container
            .patch(&owner, local_id, current.remote_ref(), |entry| entry.apply_patch(&patch));

        match outcome {
            PatchOutcome::Applied => {
                tracing::debug!("[SYNC] {} patched {}", self.name, local_id);
                Ok(self.get(local_id).unwrap_or(patched))
            }
            PatchOutcome::Discarded => {
                tracing::warn!(
                    "[SYNC] {} update of {} accepted remotely but its target is gone locally",
                    self.name,
                    local_id
                );
                if self.session_changed(&owner) {
                    return Err(SyncError::SessionChanged);
                }
                // The write itself succeeded; the next reload will show it.
                Ok(patched)
            }
        }
    }

    /// Delete remotely, then remove locally.
    pub async fn delete(&self, local_id: LocalId) -> SyncResult<E> {
        let owner = self.owner()?;
        let current = self.get(local_id).ok_or(SyncError::NotFound { local_id })?;
        let _guard = self.begin(local_id)?;

        if !self.collection.delete(current.remote_ref()).await {
            return Err(SyncError::RemoteRejected { operation: "delete" });
        }

        match self.container.remove(&owner, local_id, current.remote_ref()) {
            PatchOutcome::Applied => {
                tracing::info!("[SYNC] {} deleted {}", self.name, local_id);
                Ok(current)
            }
            PatchOutcome::Discarded if self.session_changed(&owner) => Err(SyncError::SessionChanged),
            PatchOutcome::Discarded => Ok(current),
        }
    }

    /// Replace the container with the owner's full listing.
    ///
    /// On failure the container keeps its previous contents.
    pub async fn reload(&self) -> SyncResult<usize> {
        let owner = self.owner()?;
        let mut items = self.collection.list(&owner).await.map_err(|e| {
            tracing::warn!("[SYNC] {} reload failed, keeping current contents: {}", self.name, e);
            e
        })?;

        if items.is_empty() && !self.defaults.is_empty() {
            self.seed(&owner).await?;
            items = self.collection.list(&owner).await?;
        }

        let count = items.len();
        if !self.container.replace_for(&owner, items) {
            tracing::info!("[SYNC] {} reload for {} arrived after sign-out; discarded", self.name, owner);
            return Err(SyncError::SessionChanged);
        }
        tracing::info!("[SYNC] {} loaded {} items for {}", self.name, count, owner);
        Ok(count)
    }

    /// Create the defaults for `owner` as one batch, so an empty collection
    /// either gets all of them or stays empty and is seeded on the next reload.
    async fn seed(&self, owner: &OwnerId) -> SyncResult<()> {
        tracing::info!("[SYNC] Seeding {} default {} for {}", self.defaults.len(), self.name, owner);
        self.collection
            .create_all(owner, &self.defaults)
            .await
            .map_err(|e| {
                tracing::warn!("[SYNC] Seeding {} for {} failed: {}", self.name, owner, e);
                e
            })
    }
}

#[async_trait]
impl<E: Entity> SessionBound for EntityService<E> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn claim(&self, owner: &OwnerId) -> bool {
        let claimed = self.container.claim(owner);
        if claimed {
            self.collection.forget_assigned();
        }
        claimed
    }

    fn release(&self) {
        self.container.release();
        self.collection.forget_assigned();
    }

    async fn reload(&self) -> SyncResult<usize> {
        EntityService::<E>::reload(self).await
    }
}
