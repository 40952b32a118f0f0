//! # Realtime Notification Listener
//!
//! Keeps the notification container mirrored on the store's pushed window
//! of the newest notifications of the signed-in owner.
//!
//! ## Features
//!
//! - **Single subscription**: at most one live window per listener;
//!   starting for another owner cancels the previous one first
//! - **Window replace**: every pushed window replaces the container wholesale
//! - **Unread count**: derived from the container on every call
//! - **Batched mutations**: `mark_all_read` and `delete_all` commit as one
//!   atomic batch; the container only changes through the next window
//! - **Reconnection**: governed by [`ReconnectPolicy`]; by default a
//!   subscription error stops the listener and the last window stays
//!
//! Must be started from within a Tokio runtime.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use super::container::Container;
use crate::shared::config::ReconnectPolicy;
use crate::shared::error::{SyncError, SyncResult};
use crate::shared::lock;
use crate::shared::models::{
    Entity, LocalId, LocalIdAllocator, Notification, NotificationDraft, NotificationKind,
    NotificationPatch, OwnerId, User,
};
use crate::store::{to_fields, BatchWrite, Collection, DocumentStore};

enum ListenerState {
    Stopped,
    Running {
        owner: OwnerId,
        generation: u64,
        task: JoinHandle<()>,
    },
}

/// Subscription task context
struct Subscription {
    owner: OwnerId,
    generation: u64,
    window: usize,
    reconnect: ReconnectPolicy,
    collection: Arc<Collection<Notification>>,
    container: Container<Notification>,
    state: Arc<Mutex<ListenerState>>,
}

/// Why a subscription attempt ended
enum Ended {
    /// The listener moved on; exit quietly
    Superseded,
    /// The store closed the stream
    Closed,
    Failed(SyncError),
}

/// Realtime listener manager for notifications
pub struct NotificationListener {
    collection: Arc<Collection<Notification>>,
    container: Container<Notification>,
    window: usize,
    reconnect: ReconnectPolicy,
    state: Arc<Mutex<ListenerState>>,
    generation: Mutex<u64>,
}

impl NotificationListener {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        ids: Arc<LocalIdAllocator>,
        window: usize,
        reconnect: ReconnectPolicy,
    ) -> Self {
        Self {
            collection: Arc::new(Collection::new(store, ids)),
            container: Container::new("notifications"),
            window,
            reconnect,
            state: Arc::new(Mutex::new(ListenerState::Stopped)),
            generation: Mutex::new(0),
        }
    }

    /// Read-only view of the notification container
    pub fn container(&self) -> &Container<Notification> {
        &self.container
    }

    /// Current window, newest first
    pub fn notifications(&self) -> Arc<Vec<Notification>> {
        self.container.read()
    }

    pub fn unread_count(&self) -> usize {
        self.container.read().iter().filter(|n| !n.read).count()
    }

    pub fn is_running(&self) -> bool {
        matches!(*lock(&self.state), ListenerState::Running { .. })
    }

    /// Owner of the live subscription
    pub fn running_for(&self) -> Option<OwnerId> {
        match &*lock(&self.state) {
            ListenerState::Running { owner, .. } => Some(owner.clone()),
            ListenerState::Stopped => None,
        }
    }

    /// Open the window subscription for `user`.
    ///
    /// A no-op while already running for the same user.
    pub fn start(&self, user: &User) {
        let mut state = lock(&self.state);
        if let ListenerState::Running { owner, task, .. } = &*state {
            if owner == &user.uid && !task.is_finished() {
                tracing::debug!("[REALTIME] Already listening for {}", owner);
                return;
            }
        }
        if let ListenerState::Running { task, owner, .. } = std::mem::replace(&mut *state, ListenerState::Stopped) {
            tracing::info!("[REALTIME] Replacing subscription of {}", owner);
            task.abort();
        }

        self.container.claim(&user.uid);

        let generation = {
            let mut generation = lock(&self.generation);
            *generation += 1;
            *generation
        };
        let subscription = Subscription {
            owner: user.uid.clone(),
            generation,
            window: self.window,
            reconnect: self.reconnect.clone(),
            collection: Arc::clone(&self.collection),
            container: self.container.clone(),
            state: Arc::clone(&self.state),
        };

        tracing::info!("[REALTIME] Starting listener for {} (window {})", user.uid, self.window);
        *state = ListenerState::Running {
            owner: user.uid.clone(),
            generation,
            task: tokio::spawn(subscription.run()),
        };
    }

    /// Cancel the subscription; the last window stays in the container.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *lock(&self.state), ListenerState::Stopped);
        if let ListenerState::Running { owner, task, .. } = previous {
            task.abort();
            tracing::info!("[REALTIME] Stopped listener for {}", owner);
        }
    }

    /// Stop and clear; used on sign-out.
    pub(crate) fn release(&self) {
        self.stop();
        self.container.release();
        self.collection.forget_assigned();
    }

    fn owner(&self) -> SyncResult<OwnerId> {
        self.container.owner().ok_or(SyncError::NotAuthenticated)
    }

    fn find(&self, local_id: LocalId) -> SyncResult<Notification> {
        self.container
            .get(local_id)
            .ok_or(SyncError::NotFound { local_id })
    }

    pub async fn mark_read(&self, local_id: LocalId) -> SyncResult<()> {
        let notification = self.find(local_id)?;
        if notification.read {
            return Ok(());
        }
        if self
            .collection
            .update(&notification.remote_ref, &NotificationPatch::mark_read())
            .await
        {
            Ok(())
        } else {
            Err(SyncError::RemoteRejected { operation: "mark_read" })
        }
    }

    /// Mark every unread notification of the window read, atomically.
    ///
    /// Returns how many were marked.
    pub async fn mark_all_read(&self) -> SyncResult<usize> {
        self.owner()?;
        let fields = to_fields(&NotificationPatch::mark_read())?;
        let writes: Vec<BatchWrite> = self
            .container
            .read()
            .iter()
            .filter(|n| !n.read)
            .map(|n| BatchWrite::Update {
                collection: Notification::COLLECTION.to_string(),
                remote_ref: n.remote_ref.clone(),
                fields: fields.clone(),
            })
            .collect();

        self.commit("mark_all_read", writes).await
    }

    pub async fn delete(&self, local_id: LocalId) -> SyncResult<()> {
        let notification = self.find(local_id)?;
        if self.collection.delete(&notification.remote_ref).await {
            Ok(())
        } else {
            Err(SyncError::RemoteRejected { operation: "delete" })
        }
    }

    /// Delete every notification of the window, atomically.
    pub async fn delete_all(&self) -> SyncResult<usize> {
        self.owner()?;
        let writes: Vec<BatchWrite> = self
            .container
            .read()
            .iter()
            .map(|n| BatchWrite::Delete {
                collection: Notification::COLLECTION.to_string(),
                remote_ref: n.remote_ref.clone(),
            })
            .collect();

        self.commit("delete_all", writes).await
    }

    async fn commit(&self, operation: &str, writes: Vec<BatchWrite>) -> SyncResult<usize> {
        let count = writes.len();
        if count == 0 {
            return Ok(0);
        }
        match self.collection.store().commit_batch(writes).await {
            Ok(()) => {
                tracing::info!("[REALTIME] {} committed for {} notifications", operation, count);
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("[REALTIME] {} failed, nothing applied: {}", operation, e);
                Err(e)
            }
        }
    }

    /// Post a notification for the current owner.
    ///
    /// It shows up in the container with the next pushed window.
    pub async fn notify(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> SyncResult<Notification> {
        let owner = self.owner()?;
        let draft = NotificationDraft::new(kind, title, message);
        self.collection.create(&owner, &draft).await
    }

    pub async fn product_added(&self, product: &str) -> SyncResult<Notification> {
        self.notify(
            NotificationKind::ProductAdded,
            "Nuevo Producto",
            format!("Se agregó \"{}\" al inventario", product),
        )
        .await
    }

    pub async fn low_stock(&self, product: &str, stock: i64) -> SyncResult<Notification> {
        self.notify(
            NotificationKind::LowStock,
            "¡Stock Bajo!",
            format!("\"{}\" tiene solo {} unidades", product, stock),
        )
        .await
    }

    pub async fn product_edited(&self, product: &str) -> SyncResult<Notification> {
        self.notify(
            NotificationKind::ProductEdited,
            "Producto Actualizado",
            format!("Se actualizó \"{}\"", product),
        )
        .await
    }

    pub async fn product_removed(&self, product: &str) -> SyncResult<Notification> {
        self.notify(
            NotificationKind::ProductRemoved,
            "Producto Eliminado",
            format!("Se eliminó \"{}\" del inventario", product),
        )
        .await
    }
}

impl Drop for NotificationListener {
    fn drop(&mut self) {
        if let ListenerState::Running { task, .. } = &*lock(&self.state) {
            task.abort();
        }
    }
}

impl Subscription {
    async fn run(self) {
        let mut attempt = 0;
        loop {
            let failure = match self.listen(&mut attempt).await {
                Ended::Superseded => return,
                Ended::Closed => {
                    tracing::info!("[REALTIME] Window for {} closed by the store", self.owner);
                    self.finish();
                    return;
                }
                Ended::Failed(e) => e,
            };

            tracing::error!("[REALTIME] Subscription for {} failed: {}", self.owner, failure);
            let delay = if failure.is_retryable() {
                self.reconnect.delay_for(attempt)
            } else {
                None
            };
            match delay {
                Some(delay) => {
                    attempt += 1;
                    tracing::warn!(
                        "[REALTIME] Reconnecting for {} in {:?} (attempt {})",
                        self.owner,
                        delay,
                        attempt
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    self.finish();
                    return;
                }
            }
        }
    }

    /// One subscription attempt, until the stream ends or fails
    async fn listen(&self, attempt: &mut u32) -> Ended {
        let mut stream = match self
            .collection
            .store()
            .watch_window(Notification::COLLECTION, &self.owner, self.window)
            .await
        {
            Ok(stream) => stream,
            Err(e) => return Ended::Failed(e),
        };

        while let Some(snapshot) = stream.next().await {
            match snapshot {
                Ok(documents) => {
                    *attempt = 0;
                    let items = self.collection.decode_all(&documents);
                    if !self.apply(items) {
                        return Ended::Superseded;
                    }
                }
                Err(e) => return Ended::Failed(e),
            }
        }
        Ended::Closed
    }

    /// Replace the container unless this subscription was superseded.
    ///
    /// The listener state stays locked across the replace, so nothing lands after `stop` returns.
    fn apply(&self, items: Vec<Notification>) -> bool {
        let state = lock(&self.state);
        match &*state {
            ListenerState::Running { generation, .. } if *generation == self.generation => {
                let count = items.len();
                let unread = items.iter().filter(|n| !n.read).count();
                self.container.replace_for(&self.owner, items);
                tracing::debug!(
                    "[REALTIME] Window for {}: {} notifications, {} unread",
                    self.owner,
                    count,
                    unread
                );
                true
            }
            _ => false,
        }
    }

    /// Mark the listener stopped if it is still ours
    fn finish(&self) {
        let mut state = lock(&self.state);
        if matches!(&*state, ListenerState::Running { generation, .. } if *generation == self.generation) {
            *state = ListenerState::Stopped;
            tracing::info!("[REALTIME] Listener for {} stopped", self.owner);
        }
    }
}
