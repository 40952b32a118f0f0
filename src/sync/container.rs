//! # Entity Container
//!
//! In-memory ordered copy of one remote collection for one owner.
//!
//! Consumers get read-only access: synchronous snapshots through
//! [`Container::read`] and an ordered feed of commits through
//! [`Container::subscribe`]. Mutators are crate-private and owner-guarded:
//! a mutation addressed to an owner other than the bound one changes
//! nothing, which keeps late results of a previous session out.
//!
//! Every commit bumps a monotonic revision and is delivered to every
//! subscriber, in order, through an unbounded queue.

use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;

use crate::shared::lock;
use crate::shared::models::{Entity, LocalId, OwnerId, RemoteRef};

/// What a commit did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Emptied, on owner change or sign-out
    Cleared,
    /// Wholesale replacement from a reload or a pushed window
    Replaced,
    Appended(LocalId),
    Patched(LocalId),
    Removed(LocalId),
}

/// One committed update as seen by a subscriber
#[derive(Debug, Clone)]
pub struct ContainerEvent<E> {
    pub revision: u64,
    pub change: Change,
    pub items: Arc<Vec<E>>,
}

/// Result of a success-path patch or removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    /// The target no longer exists in this container, or the owner changed
    Discarded,
}

impl PatchOutcome {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// Ordered feed of container commits
#[derive(Debug)]
pub struct ContainerWatcher<E> {
    rx: mpsc::UnboundedReceiver<ContainerEvent<E>>,
}

impl<E> ContainerWatcher<E> {
    /// Next commit; `None` once the container is gone
    pub async fn changed(&mut self) -> Option<ContainerEvent<E>> {
        self.rx.recv().await
    }

    /// Every commit queued so far
    pub fn drain(&mut self) -> Vec<ContainerEvent<E>> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

struct State<E> {
    owner: Option<OwnerId>,
    items: Arc<Vec<E>>,
    revision: u64,
}

struct Shared<E> {
    label: &'static str,
    state: RwLock<State<E>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ContainerEvent<E>>>>,
}

/// Shared handle to one container
pub struct Container<E: Entity> {
    shared: Arc<Shared<E>>,
}

impl<E: Entity> Clone for Container<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Entity> std::fmt::Debug for Container<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("label", &self.shared.label)
            .field("owner", &self.owner())
            .field("len", &self.len())
            .field("revision", &self.revision())
            .finish()
    }
}

impl<E: Entity> Container<E> {
    /// Empty, unbound container
    pub fn new(label: &'static str) -> Self {
        Self {
            shared: Arc::new(Shared {
                label,
                state: RwLock::new(State {
                    owner: None,
                    items: Arc::new(Vec::new()),
                    revision: 0,
                }),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Latest committed contents
    pub fn read(&self) -> Arc<Vec<E>> {
        Arc::clone(&self.read_state().items)
    }

    pub fn get(&self, local_id: LocalId) -> Option<E> {
        self.read_state()
            .items
            .iter()
            .find(|item| item.local_id() == local_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.read_state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_state().items.is_empty()
    }

    /// Owner the contents belong to
    pub fn owner(&self) -> Option<OwnerId> {
        self.read_state().owner.clone()
    }

    pub fn revision(&self) -> u64 {
        self.read_state().revision
    }

    /// Receive every commit made from now on
    pub fn subscribe(&self) -> ContainerWatcher<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.shared.subscribers).push(tx);
        ContainerWatcher { rx }
    }

    /// Bind to `owner`, clearing contents that belong to anyone else.
    ///
    /// Returns `false` when already bound to `owner`.
    pub(crate) fn claim(&self, owner: &OwnerId) -> bool {
        let mut state = self.write_state();
        if state.owner.as_ref() == Some(owner) {
            return false;
        }
        state.owner = Some(owner.clone());
        if !state.items.is_empty() {
            state.items = Arc::new(Vec::new());
            self.commit(&mut state, Change::Cleared);
        }
        true
    }

    /// Unbind and clear
    pub(crate) fn release(&self) {
        let mut state = self.write_state();
        let was_bound = state.owner.take().is_some();
        if was_bound || !state.items.is_empty() {
            state.items = Arc::new(Vec::new());
            self.commit(&mut state, Change::Cleared);
        }
    }

    pub(crate) fn replace_for(&self, owner: &OwnerId, items: Vec<E>) -> bool {
        let mut state = self.write_state();
        if state.owner.as_ref() != Some(owner) {
            return false;
        }
        state.items = Arc::new(items);
        self.commit(&mut state, Change::Replaced);
        true
    }

    /// Append a freshly created entity.
    ///
    /// Refused when the owner changed or the entity already arrived with a reload.
    pub(crate) fn append(&self, owner: &OwnerId, item: E) -> bool {
        let mut state = self.write_state();
        if state.owner.as_ref() != Some(owner)
            || state
                .items
                .iter()
                .any(|existing| existing.remote_ref() == item.remote_ref())
        {
            return false;
        }
        let local_id = item.local_id();
        Arc::make_mut(&mut state.items).push(item);
        self.commit(&mut state, Change::Appended(local_id));
        true
    }

    /// Apply `f` to the entry still identified by `local_id` and `remote_ref`
    pub(crate) fn patch(
        &self,
        owner: &OwnerId,
        local_id: LocalId,
        remote_ref: &RemoteRef,
        f: impl FnOnce(&mut E),
    ) -> PatchOutcome {
        let mut state = self.write_state();
        let Some(index) = Self::position(&state, owner, local_id, remote_ref) else {
            return PatchOutcome::Discarded;
        };
        f(&mut Arc::make_mut(&mut state.items)[index]);
        self.commit(&mut state, Change::Patched(local_id));
        PatchOutcome::Applied
    }

    pub(crate) fn remove(&self, owner: &OwnerId, local_id: LocalId, remote_ref: &RemoteRef) -> PatchOutcome {
        let mut state = self.write_state();
        let Some(index) = Self::position(&state, owner, local_id, remote_ref) else {
            return PatchOutcome::Discarded;
        };
        Arc::make_mut(&mut state.items).remove(index);
        self.commit(&mut state, Change::Removed(local_id));
        PatchOutcome::Applied
    }

    fn position(state: &State<E>, owner: &OwnerId, local_id: LocalId, remote_ref: &RemoteRef) -> Option<usize> {
        if state.owner.as_ref() != Some(owner) {
            return None;
        }
        state
            .items
            .iter()
            .position(|item| item.local_id() == local_id && item.remote_ref() == remote_ref)
    }

    /// Publish while still holding the write lock so subscribers see commits in order.
    fn commit(&self, state: &mut State<E>, change: Change) {
        state.revision += 1;
        let event = ContainerEvent {
            revision: state.revision,
            change,
            items: Arc::clone(&state.items),
        };

        let mut subscribers = lock(&self.shared.subscribers);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());

        tracing::debug!(
            "[SYNC] {} revision {}: {:?} ({} items)",
            self.shared.label,
            state.revision,
            change,
            state.items.len()
        );
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State<E>> {
        self.shared
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, State<E>> {
        self.shared
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
