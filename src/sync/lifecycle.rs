//! # Session Lifecycle
//!
//! Drives every per-owner component from the auth state:
//!
//! - `present(user)`: bind each service to the user, reload them in the
//!   background and start the notification listener
//! - `absent`: abort pending reloads, clear every container and stop the
//!   listener, all before `apply` returns
//! - `unknown`: nothing
//!
//! A `present` for the user already bound is ignored. A `present` for a
//! different user without an `absent` in between is handled as a sign-out
//! followed by a sign-in.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use super::auth::{AuthSignal, AuthState};
use super::realtime::NotificationListener;
use super::service::SessionBound;
use crate::shared::lock;
use crate::shared::models::{OwnerId, User};

/// Lifecycle controller
#[derive(Default)]
pub struct SessionLifecycle {
    services: Vec<Arc<dyn SessionBound>>,
    listener: Option<Arc<NotificationListener>>,
    current: Mutex<Option<OwnerId>>,
    reloads: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service to bind, reload and clear with the session
    pub fn with_service(mut self, service: Arc<dyn SessionBound>) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_listener(mut self, listener: Arc<NotificationListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Owner of the current session
    pub fn current_owner(&self) -> Option<OwnerId> {
        lock(&self.current).clone()
    }

    /// Number of reloads still running
    pub fn pending_reloads(&self) -> usize {
        let mut reloads = lock(&self.reloads);
        reloads.retain(|task| !task.is_finished());
        reloads.len()
    }

    /// Wait for the reloads started so far
    pub async fn settled(&self) {
        let pending: Vec<JoinHandle<()>> = lock(&self.reloads).drain(..).collect();
        for task in pending {
            // an aborted reload ends with a cancellation error; nothing to report
            let _ = task.await;
        }
    }

    /// React to one auth state.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn apply(&self, state: &AuthState) {
        match state {
            AuthState::Unknown => {
                tracing::debug!("[SESSION] Auth state unknown, nothing to do");
            }
            AuthState::Absent => self.sign_out(),
            AuthState::Present(user) => self.sign_in(user),
        }
    }

    fn sign_in(&self, user: &User) {
        let mut current = lock(&self.current);
        if current.as_ref() == Some(&user.uid) {
            tracing::debug!("[SESSION] Already signed in as {}", user.uid);
            return;
        }
        if let Some(previous) = current.take() {
            tracing::info!("[SESSION] Switching from {} to {}", previous, user.uid);
            self.clear();
        }
        *current = Some(user.uid.clone());

        tracing::info!("[SESSION] Signed in as {}; loading {} services", user.uid, self.services.len());
        for service in &self.services {
            service.claim(&user.uid);
        }

        let mut reloads = lock(&self.reloads);
        reloads.retain(|task| !task.is_finished());
        for service in &self.services {
            let service = Arc::clone(service);
            reloads.push(tokio::spawn(async move {
                if let Err(e) = service.reload().await {
                    tracing::warn!("[SESSION] Reload of {} failed: {}", service.name(), e);
                }
            }));
        }
        drop(reloads);

        if let Some(listener) = &self.listener {
            listener.start(user);
        }
    }

    fn sign_out(&self) {
        let mut current = lock(&self.current);
        let previous = current.take();
        self.clear();
        match previous {
            Some(owner) => tracing::info!("[SESSION] Signed out {}; containers cleared", owner),
            None => tracing::debug!("[SESSION] Signed out with no session bound"),
        }
    }

    /// Abort reloads, clear every container and stop the listener
    fn clear(&self) {
        for task in lock(&self.reloads).drain(..) {
            task.abort();
        }
        for service in &self.services {
            service.release();
        }
        if let Some(listener) = &self.listener {
            listener.release();
        }
    }

    /// Follow `signal` for as long as it exists, starting with its current state.
    pub fn attach(self: &Arc<Self>, signal: &AuthSignal) -> JoinHandle<()> {
        let mut states = signal.subscribe();
        let lifecycle = Arc::clone(self);
        tokio::spawn(async move {
            let state = states.borrow_and_update().clone();
            lifecycle.apply(&state);
            while states.changed().await.is_ok() {
                let state = states.borrow_and_update().clone();
                lifecycle.apply(&state);
            }
            tracing::debug!("[SESSION] Auth signal dropped; lifecycle loop ends");
        })
    }
}
