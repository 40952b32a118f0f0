//! # Auth State Signal
//!
//! Three-valued session state published by whatever performs sign-in.
//! The crate only observes it; producing it is up to the embedding
//! application.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use inventory_sync::{AuthSignal, User};
//!
//! let auth = AuthSignal::new();
//! let mut states = auth.subscribe();
//!
//! auth.sign_in(User::new("uid-1", "Ana", "ana@example.com"));
//! auth.sign_out();
//! ```

use tokio::sync::watch;

use crate::shared::models::{OwnerId, User};

/// Session state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Not resolved yet
    #[default]
    Unknown,
    /// No session
    Absent,
    Present(User),
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Present(user) => Some(user),
            _ => None,
        }
    }

    pub fn owner(&self) -> Option<&OwnerId> {
        self.user().map(|user| &user.uid)
    }
}

/// Observable auth state
#[derive(Debug, Clone)]
pub struct AuthSignal {
    tx: watch::Sender<AuthState>,
}

impl Default for AuthSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSignal {
    /// Starts in [`AuthState::Unknown`]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AuthState::Unknown);
        Self { tx }
    }

    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    /// Publish `state`; an identical state is not re-announced
    pub fn set(&self, state: AuthState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            tracing::info!("[SESSION] Auth state -> {}", describe(&state));
            *current = state;
            true
        });
    }

    pub fn sign_in(&self, user: User) {
        self.set(AuthState::Present(user));
    }

    pub fn sign_out(&self) {
        self.set(AuthState::Absent);
    }
}

fn describe(state: &AuthState) -> String {
    match state {
        AuthState::Unknown => "unknown".to_string(),
        AuthState::Absent => "absent".to_string(),
        AuthState::Present(user) => format!("present({})", user.uid),
    }
}
