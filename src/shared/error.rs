//! Sync Error Types
//!
//! This module defines the error taxonomy shared by the store adapters,
//! the sync services and the realtime listener.
//!
//! # Error Categories
//!
//! - `RemoteUnavailable` - network or auth failure reported by a store adapter
//! - `ValidationRejected` - the remote store refused a write
//! - `SubscriptionError` - the push channel failed
//! - `RemoteRejected` - an update/delete adapter call reported `false`
//! - Local guards: `NotAuthenticated`, `NotFound`, `OperationPending`, `SessionChanged`
//!
//! # Usage
//!
//! ```rust
//! use inventory_sync::shared::error::SyncError;
//!
//! let error = SyncError::validation("precio", "price must not be negative");
//! assert!(!error.is_retryable());
//! ```
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync + Clone` so a single failure can be
//! reported to several observers.
use thiserror::Error;

use crate::shared::config::ConfigError;
use crate::shared::models::LocalId;

/// Result alias used across the crate
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors produced by the synchronization layer
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// Transport or authentication failure from the remote store
    #[error("Remote store unavailable: {message}")]
    RemoteUnavailable {
        /// Human-readable error message
        message: String,
    },

    /// The remote store rejected a write because of a constraint violation
    #[error("Validation rejected for field '{field}': {message}")]
    ValidationRejected {
        /// The offending field, or `*` when the store did not say
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// The push channel failed
    #[error("Subscription error: {message}")]
    SubscriptionError {
        /// Human-readable error message
        message: String,
    },

    /// An update or delete was refused by the adapter
    #[error("Remote store refused {operation}")]
    RemoteRejected {
        /// The refused operation (`update`, `delete`)
        operation: &'static str,
    },

    /// No owner is bound to the container
    #[error("No authenticated owner")]
    NotAuthenticated,

    /// The local id is not present in the container
    #[error("Entity {local_id} not found")]
    NotFound {
        /// Requested local id
        local_id: LocalId,
    },

    /// Another create/update/delete targets the same entity
    #[error("Entity {local_id} already has an operation in flight")]
    OperationPending {
        /// Busy local id
        local_id: LocalId,
    },

    /// The owner changed while the remote call was in flight
    #[error("Session changed while the operation was in flight")]
    SessionChanged,

    /// Document to entity mapping failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Create a new remote-unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationRejected {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new subscription error
    pub fn subscription(message: impl Into<String>) -> Self {
        Self::SubscriptionError {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Whether a later attempt may succeed without any change on the caller side
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable { .. } | Self::SubscriptionError { .. }
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}
