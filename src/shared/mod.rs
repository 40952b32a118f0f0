//! Shared Module
//!
//! Types used by every layer of the crate: the domain models, the error
//! taxonomy and the configuration.

/// Domain models and identifiers
pub mod models;

/// Shared error types
pub mod error;

/// Sync configuration
pub mod config;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Re-export commonly used types for convenience
pub use config::{ConfigError, ReconnectPolicy, SyncConfig, SyncConfigBuilder};
pub use error::{SyncError, SyncResult};

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
