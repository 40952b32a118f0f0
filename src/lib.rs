//! Inventory Sync - Main Library
//!
//! Reactive synchronization layer for an inventory manager whose data
//! lives in a remote document store. Each remote collection (products,
//! categories, notifications) is mirrored into an in-memory, observable
//! container for the signed-in owner and kept consistent with the store
//! across local CRUD calls and a pushed change window.
//!
//! # Module Structure
//!
//! - **`shared`** - Types used by every layer
//!   - Domain models and identifiers
//!   - Error taxonomy
//!   - Configuration (TOML file, environment, builder)
//!
//! - **`store`** - Remote store adapter
//!   - `DocumentStore` contract and typed `Collection` adapter
//!   - `MemoryStore` for tests and demos, `HttpStore` for REST + SSE backends
//!
//! - **`sync`** - Containers and the services that own them
//!   - Product and category sync services
//!   - Auth signal and session lifecycle
//!   - Realtime notification listener
//!
//! - **`inventory`** - `Inventory`, the session root wiring it all together
//!
//! # Data boundary
//!
//! Every container is bound to one owner. Signing out clears all of them
//! before anything else can observe them, and results of remote calls that
//! resolve after the owner changed are discarded.
//!
//! # Concurrency
//!
//! Containers are single-writer, multi-reader. Reads are synchronous
//! snapshots; locks are never held across an `.await`. Background work
//! (reloads, the notification subscription) runs on Tokio tasks, so the
//! lifecycle and listener must be driven from within a Tokio runtime.
//!
//! # Error Handling
//!
//! Fallible operations return [`SyncResult`]. A failed write never changes
//! a container.

/// Shared types and data structures
pub mod shared;

/// Remote store adapter
pub mod store;

/// Containers, services, lifecycle and realtime listener
pub mod sync;

/// Session root
pub mod inventory;

pub use inventory::Inventory;
pub use shared::models::{
    Category, CategoryDraft, CategoryPatch, LocalId, Notification, NotificationKind, OwnerId,
    Product, ProductDraft, ProductPatch, RemoteRef, Role, StockStatus, User,
};
pub use shared::{ConfigError, ReconnectPolicy, SyncConfig, SyncError, SyncResult};
pub use store::{DocumentStore, HttpStore, MemoryStore, StoreOp};
pub use sync::{
    AuthSignal, AuthState, CategoryService, Container, NotificationListener, ProductOrder,
    ProductService, SessionLifecycle,
};
