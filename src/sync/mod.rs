//! # Sync Layer
//!
//! Local reactive containers kept consistent with the remote store.
//!
//! ## Components
//!
//! - [`Container`]: ordered, observable copy of one collection
//! - [`EntityService`]: CRUD orchestration for one entity kind
//! - [`ProductService`], [`CategoryService`]: derived reads per kind
//! - [`AuthSignal`]: session state observed by the lifecycle
//! - [`SessionLifecycle`]: loads and clears containers on auth transitions
//! - [`NotificationListener`]: realtime notification window

pub mod auth;
pub mod categories;
pub mod container;
pub mod lifecycle;
pub mod products;
pub mod realtime;
pub mod service;

pub use auth::{AuthSignal, AuthState};
pub use categories::CategoryService;
pub use container::{Change, Container, ContainerEvent, ContainerWatcher, PatchOutcome};
pub use lifecycle::SessionLifecycle;
pub use products::{CategoryRollup, ProductOrder, ProductService};
pub use realtime::NotificationListener;
pub use service::{EntityService, SessionBound};
