//! # Inventory Session
//!
//! Wires one store into the product and category services, the
//! notification listener and the session lifecycle.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use inventory_sync::{AuthState, Inventory, MemoryStore, ProductDraft, SyncConfig, User};
//!
//! # async fn run() -> inventory_sync::SyncResult<()> {
//! let inventory = Inventory::new(Arc::new(MemoryStore::new()), SyncConfig::default());
//!
//! // Binds the containers to the user right away; reloads run in the background.
//! inventory.apply(&AuthState::Present(User::new("uid-1", "Ana", "ana@example.com")));
//! inventory.add_product(ProductDraft::new("Mouse", 10.0, 5)).await?;
//! println!("unread: {}", inventory.notifications().unread_count());
//!
//! // Or follow an auth signal for the rest of the process.
//! let auth = inventory_sync::AuthSignal::new();
//! inventory.attach(&auth);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::shared::config::SyncConfig;
use crate::shared::error::SyncResult;
use crate::shared::models::{
    CategoryDraft, LocalId, LocalIdAllocator, Notification, Product, ProductDraft, ProductPatch,
    StockStatus,
};
use crate::store::DocumentStore;
use crate::sync::{
    AuthSignal, AuthState, CategoryService, NotificationListener, ProductService, SessionLifecycle,
};

/// Session root for one store
pub struct Inventory {
    config: SyncConfig,
    products: Arc<ProductService>,
    categories: Arc<CategoryService>,
    notifications: Arc<NotificationListener>,
    lifecycle: Arc<SessionLifecycle>,
}

impl Inventory {
    pub fn new(store: Arc<dyn DocumentStore>, config: SyncConfig) -> Self {
        let ids = Arc::new(LocalIdAllocator::new());

        let products = Arc::new(ProductService::new("products", Arc::clone(&store), Arc::clone(&ids)));
        let mut categories = CategoryService::new("categories", Arc::clone(&store), Arc::clone(&ids));
        if config.seed_default_categories {
            categories = categories.with_defaults(CategoryDraft::defaults());
        }
        let categories = Arc::new(categories);
        let notifications = Arc::new(NotificationListener::new(
            store,
            ids,
            config.notification_window,
            config.reconnect.clone(),
        ));

        let lifecycle = Arc::new(
            SessionLifecycle::new()
                .with_service(products.clone())
                .with_service(categories.clone())
                .with_listener(notifications.clone()),
        );

        Self {
            config,
            products,
            categories,
            notifications,
            lifecycle,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn products(&self) -> &ProductService {
        &self.products
    }

    pub fn categories(&self) -> &CategoryService {
        &self.categories
    }

    pub fn notifications(&self) -> &NotificationListener {
        &self.notifications
    }

    pub fn lifecycle(&self) -> &Arc<SessionLifecycle> {
        &self.lifecycle
    }

    /// Follow `signal` in the background
    pub fn attach(&self, signal: &AuthSignal) -> JoinHandle<()> {
        self.lifecycle.attach(signal)
    }

    /// Apply one auth state directly
    pub fn apply(&self, state: &AuthState) {
        self.lifecycle.apply(state);
    }

    /// Products in stock but under the configured threshold
    pub fn low_stock(&self) -> Vec<Product> {
        self.products.low_stock(self.config.low_stock_threshold)
    }

    pub fn stock_status(&self, product: &Product) -> StockStatus {
        product.status(self.config.low_stock_threshold)
    }

    /// Create a product and announce it
    pub async fn add_product(&self, draft: ProductDraft) -> SyncResult<Product> {
        let product = self.products.create(&draft).await?;
        self.announce(self.notifications.product_added(&product.name).await);
        self.check_stock(&product).await;
        Ok(product)
    }

    /// Update a product and announce it
    pub async fn edit_product(&self, local_id: LocalId, patch: ProductPatch) -> SyncResult<Product> {
        let product = self.products.update(local_id, patch).await?;
        self.announce(self.notifications.product_edited(&product.name).await);
        self.check_stock(&product).await;
        Ok(product)
    }

    /// Delete a product and announce it
    pub async fn remove_product(&self, local_id: LocalId) -> SyncResult<Product> {
        let product = self.products.delete(local_id).await?;
        self.announce(self.notifications.product_removed(&product.name).await);
        Ok(product)
    }

    async fn check_stock(&self, product: &Product) {
        if self.stock_status(product) == StockStatus::Low {
            self.announce(self.notifications.low_stock(&product.name, product.stock).await);
        }
    }

    fn announce(&self, posted: SyncResult<Notification>) {
        if let Err(e) = posted {
            tracing::warn!("[SYNC] Could not post notification: {}", e);
        }
    }
}
