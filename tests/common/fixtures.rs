//! Session fixtures

use std::sync::Arc;

use inventory_sync::store::{to_fields, Document};
use inventory_sync::{
    AuthState, CategoryDraft, Inventory, MemoryStore, OwnerId, ProductDraft, SyncConfig, User,
};

/// One inventory session over its own in-memory store
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub inventory: Inventory,
}

impl Harness {
    /// Default categories are not seeded, so counts stay predictable.
    pub fn new() -> Self {
        let config = SyncConfig::builder()
            .seed_default_categories(false)
            .build()
            .expect("valid config");
        Self::with_config(config)
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let inventory = Inventory::new(store.clone(), config);
        Self { store, inventory }
    }

    /// Sign `user` in and wait for the reloads and the first window
    pub async fn sign_in(&self, user: &User) {
        self.inventory.apply(&AuthState::Present(user.clone()));
        self.settle().await;
    }

    pub fn sign_out(&self) {
        self.inventory.apply(&AuthState::Absent);
    }

    /// Let reloads finish and pushed windows land
    pub async fn settle(&self) {
        self.inventory.lifecycle().settled().await;
        yield_many().await;
    }
}

pub fn ana() -> User {
    User::new("ana", "Ana", "ana@example.com")
}

pub fn beto() -> User {
    User::new("beto", "Beto", "beto@example.com")
}

/// Give spawned tasks plenty of turns on the current-thread runtime
pub async fn yield_many() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

pub fn seed_products(store: &MemoryStore, owner: &OwnerId, names: &[&str]) -> Vec<Document> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let draft = ProductDraft::new(*name, 10.0 + i as f64, 20)
                .category("Hogar")
                .date("2024-05-01");
            store.seed("productos", owner, to_fields(&draft).expect("draft encodes"))
        })
        .collect()
}

pub fn seed_categories(store: &MemoryStore, owner: &OwnerId, names: &[&str]) {
    for name in names {
        let draft = CategoryDraft::new(*name, "#000000");
        store.seed("categorias", owner, to_fields(&draft).expect("draft encodes"));
    }
}
