/**
 * Inventory Sync Demo
 *
 * Runs a short scripted session against the configured store: sign in,
 * add and edit products, read the notification window, sign out and sign
 * in as somebody else.
 *
 * Uses the in-memory store unless INVENTORY_STORE_URL (or `store_url` in
 * the config file) points at an HTTP backend.
 */
use std::sync::Arc;
use std::time::Duration;

use inventory_sync::{
    AuthSignal, DocumentStore, HttpStore, Inventory, MemoryStore, ProductDraft, ProductPatch,
    SyncConfig, User,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "inventory_sync=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = SyncConfig::load_or_default()?;
    let store: Arc<dyn DocumentStore> = match &config.store_url {
        Some(url) => {
            tracing::info!("[DEMO] Using HTTP store at {}", url);
            Arc::new(HttpStore::new(&config)?)
        }
        None => {
            tracing::info!("[DEMO] Using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let inventory = Inventory::new(store, config);
    let auth = AuthSignal::new();
    let _lifecycle = inventory.attach(&auth);

    auth.sign_in(User::new("demo-ana", "Ana", "ana@example.com"));
    settle(&inventory).await;

    let mouse = inventory
        .add_product(ProductDraft::new("Mouse", 10.0, 5).category("Electrónica"))
        .await?;
    inventory
        .add_product(ProductDraft::new("Camiseta", 8.5, 40).category("Ropa"))
        .await?;
    inventory.edit_product(mouse.id, ProductPatch::stock(2)).await?;
    settle(&inventory).await;

    println!("Categories: {}", inventory.categories().names().join(", "));
    for product in inventory.products().all().iter() {
        println!(
            "  {:<10} {:>6.2} x {:>3}  {:?}",
            product.name,
            product.price,
            product.stock,
            inventory.stock_status(product)
        );
    }
    println!("Inventory value: {:.2}", inventory.products().inventory_value());
    println!("Unread notifications: {}", inventory.notifications().unread_count());
    for notification in inventory.notifications().notifications().iter() {
        println!("  {} {}: {}", notification.icon, notification.title, notification.message);
    }

    let marked = inventory.notifications().mark_all_read().await?;
    settle(&inventory).await;
    println!(
        "Marked {} read, unread now {}",
        marked,
        inventory.notifications().unread_count()
    );

    auth.sign_out();
    settle(&inventory).await;
    println!("After sign-out: {} products", inventory.products().all().len());

    auth.sign_in(User::new("demo-beto", "Beto", "beto@example.com"));
    settle(&inventory).await;
    println!(
        "Signed in as Beto: {} products, {} categories",
        inventory.products().all().len(),
        inventory.categories().all().len()
    );

    Ok(())
}

/// Give background reloads and pushed windows a moment to land
async fn settle(inventory: &Inventory) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    inventory.lifecycle().settled().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
}
