//! Product CRUD through the inventory session

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};

use inventory_sync::{
    AuthState, LocalId, NotificationKind, ProductDraft, ProductPatch, StoreOp, SyncError,
};

use crate::common::*;

#[tokio::test]
async fn test_create_appends_entity_with_remote_ref() {
    let harness = Harness::new();
    harness.sign_in(&ana()).await;
    assert!(harness.inventory.products().all().is_empty());

    let product = harness
        .inventory
        .products()
        .create(&ProductDraft::new("Mouse", 10.0, 5))
        .await
        .unwrap();

    let products = harness.inventory.products().all();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0], product);
    assert_eq!(product.name, "Mouse");
    assert_eq!(product.price, 10.0);
    assert_eq!(product.stock, 5);
    assert!(!product.remote_ref.as_str().is_empty());
}

#[tokio::test]
async fn test_update_patches_only_given_fields() {
    let harness = Harness::new();
    harness.sign_in(&ana()).await;
    let products = harness.inventory.products();
    let mouse = products
        .create(&ProductDraft::new("Mouse", 10.0, 5).category("Electrónica"))
        .await
        .unwrap();

    let updated = products.update(mouse.id, ProductPatch::stock(0)).await.unwrap();

    let mut expected = mouse.clone();
    expected.stock = 0;
    assert_eq!(updated, expected);
    assert_eq!(products.get(mouse.id), Some(expected));

    let stored = harness.store.documents("productos", &ana().uid);
    assert_eq!(stored[0].fields["stock"], 0);
    assert_eq!(stored[0].fields["nombre"], "Mouse");
}

#[tokio::test]
async fn test_failed_create_leaves_container_unchanged() {
    let harness = Harness::new();
    harness.sign_in(&ana()).await;
    let products = harness.inventory.products();
    products.create(&ProductDraft::new("Mouse", 10.0, 5)).await.unwrap();
    let before = products.all();

    harness
        .store
        .fail_next(StoreOp::Create, SyncError::validation("precio", "must be positive"));
    let result = products.create(&ProductDraft::new("Teclado", -1.0, 5)).await;

    assert_matches!(result, Err(SyncError::ValidationRejected { ref field, .. }) if field == "precio");
    assert_eq!(products.all(), before);
}

#[tokio::test]
async fn test_failed_delete_leaves_container_unchanged() {
    let harness = Harness::new();
    harness.sign_in(&ana()).await;
    let products = harness.inventory.products();
    let mouse = products.create(&ProductDraft::new("Mouse", 10.0, 5)).await.unwrap();
    let revision = products.container().revision();

    harness.store.set_available(false);
    let result = products.delete(mouse.id).await;

    assert_err!(&result);
    assert_eq!(result, Err(SyncError::RemoteRejected { operation: "delete" }));
    assert_eq!(products.all().len(), 1);
    assert_eq!(products.container().revision(), revision);
}

#[tokio::test]
async fn test_second_write_to_same_id_is_refused_while_pending() {
    let harness = Harness::new();
    harness.sign_in(&ana()).await;
    let products = harness.inventory.products();
    let mouse = products.create(&ProductDraft::new("Mouse", 10.0, 5)).await.unwrap();

    harness
        .store
        .set_latency(StoreOp::Update, std::time::Duration::from_millis(50));
    let (first, second) = tokio::join!(
        products.update(mouse.id, ProductPatch::stock(4)),
        products.update(mouse.id, ProductPatch::stock(3)),
    );

    assert_ok!(first);
    assert_eq!(second, Err(SyncError::OperationPending { local_id: mouse.id }));
    assert_eq!(products.get(mouse.id).unwrap().stock, 4);
    assert!(!products.is_pending(mouse.id));
}

#[tokio::test]
async fn test_unknown_id_and_missing_session() {
    let harness = Harness::new();
    let products = harness.inventory.products();
    assert_eq!(
        products.create(&ProductDraft::new("Mouse", 1.0, 1)).await,
        Err(SyncError::NotAuthenticated)
    );

    harness.sign_in(&ana()).await;
    assert_eq!(
        products.update(LocalId(7), ProductPatch::stock(1)).await,
        Err(SyncError::NotFound { local_id: LocalId(7) })
    );
}

#[tokio::test]
async fn test_activity_posts_notifications() {
    let harness = Harness::new();
    harness.sign_in(&ana()).await;
    let inventory = &harness.inventory;

    let mouse = inventory
        .add_product(ProductDraft::new("Mouse", 10.0, 3))
        .await
        .unwrap();
    inventory
        .edit_product(mouse.id, ProductPatch::price(12.0))
        .await
        .unwrap();
    inventory.remove_product(mouse.id).await.unwrap();
    harness.settle().await;

    let kinds: Vec<_> = inventory
        .notifications()
        .notifications()
        .iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::ProductRemoved,
            NotificationKind::LowStock,
            NotificationKind::ProductEdited,
            NotificationKind::LowStock,
            NotificationKind::ProductAdded,
        ]
    );
    assert_eq!(inventory.notifications().unread_count(), 5);
    assert!(inventory.products().all().is_empty());
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_the_write() {
    let harness = Harness::new();
    harness.sign_in(&ana()).await;

    let inventory = &harness.inventory;
    let mouse = inventory
        .add_product(ProductDraft::new("Mouse", 10.0, 50))
        .await
        .unwrap();

    // The update goes through; posting the notification after it fails.
    harness
        .store
        .fail_next(StoreOp::Create, SyncError::unavailable("offline"));
    assert_ok!(inventory.edit_product(mouse.id, ProductPatch::stock(40)).await);
    assert_eq!(inventory.products().get(mouse.id).unwrap().stock, 40);
}

#[tokio::test]
async fn test_write_right_after_sign_in_is_accepted() {
    let harness = Harness::new();
    harness.inventory.apply(&AuthState::Present(ana()));

    let mouse = harness
        .inventory
        .add_product(ProductDraft::new("Mouse", 10.0, 5))
        .await;

    assert_ok!(&mouse);
    harness.settle().await;
    assert_eq!(harness.inventory.products().all().len(), 1);
    assert_eq!(harness.store.documents("productos", &ana().uid).len(), 1);
}
