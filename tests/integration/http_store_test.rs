//! HTTP store against a mock backend

use std::sync::Arc;

use assert_matches::assert_matches;
use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use inventory_sync::store::{BatchWrite, DocumentStore, Fields};
use inventory_sync::{
    AuthState, HttpStore, Inventory, OwnerId, SyncConfig, SyncError,
};

use crate::common::*;

fn store_for(server: &MockServer) -> HttpStore {
    let config = SyncConfig::builder()
        .store_url(server.uri())
        .auth_token("secret")
        .build()
        .unwrap();
    HttpStore::new(&config).unwrap()
}

fn document(remote_ref: &str, fields: serde_json::Value) -> serde_json::Value {
    json!({
        "ref": remote_ref,
        "userId": "ana",
        "createdAt": "2024-05-01T10:00:00Z",
        "fields": fields,
    })
}

fn fields(value: serde_json::Value) -> Fields {
    match value {
        serde_json::Value::Object(fields) => fields,
        _ => panic!("expected an object"),
    }
}

#[tokio::test]
async fn test_list_sends_owner_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/productos/documents"))
        .and(query_param("owner", "ana"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            document("r1", json!({ "id": 1, "nombre": "Mouse", "precio": 10.0, "stock": 5 })),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let documents = store_for(&server)
        .list("productos", &OwnerId::new("ana"))
        .await
        .unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].remote_ref.as_str(), "r1");
    assert_eq!(documents[0].fields["nombre"], "Mouse");
}

#[tokio::test]
async fn test_create_posts_owner_and_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/categorias/documents"))
        .and(body_json(json!({ "owner": "ana", "fields": { "nombre": "Ropa" } })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(document("c1", json!({ "nombre": "Ropa" }))),
        )
        .mount(&server)
        .await;

    let created = store_for(&server)
        .create("categorias", &OwnerId::new("ana"), fields(json!({ "nombre": "Ropa" })))
        .await
        .unwrap();
    assert_eq!(created.remote_ref.as_str(), "c1");
}

#[tokio::test]
async fn test_status_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/collections/productos/documents/r1"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({ "field": "precio", "message": "must be positive" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/collections/productos/documents/r1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let created = store
        .create("productos", &OwnerId::new("ana"), Fields::new())
        .await;
    assert_matches!(created, Err(SyncError::RemoteUnavailable { .. }));

    let documents = store.list("productos", &OwnerId::new("ana")).await;
    assert_matches!(documents, Err(SyncError::RemoteUnavailable { .. }));

    let remote_ref = serde_json::from_value(json!("r1")).unwrap();
    assert_eq!(
        store
            .update("productos", &remote_ref, fields(json!({ "precio": -1 })))
            .await,
        Err(SyncError::validation("precio", "must be positive"))
    );
    assert_matches!(
        store.delete("productos", &remote_ref).await,
        Err(SyncError::RemoteUnavailable { .. })
    );
}

#[tokio::test]
async fn test_batch_is_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/batch"))
        .and(body_json(json!({
            "writes": [
                { "op": "update", "collection": "notificaciones", "ref": "n1", "fields": { "leida": true } },
                { "op": "delete", "collection": "notificaciones", "ref": "n2" },
            ]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let writes = vec![
        BatchWrite::Update {
            collection: "notificaciones".into(),
            remote_ref: serde_json::from_value(json!("n1")).unwrap(),
            fields: fields(json!({ "leida": true })),
        },
        BatchWrite::Delete {
            collection: "notificaciones".into(),
            remote_ref: serde_json::from_value(json!("n2")).unwrap(),
        },
    ];
    store_for(&server).commit_batch(writes).await.unwrap();
}

#[tokio::test]
async fn test_watch_reads_event_stream_windows() {
    let server = MockServer::start().await;
    let first = json!([document("n2", json!({ "titulo": "B" })), document("n1", json!({ "titulo": "A" }))]);
    let second = json!([document("n1", json!({ "titulo": "A" }))]);
    let body = format!(": keep-alive\n\ndata: {}\n\ndata: {}\n\n", first, second);

    Mock::given(method("GET"))
        .and(path("/collections/notificaciones/watch"))
        .and(query_param("owner", "ana"))
        .and(query_param("limit", "50"))
        .and(header("Accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut stream = store_for(&server)
        .watch_window("notificaciones", &OwnerId::new("ana"), 50)
        .await
        .unwrap();

    let window = stream.next().await.unwrap().unwrap();
    assert_eq!(window.len(), 2);
    let window = stream.next().await.unwrap().unwrap();
    assert_eq!(window.len(), 1);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_watch_joins_multiline_events_and_flushes_the_last_one() {
    let server = MockServer::start().await;
    let a = document("n1", json!({ "titulo": "A" }));
    let b = document("n2", json!({ "titulo": "B" }));
    // the final event has neither a blank line nor a trailing newline
    let body = format!("data: [{},\ndata: {}]\n\ndata: [{}]", b, a, a);

    Mock::given(method("GET"))
        .and(path("/collections/notificaciones/watch"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut stream = store_for(&server)
        .watch_window("notificaciones", &OwnerId::new("ana"), 50)
        .await
        .unwrap();

    let window = stream.next().await.unwrap().unwrap();
    let refs: Vec<_> = window.iter().map(|d| d.remote_ref.as_str().to_string()).collect();
    assert_eq!(refs, vec!["n2", "n1"]);

    let window = stream.next().await.unwrap().unwrap();
    assert_eq!(window.len(), 1);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_batch_create_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/batch"))
        .and(body_json(json!({
            "writes": [
                { "op": "create", "collection": "categorias", "owner": "ana", "fields": { "nombre": "Ropa" } },
            ]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let writes = vec![BatchWrite::Create {
        collection: "categorias".into(),
        owner: OwnerId::new("ana"),
        fields: fields(json!({ "nombre": "Ropa" })),
    }];
    store_for(&server).commit_batch(writes).await.unwrap();
}

#[tokio::test]
async fn test_watch_rejection_is_a_subscription_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/notificaciones/watch"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = store_for(&server)
        .watch_window("notificaciones", &OwnerId::new("ana"), 50)
        .await;
    assert_matches!(result.err(), Some(SyncError::SubscriptionError { .. }));
}

#[tokio::test]
async fn test_inventory_loads_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/productos/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            document("r1", json!({ "id": 1, "nombre": "Mouse", "precio": 10.0, "stock": 5 })),
            document("r2", json!({ "id": 2, "nombre": "Teclado", "precio": 25.0, "stock": 0 })),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/categorias/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/notificaciones/watch"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("data: []\n\n", "text/event-stream"))
        .mount(&server)
        .await;

    let config = SyncConfig::builder()
        .store_url(server.uri())
        .seed_default_categories(false)
        .build()
        .unwrap();
    let inventory = Inventory::new(Arc::new(HttpStore::new(&config).unwrap()), config);
    inventory.apply(&AuthState::Present(ana()));
    inventory.lifecycle().settled().await;

    let products = inventory.products();
    assert_eq!(products.all().len(), 2);
    assert_eq!(products.inventory_value(), 50.0);
    assert_eq!(products.out_of_stock().len(), 1);
    assert!(inventory.categories().all().is_empty());
}
