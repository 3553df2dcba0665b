//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{CompanyId, Money, OrderStatus};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use storage::{City, InMemoryStore, Product, Shop};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    store: InMemoryStore,
    shop: Shop,
    city: City,
    cement: Product,
}

async fn setup() -> TestApp {
    let store = InMemoryStore::new();
    let shop = store.add_shop(CompanyId::new(1), "Stroymarket").await;
    let city = store.add_city("Алматы", "Алматы").await;
    let cement = store
        .add_product(shop.id, "Цемент М500", Money::from_units(1500), 10)
        .await;

    let state = Arc::new(api::AppState::new(store.clone()));
    let app = api::create_app(state, get_metrics_handle());
    TestApp {
        app,
        store,
        shop,
        city,
        cement,
    }
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    customer: Option<i64>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(id) = customer {
        request = request.header("x-customer-id", id.to_string());
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn delivery(t: &TestApp) -> Value {
    json!({
        "shop_id": t.shop.id,
        "delivery_address": "ул. Абая 10",
        "delivery_city_id": t.city.id,
        "contact_phone": "+77010000000",
        "delivery_apartment": "5"
    })
}

#[tokio::test]
async fn test_health_check() {
    let t = setup().await;

    let (status, json) = send(&t.app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup().await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_customer_is_unauthorized() {
    let t = setup().await;

    let (status, json) = send(&t.app, "GET", "/carts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].is_string());

    let (status, _) = send(&t.app, "GET", "/orders", Some(0), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_add_item_and_view_cart() {
    let t = setup().await;
    let body = json!({ "product_id": t.cement.id, "quantity": 2 });

    let (status, json) = send(&t.app, "POST", "/carts/items", Some(1), Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["shop_id"], t.shop.id.as_i64());
    assert_eq!(json["items_count"], 2);
    assert_eq!(json["total"], "3000");
    assert_eq!(json["items"][0]["product"]["name_ru"], "Цемент М500");

    let uri = format!("/carts/{}", t.shop.id);
    let (status, json) = send(&t.app, "GET", &uri, Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"].as_array().unwrap().len(), 1);

    let (_, json) = send(&t.app, "GET", "/carts", Some(1), None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cart_errors() {
    let t = setup().await;

    let body = json!({ "product_id": 9999 });
    let (status, _) = send(&t.app, "POST", "/carts/items", Some(1), Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body = json!({ "product_id": t.cement.id, "quantity": 11 });
    let (status, json) = send(&t.app, "POST", "/carts/items", Some(1), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Insufficient stock for product: Цемент М500");

    let body = json!({ "product_id": t.cement.id, "quantity": 0 });
    let (status, _) = send(&t.app, "POST", "/carts/items", Some(1), Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&t.app, "DELETE", "/carts/123", Some(1), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_remove_and_clear() {
    let t = setup().await;
    let body = json!({ "product_id": t.cement.id });
    let (_, cart) = send(&t.app, "POST", "/carts/items", Some(1), Some(body)).await;
    let item_id = cart["items"][0]["id"].as_i64().unwrap();
    let item_uri = format!("/carts/items/{item_id}");

    let (status, json) = send(
        &t.app,
        "PATCH",
        &item_uri,
        Some(1),
        Some(json!({ "quantity": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"][0]["quantity"], 4);

    let (status, _) = send(
        &t.app,
        "PATCH",
        &item_uri,
        Some(2),
        Some(json!({ "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&t.app, "DELETE", &item_uri, Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"].as_array().unwrap().len(), 0);

    let uri = format!("/carts/{}", t.shop.id);
    let (status, json) = send(&t.app, "DELETE", &uri, Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items_count"], 0);
}

#[tokio::test]
async fn test_checkout_flow() {
    let t = setup().await;
    let body = json!({ "product_id": t.cement.id, "quantity": 3 });
    send(&t.app, "POST", "/carts/items", Some(1), Some(body)).await;

    let (status, order) = send(&t.app, "POST", "/orders", Some(1), Some(delivery(&t))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total"], "4500");
    assert_eq!(order["items_count"], 3);
    assert_eq!(order["delivery"]["apartment"], "5");
    assert_eq!(order["delivery_city"]["name_ru"], "Алматы");
    assert!(
        order["order_number"]
            .as_str()
            .unwrap()
            .ends_with("-00001")
    );
    assert_eq!(
        t.store.product_snapshot(t.cement.id).await.unwrap().quantity,
        7
    );

    let id = order["id"].as_i64().unwrap();
    let (status, fetched) = send(&t.app, "GET", &format!("/orders/{id}"), Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["order_number"], order["order_number"]);

    let (_, list) = send(&t.app, "GET", "/orders", Some(1), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_rejections() {
    let t = setup().await;

    // No cart yet for this shop.
    let (status, _) = send(&t.app, "POST", "/orders", Some(1), Some(delivery(&t))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uri = format!("/carts/{}", t.shop.id);
    send(&t.app, "GET", &uri, Some(1), None).await;
    let (status, json) = send(&t.app, "POST", "/orders", Some(1), Some(delivery(&t))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "Cart is empty");

    let body = json!({ "product_id": t.cement.id, "quantity": 1 });
    send(&t.app, "POST", "/carts/items", Some(1), Some(body)).await;
    let mut bad = delivery(&t);
    bad["contact_phone"] = json!("1".repeat(21));
    let (status, _) = send(&t.app, "POST", "/orders", Some(1), Some(bad)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    t.store.update_product(t.cement.id, |p| p.quantity = 0).await;
    let (status, _) = send(&t.app, "POST", "/orders", Some(1), Some(delivery(&t))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(t.store.order_count().await, 0);
}

#[tokio::test]
async fn test_order_number_collision_is_unavailable() {
    let t = setup().await;
    let body = json!({ "product_id": t.cement.id });
    send(&t.app, "POST", "/carts/items", Some(1), Some(body)).await;
    t.store.inject_order_number_collisions(5);

    let (status, _) = send(&t.app, "POST", "/orders", Some(1), Some(delivery(&t))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_cancel_order() {
    let t = setup().await;
    let body = json!({ "product_id": t.cement.id, "quantity": 4 });
    send(&t.app, "POST", "/carts/items", Some(1), Some(body)).await;
    let (_, order) = send(&t.app, "POST", "/orders", Some(1), Some(delivery(&t))).await;
    let uri = format!("/orders/{}/cancel", order["id"].as_i64().unwrap());

    let (status, _) = send(&t.app, "POST", &uri, Some(2), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&t.app, "POST", &uri, Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], OrderStatus::Cancelled.as_str());
    assert_eq!(
        t.store.product_snapshot(t.cement.id).await.unwrap().quantity,
        10
    );

    let (status, _) = send(&t.app, "POST", &uri, Some(1), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_foreign_order_is_not_found() {
    let t = setup().await;
    let body = json!({ "product_id": t.cement.id });
    send(&t.app, "POST", "/carts/items", Some(1), Some(body)).await;
    let (_, order) = send(&t.app, "POST", "/orders", Some(1), Some(delivery(&t))).await;

    let uri = format!("/orders/{}", order["id"].as_i64().unwrap());
    let (status, _) = send(&t.app, "GET", &uri, Some(2), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_bodies_use_error_body() {
    let t = setup().await;
    let body = json!({ "product_id": t.cement.id });
    send(&t.app, "POST", "/carts/items", Some(1), Some(body)).await;

    let mut incomplete = delivery(&t);
    incomplete.as_object_mut().unwrap().remove("delivery_address");
    let (status, json) = send(&t.app, "POST", "/orders", Some(1), Some(incomplete)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("delivery_address"));

    let request = Request::builder()
        .method("POST")
        .uri("/carts/items")
        .header("x-customer-id", "1")
        .header("content-type", "application/json")
        .body(Body::from("{\"product_id\":"))
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(json["error"].is_string());
    assert_eq!(t.store.order_count().await, 0);
}
