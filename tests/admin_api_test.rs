//! Back-office surface: session auth, catalog CRUD, order management,
//! settings, and delivery fees.

mod common;

use axum::http::{Method, StatusCode};
use common::{cookies_from, response_json, TestApp};
use serde_json::json;

async fn admin_cookie(app: &TestApp) -> String {
    let login = app
        .request(
            Method::POST,
            "/api/admin/login",
            Some(json!({ "username": "admin", "password": "atelier-test-password" })),
        )
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    cookies_from(&login)
}

#[tokio::test]
async fn wrong_credentials_are_rejected() {
    let app = TestApp::new().await;
    let login = app
        .request(
            Method::POST,
            "/api/admin/login",
            Some(json!({ "username": "admin", "password": "wrong" })),
        )
        .await;
    assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(login).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn admin_routes_require_a_session() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/admin/orders", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);

    let forged = app
        .request_with_headers(
            Method::GET,
            "/api/admin/orders",
            None,
            &[("cookie", "atelier_admin=forged-token")],
        )
        .await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new().await;
    let cookie = admin_cookie(&app).await;

    let logout = app
        .request_with_headers(Method::POST, "/api/admin/logout", None, &[("cookie", &cookie)])
        .await;
    assert_eq!(logout.status(), StatusCode::OK);
    // The replacement cookie is empty.
    assert_eq!(cookies_from(&logout), "atelier_admin=");
}

#[tokio::test]
async fn product_and_variant_crud() {
    let app = TestApp::new().await;
    let cookie = admin_cookie(&app).await;

    let create = app
        .request_with_headers(
            Method::POST,
            "/api/admin/products",
            Some(json!({
                "sku": "SHOE-010",
                "category": "shoes",
                "name": "Suede Pump",
                "description": "Block heel",
                "price": 8_900,
                "images": ["https://cdn.example/pump.jpg"]
            })),
            &[("cookie", &cookie)],
        )
        .await;
    assert_eq!(create.status(), StatusCode::OK);
    let product_id = response_json(create).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let add_variant = app
        .request_with_headers(
            Method::POST,
            &format!("/api/admin/products/{product_id}/variants"),
            Some(json!({ "size": "38", "color": "Burgundy", "stock": 4, "low_stock_threshold": 1 })),
            &[("cookie", &cookie)],
        )
        .await;
    assert_eq!(add_variant.status(), StatusCode::OK);
    let variant = response_json(add_variant).await;
    let variant_id = variant["data"]["id"].as_str().unwrap().to_string();

    // Update the variant stock through the admin override.
    let update_variant = app
        .request_with_headers(
            Method::PUT,
            &format!("/api/admin/variants/{variant_id}"),
            Some(json!({
                "product_id": product_id,
                "size": "38",
                "color": "Burgundy",
                "stock": 9,
                "low_stock_threshold": 1
            })),
            &[("cookie", &cookie)],
        )
        .await;
    assert_eq!(update_variant.status(), StatusCode::OK);

    // Deactivate the product; the storefront stops listing it, admin keeps it.
    let deactivate = app
        .request_with_headers(
            Method::PUT,
            &format!("/api/admin/products/{product_id}"),
            Some(json!({
                "sku": "SHOE-010",
                "category": "shoes",
                "name": "Suede Pump",
                "description": "Block heel",
                "price": 8_900,
                "active": false
            })),
            &[("cookie", &cookie)],
        )
        .await;
    assert_eq!(deactivate.status(), StatusCode::OK);

    let storefront = app.request(Method::GET, "/api/products", None).await;
    assert_eq!(
        response_json(storefront).await["data"].as_array().unwrap().len(),
        0
    );
    let back_office = app
        .request_with_headers(Method::GET, "/api/admin/products", None, &[("cookie", &cookie)])
        .await;
    assert_eq!(
        response_json(back_office).await["data"].as_array().unwrap().len(),
        1
    );
}

#[tokio::test]
async fn negative_price_is_rejected() {
    let app = TestApp::new().await;
    let cookie = admin_cookie(&app).await;

    let create = app
        .request_with_headers(
            Method::POST,
            "/api/admin/products",
            Some(json!({
                "sku": "X",
                "category": "shoes",
                "name": "Broken",
                "price": -5
            })),
            &[("cookie", &cookie)],
        )
        .await;
    assert_eq!(create.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_paid_transition_runs_side_effects_once() {
    let app = TestApp::new().await;
    let cookie = admin_cookie(&app).await;
    let (product, variant) = app.seed_catalog(12_500, 10).await;

    // Customer places a card order that never completes online.
    let add = app
        .request(
            Method::POST,
            "/api/cart/items",
            Some(json!({ "product_id": product.id, "variant_id": variant.id, "qty": 2 })),
        )
        .await;
    let cart_cookie = cookies_from(&add);
    let checkout = app
        .request_with_headers(
            Method::POST,
            "/api/checkout",
            Some(json!({
                "customer_name": "Wanjiku M.",
                "customer_email": "wanjiku@example.com",
                "customer_phone": "0712345678",
                "delivery_location_key": "nairobi-cbd",
                "delivery_address": "Kimathi St",
                "payment_method": "MPESA"
            })),
            &[("cookie", &cart_cookie)],
        )
        .await;
    let order_id = response_json(checkout).await["data"]["order"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Admin confirms payment manually, twice.
    for _ in 0..2 {
        let update = app
            .request_with_headers(
                Method::PUT,
                &format!("/api/admin/orders/{order_id}/status"),
                Some(json!({ "status": "PAID" })),
                &[("cookie", &cookie)],
            )
            .await;
        assert_eq!(update.status(), StatusCode::OK);
        assert_eq!(response_json(update).await["data"]["status"], "PAID");
    }

    // Decremented once, one confirmation email.
    assert_eq!(app.variant_stock(variant.id).await, 8);
    let confirmations = app
        .mailer
        .subjects_for("wanjiku@example.com")
        .iter()
        .filter(|subject| subject.contains("Payment confirmed"))
        .count();
    assert_eq!(confirmations, 1);

    // Continue the lifecycle.
    let processing = app
        .request_with_headers(
            Method::PUT,
            &format!("/api/admin/orders/{order_id}/status"),
            Some(json!({ "status": "PROCESSING" })),
            &[("cookie", &cookie)],
        )
        .await;
    assert_eq!(response_json(processing).await["data"]["status"], "PROCESSING");
}

#[tokio::test]
async fn settings_round_trip_ignores_unknown_keys() {
    let app = TestApp::new().await;
    let cookie = admin_cookie(&app).await;

    let update = app
        .request_with_headers(
            Method::PUT,
            "/api/admin/settings",
            Some(json!({
                "contact_email": "orders@example.com",
                "payments_enabled": "false",
                "made_up_key": "ignored"
            })),
            &[("cookie", &cookie)],
        )
        .await;
    assert_eq!(update.status(), StatusCode::OK);
    let body = response_json(update).await;
    assert_eq!(body["data"]["contact_email"], "orders@example.com");
    assert_eq!(body["data"]["payments_enabled"], false);
    assert!(body["data"].get("made_up_key").is_none());

    // Public settings reflect the change without exposing admin-only keys.
    let public = app.request(Method::GET, "/api/settings", None).await;
    let public_body = response_json(public).await;
    assert_eq!(public_body["data"]["contact_email"], "orders@example.com");
    assert_eq!(public_body["data"]["payments_enabled"], false);
}

#[tokio::test]
async fn disabled_online_payments_block_card_checkout() {
    let app = TestApp::new().await;
    let cookie = admin_cookie(&app).await;
    let (product, variant) = app.seed_catalog(12_500, 5).await;

    app.request_with_headers(
        Method::PUT,
        "/api/admin/settings",
        Some(json!({ "payments_enabled": "false" })),
        &[("cookie", &cookie)],
    )
    .await;

    let add = app
        .request(
            Method::POST,
            "/api/cart/items",
            Some(json!({ "product_id": product.id, "variant_id": variant.id, "qty": 1 })),
        )
        .await;
    let cart_cookie = cookies_from(&add);
    let checkout = app
        .request_with_headers(
            Method::POST,
            "/api/checkout",
            Some(json!({
                "customer_name": "Wanjiku M.",
                "customer_email": "wanjiku@example.com",
                "customer_phone": "0712345678",
                "delivery_location_key": "nairobi-cbd",
                "delivery_address": "Kimathi St",
                "payment_method": "CARD"
            })),
            &[("cookie", &cart_cookie)],
        )
        .await;
    assert_eq!(checkout.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delivery_locations_crud() {
    let app = TestApp::new().await;
    let cookie = admin_cookie(&app).await;

    let upsert = app
        .request_with_headers(
            Method::PUT,
            "/api/admin/delivery-locations",
            Some(json!({
                "location_key": "mombasa",
                "label": "Mombasa",
                "fee": 600,
                "eta_days": "2-4"
            })),
            &[("cookie", &cookie)],
        )
        .await;
    assert_eq!(upsert.status(), StatusCode::OK);

    // Customers see it immediately.
    let public = app.request(Method::GET, "/api/delivery-locations", None).await;
    let locations = response_json(public).await;
    assert_eq!(locations["data"][0]["location_key"], "mombasa");
    assert_eq!(locations["data"][0]["fee"], 600);

    let delete = app
        .request_with_headers(
            Method::DELETE,
            "/api/admin/delivery-locations/mombasa",
            None,
            &[("cookie", &cookie)],
        )
        .await;
    assert_eq!(delete.status(), StatusCode::OK);

    let missing = app
        .request_with_headers(
            Method::DELETE,
            "/api/admin/delivery-locations/mombasa",
            None,
            &[("cookie", &cookie)],
        )
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
