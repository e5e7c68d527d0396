//! End-to-end tests of the HTTP surface over the in-memory store

mod common;

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use common::{json_request, TestApp, MASTER_TOKEN};
use shoreline_commerce::domain::{OrderStatus, PaymentStatus};
use shoreline_commerce::payments::{PayFastCredentials, PayFastGateway};

const KITE_HOST: &str = "kiteshack.shoreline.shop";

fn payfast_credentials() -> Value {
    json!({ "merchant_id": "10000100", "merchant_key": "46f0cd694581a", "passphrase": "salt-water" })
}

fn signed_itn(order_id: &str, status: &str, amount: &str) -> String {
    let gateway = PayFastGateway::new(
        PayFastCredentials {
            merchant_id: "10000100".into(),
            merchant_key: "46f0cd694581a".into(),
            passphrase: Some("salt-water".into()),
        },
        String::new(),
    );
    let mut params = BTreeMap::new();
    params.insert("m_payment_id".to_string(), order_id.to_string());
    params.insert("pf_payment_id".to_string(), "1089250".to_string());
    params.insert("payment_status".to_string(), status.to_string());
    params.insert("amount_gross".to_string(), amount.to_string());
    params.insert("merchant_id".to_string(), "10000100".to_string());
    let signature = gateway.itn_signature(&params);
    params.insert("signature".to_string(), signature);
    url::form_urlencoded::Serializer::new(String::new()).extend_pairs(params.iter()).finish()
}

fn itn_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/payments")
        .header("host", "shoreline.shop")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn checkout_body(session: &str) -> Value {
    json!({
        "session_id": session,
        "customer": { "email": "Rider@Example.com", "name": "Sam Rider", "phone": "+27820000000" },
        "shipping_address": { "line1": "1 Beach Rd", "city": "Muizenberg", "postal_code": "7945" },
        "gateway": "payfast",
        "return_url": "https://kiteshack.shoreline.shop/checkout/success",
        "cancel_url": "https://kiteshack.shoreline.shop/checkout/cancel"
    })
}

#[tokio::test]
async fn health_reports_service_name() {
    let app = TestApp::new();
    let (status, body) = app.send(json_request("GET", "/health", "localhost", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "shoreline-commerce");
}

#[tokio::test]
async fn checkout_and_payfast_itn_mark_order_paid() {
    let app = TestApp::new();
    let (tenant, _) = app.seed_tenant("Kite Shack", "kiteshack").await;
    let board = app.seed_product(&tenant, "Twin Tip 138", Decimal::new(500, 0), 5).await;
    app.seed_gateway(&tenant, "payfast", payfast_credentials(), true).await;

    let (status, _) = app
        .send(json_request("POST", "/api/v1/cart/sess-1", KITE_HOST, None, Some(json!({ "product_id": board.id, "quantity": 2 }))))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(json_request("POST", "/api/v1/checkout", KITE_HOST, None, Some(checkout_body("sess-1")))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order_id = body["data"]["order"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["order"]["status"], "pending");
    assert_eq!(body["data"]["order"]["customer_email"], "rider@example.com");
    let redirect = body["data"]["payment"]["redirect_url"].as_str().unwrap();
    assert!(redirect.starts_with("https://sandbox.payfast.co.za/eng/process?merchant_id=10000100"));
    assert!(redirect.contains("&signature="));

    // 2 x 500 plus the flat shipping rate
    let order = app.store.orders().into_iter().next().unwrap();
    assert_eq!(order.total, Decimal::new(1100, 0));

    let (status, body) = app.send(json_request("GET", "/api/v1/cart/sess-1", KITE_HOST, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 0);

    let (status, body) = app.send(itn_request(signed_itn(&order_id, "COMPLETE", "1100.00"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["payment_status"], "paid");
    assert_eq!(body["data"]["gateway"], "payfast");

    let order = app.store.orders().into_iter().next().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.gateway_reference.as_deref(), Some("1089250"));
    assert_eq!(app.store.product(board.id).unwrap().stock, 3);
    assert!(app.events.contains("commerce.kiteshack.order.placed"));
    assert!(app.events.contains("commerce.kiteshack.order.paid"));

    // A repeated callback does not take stock twice.
    let (status, _) = app.send(itn_request(signed_itn(&order_id, "COMPLETE", "1100.00"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.product(board.id).unwrap().stock, 3);

    let (status, body) = app
        .send(json_request("GET", &format!("/api/v1/orders/{order_id}/status"), KITE_HOST, None, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payment_status"], "paid");
}

#[tokio::test]
async fn itn_with_bad_signature_is_rejected() {
    let app = TestApp::new();
    let (tenant, _) = app.seed_tenant("Kite Shack", "kiteshack").await;
    let board = app.seed_product(&tenant, "Twin Tip 138", Decimal::new(500, 0), 5).await;
    app.seed_gateway(&tenant, "payfast", payfast_credentials(), true).await;
    app.send(json_request("POST", "/api/v1/cart/s2", KITE_HOST, None, Some(json!({ "product_id": board.id })))).await;
    let (_, body) = app.send(json_request("POST", "/api/v1/checkout", KITE_HOST, None, Some(checkout_body("s2")))).await;
    let order_id = body["data"]["order"]["id"].as_str().unwrap().to_string();

    let tampered = signed_itn(&order_id, "COMPLETE", "600.00").replace("amount_gross=600.00", "amount_gross=1.00");
    let (status, body) = app.send(itn_request(tampered)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["data"], Value::Null);

    let order = app.store.orders().into_iter().next().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(app.store.product(board.id).unwrap().stock, 5);
}

#[tokio::test]
async fn checkout_rejects_unconfigured_gateway_and_empty_cart() {
    let app = TestApp::new();
    let (tenant, _) = app.seed_tenant("Kite Shack", "kiteshack").await;
    let board = app.seed_product(&tenant, "Twin Tip 138", Decimal::new(500, 0), 5).await;

    let (status, body) = app.send(json_request("POST", "/api/v1/checkout", KITE_HOST, None, Some(checkout_body("empty")))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "cart is empty");

    app.send(json_request("POST", "/api/v1/cart/s3", KITE_HOST, None, Some(json!({ "product_id": board.id })))).await;
    let (status, _) = app.send(json_request("POST", "/api/v1/checkout", KITE_HOST, None, Some(checkout_body("s3")))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.store.orders().is_empty());
}

#[tokio::test]
async fn unknown_subdomain_is_not_found_but_localhost_falls_back() {
    let app = TestApp::new();
    app.seed_tenant("Kite Shack", "kiteshack").await;

    let (status, body) = app.send(json_request("GET", "/api/v1/products", "nowhere.shoreline.shop", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "store not found");

    let (status, body) = app.send(json_request("GET", "/api/v1/tenant", "nowhere.shoreline.shop", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], Value::Null);

    let (status, body) = app.send(json_request("GET", "/api/v1/tenant", "localhost:3000", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], "demo");

    let (status, body) = app.send(json_request("GET", "/api/v1/tenant", KITE_HOST, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Kite Shack");
}

#[tokio::test]
async fn tenant_data_does_not_leak_across_hosts() {
    let app = TestApp::new();
    let (kite, _) = app.seed_tenant("Kite Shack", "kiteshack").await;
    app.seed_tenant("Surf Co", "surfco").await;
    let board = app.seed_product(&kite, "Twin Tip 138", Decimal::new(500, 0), 5).await;

    let (status, body) = app.send(json_request("GET", "/api/v1/products", KITE_HOST, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], 1);

    let (status, body) = app.send(json_request("GET", "/api/v1/products", "surfco.shoreline.shop", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let (status, _) = app
        .send(json_request("GET", &format!("/api/v1/products/{}", board.id), "surfco.shoreline.shop", None, None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cart_line_quantity_is_capped() {
    let app = TestApp::new();
    let (kite, _) = app.seed_tenant("Kite Shack", "kiteshack").await;
    let leash = app.seed_product(&kite, "Board Leash", Decimal::new(250, 0), 5).await;
    let add = |quantity: u64| json_request("POST", "/api/v1/cart/s-bulk", KITE_HOST, None, Some(json!({ "product_id": leash.id, "quantity": quantity })));

    let (status, body) = app.send(add(1000)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "quantity: at most 999 per line");
    let (status, _) = app.send(add(4_294_967_295)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.send(add(999)).await;
    let (status, body) = app.send(add(999)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["item_count"], 999);

    let (status, _) = app
        .send(json_request("PUT", &format!("/api/v1/cart/s-bulk/items/{}", leash.id), KITE_HOST, None, Some(json!({ "quantity": 5000 }))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn product_updates_cannot_borrow_another_tenants_category() {
    let app = TestApp::new();
    let (kite, kite_key) = app.seed_tenant("Kite Shack", "kiteshack").await;
    let (_, surf_key) = app.seed_tenant("Surf Co", "surfco").await;
    let board = app.seed_product(&kite, "Twin Tip 138", Decimal::new(500, 0), 5).await;

    let (status, body) = app
        .send(json_request("POST", "/api/v1/manage/categories", "surfco.shoreline.shop", Some(&surf_key), Some(json!({ "name": "Longboards" }))))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let foreign = body["data"]["id"].as_str().unwrap().to_string();
    let (_, body) = app
        .send(json_request("POST", "/api/v1/manage/categories", KITE_HOST, Some(&kite_key), Some(json!({ "name": "Twin Tips" }))))
        .await;
    let own = body["data"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/manage/products/{}", board.id);
    let update = |category: &str| json!({ "name": "Twin Tip 138", "price": "500.00", "stock": 5, "category_id": category });
    let (status, body) = app.send(json_request("PUT", &uri, KITE_HOST, Some(&kite_key), Some(update(&foreign)))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "category_id: unknown category");
    assert_eq!(app.store.product(board.id).unwrap().category_id, None);

    let (status, body) = app.send(json_request("PUT", &uri, KITE_HOST, Some(&kite_key), Some(update(&own)))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["category_id"], own.as_str());
}

#[tokio::test]
async fn master_admin_provisions_tenant_and_key_unlocks_manage_routes() {
    let app = TestApp::new();
    let create = json!({ "name": "Surf Co", "slug": "Surf Co", "contact_email": "hi@surf.co" });

    let (status, _) = app.send(json_request("POST", "/api/v1/admin/tenants", "localhost", None, Some(create.clone()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send(json_request("POST", "/api/v1/admin/tenants", "localhost", Some("wrong"), Some(create.clone()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.send(json_request("POST", "/api/v1/admin/tenants", "localhost", Some(MASTER_TOKEN), Some(create.clone()))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["tenant"]["slug"], "surf-co");
    assert!(body["data"]["tenant"].get("admin_key_hash").is_none());
    let key = body["data"]["admin_key"].as_str().unwrap().to_string();
    assert!(key.starts_with("sk_surfco_"));
    assert!(app.events.contains("commerce.surf-co.tenant.provisioned"));

    let (status, _) = app.send(json_request("POST", "/api/v1/admin/tenants", "localhost", Some(MASTER_TOKEN), Some(create))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let host = "surf-co.shoreline.shop";
    let (status, body) = app.send(json_request("GET", "/api/v1/manage/orders", host, Some(&key), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let (status, _) = app.send(json_request("GET", "/api/v1/manage/orders", host, Some("sk_surfco_nope"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(json_request("GET", "/api/v1/manage/orders", host, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send(json_request("GET", "/api/v1/manage/orders", host, Some(MASTER_TOKEN), None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn gateway_credentials_are_validated_and_hidden() {
    let app = TestApp::new();
    let (tenant, _) = app.seed_tenant("Kite Shack", "kiteshack").await;
    let uri = format!("/api/v1/admin/tenants/{}/gateways/yoco", tenant.id);

    let (status, body) = app
        .send(json_request("PUT", &uri, "localhost", Some(MASTER_TOKEN), Some(json!({ "credentials": { "secret_key": "sk_test" } }))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("webhook_secret"));

    let creds = json!({ "credentials": { "secret_key": "sk_test", "webhook_secret": "whsec_c2VjcmV0" }, "is_test_mode": true });
    let (status, body) = app.send(json_request("PUT", &uri, "localhost", Some(MASTER_TOKEN), Some(creds))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["gateway_code"], "yoco");
    assert!(body["data"].get("credentials").is_none());

    let (status, _) = app
        .send(json_request("PUT", &format!("/api/v1/admin/tenants/{}/gateways/paypal", tenant.id), "localhost", Some(MASTER_TOKEN), Some(json!({ "credentials": {} }))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(json_request("DELETE", &uri, "localhost", Some(MASTER_TOKEN), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(json_request("DELETE", &uri, "localhost", Some(MASTER_TOKEN), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn demo_slots_respect_capacity_and_invoices_follow_lifecycle() {
    let app = TestApp::new();
    let (_, key) = app.seed_tenant("Kite Shack", "kiteshack").await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/v1/manage/locations",
            KITE_HOST,
            Some(&key),
            Some(json!({ "name": "Muizenberg Beach", "time_slots": ["11:00", "09:00"], "capacity_per_slot": 1 })),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let location_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["time_slots"], json!(["09:00", "11:00"]));

    let date = (Utc::now() + Duration::days(3)).date_naive().to_string();
    let booking = |name: &str| json!({
        "location_id": location_id,
        "customer_name": name,
        "customer_email": format!("{}@example.com", name.to_lowercase()),
        "product_interest": "Foil board",
        "booking_date": date,
        "time_slot": "09:00"
    });

    let (status, body) = app.send(json_request("POST", "/api/v1/bookings", KITE_HOST, None, Some(booking("Alex")))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let booking_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["status"], "pending");

    let (status, _) = app.send(json_request("POST", "/api/v1/bookings", KITE_HOST, None, Some(booking("Blake")))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(json_request("GET", &format!("/api/v1/bookings/availability?location_id={location_id}&date={date}"), KITE_HOST, None, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["time_slot"], "09:00");
    assert_eq!(body["data"][0]["available"], false);
    assert_eq!(body["data"][1]["remaining"], 1);

    let fee_uri = format!("/api/v1/manage/bookings/{booking_id}/fee");
    let (status, _) = app.send(json_request("PUT", &fee_uri, KITE_HOST, Some(&key), Some(json!({ "fee": "-5.00" })))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = app.send(json_request("PUT", &fee_uri, KITE_HOST, Some(&key), Some(json!({ "fee": "460.00" })))).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app
        .send(json_request("POST", "/api/v1/manage/invoices", KITE_HOST, Some(&key), Some(json!({ "source": "booking", "source_id": booking_id }))))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let amount = |field: &str| body["data"][field].as_str().unwrap().parse::<Decimal>().unwrap();
    assert_eq!(amount("total"), Decimal::new(460, 0));
    assert_eq!(amount("vat_amount"), Decimal::new(60, 0));
    assert_eq!(amount("subtotal_ex_vat"), Decimal::new(400, 0));
    let invoice_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["status"], "draft");
    assert!(body["data"]["invoice_number"].as_str().unwrap().starts_with("INV-"));

    let (status, _) = app
        .send(json_request("POST", "/api/v1/manage/invoices", KITE_HOST, Some(&key), Some(json!({ "source": "booking", "source_id": booking_id }))))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let action = |name: &str| format!("/api/v1/manage/invoices/{invoice_id}/{name}");
    let (status, _) = app.send(json_request("POST", &action("archive"), KITE_HOST, Some(&key), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = app.send(json_request("POST", &action("send"), KITE_HOST, Some(&key), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "sent");
    let (status, body) = app.send(json_request("POST", &action("pay"), KITE_HOST, Some(&key), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "paid");
    let (status, _) = app.send(json_request("POST", &action("send"), KITE_HOST, Some(&key), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(json_request("POST", "/api/v1/manage/invoices/refresh-overdue", KITE_HOST, Some(&key), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], 0);
}

#[tokio::test]
async fn media_delete_is_confined_to_tenant_prefix() {
    let app = TestApp::new();
    let (_, key) = app.seed_tenant("Kite Shack", "kiteshack").await;

    let (status, _) = app
        .send(json_request("DELETE", "/api/v1/manage/media", KITE_HOST, Some(&key), Some(json!({ "path": "surfco/products/1-a.jpg" }))))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(json_request("DELETE", "/api/v1/manage/media", KITE_HOST, Some(&key), Some(json!({ "path": "kiteshack/products/1-a.jpg" }))))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(*app.storage.deleted.read(), vec!["kiteshack/products/1-a.jpg".to_string()]);
}

#[tokio::test]
async fn media_upload_attaches_image_to_product() {
    let app = TestApp::new();
    let (tenant, key) = app.seed_tenant("Kite Shack", "kiteshack").await;
    let board = app.seed_product(&tenant, "Twin Tip 138", Decimal::new(500, 0), 5).await;

    let boundary = "shoreline-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"product_id\"\r\n\r\n{}\r\n\
         --{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"Board Top.PNG\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n\
         --{boundary}--\r\n",
        board.id
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/manage/media")
        .header("host", KITE_HOST)
        .header("authorization", format!("Bearer {key}"))
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let path = body["data"]["path"].as_str().unwrap();
    assert!(path.starts_with("kiteshack/products/"));
    assert!(path.ends_with("-board-top.png"));

    let images = app.store.product(board.id).unwrap().images;
    assert_eq!(images, vec![format!("https://cdn.test/{path}")]);
}
