//! HTTP surface: storefront, tenant admin (`/api/v1/manage`) and master admin
//! (`/api/v1/admin`) routes over one shared [`AppState`].

mod admin;
mod bookings;
mod cart;
mod catalog;
mod checkout;
pub mod dto;
pub mod extract;
mod integrations;
mod invoices;
mod media;
mod orders;
pub mod response;
mod storefront;
mod webhooks;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::drive::{GoogleDrive, GoogleEndpoints};
use crate::infra::{EventPublisher, ObjectStorage};
use crate::medusa::MedusaClient;
use crate::payments::{GatewayEndpoints, PaymentService};
use crate::store::Store;
use crate::tenancy;

/// Largest accepted media upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Outbound API locations, replaced with mock servers in tests.
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    pub gateways: GatewayEndpoints,
    pub google: GoogleEndpoints,
}

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub storage: Arc<dyn ObjectStorage>,
    pub events: Arc<dyn EventPublisher>,
    pub payments: PaymentService,
    pub drive: GoogleDrive,
    pub medusa: MedusaClient,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        storage: Arc<dyn ObjectStorage>,
        events: Arc<dyn EventPublisher>,
        http: reqwest::Client,
        endpoints: Endpoints,
    ) -> Self {
        let payments = PaymentService::new(store.clone(), events.clone(), http.clone(), endpoints.gateways);
        let drive = GoogleDrive::new(
            http.clone(),
            config.google.clone(),
            endpoints.google,
            store.clone(),
            storage.clone(),
            events.clone(),
        );
        let medusa = MedusaClient::new(http, config.medusa.clone());
        Self { config, store, storage, events, payments, drive, medusa }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "shoreline-commerce" }))
}

fn storefront_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tenant", get(storefront::get_tenant))
        .route("/seo/store", get(storefront::store_seo))
        .route("/seo/products/:id", get(storefront::product_seo))
        // Catalog
        .route("/products", get(catalog::list_products))
        .route("/products/:id", get(catalog::get_product))
        .route("/categories", get(catalog::list_categories))
        .route("/categories/:id", get(catalog::get_category))
        // Cart and wishlist
        .route("/cart/:session", get(cart::get_cart).post(cart::add_item).delete(cart::clear_cart))
        .route("/cart/:session/items/:product_id", put(cart::update_item).delete(cart::remove_item))
        .route("/wishlist/:session", get(cart::get_wishlist).post(cart::add_to_wishlist))
        .route("/wishlist/:session/:product_id", delete(cart::remove_from_wishlist))
        // Checkout
        .route("/checkout", post(checkout::checkout))
        .route("/orders/:id/status", get(orders::order_status))
        // Demo bookings
        .route("/locations", get(bookings::list_locations))
        .route("/bookings/availability", get(bookings::availability))
        .route("/bookings", post(bookings::create_booking))
        // Callbacks
        .route("/webhooks/payments", post(webhooks::payment_webhook))
        .route("/webhooks/payments/:gateway", post(webhooks::gateway_webhook))
        .route("/integrations/google/callback", get(integrations::google_callback))
}

fn manage_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/products", get(catalog::admin_list_products).post(catalog::create_product))
        .route(
            "/products/:id",
            get(catalog::admin_get_product).put(catalog::update_product).delete(catalog::archive_product),
        )
        .route("/products/:id/stock", post(catalog::adjust_stock))
        .route("/categories", post(catalog::create_category))
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/status", post(orders::transition_order))
        .route("/customers", get(orders::list_customers))
        .route("/invoices", get(invoices::list_invoices).post(invoices::generate_invoice))
        .route("/invoices/refresh-overdue", post(invoices::refresh_overdue))
        .route("/invoices/:id", get(invoices::get_invoice))
        .route("/invoices/:id/:action", post(invoices::invoice_action))
        .route("/locations", get(bookings::admin_list_locations).post(bookings::create_location))
        .route("/bookings", get(bookings::list_bookings))
        .route("/bookings/:id/status", post(bookings::transition_booking))
        .route("/bookings/:id/fee", put(bookings::set_booking_fee))
        .route(
            "/media",
            post(media::upload).delete(media::delete).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024)),
        )
        .route("/google", get(integrations::google_status).delete(integrations::google_disconnect))
        .route("/google/authorize", get(integrations::google_authorize))
        .route("/google/files", get(integrations::google_files))
        .route("/google/import", post(integrations::google_import))
        .route("/medusa/sync", post(integrations::medusa_sync))
}

fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tenants", get(admin::list_tenants).post(admin::create_tenant))
        .route(
            "/tenants/:id",
            get(admin::get_tenant).put(admin::update_tenant).delete(admin::deactivate_tenant),
        )
        .route("/tenants/:id/rotate-key", post(admin::rotate_admin_key))
        .route("/tenants/:id/gateways", get(admin::list_gateways))
        .route("/tenants/:id/gateways/:code", put(admin::upsert_gateway).delete(admin::delete_gateway))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let platform_domains = Arc::new(state.config.platform_domains.clone());
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1/manage", manage_router())
        .nest("/api/v1", storefront_router())
        .layer(middleware::from_fn_with_state(platform_domains, tenancy::tenant_headers))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
