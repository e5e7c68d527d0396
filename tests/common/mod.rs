//! Shared fixtures: an in-memory store, recording adapters and request helpers
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use chrono::{Datelike, NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use shoreline_commerce::api::{create_router, AppState, Endpoints};
use shoreline_commerce::config::AppConfig;
use shoreline_commerce::domain::*;
use shoreline_commerce::error::{CommerceError, Result};
use shoreline_commerce::infra::{EventPublisher, ObjectStorage, StorageError};
use shoreline_commerce::store::{Page, ProductFilter, Store};

pub const MASTER_TOKEN: &str = "master-test-token";

#[derive(Default)]
struct Tables {
    tenants: Vec<Tenant>,
    gateways: Vec<TenantGateway>,
    categories: Vec<Category>,
    products: Vec<Product>,
    cart: Vec<CartItem>,
    wishlist: Vec<WishlistItem>,
    customers: Vec<Customer>,
    orders: Vec<Order>,
    invoices: Vec<Invoice>,
    locations: Vec<Location>,
    bookings: Vec<DemoBooking>,
}

/// [`Store`] over plain vectors, mirroring the Postgres constraints the handlers rely on.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

fn paginate<T: Clone>(rows: &[T], page: Page) -> Vec<T> {
    rows.iter().skip(page.offset() as usize).take(page.limit() as usize).cloned().collect()
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn product(&self, id: Uuid) -> Option<Product> {
        self.tables.read().products.iter().find(|p| p.id == id).cloned()
    }

    pub fn orders(&self) -> Vec<Order> { self.tables.read().orders.clone() }

    pub fn tenant(&self, id: Uuid) -> Option<Tenant> {
        self.tables.read().tenants.iter().find(|t| t.id == id).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>> {
        Ok(self.tables.read().tenants.iter()
            .find(|t| t.subdomain.as_deref() == Some(subdomain) || t.slug == subdomain)
            .cloned())
    }

    async fn find_tenant_by_domain(&self, domain: &str) -> Result<Option<Tenant>> {
        Ok(self.tables.read().tenants.iter().find(|t| t.domain.as_deref() == Some(domain)).cloned())
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        Ok(self.tables.read().tenants.iter().find(|t| t.slug == slug).cloned())
    }

    async fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        Ok(self.tenant(id))
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let mut tenants = self.tables.read().tenants.clone();
        tenants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tenants)
    }

    async fn insert_tenant(&self, tenant: &Tenant) -> Result<()> {
        let mut tables = self.tables.write();
        let clash = tables.tenants.iter().any(|t| {
            t.slug == tenant.slug
                || (t.subdomain.is_some() && t.subdomain == tenant.subdomain)
                || (t.domain.is_some() && t.domain == tenant.domain)
        });
        if clash {
            return Err(CommerceError::Conflict("tenant slug, subdomain or domain already exists".into()));
        }
        tables.tenants.push(tenant.clone());
        Ok(())
    }

    async fn update_tenant(&self, tenant: &Tenant) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(row) = tables.tenants.iter_mut().find(|t| t.id == tenant.id) {
            *row = tenant.clone();
        }
        Ok(())
    }

    async fn get_gateway(&self, tenant_id: Uuid, code: &str) -> Result<Option<TenantGateway>> {
        Ok(self.tables.read().gateways.iter()
            .find(|g| g.tenant_id == tenant_id && g.gateway_code == code)
            .cloned())
    }

    async fn list_gateways(&self, tenant_id: Uuid) -> Result<Vec<TenantGateway>> {
        Ok(self.tables.read().gateways.iter().filter(|g| g.tenant_id == tenant_id).cloned().collect())
    }

    async fn upsert_gateway(&self, gateway: &TenantGateway) -> Result<()> {
        let mut tables = self.tables.write();
        tables.gateways.retain(|g| !(g.tenant_id == gateway.tenant_id && g.gateway_code == gateway.gateway_code));
        tables.gateways.push(gateway.clone());
        Ok(())
    }

    async fn delete_gateway(&self, tenant_id: Uuid, code: &str) -> Result<bool> {
        let mut tables = self.tables.write();
        let before = tables.gateways.len();
        tables.gateways.retain(|g| !(g.tenant_id == tenant_id && g.gateway_code == code));
        Ok(tables.gateways.len() != before)
    }

    async fn list_categories(&self, tenant_id: Uuid) -> Result<Vec<Category>> {
        Ok(self.tables.read().categories.iter().filter(|c| c.tenant_id == tenant_id).cloned().collect())
    }

    async fn get_category(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Category>> {
        Ok(self.tables.read().categories.iter().find(|c| c.tenant_id == tenant_id && c.id == id).cloned())
    }

    async fn insert_category(&self, category: &Category) -> Result<()> {
        self.tables.write().categories.push(category.clone());
        Ok(())
    }

    async fn list_products(&self, tenant_id: Uuid, filter: &ProductFilter) -> Result<(Vec<Product>, i64)> {
        let mut matching: Vec<Product> = self.tables.read().products.iter()
            .filter(|p| p.tenant_id == tenant_id && filter.matches(p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok((paginate(&matching, filter.page), matching.len() as i64))
    }

    async fn get_product(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Product>> {
        Ok(self.product(id).filter(|p| p.tenant_id == tenant_id))
    }

    async fn get_products(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<Product>> {
        Ok(self.tables.read().products.iter()
            .filter(|p| p.tenant_id == tenant_id && ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn find_product_by_sku(&self, tenant_id: Uuid, sku: &str) -> Result<Option<Product>> {
        Ok(self.tables.read().products.iter().find(|p| p.tenant_id == tenant_id && p.sku == sku).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.products.iter().any(|p| p.tenant_id == product.tenant_id && p.sku == product.sku) {
            return Err(CommerceError::Conflict("product sku already exists".into()));
        }
        tables.products.push(product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(row) = tables.products.iter_mut().find(|p| p.id == product.id && p.tenant_id == product.tenant_id) {
            *row = product.clone();
        }
        Ok(())
    }

    async fn decrement_stock(&self, tenant_id: Uuid, product_id: Uuid, quantity: i32) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(row) = tables.products.iter_mut().find(|p| p.id == product_id && p.tenant_id == tenant_id) {
            row.stock = (row.stock - quantity).max(0);
        }
        Ok(())
    }

    async fn list_cart_items(&self, tenant_id: Uuid, session_id: &str) -> Result<Vec<CartItem>> {
        Ok(self.tables.read().cart.iter()
            .filter(|i| i.tenant_id == tenant_id && i.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn add_cart_item(&self, item: &CartItem) -> Result<CartItem> {
        let mut tables = self.tables.write();
        let existing = tables.cart.iter_mut()
            .find(|i| i.tenant_id == item.tenant_id && i.session_id == item.session_id && i.product_id == item.product_id);
        match existing {
            Some(row) => {
                row.quantity = CartItem::merged_quantity(row.quantity, item.quantity);
                row.updated_at = item.updated_at;
                Ok(row.clone())
            }
            None => {
                tables.cart.push(item.clone());
                Ok(item.clone())
            }
        }
    }

    async fn set_cart_quantity(&self, tenant_id: Uuid, session_id: &str, product_id: Uuid, quantity: i32) -> Result<bool> {
        let mut tables = self.tables.write();
        match tables.cart.iter_mut().find(|i| i.tenant_id == tenant_id && i.session_id == session_id && i.product_id == product_id) {
            Some(row) => {
                row.quantity = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_cart_item(&self, tenant_id: Uuid, session_id: &str, product_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write();
        let before = tables.cart.len();
        tables.cart.retain(|i| !(i.tenant_id == tenant_id && i.session_id == session_id && i.product_id == product_id));
        Ok(tables.cart.len() != before)
    }

    async fn clear_cart(&self, tenant_id: Uuid, session_id: &str) -> Result<()> {
        self.tables.write().cart.retain(|i| !(i.tenant_id == tenant_id && i.session_id == session_id));
        Ok(())
    }

    async fn list_wishlist(&self, tenant_id: Uuid, session_id: &str) -> Result<Vec<WishlistItem>> {
        Ok(self.tables.read().wishlist.iter()
            .filter(|i| i.tenant_id == tenant_id && i.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn add_wishlist_item(&self, item: &WishlistItem) -> Result<()> {
        let mut tables = self.tables.write();
        let exists = tables.wishlist.iter()
            .any(|i| i.tenant_id == item.tenant_id && i.session_id == item.session_id && i.product_id == item.product_id);
        if !exists {
            tables.wishlist.push(item.clone());
        }
        Ok(())
    }

    async fn remove_wishlist_item(&self, tenant_id: Uuid, session_id: &str, product_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write();
        let before = tables.wishlist.len();
        tables.wishlist.retain(|i| !(i.tenant_id == tenant_id && i.session_id == session_id && i.product_id == product_id));
        Ok(tables.wishlist.len() != before)
    }

    async fn upsert_customer(&self, customer: &Customer) -> Result<Customer> {
        let mut tables = self.tables.write();
        match tables.customers.iter_mut().find(|c| c.tenant_id == customer.tenant_id && c.email == customer.email) {
            Some(row) => {
                row.name = customer.name.clone();
                if customer.phone.is_some() { row.phone = customer.phone.clone(); }
                row.updated_at = customer.updated_at;
                Ok(row.clone())
            }
            None => {
                tables.customers.push(customer.clone());
                Ok(customer.clone())
            }
        }
    }

    async fn list_customers(&self, tenant_id: Uuid, page: Page) -> Result<(Vec<Customer>, i64)> {
        let rows: Vec<Customer> = self.tables.read().customers.iter().filter(|c| c.tenant_id == tenant_id).cloned().collect();
        Ok((paginate(&rows, page), rows.len() as i64))
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut row = order.clone();
        row.take_events();
        self.tables.write().orders.push(row);
        Ok(())
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(row) = tables.orders.iter_mut().find(|o| o.id == order.id && o.tenant_id == order.tenant_id) {
            *row = order.clone();
            row.take_events();
        }
        Ok(())
    }

    async fn get_order(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Order>> {
        Ok(self.tables.read().orders.iter().find(|o| o.tenant_id == tenant_id && o.id == id).cloned())
    }

    async fn find_order_by_reference(&self, reference: &str) -> Result<Option<Order>> {
        Ok(self.tables.read().orders.iter()
            .find(|o| o.id.to_string() == reference || o.order_number == reference)
            .cloned())
    }

    async fn list_orders(&self, tenant_id: Uuid, status: Option<OrderStatus>, page: Page) -> Result<(Vec<Order>, i64)> {
        let mut rows: Vec<Order> = self.tables.read().orders.iter()
            .filter(|o| o.tenant_id == tenant_id && status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok((paginate(&rows, page), rows.len() as i64))
    }

    async fn next_invoice_sequence(&self, tenant_id: Uuid, issue_date: NaiveDate) -> Result<i64> {
        let count = self.tables.read().invoices.iter()
            .filter(|i| {
                i.tenant_id == tenant_id
                    && i.issue_date.year() == issue_date.year()
                    && i.issue_date.month() == issue_date.month()
            })
            .count();
        Ok(count as i64 + 1)
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<()> {
        let mut row = invoice.clone();
        row.take_events();
        self.tables.write().invoices.push(row);
        Ok(())
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(row) = tables.invoices.iter_mut().find(|i| i.id == invoice.id && i.tenant_id == invoice.tenant_id) {
            *row = invoice.clone();
            row.take_events();
        }
        Ok(())
    }

    async fn get_invoice(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Invoice>> {
        Ok(self.tables.read().invoices.iter().find(|i| i.tenant_id == tenant_id && i.id == id).cloned())
    }

    async fn find_invoice_by_source(&self, tenant_id: Uuid, source: InvoiceSource, source_id: Uuid) -> Result<Option<Invoice>> {
        Ok(self.tables.read().invoices.iter()
            .find(|i| i.tenant_id == tenant_id && i.source_type == source && i.source_id == source_id)
            .cloned())
    }

    async fn list_invoices(&self, tenant_id: Uuid, status: Option<InvoiceStatus>) -> Result<Vec<Invoice>> {
        Ok(self.tables.read().invoices.iter()
            .filter(|i| i.tenant_id == tenant_id && status.map_or(true, |s| i.status == s))
            .cloned()
            .collect())
    }

    async fn list_locations(&self, tenant_id: Uuid, active_only: bool) -> Result<Vec<Location>> {
        Ok(self.tables.read().locations.iter()
            .filter(|l| l.tenant_id == tenant_id && (!active_only || l.is_active))
            .cloned()
            .collect())
    }

    async fn get_location(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Location>> {
        Ok(self.tables.read().locations.iter().find(|l| l.tenant_id == tenant_id && l.id == id).cloned())
    }

    async fn insert_location(&self, location: &Location) -> Result<()> {
        self.tables.write().locations.push(location.clone());
        Ok(())
    }

    async fn list_bookings(&self, tenant_id: Uuid, date: Option<NaiveDate>) -> Result<Vec<DemoBooking>> {
        Ok(self.tables.read().bookings.iter()
            .filter(|b| b.tenant_id == tenant_id && date.map_or(true, |d| b.booking_date == d))
            .cloned()
            .collect())
    }

    async fn bookings_for_day(&self, tenant_id: Uuid, location_id: Uuid, date: NaiveDate) -> Result<Vec<DemoBooking>> {
        Ok(self.tables.read().bookings.iter()
            .filter(|b| b.tenant_id == tenant_id && b.location_id == location_id && b.booking_date == date)
            .cloned()
            .collect())
    }

    async fn get_booking(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<DemoBooking>> {
        Ok(self.tables.read().bookings.iter().find(|b| b.tenant_id == tenant_id && b.id == id).cloned())
    }

    async fn insert_booking(&self, booking: &DemoBooking) -> Result<()> {
        let mut row = booking.clone();
        row.take_events();
        self.tables.write().bookings.push(row);
        Ok(())
    }

    async fn update_booking(&self, booking: &DemoBooking) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(row) = tables.bookings.iter_mut().find(|b| b.id == booking.id && b.tenant_id == booking.tenant_id) {
            *row = booking.clone();
            row.take_events();
        }
        Ok(())
    }
}

/// Keeps uploaded objects in memory and serves them from a fake CDN host.
#[derive(Default)]
pub struct RecordingStorage {
    pub objects: RwLock<Vec<(String, String, usize)>>,
    pub deleted: RwLock<Vec<String>>,
}

#[async_trait]
impl ObjectStorage for RecordingStorage {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> std::result::Result<String, StorageError> {
        self.objects.write().push((path.to_string(), content_type.to_string(), data.len()));
        Ok(self.public_url(path))
    }

    async fn delete(&self, paths: &[String]) -> std::result::Result<(), StorageError> {
        self.deleted.write().extend(paths.iter().cloned());
        Ok(())
    }

    fn public_url(&self, path: &str) -> String { format!("https://cdn.test/{path}") }
}

/// Remembers the subject of every published event.
#[derive(Default)]
pub struct RecordingEvents {
    pub subjects: RwLock<Vec<String>>,
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(&self, subject: &str, _event: &DomainEvent) -> anyhow::Result<()> {
        self.subjects.write().push(subject.to_string());
        Ok(())
    }
}

impl RecordingEvents {
    pub fn contains(&self, subject: &str) -> bool { self.subjects.read().iter().any(|s| s == subject) }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<RecordingStorage>,
    pub events: Arc<RecordingEvents>,
}

impl TestApp {
    pub fn new() -> Self { Self::with(AppConfig::for_tests(MASTER_TOKEN), Endpoints::default()) }

    pub fn with(config: AppConfig, endpoints: Endpoints) -> Self {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(RecordingStorage::default());
        let events = Arc::new(RecordingEvents::default());
        let state = AppState::new(config, store.clone(), storage.clone(), events.clone(), reqwest::Client::new(), endpoints);
        Self { router: create_router(Arc::new(state)), store, storage, events }
    }

    /// Sends a request and returns the status with the parsed JSON body (`Null` when empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    pub async fn seed_tenant(&self, name: &str, slug: &str) -> (Tenant, String) {
        let mut tenant = Tenant::new(name, slug);
        tenant.subdomain = Some(slug.to_string());
        tenant.shipping_flat_rate = Decimal::new(100, 0);
        let key = generate_admin_key(slug);
        tenant.admin_key_hash = Some(hash_admin_key(&key));
        self.store.insert_tenant(&tenant).await.unwrap();
        (tenant, key)
    }

    pub async fn seed_product(&self, tenant: &Tenant, name: &str, price: Decimal, stock: i32) -> Product {
        let product = Product::create(tenant.id, tenant.vat_rate, ProductDraft {
            name: name.to_string(),
            price,
            stock,
            ..Default::default()
        })
        .unwrap();
        self.store.insert_product(&product).await.unwrap();
        product
    }

    pub async fn seed_gateway(&self, tenant: &Tenant, code: &str, credentials: Value, test_mode: bool) {
        let now = Utc::now();
        self.store.upsert_gateway(&TenantGateway {
            tenant_id: tenant.id,
            gateway_code: code.to_string(),
            is_active: true,
            is_test_mode: test_mode,
            credentials,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    }
}

pub fn json_request(method: &str, uri: &str, host: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header("host", host);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
