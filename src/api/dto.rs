use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::{InvoiceSource, InvoiceStatus, Order, OrderStatus, PaymentStatus, Tenant};
use crate::payments::PaymentSession;
use crate::store::Page;

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PaginationParams {
    pub fn page(&self) -> Page { Page::new(self.page, self.per_page) }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(alias = "category")]
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
}

/// Public view of the resolved store.
#[derive(Debug, Serialize)]
pub struct StorefrontResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub tagline: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub currency: String,
    pub vat_rate: Decimal,
    pub shipping_flat_rate: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
}

impl From<&Tenant> for StorefrontResponse {
    fn from(t: &Tenant) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            slug: t.slug.clone(),
            tagline: t.tagline.clone(),
            logo_url: t.logo_url.clone(),
            primary_color: t.primary_color.clone(),
            secondary_color: t.secondary_color.clone(),
            contact_email: t.contact_email.clone(),
            contact_phone: t.contact_phone.clone(),
            currency: t.currency.clone(),
            vat_rate: t.vat_rate,
            shipping_flat_rate: t.shipping_flat_rate,
            free_shipping_threshold: t.free_shipping_threshold,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 { 1 }

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct WishlistRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutCustomer {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub name: String,
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 128, message = "must be between 1 and 128 characters"))]
    pub session_id: String,
    #[validate]
    pub customer: CheckoutCustomer,
    #[serde(default)]
    pub shipping_address: serde_json::Value,
    pub gateway: String,
    #[validate(url(message = "must be an absolute URL"))]
    pub return_url: String,
    #[validate(url(message = "must be an absolute URL"))]
    pub cancel_url: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub payment: PaymentSession,
}

#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total: Decimal,
    pub currency: String,
}

impl From<&Order> for OrderStatusResponse {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id,
            order_number: o.order_number.clone(),
            status: o.status,
            payment_status: o.payment_status,
            total: o.total,
            currency: o.currency.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest<S> {
    pub status: S,
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustmentRequest {
    pub delta: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    #[validate(url(message = "must be an absolute URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateInvoiceRequest {
    pub source: InvoiceSource,
    pub source_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
}

#[derive(Debug, Serialize)]
pub struct RefreshOverdueResponse {
    pub updated: usize,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub location_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListBookingsQuery {
    pub date: Option<NaiveDate>,
}

fn default_true() -> bool { true }

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub name: String,
    #[validate(length(min = 2, max = 63, message = "must be between 2 and 63 characters"))]
    pub slug: String,
    pub subdomain: Option<String>,
    pub domain: Option<String>,
    #[serde(flatten)]
    #[validate]
    pub settings: TenantSettings,
}

/// Branding and commercial settings shared by create and update.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct TenantSettings {
    pub tagline: Option<String>,
    #[validate(url(message = "must be an absolute URL"))]
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    #[validate(length(equal = 3, message = "must be a 3 letter currency code"))]
    pub currency: Option<String>,
    pub vat_rate: Option<Decimal>,
    pub shipping_flat_rate: Option<Decimal>,
    pub free_shipping_threshold: Option<Decimal>,
    #[validate(range(min = 0, max = 365, message = "must be between 0 and 365"))]
    pub payment_terms_days: Option<i32>,
    pub google_drive_folder_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTenantRequest {
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub name: Option<String>,
    pub subdomain: Option<String>,
    pub domain: Option<String>,
    pub is_active: Option<bool>,
    #[serde(flatten)]
    #[validate]
    pub settings: TenantSettings,
}

#[derive(Debug, Serialize)]
pub struct TenantWithKeyResponse {
    pub tenant: Tenant,
    /// Shown once; only its hash is stored.
    pub admin_key: String,
}

#[derive(Debug, Deserialize)]
pub struct GatewayRequest {
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_test_mode: bool,
    pub credentials: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct DriveFilesQuery {
    pub folder_id: Option<String>,
    pub page_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DriveImportRequest {
    #[validate(length(min = 1, max = 50, message = "must list between 1 and 50 files"))]
    pub file_ids: Vec<String>,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeUrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct GoogleStatusResponse {
    pub connected: bool,
    pub folder_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMediaRequest {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct MediaUploadResponse {
    pub path: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Uuid>,
}
