mod postgres;

pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// 1-based page request, clamped to `1..=MAX_PER_PAGE` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page { pub page: u32, pub per_page: u32 }

impl Page {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 { i64::from(self.per_page) }
    pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.per_page) }
}

impl Default for Page {
    fn default() -> Self { Self::new(None, None) }
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    /// Case-insensitive match on name, sku or brand.
    pub search: Option<String>,
    /// Restrict to `ProductStatus::Active`.
    pub active_only: bool,
    pub page: Page,
}

impl ProductFilter {
    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// The search term as an `ILIKE ... ESCAPE '\'` pattern that matches it literally.
    pub fn like_pattern(&self) -> Option<String> {
        self.search_term().map(|term| {
            let mut pattern = String::with_capacity(term.len() + 2);
            pattern.push('%');
            for c in term.chars() {
                if matches!(c, '%' | '_' | '\\') { pattern.push('\\'); }
                pattern.push(c);
            }
            pattern.push('%');
            pattern
        })
    }

    /// Whether `product` passes every filter except paging.
    pub fn matches(&self, product: &Product) -> bool {
        if self.active_only && !product.is_active() { return false; }
        if self.category_id.is_some() && product.category_id != self.category_id { return false; }
        match self.search_term() {
            Some(term) => {
                let term = term.to_lowercase();
                product.name.to_lowercase().contains(&term)
                    || product.sku.to_lowercase().contains(&term)
                    || product.brand.as_deref().is_some_and(|b| b.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

/// Store defines the persistence interface. Every read and write is scoped to a tenant
/// except the tenant lookups themselves and the webhook order lookup.
#[async_trait]
pub trait Store: Send + Sync {
    // Tenant operations
    async fn find_tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>>;
    async fn find_tenant_by_domain(&self, domain: &str) -> Result<Option<Tenant>>;
    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>>;
    async fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>>;
    async fn list_tenants(&self) -> Result<Vec<Tenant>>;
    async fn insert_tenant(&self, tenant: &Tenant) -> Result<()>;
    async fn update_tenant(&self, tenant: &Tenant) -> Result<()>;

    // Gateway configuration
    async fn get_gateway(&self, tenant_id: Uuid, code: &str) -> Result<Option<TenantGateway>>;
    async fn list_gateways(&self, tenant_id: Uuid) -> Result<Vec<TenantGateway>>;
    async fn upsert_gateway(&self, gateway: &TenantGateway) -> Result<()>;
    async fn delete_gateway(&self, tenant_id: Uuid, code: &str) -> Result<bool>;

    // Catalog
    async fn list_categories(&self, tenant_id: Uuid) -> Result<Vec<Category>>;
    async fn get_category(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Category>>;
    async fn insert_category(&self, category: &Category) -> Result<()>;
    async fn list_products(&self, tenant_id: Uuid, filter: &ProductFilter) -> Result<(Vec<Product>, i64)>;
    async fn get_product(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Product>>;
    async fn get_products(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<Product>>;
    async fn find_product_by_sku(&self, tenant_id: Uuid, sku: &str) -> Result<Option<Product>>;
    async fn insert_product(&self, product: &Product) -> Result<()>;
    async fn update_product(&self, product: &Product) -> Result<()>;
    /// Lowers stock by `quantity`, stopping at zero.
    async fn decrement_stock(&self, tenant_id: Uuid, product_id: Uuid, quantity: i32) -> Result<()>;

    // Cart and wishlist
    async fn list_cart_items(&self, tenant_id: Uuid, session_id: &str) -> Result<Vec<CartItem>>;
    /// Inserts the row or adds its quantity to an existing one.
    async fn add_cart_item(&self, item: &CartItem) -> Result<CartItem>;
    async fn set_cart_quantity(&self, tenant_id: Uuid, session_id: &str, product_id: Uuid, quantity: i32) -> Result<bool>;
    async fn remove_cart_item(&self, tenant_id: Uuid, session_id: &str, product_id: Uuid) -> Result<bool>;
    async fn clear_cart(&self, tenant_id: Uuid, session_id: &str) -> Result<()>;
    async fn list_wishlist(&self, tenant_id: Uuid, session_id: &str) -> Result<Vec<WishlistItem>>;
    async fn add_wishlist_item(&self, item: &WishlistItem) -> Result<()>;
    async fn remove_wishlist_item(&self, tenant_id: Uuid, session_id: &str, product_id: Uuid) -> Result<bool>;

    // Customers
    /// Inserts or refreshes name/phone on the (tenant, email) row and returns the stored row.
    async fn upsert_customer(&self, customer: &Customer) -> Result<Customer>;
    async fn list_customers(&self, tenant_id: Uuid, page: Page) -> Result<(Vec<Customer>, i64)>;

    // Orders
    async fn insert_order(&self, order: &Order) -> Result<()>;
    async fn update_order(&self, order: &Order) -> Result<()>;
    async fn get_order(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Order>>;
    /// Finds an order by id or order number across tenants. Used by payment webhooks.
    async fn find_order_by_reference(&self, reference: &str) -> Result<Option<Order>>;
    async fn list_orders(&self, tenant_id: Uuid, status: Option<OrderStatus>, page: Page) -> Result<(Vec<Order>, i64)>;

    // Invoices
    /// Sequence number the next invoice issued in `issue_date`'s month should carry.
    async fn next_invoice_sequence(&self, tenant_id: Uuid, issue_date: NaiveDate) -> Result<i64>;
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<()>;
    async fn update_invoice(&self, invoice: &Invoice) -> Result<()>;
    async fn get_invoice(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Invoice>>;
    async fn find_invoice_by_source(&self, tenant_id: Uuid, source: InvoiceSource, source_id: Uuid) -> Result<Option<Invoice>>;
    async fn list_invoices(&self, tenant_id: Uuid, status: Option<InvoiceStatus>) -> Result<Vec<Invoice>>;

    // Locations and bookings
    async fn list_locations(&self, tenant_id: Uuid, active_only: bool) -> Result<Vec<Location>>;
    async fn get_location(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Location>>;
    async fn insert_location(&self, location: &Location) -> Result<()>;
    async fn list_bookings(&self, tenant_id: Uuid, date: Option<NaiveDate>) -> Result<Vec<DemoBooking>>;
    /// Every booking at `location_id` on `date`, cancelled ones included.
    async fn bookings_for_day(&self, tenant_id: Uuid, location_id: Uuid, date: NaiveDate) -> Result<Vec<DemoBooking>>;
    async fn get_booking(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<DemoBooking>>;
    async fn insert_booking(&self, booking: &DemoBooking) -> Result<()>;
    async fn update_booking(&self, booking: &DemoBooking) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_page_clamps() {
        assert_eq!(Page::new(Some(0), Some(500)), Page { page: 1, per_page: 100 });
        let p = Page::new(Some(3), Some(10));
        assert_eq!((p.limit(), p.offset()), (10, 20));
    }

    #[test]
    fn test_filter_matches_search_and_category() {
        let category = Uuid::now_v7();
        let mut product = Product::create(Uuid::now_v7(), Decimal::new(15, 2), ProductDraft {
            name: "Wave Wetsuit".into(),
            sku: Some("ws-43".into()),
            brand: Some("O'Neill".into()),
            price: Decimal::new(3500, 0),
            category_id: Some(category),
            ..Default::default()
        }).unwrap();
        let filter = ProductFilter { search: Some("oneill".into()), ..Default::default() };
        assert!(!filter.matches(&product));
        let filter = ProductFilter { search: Some("o'NEILL".into()), category_id: Some(category), active_only: true, ..Default::default() };
        assert!(filter.matches(&product));
        product.archive();
        assert!(!filter.matches(&product));
    }

    #[test]
    fn test_search_wildcards_are_literal() {
        let filter = ProductFilter { search: Some(" 50%_off\\ ".into()), ..Default::default() };
        assert_eq!(filter.like_pattern().as_deref(), Some("%50\\%\\_off\\\\%"));
        assert_eq!(ProductFilter { search: Some("  ".into()), ..Default::default() }.like_pattern(), None);

        let product = Product::create(Uuid::now_v7(), Decimal::new(15, 2), ProductDraft {
            name: "Wax Comb".into(),
            price: Decimal::new(45, 0),
            ..Default::default()
        }).unwrap();
        let filter = ProductFilter { search: Some("w%b".into()), ..Default::default() };
        assert!(!filter.matches(&product));
    }
}
