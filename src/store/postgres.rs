use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Page, ProductFilter, Store};
use crate::domain::*;
use crate::error::{CommerceError, Result};

/// Postgres-backed [`Store`] using runtime-checked `sqlx` queries.
#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
    pub fn pool(&self) -> &PgPool { &self.pool }

    async fn load_items(&self, mut order: Order) -> Result<Order> {
        order.items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY name")
            .bind(order.id).fetch_all(&self.pool).await?;
        Ok(order)
    }
}

/// Unique violations surface as conflicts, everything else stays a database error.
fn conflict_on_unique(e: sqlx::Error, what: &str) -> CommerceError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => CommerceError::Conflict(format!("{what} already exists")),
        _ => CommerceError::Database(e),
    }
}

const PRODUCT_FILTER: &str = "tenant_id = $1 AND ($2::uuid IS NULL OR category_id = $2) \
    AND ($3::text IS NULL OR name ILIKE $3 ESCAPE '\\' OR sku ILIKE $3 ESCAPE '\\' OR brand ILIKE $3 ESCAPE '\\') \
    AND (NOT $4 OR status = 'active')";

#[async_trait]
impl Store for PgStore {
    async fn find_tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>> {
        Ok(sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE subdomain = $1 OR slug = $1 LIMIT 1")
            .bind(subdomain).fetch_optional(&self.pool).await?)
    }

    async fn find_tenant_by_domain(&self, domain: &str) -> Result<Option<Tenant>> {
        Ok(sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE domain = $1 LIMIT 1")
            .bind(domain).fetch_optional(&self.pool).await?)
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        Ok(sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE slug = $1")
            .bind(slug).fetch_optional(&self.pool).await?)
    }

    async fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        Ok(sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1").bind(id).fetch_optional(&self.pool).await?)
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        Ok(sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY name").fetch_all(&self.pool).await?)
    }

    async fn insert_tenant(&self, t: &Tenant) -> Result<()> {
        sqlx::query("INSERT INTO tenants (id, name, slug, subdomain, domain, tagline, logo_url, primary_color, secondary_color, contact_email, contact_phone, currency, vat_rate, shipping_flat_rate, free_shipping_threshold, payment_terms_days, is_active, admin_key_hash, google_refresh_token, google_access_token, google_token_expires_at, google_drive_folder_id, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)")
            .bind(t.id).bind(&t.name).bind(&t.slug).bind(&t.subdomain).bind(&t.domain).bind(&t.tagline).bind(&t.logo_url)
            .bind(&t.primary_color).bind(&t.secondary_color).bind(&t.contact_email).bind(&t.contact_phone).bind(&t.currency)
            .bind(t.vat_rate).bind(t.shipping_flat_rate).bind(t.free_shipping_threshold).bind(t.payment_terms_days).bind(t.is_active)
            .bind(&t.admin_key_hash).bind(&t.google_refresh_token).bind(&t.google_access_token).bind(t.google_token_expires_at)
            .bind(&t.google_drive_folder_id).bind(t.created_at).bind(t.updated_at)
            .execute(&self.pool).await.map_err(|e| conflict_on_unique(e, "tenant slug, subdomain or domain"))?;
        Ok(())
    }

    async fn update_tenant(&self, t: &Tenant) -> Result<()> {
        sqlx::query("UPDATE tenants SET name = $2, slug = $3, subdomain = $4, domain = $5, tagline = $6, logo_url = $7, primary_color = $8, secondary_color = $9, contact_email = $10, contact_phone = $11, currency = $12, vat_rate = $13, shipping_flat_rate = $14, free_shipping_threshold = $15, payment_terms_days = $16, is_active = $17, admin_key_hash = $18, google_refresh_token = $19, google_access_token = $20, google_token_expires_at = $21, google_drive_folder_id = $22, updated_at = $23 WHERE id = $1")
            .bind(t.id).bind(&t.name).bind(&t.slug).bind(&t.subdomain).bind(&t.domain).bind(&t.tagline).bind(&t.logo_url)
            .bind(&t.primary_color).bind(&t.secondary_color).bind(&t.contact_email).bind(&t.contact_phone).bind(&t.currency)
            .bind(t.vat_rate).bind(t.shipping_flat_rate).bind(t.free_shipping_threshold).bind(t.payment_terms_days).bind(t.is_active)
            .bind(&t.admin_key_hash).bind(&t.google_refresh_token).bind(&t.google_access_token).bind(t.google_token_expires_at)
            .bind(&t.google_drive_folder_id).bind(t.updated_at)
            .execute(&self.pool).await.map_err(|e| conflict_on_unique(e, "tenant slug, subdomain or domain"))?;
        Ok(())
    }

    async fn get_gateway(&self, tenant_id: Uuid, code: &str) -> Result<Option<TenantGateway>> {
        Ok(sqlx::query_as::<_, TenantGateway>("SELECT * FROM tenant_gateways WHERE tenant_id = $1 AND gateway_code = $2")
            .bind(tenant_id).bind(code).fetch_optional(&self.pool).await?)
    }

    async fn list_gateways(&self, tenant_id: Uuid) -> Result<Vec<TenantGateway>> {
        Ok(sqlx::query_as::<_, TenantGateway>("SELECT * FROM tenant_gateways WHERE tenant_id = $1 ORDER BY gateway_code")
            .bind(tenant_id).fetch_all(&self.pool).await?)
    }

    async fn upsert_gateway(&self, g: &TenantGateway) -> Result<()> {
        sqlx::query("INSERT INTO tenant_gateways (tenant_id, gateway_code, is_active, is_test_mode, credentials, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (tenant_id, gateway_code) DO UPDATE SET is_active = EXCLUDED.is_active, is_test_mode = EXCLUDED.is_test_mode, credentials = EXCLUDED.credentials, updated_at = EXCLUDED.updated_at")
            .bind(g.tenant_id).bind(&g.gateway_code).bind(g.is_active).bind(g.is_test_mode).bind(&g.credentials).bind(g.created_at).bind(g.updated_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn delete_gateway(&self, tenant_id: Uuid, code: &str) -> Result<bool> {
        let r = sqlx::query("DELETE FROM tenant_gateways WHERE tenant_id = $1 AND gateway_code = $2").bind(tenant_id).bind(code).execute(&self.pool).await?;
        Ok(r.rows_affected() > 0)
    }

    async fn list_categories(&self, tenant_id: Uuid) -> Result<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE tenant_id = $1 ORDER BY name").bind(tenant_id).fetch_all(&self.pool).await?)
    }

    async fn get_category(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Category>> {
        Ok(sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE tenant_id = $1 AND id = $2").bind(tenant_id).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn insert_category(&self, c: &Category) -> Result<()> {
        sqlx::query("INSERT INTO categories (id, tenant_id, name, slug, description, parent_id, image_url, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(c.id).bind(c.tenant_id).bind(&c.name).bind(&c.slug).bind(&c.description).bind(c.parent_id).bind(&c.image_url).bind(c.created_at)
            .execute(&self.pool).await.map_err(|e| conflict_on_unique(e, "category"))?;
        Ok(())
    }

    async fn list_products(&self, tenant_id: Uuid, f: &ProductFilter) -> Result<(Vec<Product>, i64)> {
        let search = f.like_pattern();
        let products = sqlx::query_as::<_, Product>(&format!("SELECT * FROM products WHERE {PRODUCT_FILTER} ORDER BY created_at DESC LIMIT $5 OFFSET $6"))
            .bind(tenant_id).bind(f.category_id).bind(&search).bind(f.active_only).bind(f.page.limit()).bind(f.page.offset())
            .fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products WHERE {PRODUCT_FILTER}"))
            .bind(tenant_id).bind(f.category_id).bind(&search).bind(f.active_only)
            .fetch_one(&self.pool).await?;
        Ok((products, total.0))
    }

    async fn get_product(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Product>> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM products WHERE tenant_id = $1 AND id = $2").bind(tenant_id).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn get_products(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<Product>> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM products WHERE tenant_id = $1 AND id = ANY($2)").bind(tenant_id).bind(ids).fetch_all(&self.pool).await?)
    }

    async fn find_product_by_sku(&self, tenant_id: Uuid, sku: &str) -> Result<Option<Product>> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM products WHERE tenant_id = $1 AND sku = $2").bind(tenant_id).bind(sku).fetch_optional(&self.pool).await?)
    }

    async fn insert_product(&self, p: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, tenant_id, sku, name, description, price, price_ex_vat, cost, compare_at_price, stock, category_id, brand, images, features, specifications, tags, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)")
            .bind(p.id).bind(p.tenant_id).bind(&p.sku).bind(&p.name).bind(&p.description).bind(p.price).bind(p.price_ex_vat).bind(p.cost)
            .bind(p.compare_at_price).bind(p.stock).bind(p.category_id).bind(&p.brand).bind(&p.images).bind(&p.features)
            .bind(&p.specifications).bind(&p.tags).bind(p.status).bind(p.created_at).bind(p.updated_at)
            .execute(&self.pool).await.map_err(|e| conflict_on_unique(e, "product sku"))?;
        Ok(())
    }

    async fn update_product(&self, p: &Product) -> Result<()> {
        sqlx::query("UPDATE products SET sku = $3, name = $4, description = $5, price = $6, price_ex_vat = $7, cost = $8, compare_at_price = $9, stock = $10, category_id = $11, brand = $12, images = $13, features = $14, specifications = $15, tags = $16, status = $17, updated_at = $18 WHERE tenant_id = $1 AND id = $2")
            .bind(p.tenant_id).bind(p.id).bind(&p.sku).bind(&p.name).bind(&p.description).bind(p.price).bind(p.price_ex_vat).bind(p.cost)
            .bind(p.compare_at_price).bind(p.stock).bind(p.category_id).bind(&p.brand).bind(&p.images).bind(&p.features)
            .bind(&p.specifications).bind(&p.tags).bind(p.status).bind(p.updated_at)
            .execute(&self.pool).await.map_err(|e| conflict_on_unique(e, "product sku"))?;
        Ok(())
    }

    async fn decrement_stock(&self, tenant_id: Uuid, product_id: Uuid, quantity: i32) -> Result<()> {
        sqlx::query("UPDATE products SET stock = GREATEST(stock - $3, 0), updated_at = NOW() WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id).bind(product_id).bind(quantity).execute(&self.pool).await?;
        Ok(())
    }

    async fn list_cart_items(&self, tenant_id: Uuid, session_id: &str) -> Result<Vec<CartItem>> {
        Ok(sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE tenant_id = $1 AND session_id = $2 ORDER BY created_at")
            .bind(tenant_id).bind(session_id).fetch_all(&self.pool).await?)
    }

    async fn add_cart_item(&self, i: &CartItem) -> Result<CartItem> {
        Ok(sqlx::query_as::<_, CartItem>("INSERT INTO cart_items (tenant_id, session_id, product_id, quantity, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (tenant_id, session_id, product_id) DO UPDATE SET quantity = LEAST(cart_items.quantity::int8 + EXCLUDED.quantity, $7)::int4, updated_at = EXCLUDED.updated_at RETURNING *")
            .bind(i.tenant_id).bind(&i.session_id).bind(i.product_id).bind(i.quantity).bind(i.created_at).bind(i.updated_at).bind(i64::from(MAX_LINE_QUANTITY))
            .fetch_one(&self.pool).await?)
    }

    async fn set_cart_quantity(&self, tenant_id: Uuid, session_id: &str, product_id: Uuid, quantity: i32) -> Result<bool> {
        let r = sqlx::query("UPDATE cart_items SET quantity = $4, updated_at = NOW() WHERE tenant_id = $1 AND session_id = $2 AND product_id = $3")
            .bind(tenant_id).bind(session_id).bind(product_id).bind(quantity).execute(&self.pool).await?;
        Ok(r.rows_affected() > 0)
    }

    async fn remove_cart_item(&self, tenant_id: Uuid, session_id: &str, product_id: Uuid) -> Result<bool> {
        let r = sqlx::query("DELETE FROM cart_items WHERE tenant_id = $1 AND session_id = $2 AND product_id = $3")
            .bind(tenant_id).bind(session_id).bind(product_id).execute(&self.pool).await?;
        Ok(r.rows_affected() > 0)
    }

    async fn clear_cart(&self, tenant_id: Uuid, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE tenant_id = $1 AND session_id = $2").bind(tenant_id).bind(session_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn list_wishlist(&self, tenant_id: Uuid, session_id: &str) -> Result<Vec<WishlistItem>> {
        Ok(sqlx::query_as::<_, WishlistItem>("SELECT * FROM wishlist_items WHERE tenant_id = $1 AND session_id = $2 ORDER BY created_at")
            .bind(tenant_id).bind(session_id).fetch_all(&self.pool).await?)
    }

    async fn add_wishlist_item(&self, i: &WishlistItem) -> Result<()> {
        sqlx::query("INSERT INTO wishlist_items (tenant_id, session_id, product_id, created_at) VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING")
            .bind(i.tenant_id).bind(&i.session_id).bind(i.product_id).bind(i.created_at).execute(&self.pool).await?;
        Ok(())
    }

    async fn remove_wishlist_item(&self, tenant_id: Uuid, session_id: &str, product_id: Uuid) -> Result<bool> {
        let r = sqlx::query("DELETE FROM wishlist_items WHERE tenant_id = $1 AND session_id = $2 AND product_id = $3")
            .bind(tenant_id).bind(session_id).bind(product_id).execute(&self.pool).await?;
        Ok(r.rows_affected() > 0)
    }

    async fn upsert_customer(&self, c: &Customer) -> Result<Customer> {
        Ok(sqlx::query_as::<_, Customer>("INSERT INTO customers (id, tenant_id, email, name, phone, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (tenant_id, email) DO UPDATE SET name = EXCLUDED.name, phone = COALESCE(EXCLUDED.phone, customers.phone), updated_at = EXCLUDED.updated_at RETURNING *")
            .bind(c.id).bind(c.tenant_id).bind(&c.email).bind(&c.name).bind(&c.phone).bind(c.created_at).bind(c.updated_at)
            .fetch_one(&self.pool).await?)
    }

    async fn list_customers(&self, tenant_id: Uuid, page: Page) -> Result<(Vec<Customer>, i64)> {
        let customers = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE tenant_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3")
            .bind(tenant_id).bind(page.limit()).bind(page.offset()).fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM customers WHERE tenant_id = $1").bind(tenant_id).fetch_one(&self.pool).await?;
        Ok((customers, total.0))
    }

    async fn insert_order(&self, o: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO orders (id, tenant_id, order_number, customer_id, customer_email, customer_name, customer_phone, shipping_address, subtotal, shipping, vat_amount, total, currency, status, payment_status, gateway_code, gateway_reference, last_webhook_payload, paid_at, notes, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)")
            .bind(o.id).bind(o.tenant_id).bind(&o.order_number).bind(o.customer_id).bind(&o.customer_email).bind(&o.customer_name)
            .bind(&o.customer_phone).bind(&o.shipping_address).bind(o.subtotal).bind(o.shipping).bind(o.vat_amount).bind(o.total)
            .bind(&o.currency).bind(o.status).bind(o.payment_status).bind(&o.gateway_code).bind(&o.gateway_reference)
            .bind(&o.last_webhook_payload).bind(o.paid_at).bind(&o.notes).bind(o.created_at).bind(o.updated_at)
            .execute(&mut *tx).await?;
        for i in &o.items {
            sqlx::query("INSERT INTO order_items (id, order_id, product_id, sku, name, quantity, unit_price, line_total) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
                .bind(i.id).bind(i.order_id).bind(i.product_id).bind(&i.sku).bind(&i.name).bind(i.quantity).bind(i.unit_price).bind(i.line_total)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_order(&self, o: &Order) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $3, payment_status = $4, gateway_code = $5, gateway_reference = $6, last_webhook_payload = $7, paid_at = $8, notes = $9, updated_at = $10 WHERE tenant_id = $1 AND id = $2")
            .bind(o.tenant_id).bind(o.id).bind(o.status).bind(o.payment_status).bind(&o.gateway_code).bind(&o.gateway_reference)
            .bind(&o.last_webhook_payload).bind(o.paid_at).bind(&o.notes).bind(o.updated_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn get_order(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE tenant_id = $1 AND id = $2").bind(tenant_id).bind(id).fetch_optional(&self.pool).await?;
        match order { Some(o) => Ok(Some(self.load_items(o).await?)), None => Ok(None) }
    }

    async fn find_order_by_reference(&self, reference: &str) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id::text = $1 OR order_number = $1 LIMIT 1")
            .bind(reference).fetch_optional(&self.pool).await?;
        match order { Some(o) => Ok(Some(self.load_items(o).await?)), None => Ok(None) }
    }

    async fn list_orders(&self, tenant_id: Uuid, status: Option<OrderStatus>, page: Page) -> Result<(Vec<Order>, i64)> {
        let orders = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE tenant_id = $1 AND ($2::order_status IS NULL OR status = $2) ORDER BY created_at DESC LIMIT $3 OFFSET $4")
            .bind(tenant_id).bind(status).bind(page.limit()).bind(page.offset()).fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE tenant_id = $1 AND ($2::order_status IS NULL OR status = $2)")
            .bind(tenant_id).bind(status).fetch_one(&self.pool).await?;
        Ok((orders, total.0))
    }

    async fn next_invoice_sequence(&self, tenant_id: Uuid, issue_date: NaiveDate) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM invoices WHERE tenant_id = $1 AND date_trunc('month', issue_date) = date_trunc('month', $2::date)")
            .bind(tenant_id).bind(issue_date).fetch_one(&self.pool).await?;
        Ok(count.0 + 1)
    }

    async fn insert_invoice(&self, i: &Invoice) -> Result<()> {
        sqlx::query("INSERT INTO invoices (id, tenant_id, invoice_number, source_type, source_id, customer_name, customer_email, line_items, subtotal_ex_vat, vat_amount, total, currency, issue_date, due_date, status, paid_at, notes, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)")
            .bind(i.id).bind(i.tenant_id).bind(&i.invoice_number).bind(i.source_type).bind(i.source_id).bind(&i.customer_name)
            .bind(&i.customer_email).bind(&i.line_items).bind(i.subtotal_ex_vat).bind(i.vat_amount).bind(i.total).bind(&i.currency)
            .bind(i.issue_date).bind(i.due_date).bind(i.status).bind(i.paid_at).bind(&i.notes).bind(i.created_at).bind(i.updated_at)
            .execute(&self.pool).await.map_err(|e| conflict_on_unique(e, "invoice number"))?;
        Ok(())
    }

    async fn update_invoice(&self, i: &Invoice) -> Result<()> {
        sqlx::query("UPDATE invoices SET status = $3, paid_at = $4, notes = $5, updated_at = $6 WHERE tenant_id = $1 AND id = $2")
            .bind(i.tenant_id).bind(i.id).bind(i.status).bind(i.paid_at).bind(&i.notes).bind(i.updated_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn get_invoice(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Invoice>> {
        Ok(sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE tenant_id = $1 AND id = $2").bind(tenant_id).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_invoice_by_source(&self, tenant_id: Uuid, source: InvoiceSource, source_id: Uuid) -> Result<Option<Invoice>> {
        Ok(sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE tenant_id = $1 AND source_type = $2 AND source_id = $3 LIMIT 1")
            .bind(tenant_id).bind(source).bind(source_id).fetch_optional(&self.pool).await?)
    }

    async fn list_invoices(&self, tenant_id: Uuid, status: Option<InvoiceStatus>) -> Result<Vec<Invoice>> {
        Ok(sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE tenant_id = $1 AND ($2::invoice_status IS NULL OR status = $2) ORDER BY issue_date DESC, invoice_number DESC")
            .bind(tenant_id).bind(status).fetch_all(&self.pool).await?)
    }

    async fn list_locations(&self, tenant_id: Uuid, active_only: bool) -> Result<Vec<Location>> {
        Ok(sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE tenant_id = $1 AND (NOT $2 OR is_active) ORDER BY name")
            .bind(tenant_id).bind(active_only).fetch_all(&self.pool).await?)
    }

    async fn get_location(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Location>> {
        Ok(sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE tenant_id = $1 AND id = $2").bind(tenant_id).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn insert_location(&self, l: &Location) -> Result<()> {
        sqlx::query("INSERT INTO locations (id, tenant_id, name, address, time_slots, capacity_per_slot, is_active, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(l.id).bind(l.tenant_id).bind(&l.name).bind(&l.address).bind(&l.time_slots).bind(l.capacity_per_slot).bind(l.is_active).bind(l.created_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn list_bookings(&self, tenant_id: Uuid, date: Option<NaiveDate>) -> Result<Vec<DemoBooking>> {
        Ok(sqlx::query_as::<_, DemoBooking>("SELECT * FROM demo_bookings WHERE tenant_id = $1 AND ($2::date IS NULL OR booking_date = $2) ORDER BY booking_date, time_slot")
            .bind(tenant_id).bind(date).fetch_all(&self.pool).await?)
    }

    async fn bookings_for_day(&self, tenant_id: Uuid, location_id: Uuid, date: NaiveDate) -> Result<Vec<DemoBooking>> {
        Ok(sqlx::query_as::<_, DemoBooking>("SELECT * FROM demo_bookings WHERE tenant_id = $1 AND location_id = $2 AND booking_date = $3")
            .bind(tenant_id).bind(location_id).bind(date).fetch_all(&self.pool).await?)
    }

    async fn get_booking(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<DemoBooking>> {
        Ok(sqlx::query_as::<_, DemoBooking>("SELECT * FROM demo_bookings WHERE tenant_id = $1 AND id = $2").bind(tenant_id).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn insert_booking(&self, b: &DemoBooking) -> Result<()> {
        sqlx::query("INSERT INTO demo_bookings (id, tenant_id, location_id, customer_name, customer_email, customer_phone, product_interest, booking_date, time_slot, fee, status, notes, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)")
            .bind(b.id).bind(b.tenant_id).bind(b.location_id).bind(&b.customer_name).bind(&b.customer_email).bind(&b.customer_phone)
            .bind(&b.product_interest).bind(b.booking_date).bind(&b.time_slot).bind(b.fee).bind(b.status).bind(&b.notes)
            .bind(b.created_at).bind(b.updated_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn update_booking(&self, b: &DemoBooking) -> Result<()> {
        sqlx::query("UPDATE demo_bookings SET status = $3, fee = $4, notes = $5, updated_at = $6 WHERE tenant_id = $1 AND id = $2")
            .bind(b.tenant_id).bind(b.id).bind(b.status).bind(b.fee).bind(&b.notes).bind(b.updated_at)
            .execute(&self.pool).await?;
        Ok(())
    }
}
