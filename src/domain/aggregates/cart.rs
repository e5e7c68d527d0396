//! Session carts and wishlists

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Money;

/// Upper bound on the quantity of a single cart line.
pub const MAX_LINE_QUANTITY: i32 = 999;

/// Persisted cart row, keyed by (tenant, session, product).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartItem {
    pub tenant_id: Uuid,
    pub session_id: String,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new(tenant_id: Uuid, session_id: impl Into<String>, product_id: Uuid, quantity: i32) -> Self {
        let now = Utc::now();
        Self { tenant_id, session_id: session_id.into(), product_id, quantity, created_at: now, updated_at: now }
    }

    /// Quantity after adding `added` to a line holding `current`, capped at [`MAX_LINE_QUANTITY`].
    pub fn merged_quantity(current: i32, added: i32) -> i32 {
        current.saturating_add(added).min(MAX_LINE_QUANTITY)
    }
}

/// Cart line joined with the product it refers to.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
    pub in_stock: bool,
}

impl CartLine {
    pub fn new(product_id: Uuid, sku: String, name: String, image: Option<String>, quantity: u32, unit_price: Money, in_stock: bool) -> Self {
        let line_total = unit_price.multiply(quantity);
        Self { product_id, sku, name, image, quantity, unit_price, line_total, in_stock }
    }
}

/// Priced view of a session's cart. Built fresh from stored rows on every read.
#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    session_id: String,
    currency: String,
    items: Vec<CartLine>,
    subtotal: Money,
    item_count: u32,
}

impl Cart {
    pub fn new(session_id: impl Into<String>, currency: &str) -> Self {
        let currency = currency.to_uppercase();
        Self { session_id: session_id.into(), subtotal: Money::zero(&currency), currency, items: vec![], item_count: 0 }
    }

    pub fn items(&self) -> &[CartLine] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn item_count(&self) -> u32 { self.item_count }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Adds a line, merging quantities when the product is already in the cart.
    /// Lines priced in another currency are ignored.
    pub fn add_item(&mut self, line: CartLine) {
        if line.unit_price.currency() != self.currency { return; }
        match self.items.iter_mut().find(|i| i.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity += line.quantity;
                existing.line_total = existing.unit_price.multiply(existing.quantity);
                existing.in_stock = existing.in_stock && line.in_stock;
            }
            None => self.items.push(line),
        }
        self.subtotal = self.items.iter()
            .fold(Money::zero(&self.currency), |acc, i| acc.add(&i.line_total).unwrap_or(acc));
        self.item_count = self.items.iter().map(|i| i.quantity).sum();
    }
}

/// Saved-for-later product, keyed like the cart.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WishlistItem {
    pub tenant_id: Uuid,
    pub session_id: String,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(id: Uuid, qty: u32) -> CartLine {
        CartLine::new(id, "W1".into(), "Wetsuit 4/3".into(), None, qty, Money::zar(Decimal::new(10, 0)), true)
    }

    #[test]
    fn test_lines_merge_and_totals_follow() {
        let board = Uuid::now_v7();
        let mut cart = Cart::new("sess-1", "ZAR");
        cart.add_item(line(board, 2));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.subtotal().amount(), Decimal::new(20, 0));
        cart.add_item(line(board, 1));
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.items()[0].line_total.amount(), Decimal::new(30, 0));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_foreign_currency_line_ignored() {
        let mut cart = Cart::new("sess-2", "ZAR");
        cart.add_item(CartLine::new(Uuid::now_v7(), "F1".into(), "Fins".into(), None, 1, Money::new(Decimal::ONE, "USD"), true));
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal().amount(), Decimal::ZERO);
    }

    #[test]
    fn test_merged_quantity_capped() {
        assert_eq!(CartItem::merged_quantity(2, 3), 5);
        assert_eq!(CartItem::merged_quantity(MAX_LINE_QUANTITY, MAX_LINE_QUANTITY), MAX_LINE_QUANTITY);
        assert_eq!(CartItem::merged_quantity(i32::MAX, 1), MAX_LINE_QUANTITY);
    }
}
