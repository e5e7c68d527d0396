//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{round_cents, vat_portion, Money};
use crate::domain::{Tenant, TransitionError};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub order_number: String,
    pub customer_id: Option<Uuid>,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub shipping_address: serde_json::Value,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub gateway_code: Option<String>,
    pub gateway_reference: Option<String>,
    #[serde(skip)]
    pub last_webhook_payload: Option<serde_json::Value>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[sqlx(skip)]
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Refunded }

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Cancelled, Refunded }

/// What a gateway callback says happened to a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome { Paid, Failed, Cancelled, Pending }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending | Confirmed | Processing, Cancelled)
                | (Confirmed | Processing | Shipped | Delivered, Refunded)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled, Self::Refunded]
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

/// Customer details captured at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCustomer {
    pub customer_id: Option<Uuid>,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

/// A priced line ready to become an [`OrderItem`].
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Whether applying a payment callback changed anything worth acting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentApplied {
    pub newly_paid: bool,
    pub cancelled: bool,
}

pub fn generate_order_number(now: DateTime<Utc>) -> String {
    format!("ORD-{}-{:06X}", now.format("%Y%m%d"), rand::random::<u32>() & 0xFF_FFFF)
}

impl Order {
    /// Prices the lines against the tenant's shipping and VAT settings and opens a pending order.
    pub fn place(tenant: &Tenant, customer: OrderCustomer, shipping_address: serde_json::Value, lines: Vec<OrderLine>) -> Result<Self, OrderError> {
        if lines.is_empty() { return Err(OrderError::NoItems); }
        let now = Utc::now();
        let id = Uuid::now_v7();
        let currency = tenant.currency.as_str();

        let items: Vec<OrderItem> = lines.into_iter().map(|l| {
            let unit = Money::new(l.unit_price, currency);
            OrderItem {
                id: Uuid::now_v7(),
                order_id: id,
                product_id: l.product_id,
                sku: l.sku,
                name: l.name,
                quantity: l.quantity as i32,
                unit_price: unit.amount(),
                line_total: unit.multiply(l.quantity).amount(),
            }
        }).collect();

        let subtotal = round_cents(items.iter().map(|i| i.line_total).sum());
        let shipping = round_cents(tenant.shipping_for(subtotal));
        let total = subtotal + shipping;

        let mut order = Self {
            id,
            tenant_id: tenant.id,
            order_number: generate_order_number(now),
            customer_id: customer.customer_id,
            customer_email: customer.email.trim().to_lowercase(),
            customer_name: customer.name.trim().to_string(),
            customer_phone: customer.phone,
            shipping_address,
            subtotal,
            shipping,
            vat_amount: vat_portion(total, tenant.vat_rate),
            total,
            currency: tenant.currency.clone(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            gateway_code: None,
            gateway_reference: None,
            last_webhook_payload: None,
            paid_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
            items,
            events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { tenant_id: tenant.id, order_id: id, total }));
        Ok(order)
    }

    pub fn total_money(&self) -> Money { Money::new(self.total, &self.currency) }
    pub fn is_paid(&self) -> bool { self.payment_status == PaymentStatus::Paid }

    pub fn transition(&mut self, next: OrderStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::new("order", self.status, next));
        }
        let from = self.status;
        self.status = next;
        if next == OrderStatus::Refunded { self.payment_status = PaymentStatus::Refunded; }
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { tenant_id: self.tenant_id, order_id: self.id, from, to: next }));
        Ok(())
    }

    pub fn attach_payment(&mut self, gateway_code: &str, reference: Option<String>) {
        self.gateway_code = Some(gateway_code.to_string());
        self.gateway_reference = reference;
        self.touch();
    }

    /// Applies a gateway callback. The latest callback wins; there is no ordering check.
    pub fn apply_payment(&mut self, outcome: PaymentOutcome, reference: Option<String>, payload: serde_json::Value) -> PaymentApplied {
        let was_paid = self.is_paid();
        if reference.is_some() { self.gateway_reference = reference; }
        self.last_webhook_payload = Some(payload);
        let mut applied = PaymentApplied { newly_paid: false, cancelled: false };

        match outcome {
            PaymentOutcome::Paid => {
                self.payment_status = PaymentStatus::Paid;
                if !was_paid {
                    self.paid_at = Some(Utc::now());
                    applied.newly_paid = true;
                    if self.status == OrderStatus::Pending { self.status = OrderStatus::Confirmed; }
                    self.raise_event(DomainEvent::Order(OrderEvent::Paid { tenant_id: self.tenant_id, order_id: self.id, total: self.total }));
                }
            }
            PaymentOutcome::Failed => self.payment_status = PaymentStatus::Failed,
            PaymentOutcome::Cancelled => {
                self.payment_status = PaymentStatus::Cancelled;
                if self.status == OrderStatus::Pending {
                    self.status = OrderStatus::Cancelled;
                    applied.cancelled = true;
                }
            }
            PaymentOutcome::Pending => self.payment_status = PaymentStatus::Pending,
        }
        self.touch();
        applied
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "No items") }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> Tenant {
        let mut t = Tenant::new("Kite Shack", "kite-shack");
        t.shipping_flat_rate = Decimal::new(100, 0);
        t.free_shipping_threshold = Some(Decimal::new(5000, 0));
        t
    }

    fn customer() -> OrderCustomer {
        OrderCustomer { customer_id: None, email: " Rider@Example.com ".into(), name: "Rider".into(), phone: None }
    }

    fn lines() -> Vec<OrderLine> {
        vec![OrderLine { product_id: Uuid::now_v7(), sku: "W001".into(), name: "Wetsuit".into(), quantity: 2, unit_price: Decimal::new(1000, 0) }]
    }

    #[test]
    fn test_place_prices_order() {
        let mut order = Order::place(&tenant(), customer(), serde_json::json!({}), lines()).unwrap();
        assert_eq!(order.subtotal, Decimal::new(2000, 0));
        assert_eq!(order.shipping, Decimal::new(100, 0));
        assert_eq!(order.total, Decimal::new(2100, 0));
        assert_eq!(order.vat_amount, Decimal::new(27391, 2));
        assert_eq!(order.customer_email, "rider@example.com");
        assert!(order.order_number.starts_with("ORD-"));
        assert_eq!(order.take_events().len(), 1);
    }

    #[test]
    fn test_empty_order_rejected() {
        assert_eq!(Order::place(&tenant(), customer(), serde_json::json!({}), vec![]).unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn test_order_workflow() {
        let mut order = Order::place(&tenant(), customer(), serde_json::json!({}), lines()).unwrap();
        assert!(order.transition(OrderStatus::Shipped).is_err());
        order.transition(OrderStatus::Confirmed).unwrap();
        order.transition(OrderStatus::Processing).unwrap();
        order.transition(OrderStatus::Shipped).unwrap();
        assert!(order.transition(OrderStatus::Cancelled).is_err());
        order.transition(OrderStatus::Delivered).unwrap();
        order.transition(OrderStatus::Refunded).unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert!(order.transition(OrderStatus::Pending).is_err());
    }

    #[test]
    fn test_duplicate_paid_callback_only_confirms_once() {
        let mut order = Order::place(&tenant(), customer(), serde_json::json!({}), lines()).unwrap();
        let first = order.apply_payment(PaymentOutcome::Paid, Some("pf-1".into()), serde_json::json!({"n": 1}));
        assert!(first.newly_paid);
        assert_eq!(order.status, OrderStatus::Confirmed);
        let second = order.apply_payment(PaymentOutcome::Paid, Some("pf-1".into()), serde_json::json!({"n": 2}));
        assert!(!second.newly_paid);
        assert_eq!(order.last_webhook_payload, Some(serde_json::json!({"n": 2})));
    }

    #[test]
    fn test_cancelled_payment_cancels_pending_order() {
        let mut order = Order::place(&tenant(), customer(), serde_json::json!({}), lines()).unwrap();
        let applied = order.apply_payment(PaymentOutcome::Cancelled, None, serde_json::json!({}));
        assert!(applied.cancelled);
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Cancelled);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}
