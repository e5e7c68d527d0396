//! Invoice Aggregate: billing documents derived from orders and demo bookings

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, InvoiceEvent};
use crate::domain::value_objects::{round_cents, vat_portion};
use crate::domain::{DemoBooking, Location, Order, Tenant, TransitionError};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_number: String,
    pub source_type: InvoiceSource,
    pub source_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub line_items: Json<Vec<InvoiceLine>>,
    pub subtotal_ex_vat: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceSource { Order, Booking }

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus { #[default] Draft, Sent, Paid, Overdue, Cancelled }

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (*self, next),
            (Draft, Sent) | (Sent, Paid) | (Sent, Overdue) | (Overdue, Paid) | (Draft | Sent | Overdue, Cancelled)
        )
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// `INV-YYYYMM-NNNN` for the tenant's `sequence`-th invoice.
pub fn format_invoice_number(issue_date: NaiveDate, sequence: i64) -> String {
    format!("INV-{}-{:04}", issue_date.format("%Y%m"), sequence)
}

impl Invoice {
    fn build(tenant: &Tenant, source_type: InvoiceSource, source_id: Uuid, customer_name: String, customer_email: String, lines: Vec<InvoiceLine>, number: String, today: NaiveDate) -> Self {
        let now = Utc::now();
        let total = round_cents(lines.iter().map(|l| l.total).sum());
        let vat_amount = vat_portion(total, tenant.vat_rate);
        let mut invoice = Self {
            id: Uuid::now_v7(),
            tenant_id: tenant.id,
            invoice_number: number,
            source_type,
            source_id,
            customer_name,
            customer_email,
            line_items: Json(lines),
            subtotal_ex_vat: total - vat_amount,
            vat_amount,
            total,
            currency: tenant.currency.clone(),
            issue_date: today,
            due_date: today + Duration::days(i64::from(tenant.payment_terms_days.max(0))),
            status: InvoiceStatus::Draft,
            paid_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
            events: vec![],
        };
        invoice.raise_event(DomainEvent::Invoice(InvoiceEvent::Issued { tenant_id: tenant.id, invoice_id: invoice.id, number: invoice.invoice_number.clone() }));
        invoice
    }

    /// Invoice for an order; already-paid orders produce a paid invoice.
    pub fn from_order(tenant: &Tenant, order: &Order, number: String, today: NaiveDate) -> Self {
        let mut lines: Vec<InvoiceLine> = order.items.iter().map(|i| InvoiceLine {
            description: format!("{} ({})", i.name, i.sku),
            quantity: i.quantity,
            unit_price: i.unit_price,
            total: i.line_total,
        }).collect();
        if order.shipping > Decimal::ZERO {
            lines.push(InvoiceLine { description: "Shipping".to_string(), quantity: 1, unit_price: order.shipping, total: order.shipping });
        }
        let mut invoice = Self::build(tenant, InvoiceSource::Order, order.id, order.customer_name.clone(), order.customer_email.clone(), lines, number, today);
        invoice.notes = Some(format!("Order {}", order.order_number));
        if order.is_paid() {
            invoice.status = InvoiceStatus::Paid;
            invoice.paid_at = order.paid_at.or(Some(Utc::now()));
        }
        invoice
    }

    pub fn from_booking(tenant: &Tenant, booking: &DemoBooking, location: &Location, number: String, today: NaiveDate) -> Self {
        let fee = round_cents(booking.fee.unwrap_or(Decimal::ZERO));
        let product = booking.product_interest.as_deref().unwrap_or("equipment");
        let lines = vec![InvoiceLine {
            description: format!("Demo booking: {} at {} on {} {}", product, location.name, booking.booking_date, booking.time_slot),
            quantity: 1,
            unit_price: fee,
            total: fee,
        }];
        Self::build(tenant, InvoiceSource::Booking, booking.id, booking.customer_name.clone(), booking.customer_email.clone(), lines, number, today)
    }

    pub fn transition(&mut self, next: InvoiceStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::new("invoice", self.status, next));
        }
        self.status = next;
        if next == InvoiceStatus::Paid { self.paid_at = Some(Utc::now()); }
        self.touch();
        self.raise_event(DomainEvent::Invoice(InvoiceEvent::StatusChanged { tenant_id: self.tenant_id, invoice_id: self.id, to: next }));
        Ok(())
    }

    /// Sent invoices whose due date lies before `today` become overdue.
    pub fn mark_overdue_if_due(&mut self, today: NaiveDate) -> bool {
        if self.status == InvoiceStatus::Sent && self.due_date < today {
            return self.transition(InvoiceStatus::Overdue).is_ok();
        }
        false
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookingDraft, BookingFee, LocationDraft, OrderCustomer, OrderLine, PaymentOutcome};

    fn tenant() -> Tenant { Tenant::new("Kite Shack", "kite-shack") }

    fn order(t: &Tenant) -> Order {
        let customer = OrderCustomer { customer_id: None, email: "a@b.co".into(), name: "A".into(), phone: None };
        let lines = vec![OrderLine { product_id: Uuid::now_v7(), sku: "B1".into(), name: "Board".into(), quantity: 1, unit_price: Decimal::new(1150, 0) }];
        Order::place(t, customer, serde_json::json!({}), lines).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

    #[test]
    fn test_number_format() {
        assert_eq!(format_invoice_number(date(2024, 3, 9), 7), "INV-202403-0007");
    }

    #[test]
    fn test_from_order_splits_vat() {
        let t = tenant();
        let inv = Invoice::from_order(&t, &order(&t), "INV-202403-0001".into(), date(2024, 3, 1));
        assert_eq!(inv.total, Decimal::new(1150, 0));
        assert_eq!(inv.vat_amount, Decimal::new(150, 0));
        assert_eq!(inv.subtotal_ex_vat, Decimal::new(1000, 0));
        assert_eq!(inv.due_date, date(2024, 3, 15));
        assert_eq!(inv.status, InvoiceStatus::Draft);
    }

    #[test]
    fn test_paid_order_issues_paid_invoice() {
        let t = tenant();
        let mut o = order(&t);
        o.apply_payment(PaymentOutcome::Paid, None, serde_json::json!({}));
        let inv = Invoice::from_order(&t, &o, "INV-202403-0002".into(), date(2024, 3, 1));
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert!(inv.paid_at.is_some());
    }

    #[test]
    fn test_booking_fee_invoiced_with_vat() {
        let t = tenant();
        let loc = Location::create(t.id, LocationDraft {
            name: "Langebaan Lagoon".into(),
            address: None,
            time_slots: vec!["09:00".into()],
            capacity_per_slot: 2,
        }).unwrap();
        let today = date(2024, 3, 1);
        let draft = BookingDraft {
            location_id: loc.id,
            customer_name: "Lee".into(),
            customer_email: "lee@example.com".into(),
            customer_phone: None,
            product_interest: Some("Foil board".into()),
            booking_date: date(2024, 3, 4),
            time_slot: "09:00".into(),
            notes: None,
        };
        let mut booking = DemoBooking::create(t.id, &loc, &[], draft, today).unwrap();

        let free = Invoice::from_booking(&t, &booking, &loc, "INV-202403-0004".into(), today);
        assert_eq!(free.total, Decimal::ZERO);

        booking.set_fee(BookingFee { fee: Some(Decimal::new(460, 0)) }).unwrap();
        let inv = Invoice::from_booking(&t, &booking, &loc, "INV-202403-0005".into(), today);
        assert_eq!(inv.total, Decimal::new(460, 0));
        assert_eq!(inv.vat_amount, Decimal::new(60, 0));
        assert_eq!(inv.subtotal_ex_vat, Decimal::new(400, 0));
        assert_eq!(inv.line_items.0[0].unit_price, Decimal::new(460, 0));
        assert_eq!(inv.source_type, InvoiceSource::Booking);
    }

    #[test]
    fn test_lifecycle_and_overdue() {
        let t = tenant();
        let mut inv = Invoice::from_order(&t, &order(&t), "INV-202403-0003".into(), date(2024, 3, 1));
        assert!(!inv.mark_overdue_if_due(date(2024, 4, 1)));
        assert!(inv.transition(InvoiceStatus::Paid).is_err());
        inv.transition(InvoiceStatus::Sent).unwrap();
        assert!(!inv.mark_overdue_if_due(date(2024, 3, 15)));
        assert!(inv.mark_overdue_if_due(date(2024, 3, 16)));
        inv.transition(InvoiceStatus::Paid).unwrap();
        assert!(inv.transition(InvoiceStatus::Cancelled).is_err());
    }
}
