//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{BookingStatus, InvoiceStatus, OrderStatus};

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Tenant(TenantEvent),
    Product(ProductEvent),
    Order(OrderEvent),
    Invoice(InvoiceEvent),
    Booking(BookingEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TenantEvent {
    Provisioned { tenant_id: Uuid, slug: String },
    Deactivated { tenant_id: Uuid },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { tenant_id: Uuid, product_id: Uuid, sku: String },
    StockAdjusted { tenant_id: Uuid, product_id: Uuid, stock: i32 },
    ImagesImported { tenant_id: Uuid, product_id: Uuid, count: usize },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { tenant_id: Uuid, order_id: Uuid, total: Decimal },
    Paid { tenant_id: Uuid, order_id: Uuid, total: Decimal },
    StatusChanged { tenant_id: Uuid, order_id: Uuid, from: OrderStatus, to: OrderStatus },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InvoiceEvent {
    Issued { tenant_id: Uuid, invoice_id: Uuid, number: String },
    StatusChanged { tenant_id: Uuid, invoice_id: Uuid, to: InvoiceStatus },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BookingEvent {
    Created { tenant_id: Uuid, booking_id: Uuid, location_id: Uuid },
    StatusChanged { tenant_id: Uuid, booking_id: Uuid, to: BookingStatus },
}

impl DomainEvent {
    /// Dotted event name used as the trailing part of the publish subject.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tenant(TenantEvent::Provisioned { .. }) => "tenant.provisioned",
            Self::Tenant(TenantEvent::Deactivated { .. }) => "tenant.deactivated",
            Self::Product(ProductEvent::Created { .. }) => "product.created",
            Self::Product(ProductEvent::StockAdjusted { .. }) => "product.stock_adjusted",
            Self::Product(ProductEvent::ImagesImported { .. }) => "product.images_imported",
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
            Self::Order(OrderEvent::Paid { .. }) => "order.paid",
            Self::Order(OrderEvent::StatusChanged { .. }) => "order.status_changed",
            Self::Invoice(InvoiceEvent::Issued { .. }) => "invoice.issued",
            Self::Invoice(InvoiceEvent::StatusChanged { .. }) => "invoice.status_changed",
            Self::Booking(BookingEvent::Created { .. }) => "booking.created",
            Self::Booking(BookingEvent::StatusChanged { .. }) => "booking.status_changed",
        }
    }

    pub fn tenant_id(&self) -> Uuid {
        match self {
            Self::Tenant(TenantEvent::Provisioned { tenant_id, .. } | TenantEvent::Deactivated { tenant_id }) => *tenant_id,
            Self::Product(
                ProductEvent::Created { tenant_id, .. }
                | ProductEvent::StockAdjusted { tenant_id, .. }
                | ProductEvent::ImagesImported { tenant_id, .. },
            ) => *tenant_id,
            Self::Order(
                OrderEvent::Placed { tenant_id, .. }
                | OrderEvent::Paid { tenant_id, .. }
                | OrderEvent::StatusChanged { tenant_id, .. },
            ) => *tenant_id,
            Self::Invoice(InvoiceEvent::Issued { tenant_id, .. } | InvoiceEvent::StatusChanged { tenant_id, .. }) => *tenant_id,
            Self::Booking(BookingEvent::Created { tenant_id, .. } | BookingEvent::StatusChanged { tenant_id, .. }) => *tenant_id,
        }
    }
}
