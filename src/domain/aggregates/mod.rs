//! Aggregates module
pub mod booking;
pub mod cart;
pub mod customer;
pub mod invoice;
pub mod order;
pub mod product;
pub mod tenant;

pub use booking::{slot_availability, BookingDraft, BookingFee, BookingStatus, DemoBooking, Location, LocationDraft, SlotAvailability};
pub use cart::{Cart, CartItem, CartLine, WishlistItem, MAX_LINE_QUANTITY};
pub use customer::Customer;
pub use invoice::{format_invoice_number, Invoice, InvoiceLine, InvoiceSource, InvoiceStatus};
pub use order::{Order, OrderCustomer, OrderError, OrderItem, OrderLine, OrderStatus, PaymentApplied, PaymentOutcome, PaymentStatus};
pub use product::{Category, Product, ProductDraft, ProductStatus, MAX_PRODUCT_IMAGES};
pub use tenant::{generate_admin_key, hash_admin_key, Tenant, TenantGateway};
