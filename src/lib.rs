//! Shoreline Commerce - multi-tenant storefront service
//!
//! One deployment serves many branded surf and watersports stores, each
//! addressed by its own subdomain or custom domain.
//!
//! ## Features
//! - Host based tenant resolution with a local development fallback
//! - Product catalog with VAT inclusive pricing and stock tracking
//! - Session carts, wishlists and checkout
//! - PayFast, Yoco, Stripe, iKhokha and Peach Payments gateways with signed webhooks
//! - Invoices and in-store demo bookings
//! - Google Drive and Medusa catalog imports
//! - Storefront SEO metadata

pub mod api;
pub mod config;
pub mod domain;
pub mod drive;
pub mod error;
pub mod infra;
pub mod medusa;
pub mod payments;
pub mod seo;
pub mod store;
pub mod tenancy;

pub use error::{CommerceError, Result};
