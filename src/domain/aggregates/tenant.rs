//! Tenant aggregate: one branded storefront

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub subdomain: Option<String>,
    pub domain: Option<String>,
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
    pub payment_terms_days: i32,
    pub is_active: bool,
    #[serde(skip)]
    pub admin_key_hash: Option<String>,
    #[serde(skip)]
    pub google_refresh_token: Option<String>,
    #[serde(skip)]
    pub google_access_token: Option<String>,
    #[serde(skip)]
    pub google_token_expires_at: Option<DateTime<Utc>>,
    pub google_drive_folder_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_CURRENCY: &str = "ZAR";
pub const DEFAULT_PAYMENT_TERMS_DAYS: i32 = 14;

pub fn default_vat_rate() -> Decimal { Decimal::new(15, 2) }

impl Tenant {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            slug: slug.into(),
            subdomain: None,
            domain: None,
            tagline: None,
            logo_url: None,
            primary_color: None,
            secondary_color: None,
            contact_email: None,
            contact_phone: None,
            currency: DEFAULT_CURRENCY.to_string(),
            vat_rate: default_vat_rate(),
            shipping_flat_rate: Decimal::ZERO,
            free_shipping_threshold: None,
            payment_terms_days: DEFAULT_PAYMENT_TERMS_DAYS,
            is_active: true,
            admin_key_hash: None,
            google_refresh_token: None,
            google_access_token: None,
            google_token_expires_at: None,
            google_drive_folder_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Built-in store used for local development when no tenant row matches.
    pub fn local_default() -> Self {
        let mut tenant = Self::new("Shoreline Demo Store", "demo");
        tenant.id = Uuid::nil();
        tenant.subdomain = Some("demo".to_string());
        tenant.tagline = Some("Surf, kite and SUP gear".to_string());
        tenant.primary_color = Some("#0f4c81".to_string());
        tenant.secondary_color = Some("#f5a623".to_string());
        tenant
    }

    pub fn is_local_default(&self) -> bool { self.id.is_nil() }

    /// Shipping charged for a VAT inclusive `subtotal`.
    pub fn shipping_for(&self, subtotal: Decimal) -> Decimal {
        match self.free_shipping_threshold {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => self.shipping_flat_rate,
        }
    }

    pub fn verify_admin_key(&self, raw_key: &str) -> bool {
        match &self.admin_key_hash {
            Some(hash) => constant_time_eq(hash.as_bytes(), hash_admin_key(raw_key).as_bytes()),
            None => false,
        }
    }

    pub fn google_connected(&self) -> bool { self.google_refresh_token.is_some() }

    /// Cached Google access token if it is still valid for at least a minute.
    pub fn cached_google_token(&self, now: DateTime<Utc>) -> Option<&str> {
        match (&self.google_access_token, self.google_token_expires_at) {
            (Some(token), Some(expires_at)) if expires_at - now > Duration::seconds(60) => Some(token),
            _ => None,
        }
    }

    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Generates a tenant admin key: `sk_<slug>_<32 hex chars>`.
pub fn generate_admin_key(slug: &str) -> String {
    let bytes: [u8; 16] = rand::random();
    format!("sk_{}_{}", slug.replace('-', ""), hex::encode(bytes))
}

pub fn hash_admin_key(raw_key: &str) -> String {
    hex::encode(Sha256::digest(raw_key.as_bytes()))
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() { return false; }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Which gateway adapter a tenant has configured, with its credentials.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantGateway {
    pub tenant_id: Uuid,
    pub gateway_code: String,
    pub is_active: bool,
    pub is_test_mode: bool,
    #[serde(skip_serializing)]
    pub credentials: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_shipping_threshold() {
        let mut t = Tenant::new("Kite Shack", "kite-shack");
        t.shipping_flat_rate = Decimal::new(150, 0);
        t.free_shipping_threshold = Some(Decimal::new(2000, 0));
        assert_eq!(t.shipping_for(Decimal::new(1999, 0)), Decimal::new(150, 0));
        assert_eq!(t.shipping_for(Decimal::new(2000, 0)), Decimal::ZERO);
    }

    #[test]
    fn test_admin_key_roundtrip() {
        let mut t = Tenant::new("Kite Shack", "kite-shack");
        let key = generate_admin_key(&t.slug);
        assert!(key.starts_with("sk_kiteshack_"));
        assert!(!t.verify_admin_key(&key));
        t.admin_key_hash = Some(hash_admin_key(&key));
        assert!(t.verify_admin_key(&key));
        assert!(!t.verify_admin_key("sk_kiteshack_wrong"));
    }

    #[test]
    fn test_cached_google_token_expiry_skew() {
        let now = Utc::now();
        let mut t = Tenant::new("Kite Shack", "kite-shack");
        t.google_access_token = Some("ya29.token".into());
        t.google_token_expires_at = Some(now + Duration::seconds(30));
        assert!(t.cached_google_token(now).is_none());
        t.google_token_expires_at = Some(now + Duration::seconds(600));
        assert_eq!(t.cached_google_token(now), Some("ya29.token"));
    }
}
