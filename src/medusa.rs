//! Medusa admin API client and catalog import.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::MedusaConfig;
use crate::domain::events::ProductEvent;
use crate::domain::{DomainEvent, Product, ProductDraft, ProductStatus, Sku, Tenant};
use crate::error::{CommerceError, Result};
use crate::infra::{publish_all, EventPublisher};
use crate::store::Store;

const SYNC_PAGE_SIZE: u32 = 100;

/// Cookie-authenticated admin session.
#[derive(Debug, Clone)]
pub struct MedusaSession {
    cookie: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MedusaPrice {
    pub amount: i64,
    pub currency_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MedusaVariant {
    pub sku: Option<String>,
    #[serde(default)]
    pub inventory_quantity: Option<i32>,
    #[serde(default)]
    pub prices: Vec<MedusaPrice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MedusaImage {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MedusaProduct {
    pub id: String,
    pub title: String,
    pub handle: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub images: Vec<MedusaImage>,
    #[serde(default)]
    pub variants: Vec<MedusaVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MedusaProductPage {
    pub products: Vec<MedusaProduct>,
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
}

impl MedusaProduct {
    /// Variant sku, falling back to the handle.
    pub fn sku(&self) -> Option<String> {
        self.variants.first().and_then(|v| v.sku.clone())
            .or_else(|| self.handle.clone())
            .and_then(|raw| Sku::new(raw).ok())
            .map(Sku::into_inner)
    }

    /// First variant price in the tenant currency (or its first price), as a decimal amount.
    pub fn price(&self, currency: &str) -> Option<Decimal> {
        let prices = &self.variants.first()?.prices;
        prices.iter()
            .find(|p| p.currency_code.eq_ignore_ascii_case(currency))
            .or_else(|| prices.first())
            .map(|p| Decimal::new(p.amount, 2))
            .filter(|p| *p > Decimal::ZERO)
    }

    fn image_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.images.iter().map(|i| i.url.clone()).collect();
        if urls.is_empty() {
            urls.extend(self.thumbnail.clone());
        }
        urls.retain(|u| url::Url::parse(u).is_ok());
        urls.truncate(crate::domain::aggregates::product::MAX_PRODUCT_IMAGES);
        urls
    }

    fn apply_to(&self, mut draft: ProductDraft, price: Decimal) -> ProductDraft {
        draft.name = self.title.trim().to_string();
        draft.description = self.description.clone();
        draft.price = price;
        if let Some(stock) = self.variants.first().and_then(|v| v.inventory_quantity) {
            draft.stock = stock.max(0);
        }
        let images = self.image_urls();
        if !images.is_empty() {
            draft.images = images;
        }
        draft.status = Some(match self.status.as_deref() {
            Some("published") | None => ProductStatus::Active,
            _ => ProductStatus::Draft,
        });
        draft
    }
}

pub struct MedusaClient {
    http: reqwest::Client,
    config: Option<MedusaConfig>,
}

impl MedusaClient {
    pub fn new(http: reqwest::Client, config: Option<MedusaConfig>) -> Self { Self { http, config } }

    fn config(&self) -> Result<&MedusaConfig> {
        self.config.as_ref().ok_or_else(|| CommerceError::Config("MEDUSA_BACKEND_URL is not set".into()))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<MedusaSession> {
        let config = self.config()?;
        let response = self.http
            .post(format!("{}/admin/auth", config.backend_url))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| CommerceError::Upstream(format!("medusa login: {e}")))?;
        if !response.status().is_success() {
            return Err(CommerceError::Upstream(format!("medusa login rejected: HTTP {}", response.status())));
        }
        let cookie = response.headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .collect::<Vec<_>>()
            .join("; ");
        if cookie.is_empty() {
            return Err(CommerceError::Upstream("medusa login returned no session cookie".into()));
        }
        Ok(MedusaSession { cookie })
    }

    pub async fn list_products(&self, session: &MedusaSession, limit: u32, offset: u32) -> Result<MedusaProductPage> {
        let config = self.config()?;
        let response = self.http
            .get(format!("{}/admin/products", config.backend_url))
            .header(reqwest::header::COOKIE, &session.cookie)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await
            .map_err(|e| CommerceError::Upstream(format!("medusa products: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CommerceError::Upstream(format!("medusa products: HTTP {status}: {body}")));
        }
        response.json().await.map_err(|e| CommerceError::Upstream(format!("medusa products: {e}")))
    }

    /// Imports every Medusa product into the tenant catalog, matched by sku.
    pub async fn sync_products(&self, store: &dyn Store, events: &Arc<dyn EventPublisher>, tenant: &Tenant) -> Result<SyncReport> {
        let config = self.config()?;
        let session = self.login(&config.admin_email, &config.admin_password).await?;

        let mut report = SyncReport::default();
        let mut published = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.list_products(&session, SYNC_PAGE_SIZE, offset).await?;
            let fetched = page.products.len() as u32;
            for remote in &page.products {
                let (Some(sku), Some(price)) = (remote.sku(), remote.price(&tenant.currency)) else {
                    tracing::debug!(tenant = %tenant.id, medusa_id = %remote.id, "skipping medusa product without sku or price");
                    report.skipped += 1;
                    continue;
                };
                match store.find_product_by_sku(tenant.id, &sku).await? {
                    Some(mut product) => {
                        let draft = remote.apply_to(product.draft(), price);
                        if product.update(tenant.vat_rate, draft).is_err() {
                            report.skipped += 1;
                            continue;
                        }
                        store.update_product(&product).await?;
                        report.updated += 1;
                    }
                    None => {
                        let draft = remote.apply_to(ProductDraft { sku: Some(sku), ..Default::default() }, price);
                        let Ok(product) = Product::create(tenant.id, tenant.vat_rate, draft) else {
                            report.skipped += 1;
                            continue;
                        };
                        store.insert_product(&product).await?;
                        published.push(DomainEvent::Product(ProductEvent::Created {
                            tenant_id: tenant.id,
                            product_id: product.id,
                            sku: product.sku.clone(),
                        }));
                        report.created += 1;
                    }
                }
            }
            offset += fetched;
            if fetched == 0 || offset >= page.count {
                break;
            }
        }

        publish_all(events.as_ref(), &tenant.slug, published).await;
        tracing::info!(
            tenant = %tenant.id, created = report.created, updated = report.updated, skipped = report.skipped,
            "medusa sync finished"
        );
        Ok(report)
    }
}
