//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::value_objects::{ex_vat, non_blank, non_negative_amount, positive_amount, round_cents, Money, Sku};
use crate::error::{CommerceError, Result};

pub const MAX_PRODUCT_IMAGES: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub price_ex_vat: Decimal,
    pub cost: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub images: Vec<String>,
    pub features: Vec<String>,
    pub specifications: serde_json::Value,
    pub tags: Vec<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { Draft, #[default] Active, Archived }

/// Writable product fields. Every create and update goes through [`Validate`].
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProductDraft {
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"), custom = "non_blank")]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "must be between 1 and 50 characters"))]
    pub sku: Option<String>,
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub description: Option<String>,
    #[validate(custom = "positive_amount")]
    pub price: Decimal,
    #[validate(custom = "non_negative_amount")]
    pub cost: Option<Decimal>,
    #[validate(custom = "positive_amount")]
    pub compare_at_price: Option<Decimal>,
    #[validate(range(min = 0, message = "cannot be negative"))]
    #[serde(default)]
    pub stock: i32,
    pub category_id: Option<Uuid>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub brand: Option<String>,
    #[validate(custom = "image_urls")]
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub specifications: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
}

fn image_urls(images: &Vec<String>) -> std::result::Result<(), ValidationError> {
    if images.len() > MAX_PRODUCT_IMAGES {
        let mut err = ValidationError::new("too_many_images");
        err.message = Some(format!("at most {MAX_PRODUCT_IMAGES} images").into());
        return Err(err);
    }
    if images.iter().any(|u| url::Url::parse(u).is_err()) {
        let mut err = ValidationError::new("url");
        err.message = Some("every image must be an absolute URL".into());
        return Err(err);
    }
    Ok(())
}

impl Product {
    pub fn create(tenant_id: Uuid, vat_rate: Decimal, draft: ProductDraft) -> Result<Self> {
        draft.validate()?;
        let sku = match &draft.sku {
            Some(raw) => Sku::new(raw.as_str()).map_err(|e| CommerceError::Validation(format!("sku: {e}")))?,
            None => Sku::generate(&draft.name),
        };
        let now = Utc::now();
        let mut product = Self {
            id: Uuid::now_v7(),
            tenant_id,
            sku: sku.into_inner(),
            name: String::new(),
            description: None,
            price: Decimal::ZERO,
            price_ex_vat: Decimal::ZERO,
            cost: None,
            compare_at_price: None,
            stock: 0,
            category_id: None,
            brand: None,
            images: vec![],
            features: vec![],
            specifications: serde_json::json!({}),
            tags: vec![],
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        };
        product.assign(draft, vat_rate);
        Ok(product)
    }

    /// Replaces the writable fields. The sku is only changed when the draft carries one.
    pub fn update(&mut self, vat_rate: Decimal, draft: ProductDraft) -> Result<()> {
        draft.validate()?;
        if let Some(raw) = &draft.sku {
            self.sku = Sku::new(raw.as_str())
                .map_err(|e| CommerceError::Validation(format!("sku: {e}")))?
                .into_inner();
        }
        self.assign(draft, vat_rate);
        self.touch();
        Ok(())
    }

    fn assign(&mut self, draft: ProductDraft, vat_rate: Decimal) {
        self.name = draft.name.trim().to_string();
        self.description = draft.description.filter(|d| !d.trim().is_empty());
        self.price = round_cents(draft.price);
        self.price_ex_vat = ex_vat(draft.price, vat_rate);
        self.cost = draft.cost.map(round_cents);
        self.compare_at_price = draft.compare_at_price.map(round_cents);
        self.stock = draft.stock;
        self.category_id = draft.category_id;
        self.brand = draft.brand;
        self.images = draft.images;
        self.features = draft.features.into_iter().filter(|f| !f.trim().is_empty()).collect();
        self.specifications = match draft.specifications {
            Some(v @ serde_json::Value::Object(_)) => v,
            _ => serde_json::json!({}),
        };
        self.tags = draft.tags;
        if let Some(status) = draft.status { self.status = status; }
    }

    /// Current writable fields, as a starting point for partial updates.
    pub fn draft(&self) -> ProductDraft {
        ProductDraft {
            name: self.name.clone(),
            sku: None,
            description: self.description.clone(),
            price: self.price,
            cost: self.cost,
            compare_at_price: self.compare_at_price,
            stock: self.stock,
            category_id: self.category_id,
            brand: self.brand.clone(),
            images: self.images.clone(),
            features: self.features.clone(),
            specifications: Some(self.specifications.clone()),
            tags: self.tags.clone(),
            status: Some(self.status),
        }
    }

    /// Recomputes the derived VAT exclusive price after a tenant rate change.
    pub fn reprice(&mut self, vat_rate: Decimal) {
        self.price_ex_vat = ex_vat(self.price, vat_rate);
        self.touch();
    }

    pub fn unit_price(&self, currency: &str) -> Money { Money::new(self.price, currency) }
    pub fn is_active(&self) -> bool { self.status == ProductStatus::Active }
    pub fn can_fulfil(&self, qty: u32) -> bool { self.is_active() && i64::from(self.stock) >= i64::from(qty) }

    pub fn adjust_stock(&mut self, delta: i32) -> Result<()> {
        let next = self.stock.checked_add(delta).filter(|s| *s >= 0)
            .ok_or_else(|| CommerceError::InsufficientStock(self.sku.clone()))?;
        self.stock = next;
        self.touch();
        Ok(())
    }

    /// Appends image URLs up to the image limit; returns the URLs that did not fit.
    pub fn append_images(&mut self, urls: Vec<String>) -> Vec<String> {
        let room = MAX_PRODUCT_IMAGES.saturating_sub(self.images.len());
        let mut urls = urls;
        let overflow = if urls.len() > room { urls.split_off(room) } else { vec![] };
        if !urls.is_empty() {
            self.images.extend(urls);
            self.touch();
        }
        overflow
    }

    pub fn archive(&mut self) { self.status = ProductStatus::Archived; self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
