//! Page metadata for storefront rendering: titles, canonical URLs, Open Graph
//! and schema.org JSON-LD.

use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::{Product, Tenant};

pub const MAX_DESCRIPTION_LEN: usize = 160;

#[derive(Debug, Clone, Serialize)]
pub struct OpenGraph {
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub site_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub canonical_url: String,
    pub open_graph: OpenGraph,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_ld: Option<Value>,
}

/// Public storefront origin of a tenant: custom domain, platform subdomain, or `fallback`.
pub fn storefront_url(tenant: &Tenant, platform_domains: &[String], fallback: &str) -> String {
    if let Some(domain) = tenant.domain.as_deref().filter(|d| !d.is_empty()) {
        return format!("https://{domain}");
    }
    let root = platform_domains.iter().find(|d| d.as_str() != "localhost");
    match (tenant.subdomain.as_deref(), root) {
        (Some(sub), Some(root)) if !tenant.is_local_default() => format!("https://{sub}.{root}"),
        _ => fallback.trim_end_matches('/').to_string(),
    }
}

/// Collapses whitespace and cuts at the last word boundary within `max` characters.
pub fn truncate_description(text: &str, max: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max {
        return collapsed;
    }
    let budget = max.saturating_sub(3);
    let cut: String = collapsed.chars().take(budget).collect();
    let head = match cut.rfind(' ') {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}...", head.trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace()))
}

pub fn store_metadata(tenant: &Tenant, store_url: &str) -> PageMetadata {
    let title = match tenant.tagline.as_deref() {
        Some(tagline) if !tagline.is_empty() => format!("{} | {}", tenant.name, tagline),
        _ => tenant.name.clone(),
    };
    let description = truncate_description(
        tenant.tagline.as_deref().unwrap_or(&format!("Shop online at {}", tenant.name)),
        MAX_DESCRIPTION_LEN,
    );
    let canonical_url = store_url.trim_end_matches('/').to_string();
    PageMetadata {
        open_graph: OpenGraph {
            title: title.clone(),
            description: description.clone(),
            url: canonical_url.clone(),
            kind: "website",
            site_name: tenant.name.clone(),
            image: tenant.logo_url.clone(),
        },
        json_ld: Some(json!({
            "@context": "https://schema.org",
            "@type": "Store",
            "name": tenant.name,
            "url": canonical_url,
            "logo": tenant.logo_url,
            "email": tenant.contact_email,
            "telephone": tenant.contact_phone,
        })),
        title,
        description,
        canonical_url,
    }
}

pub fn product_metadata(tenant: &Tenant, product: &Product, store_url: &str) -> PageMetadata {
    let title = format!("{} | {}", product.name, tenant.name);
    let description = truncate_description(
        product.description.as_deref().unwrap_or(&product.name),
        MAX_DESCRIPTION_LEN,
    );
    let canonical_url = format!("{}/products/{}", store_url.trim_end_matches('/'), product.id);
    let availability = if product.is_active() && product.stock > 0 {
        "https://schema.org/InStock"
    } else {
        "https://schema.org/OutOfStock"
    };

    let mut ld = json!({
        "@context": "https://schema.org",
        "@type": "Product",
        "name": product.name,
        "sku": product.sku,
        "description": description,
        "image": product.images,
        "offers": {
            "@type": "Offer",
            "url": canonical_url,
            "price": format!("{:.2}", product.price),
            "priceCurrency": tenant.currency,
            "availability": availability,
        },
    });
    if let Some(brand) = &product.brand {
        ld["brand"] = json!({ "@type": "Brand", "name": brand });
    }

    PageMetadata {
        open_graph: OpenGraph {
            title: title.clone(),
            description: description.clone(),
            url: canonical_url.clone(),
            kind: "product",
            site_name: tenant.name.clone(),
            image: product.images.first().cloned(),
        },
        json_ld: Some(ld),
        title,
        description,
        canonical_url,
    }
}
