use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use super::dto::StorefrontResponse;
use super::extract::{CurrentTenant, ResolvedTenant};
use super::response::{ApiError, ApiResponse, ApiResult};
use super::AppState;
use crate::domain::Tenant;
use crate::seo::{self, PageMetadata};

/// Unknown hosts still get a minimal answer here so the storefront shell can render.
pub async fn get_tenant(ResolvedTenant(tenant): ResolvedTenant) -> Json<serde_json::Value> {
    match tenant {
        Some(tenant) => Json(json!({ "data": StorefrontResponse::from(&tenant) })),
        None => Json(json!({ "data": { "name": "Store", "slug": null, "currency": crate::domain::aggregates::tenant::DEFAULT_CURRENCY } })),
    }
}

fn store_url(state: &AppState, tenant: &Tenant) -> String {
    seo::storefront_url(tenant, &state.config.platform_domains, &state.config.public_base_url)
}

pub async fn store_seo(State(state): State<Arc<AppState>>, CurrentTenant(tenant): CurrentTenant) -> ApiResponse<PageMetadata> {
    ApiResponse::success(seo::store_metadata(&tenant, &store_url(&state, &tenant)))
}

pub async fn product_seo(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<PageMetadata>> {
    let product = state.store.get_product(tenant.id, id).await?
        .filter(|p| p.is_active())
        .ok_or_else(|| ApiError::not_found("product not found"))?;
    Ok(ApiResponse::success(seo::product_metadata(&tenant, &product, &store_url(&state, &tenant))))
}
