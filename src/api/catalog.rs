use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::dto::{CategoryRequest, ListProductsQuery, StockAdjustmentRequest};
use super::extract::{CurrentTenant, RequireTenantAdmin};
use super::response::{created, ApiError, ApiResponse, ApiResult, Paginated};
use super::AppState;
use crate::domain::events::ProductEvent;
use crate::domain::value_objects::slugify;
use crate::domain::{Category, DomainEvent, Product, ProductDraft};
use crate::infra::publish_all;
use crate::store::{Page, ProductFilter};

fn filter(query: ListProductsQuery, active_only: bool) -> ProductFilter {
    ProductFilter {
        category_id: query.category_id,
        search: query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        active_only,
        page: Page::new(query.page, query.per_page),
    }
}

async fn list(state: &AppState, tenant_id: Uuid, filter: ProductFilter) -> ApiResult<Paginated<Product>> {
    let page = filter.page.page;
    let (products, total) = state.store.list_products(tenant_id, &filter).await?;
    Ok(Paginated::new(products, total, page))
}

pub async fn list_products(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Query(query): Query<ListProductsQuery>,
) -> ApiResult<Paginated<Product>> {
    list(&state, tenant.id, filter(query, true)).await
}

pub async fn get_product(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Product>> {
    let product = state.store.get_product(tenant.id, id).await?
        .filter(|p| p.is_active())
        .ok_or_else(|| ApiError::not_found("product not found"))?;
    Ok(ApiResponse::success(product))
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
) -> ApiResult<ApiResponse<Vec<Category>>> {
    Ok(ApiResponse::success(state.store.list_categories(tenant.id).await?))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Category>> {
    let category = state.store.get_category(tenant.id, id).await?
        .ok_or_else(|| ApiError::not_found("category not found"))?;
    Ok(ApiResponse::success(category))
}

pub async fn admin_list_products(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Query(query): Query<ListProductsQuery>,
) -> ApiResult<Paginated<Product>> {
    list(&state, tenant.id, filter(query, false)).await
}

pub async fn admin_get_product(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Product>> {
    let product = state.store.get_product(tenant.id, id).await?
        .ok_or_else(|| ApiError::not_found("product not found"))?;
    Ok(ApiResponse::success(product))
}

/// A product may only reference a category of its own tenant.
async fn ensure_category(state: &AppState, tenant_id: Uuid, category_id: Option<Uuid>) -> ApiResult<()> {
    if let Some(category_id) = category_id {
        state.store.get_category(tenant_id, category_id).await?
            .ok_or_else(|| ApiError::bad_request("category_id: unknown category"))?;
    }
    Ok(())
}

pub async fn create_product(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Json(draft): Json<ProductDraft>,
) -> ApiResult<(StatusCode, ApiResponse<Product>)> {
    ensure_category(&state, tenant.id, draft.category_id).await?;
    let product = Product::create(tenant.id, tenant.vat_rate, draft)?;
    state.store.insert_product(&product).await?;
    publish_all(state.events.as_ref(), &tenant.slug, vec![DomainEvent::Product(ProductEvent::Created {
        tenant_id: tenant.id,
        product_id: product.id,
        sku: product.sku.clone(),
    })])
    .await;
    tracing::info!(tenant = %tenant.id, product_id = %product.id, sku = %product.sku, "product created");
    Ok(created(product))
}

pub async fn update_product(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Path(id): Path<Uuid>,
    Json(draft): Json<ProductDraft>,
) -> ApiResult<ApiResponse<Product>> {
    let mut product = state.store.get_product(tenant.id, id).await?
        .ok_or_else(|| ApiError::not_found("product not found"))?;
    ensure_category(&state, tenant.id, draft.category_id).await?;
    product.update(tenant.vat_rate, draft)?;
    state.store.update_product(&product).await?;
    Ok(ApiResponse::success(product))
}

pub async fn archive_product(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut product = state.store.get_product(tenant.id, id).await?
        .ok_or_else(|| ApiError::not_found("product not found"))?;
    product.archive();
    state.store.update_product(&product).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Path(id): Path<Uuid>,
    Json(req): Json<StockAdjustmentRequest>,
) -> ApiResult<ApiResponse<Product>> {
    let mut product = state.store.get_product(tenant.id, id).await?
        .ok_or_else(|| ApiError::not_found("product not found"))?;
    product.adjust_stock(req.delta)?;
    state.store.update_product(&product).await?;
    publish_all(state.events.as_ref(), &tenant.slug, vec![DomainEvent::Product(ProductEvent::StockAdjusted {
        tenant_id: tenant.id,
        product_id: product.id,
        stock: product.stock,
    })])
    .await;
    Ok(ApiResponse::success(product))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Category>)> {
    req.validate()?;
    if let Some(parent_id) = req.parent_id {
        state.store.get_category(tenant.id, parent_id).await?
            .ok_or_else(|| ApiError::bad_request("parent_id: unknown category"))?;
    }
    let category = Category {
        id: Uuid::now_v7(),
        tenant_id: tenant.id,
        slug: slugify(&req.name),
        name: req.name.trim().to_string(),
        description: req.description,
        parent_id: req.parent_id,
        image_url: req.image_url,
        created_at: Utc::now(),
    };
    state.store.insert_category(&category).await?;
    Ok(created(category))
}
