use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use super::dto::{AddCartItemRequest, UpdateCartItemRequest, WishlistRequest};
use super::extract::CurrentTenant;
use super::response::{ApiError, ApiResponse, ApiResult};
use super::AppState;
use crate::domain::{Cart, CartItem, CartLine, Product, Tenant, WishlistItem, MAX_LINE_QUANTITY};

const MAX_SESSION_LEN: usize = 128;

fn check_session(session: &str) -> ApiResult<()> {
    if session.trim().is_empty() || session.len() > MAX_SESSION_LEN {
        return Err(ApiError::bad_request("session id must be between 1 and 128 characters"));
    }
    Ok(())
}

/// Joins the stored cart rows with current product data. Rows whose product is gone are dropped.
pub(super) async fn load_cart(state: &AppState, tenant: &Tenant, session: &str) -> ApiResult<(Cart, Vec<Product>)> {
    let items = state.store.list_cart_items(tenant.id, session).await?;
    let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products = state.store.get_products(tenant.id, &ids).await?;
    let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();

    let mut cart = Cart::new(session, &tenant.currency);
    for item in &items {
        let Some(product) = by_id.get(&item.product_id) else { continue };
        let quantity = item.quantity.max(0) as u32;
        cart.add_item(CartLine::new(
            product.id,
            product.sku.clone(),
            product.name.clone(),
            product.images.first().cloned(),
            quantity,
            product.unit_price(&tenant.currency),
            product.can_fulfil(quantity),
        ));
    }
    Ok((cart, products))
}

async fn active_product(state: &AppState, tenant: &Tenant, id: Uuid) -> ApiResult<Product> {
    state.store.get_product(tenant.id, id).await?
        .filter(|p| p.is_active())
        .ok_or_else(|| ApiError::not_found("product not found"))
}

pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path(session): Path<String>,
) -> ApiResult<ApiResponse<Cart>> {
    check_session(&session)?;
    let (cart, _) = load_cart(&state, &tenant, &session).await?;
    Ok(ApiResponse::success(cart))
}

fn line_quantity(requested: u32) -> ApiResult<i32> {
    i32::try_from(requested).ok()
        .filter(|q| *q <= MAX_LINE_QUANTITY)
        .ok_or_else(|| ApiError::bad_request(format!("quantity: at most {MAX_LINE_QUANTITY} per line")))
}

pub async fn add_item(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path(session): Path<String>,
    Json(req): Json<AddCartItemRequest>,
) -> ApiResult<ApiResponse<Cart>> {
    check_session(&session)?;
    if req.quantity == 0 {
        return Err(ApiError::bad_request("quantity: must be at least 1"));
    }
    let quantity = line_quantity(req.quantity)?;
    active_product(&state, &tenant, req.product_id).await?;
    state.store.add_cart_item(&CartItem::new(tenant.id, session.as_str(), req.product_id, quantity)).await?;
    let (cart, _) = load_cart(&state, &tenant, &session).await?;
    Ok(ApiResponse::success(cart))
}

/// A quantity of zero removes the line.
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((session, product_id)): Path<(String, Uuid)>,
    Json(req): Json<UpdateCartItemRequest>,
) -> ApiResult<ApiResponse<Cart>> {
    check_session(&session)?;
    let found = if req.quantity == 0 {
        state.store.remove_cart_item(tenant.id, &session, product_id).await?
    } else {
        let quantity = line_quantity(req.quantity)?;
        state.store.set_cart_quantity(tenant.id, &session, product_id, quantity).await?
    };
    if !found {
        return Err(ApiError::not_found("cart item not found"));
    }
    let (cart, _) = load_cart(&state, &tenant, &session).await?;
    Ok(ApiResponse::success(cart))
}

pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((session, product_id)): Path<(String, Uuid)>,
) -> ApiResult<ApiResponse<Cart>> {
    check_session(&session)?;
    if !state.store.remove_cart_item(tenant.id, &session, product_id).await? {
        return Err(ApiError::not_found("cart item not found"));
    }
    let (cart, _) = load_cart(&state, &tenant, &session).await?;
    Ok(ApiResponse::success(cart))
}

pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path(session): Path<String>,
) -> ApiResult<StatusCode> {
    check_session(&session)?;
    state.store.clear_cart(tenant.id, &session).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_wishlist(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path(session): Path<String>,
) -> ApiResult<ApiResponse<Vec<Product>>> {
    check_session(&session)?;
    let items = state.store.list_wishlist(tenant.id, &session).await?;
    let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let mut products = state.store.get_products(tenant.id, &ids).await?;
    products.retain(|p| p.is_active());
    Ok(ApiResponse::success(products))
}

pub async fn add_to_wishlist(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path(session): Path<String>,
    Json(req): Json<WishlistRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Product>)> {
    check_session(&session)?;
    let product = active_product(&state, &tenant, req.product_id).await?;
    state.store.add_wishlist_item(&WishlistItem {
        tenant_id: tenant.id,
        session_id: session,
        product_id: product.id,
        created_at: Utc::now(),
    })
    .await?;
    Ok((StatusCode::CREATED, ApiResponse::success(product)))
}

pub async fn remove_from_wishlist(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((session, product_id)): Path<(String, Uuid)>,
) -> ApiResult<StatusCode> {
    check_session(&session)?;
    if !state.store.remove_wishlist_item(tenant.id, &session, product_id).await? {
        return Err(ApiError::not_found("wishlist item not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
