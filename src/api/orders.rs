use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use super::dto::{ListOrdersQuery, OrderStatusResponse, PaginationParams, StatusRequest};
use super::extract::{CurrentTenant, RequireTenantAdmin};
use super::response::{ApiError, ApiResponse, ApiResult, Paginated};
use super::AppState;
use crate::domain::{Customer, Order, OrderStatus};
use crate::infra::publish_all;
use crate::store::Page;

/// Public lookup for the payment return page: status fields only.
pub async fn order_status(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<OrderStatusResponse>> {
    let order = state.store.get_order(tenant.id, id).await?
        .ok_or_else(|| ApiError::not_found("order not found"))?;
    Ok(ApiResponse::success(OrderStatusResponse::from(&order)))
}

pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Query(query): Query<ListOrdersQuery>,
) -> ApiResult<Paginated<Order>> {
    let page = Page::new(query.page, query.per_page);
    let (orders, total) = state.store.list_orders(tenant.id, query.status, page).await?;
    Ok(Paginated::new(orders, total, page.page))
}

pub async fn get_order(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Order>> {
    let order = state.store.get_order(tenant.id, id).await?
        .ok_or_else(|| ApiError::not_found("order not found"))?;
    Ok(ApiResponse::success(order))
}

pub async fn transition_order(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest<OrderStatus>>,
) -> ApiResult<ApiResponse<Order>> {
    let mut order = state.store.get_order(tenant.id, id).await?
        .ok_or_else(|| ApiError::not_found("order not found"))?;
    let from = order.status;
    order.transition(req.status).map_err(crate::error::CommerceError::from)?;
    state.store.update_order(&order).await?;
    publish_all(state.events.as_ref(), &tenant.slug, order.take_events()).await;
    tracing::info!(tenant = %tenant.id, order_id = %order.id, from = %from, to = %order.status, "order status changed");
    Ok(ApiResponse::success(order))
}

pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Paginated<Customer>> {
    let page = params.page();
    let (customers, total) = state.store.list_customers(tenant.id, page).await?;
    Ok(Paginated::new(customers, total, page.page))
}
