use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::dto::{GenerateInvoiceRequest, ListInvoicesQuery, RefreshOverdueResponse};
use super::extract::RequireTenantAdmin;
use super::response::{created, ApiError, ApiResponse, ApiResult};
use super::AppState;
use crate::domain::{format_invoice_number, Invoice, InvoiceSource, InvoiceStatus, Tenant};
use crate::error::{CommerceError, Result};
use crate::infra::publish_all;
use crate::store::Store;

pub async fn list_invoices(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Query(query): Query<ListInvoicesQuery>,
) -> ApiResult<ApiResponse<Vec<Invoice>>> {
    Ok(ApiResponse::success(state.store.list_invoices(tenant.id, query.status).await?))
}

pub async fn get_invoice(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Invoice>> {
    let invoice = state.store.get_invoice(tenant.id, id).await?
        .ok_or_else(|| ApiError::not_found("invoice not found"))?;
    Ok(ApiResponse::success(invoice))
}

/// Builds an invoice for an order or a booking. Each source is invoiced at most once.
pub async fn build_invoice(store: &dyn Store, tenant: &Tenant, source: InvoiceSource, source_id: Uuid, today: NaiveDate) -> Result<Invoice> {
    if store.find_invoice_by_source(tenant.id, source, source_id).await?.is_some() {
        return Err(CommerceError::Conflict("an invoice already exists for this source".into()));
    }
    let invoice = match source {
        InvoiceSource::Order => {
            let order = store.get_order(tenant.id, source_id).await?.ok_or(CommerceError::NotFound("order"))?;
            let number = format_invoice_number(today, store.next_invoice_sequence(tenant.id, today).await?);
            Invoice::from_order(tenant, &order, number, today)
        }
        InvoiceSource::Booking => {
            let booking = store.get_booking(tenant.id, source_id).await?.ok_or(CommerceError::NotFound("booking"))?;
            let location = store.get_location(tenant.id, booking.location_id).await?.ok_or(CommerceError::NotFound("location"))?;
            let number = format_invoice_number(today, store.next_invoice_sequence(tenant.id, today).await?);
            Invoice::from_booking(tenant, &booking, &location, number, today)
        }
    };
    store.insert_invoice(&invoice).await?;
    Ok(invoice)
}

pub async fn generate_invoice(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Json(req): Json<GenerateInvoiceRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Invoice>)> {
    let mut invoice = build_invoice(state.store.as_ref(), &tenant, req.source, req.source_id, Utc::now().date_naive()).await?;
    publish_all(state.events.as_ref(), &tenant.slug, invoice.take_events()).await;
    tracing::info!(tenant = %tenant.id, invoice = %invoice.invoice_number, source_id = %req.source_id, "invoice issued");
    Ok(created(invoice))
}

fn action_status(action: &str) -> Option<InvoiceStatus> {
    match action {
        "send" => Some(InvoiceStatus::Sent),
        "pay" => Some(InvoiceStatus::Paid),
        "cancel" => Some(InvoiceStatus::Cancelled),
        _ => None,
    }
}

pub async fn invoice_action(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Path((id, action)): Path<(Uuid, String)>,
) -> ApiResult<ApiResponse<Invoice>> {
    let next = action_status(&action).ok_or_else(|| ApiError::bad_request(format!("unknown invoice action: {action}")))?;
    let mut invoice = state.store.get_invoice(tenant.id, id).await?
        .ok_or_else(|| ApiError::not_found("invoice not found"))?;
    invoice.transition(next).map_err(CommerceError::from)?;
    state.store.update_invoice(&invoice).await?;
    publish_all(state.events.as_ref(), &tenant.slug, invoice.take_events()).await;
    Ok(ApiResponse::success(invoice))
}

/// Marks every sent invoice past its due date as overdue. Returns how many changed.
pub async fn refresh_overdue_invoices(store: &dyn Store, tenant_id: Uuid, today: NaiveDate) -> Result<usize> {
    let mut updated = 0;
    for mut invoice in store.list_invoices(tenant_id, Some(InvoiceStatus::Sent)).await? {
        if invoice.mark_overdue_if_due(today) {
            store.update_invoice(&invoice).await?;
            updated += 1;
        }
    }
    Ok(updated)
}

pub async fn refresh_overdue(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
) -> ApiResult<ApiResponse<RefreshOverdueResponse>> {
    let updated = refresh_overdue_invoices(state.store.as_ref(), tenant.id, Utc::now().date_naive()).await?;
    if updated > 0 {
        tracing::info!(tenant = %tenant.id, updated, "invoices marked overdue");
    }
    Ok(ApiResponse::success(RefreshOverdueResponse { updated }))
}
