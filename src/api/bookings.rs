use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use super::dto::{AvailabilityQuery, ListBookingsQuery, StatusRequest};
use super::extract::{CurrentTenant, RequireTenantAdmin};
use super::response::{created, ApiError, ApiResponse, ApiResult};
use super::AppState;
use crate::domain::{slot_availability, BookingDraft, BookingFee, BookingStatus, DemoBooking, Location, LocationDraft, SlotAvailability};
use crate::error::CommerceError;
use crate::infra::publish_all;

pub async fn list_locations(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
) -> ApiResult<ApiResponse<Vec<Location>>> {
    Ok(ApiResponse::success(state.store.list_locations(tenant.id, true).await?))
}

pub async fn admin_list_locations(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
) -> ApiResult<ApiResponse<Vec<Location>>> {
    Ok(ApiResponse::success(state.store.list_locations(tenant.id, false).await?))
}

pub async fn create_location(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Json(draft): Json<LocationDraft>,
) -> ApiResult<(StatusCode, ApiResponse<Location>)> {
    let location = Location::create(tenant.id, draft)?;
    state.store.insert_location(&location).await?;
    Ok(created(location))
}

pub async fn availability(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<ApiResponse<Vec<SlotAvailability>>> {
    let location = state.store.get_location(tenant.id, query.location_id).await?
        .filter(|l| l.is_active)
        .ok_or_else(|| ApiError::not_found("location not found"))?;
    let bookings = state.store.bookings_for_day(tenant.id, location.id, query.date).await?;
    Ok(ApiResponse::success(slot_availability(&location, &bookings, query.date, Utc::now().date_naive())))
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Json(draft): Json<BookingDraft>,
) -> ApiResult<(StatusCode, ApiResponse<DemoBooking>)> {
    let location = state.store.get_location(tenant.id, draft.location_id).await?
        .ok_or_else(|| ApiError::not_found("location not found"))?;
    let existing = state.store.bookings_for_day(tenant.id, location.id, draft.booking_date).await?;
    let mut booking = DemoBooking::create(tenant.id, &location, &existing, draft, Utc::now().date_naive())?;
    state.store.insert_booking(&booking).await?;
    publish_all(state.events.as_ref(), &tenant.slug, booking.take_events()).await;
    tracing::info!(tenant = %tenant.id, booking_id = %booking.id, date = %booking.booking_date, slot = %booking.time_slot, "demo booked");
    Ok(created(booking))
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Query(query): Query<ListBookingsQuery>,
) -> ApiResult<ApiResponse<Vec<DemoBooking>>> {
    Ok(ApiResponse::success(state.store.list_bookings(tenant.id, query.date).await?))
}

pub async fn transition_booking(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest<BookingStatus>>,
) -> ApiResult<ApiResponse<DemoBooking>> {
    let mut booking = state.store.get_booking(tenant.id, id).await?
        .ok_or_else(|| ApiError::not_found("booking not found"))?;
    booking.transition(req.status).map_err(CommerceError::from)?;
    state.store.update_booking(&booking).await?;
    publish_all(state.events.as_ref(), &tenant.slug, booking.take_events()).await;
    Ok(ApiResponse::success(booking))
}

pub async fn set_booking_fee(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Path(id): Path<Uuid>,
    Json(req): Json<BookingFee>,
) -> ApiResult<ApiResponse<DemoBooking>> {
    let mut booking = state.store.get_booking(tenant.id, id).await?
        .ok_or_else(|| ApiError::not_found("booking not found"))?;
    booking.set_fee(req)?;
    state.store.update_booking(&booking).await?;
    tracing::info!(tenant = %tenant.id, booking_id = %booking.id, fee = ?booking.fee, "booking fee set");
    Ok(ApiResponse::success(booking))
}
