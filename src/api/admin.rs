use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::dto::{CreateTenantRequest, GatewayRequest, TenantSettings, TenantWithKeyResponse, UpdateTenantRequest};
use super::extract::RequireMasterAdmin;
use super::response::{created, ApiError, ApiResponse, ApiResult};
use super::AppState;
use crate::domain::events::TenantEvent;
use crate::domain::value_objects::slugify;
use crate::domain::{generate_admin_key, hash_admin_key, DomainEvent, Tenant, TenantGateway};
use crate::error::Result;
use crate::infra::publish_all;
use crate::payments::{validate_credentials, GatewayCode};
use crate::store::{Page, ProductFilter, Store, MAX_PER_PAGE};

fn normalize_domain(raw: Option<String>) -> Option<String> {
    raw.map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase()).filter(|d| !d.is_empty())
}

fn normalize_subdomain(raw: Option<String>) -> Option<String> {
    raw.map(|s| slugify(&s)).filter(|s| !s.is_empty())
}

fn apply_settings(tenant: &mut Tenant, settings: TenantSettings) -> ApiResult<()> {
    if let Some(rate) = settings.vat_rate {
        if rate.is_sign_negative() || rate >= rust_decimal::Decimal::ONE {
            return Err(ApiError::bad_request("vat_rate: must be a fraction between 0 and 1"));
        }
        tenant.vat_rate = rate;
    }
    if let Some(rate) = settings.shipping_flat_rate {
        if rate.is_sign_negative() {
            return Err(ApiError::bad_request("shipping_flat_rate: must not be negative"));
        }
        tenant.shipping_flat_rate = rate;
    }
    if settings.tagline.is_some() { tenant.tagline = settings.tagline; }
    if settings.logo_url.is_some() { tenant.logo_url = settings.logo_url; }
    if settings.primary_color.is_some() { tenant.primary_color = settings.primary_color; }
    if settings.secondary_color.is_some() { tenant.secondary_color = settings.secondary_color; }
    if settings.contact_email.is_some() { tenant.contact_email = settings.contact_email; }
    if settings.contact_phone.is_some() { tenant.contact_phone = settings.contact_phone; }
    if let Some(currency) = settings.currency { tenant.currency = currency.to_ascii_uppercase(); }
    if settings.free_shipping_threshold.is_some() { tenant.free_shipping_threshold = settings.free_shipping_threshold; }
    if let Some(days) = settings.payment_terms_days { tenant.payment_terms_days = days; }
    if settings.google_drive_folder_id.is_some() { tenant.google_drive_folder_id = settings.google_drive_folder_id; }
    Ok(())
}

async fn load_tenant(state: &AppState, id: Uuid) -> ApiResult<Tenant> {
    state.store.get_tenant(id).await?.ok_or_else(|| ApiError::not_found("tenant not found"))
}

/// Recomputes VAT exclusive prices for every product of the tenant. Returns how many were touched.
pub async fn reprice_catalog(store: &dyn Store, tenant: &Tenant) -> Result<usize> {
    let mut filter = ProductFilter { page: Page::new(Some(1), Some(MAX_PER_PAGE)), ..Default::default() };
    let mut repriced = 0;
    loop {
        let (products, total) = store.list_products(tenant.id, &filter).await?;
        if products.is_empty() { break; }
        for mut product in products {
            product.reprice(tenant.vat_rate);
            store.update_product(&product).await?;
            repriced += 1;
        }
        if i64::from(filter.page.page) * i64::from(filter.page.per_page) >= total { break; }
        filter.page.page += 1;
    }
    Ok(repriced)
}

pub async fn list_tenants(
    State(state): State<Arc<AppState>>,
    _admin: RequireMasterAdmin,
) -> ApiResult<ApiResponse<Vec<Tenant>>> {
    Ok(ApiResponse::success(state.store.list_tenants().await?))
}

pub async fn get_tenant(
    State(state): State<Arc<AppState>>,
    _admin: RequireMasterAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Tenant>> {
    Ok(ApiResponse::success(load_tenant(&state, id).await?))
}

/// Provisions a storefront. The raw admin key is returned once and never stored.
pub async fn create_tenant(
    State(state): State<Arc<AppState>>,
    _admin: RequireMasterAdmin,
    Json(req): Json<CreateTenantRequest>,
) -> ApiResult<(StatusCode, ApiResponse<TenantWithKeyResponse>)> {
    req.validate()?;
    let slug = slugify(&req.slug);
    if slug.len() < 2 {
        return Err(ApiError::bad_request("slug: must contain at least 2 letters or digits"));
    }

    let mut tenant = Tenant::new(req.name.trim(), slug.clone());
    tenant.subdomain = normalize_subdomain(req.subdomain).or(Some(slug));
    tenant.domain = normalize_domain(req.domain);
    apply_settings(&mut tenant, req.settings)?;
    let admin_key = generate_admin_key(&tenant.slug);
    tenant.admin_key_hash = Some(hash_admin_key(&admin_key));

    state.store.insert_tenant(&tenant).await?;
    publish_all(
        state.events.as_ref(),
        &tenant.slug,
        vec![DomainEvent::Tenant(TenantEvent::Provisioned { tenant_id: tenant.id, slug: tenant.slug.clone() })],
    )
    .await;
    tracing::info!(tenant = %tenant.id, slug = %tenant.slug, "tenant provisioned");
    Ok(created(TenantWithKeyResponse { tenant, admin_key }))
}

pub async fn update_tenant(
    State(state): State<Arc<AppState>>,
    _admin: RequireMasterAdmin,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTenantRequest>,
) -> ApiResult<ApiResponse<Tenant>> {
    req.validate()?;
    let mut tenant = load_tenant(&state, id).await?;
    let previous_vat = tenant.vat_rate;

    if let Some(name) = req.name { tenant.name = name.trim().to_string(); }
    if req.subdomain.is_some() { tenant.subdomain = normalize_subdomain(req.subdomain); }
    if req.domain.is_some() { tenant.domain = normalize_domain(req.domain); }
    if let Some(active) = req.is_active { tenant.is_active = active; }
    apply_settings(&mut tenant, req.settings)?;
    tenant.touch();
    state.store.update_tenant(&tenant).await?;

    if tenant.vat_rate != previous_vat {
        let repriced = reprice_catalog(state.store.as_ref(), &tenant).await?;
        tracing::info!(tenant = %tenant.id, vat_rate = %tenant.vat_rate, repriced, "catalog repriced");
    }
    Ok(ApiResponse::success(tenant))
}

pub async fn deactivate_tenant(
    State(state): State<Arc<AppState>>,
    _admin: RequireMasterAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut tenant = load_tenant(&state, id).await?;
    if tenant.is_active {
        tenant.is_active = false;
        tenant.touch();
        state.store.update_tenant(&tenant).await?;
        publish_all(
            state.events.as_ref(),
            &tenant.slug,
            vec![DomainEvent::Tenant(TenantEvent::Deactivated { tenant_id: tenant.id })],
        )
        .await;
        tracing::info!(tenant = %tenant.id, "tenant deactivated");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rotate_admin_key(
    State(state): State<Arc<AppState>>,
    _admin: RequireMasterAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<TenantWithKeyResponse>> {
    let mut tenant = load_tenant(&state, id).await?;
    let admin_key = generate_admin_key(&tenant.slug);
    tenant.admin_key_hash = Some(hash_admin_key(&admin_key));
    tenant.touch();
    state.store.update_tenant(&tenant).await?;
    tracing::info!(tenant = %tenant.id, "admin key rotated");
    Ok(ApiResponse::success(TenantWithKeyResponse { tenant, admin_key }))
}

pub async fn list_gateways(
    State(state): State<Arc<AppState>>,
    _admin: RequireMasterAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Vec<TenantGateway>>> {
    let tenant = load_tenant(&state, id).await?;
    Ok(ApiResponse::success(state.store.list_gateways(tenant.id).await?))
}

pub async fn upsert_gateway(
    State(state): State<Arc<AppState>>,
    _admin: RequireMasterAdmin,
    Path((id, code)): Path<(Uuid, String)>,
    Json(req): Json<GatewayRequest>,
) -> ApiResult<ApiResponse<TenantGateway>> {
    let code: GatewayCode = code.parse()?;
    validate_credentials(code, &req.credentials)?;
    let tenant = load_tenant(&state, id).await?;

    let now = Utc::now();
    let created_at = state.store.get_gateway(tenant.id, code.as_str()).await?
        .map(|g| g.created_at)
        .unwrap_or(now);
    let gateway = TenantGateway {
        tenant_id: tenant.id,
        gateway_code: code.as_str().to_string(),
        is_active: req.is_active,
        is_test_mode: req.is_test_mode,
        credentials: req.credentials,
        created_at,
        updated_at: now,
    };
    state.store.upsert_gateway(&gateway).await?;
    tracing::info!(tenant = %tenant.id, gateway = %code, active = gateway.is_active, test_mode = gateway.is_test_mode, "gateway configured");
    Ok(ApiResponse::success(gateway))
}

pub async fn delete_gateway(
    State(state): State<Arc<AppState>>,
    _admin: RequireMasterAdmin,
    Path((id, code)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    let code: GatewayCode = code.parse()?;
    if !state.store.delete_gateway(id, code.as_str()).await? {
        return Err(ApiError::not_found("gateway not configured"));
    }
    Ok(StatusCode::NO_CONTENT)
}
