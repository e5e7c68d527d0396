//! Request extractors for tenant scoping and admin authentication.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;

use super::response::ApiError;
use super::AppState;
use crate::domain::aggregates::tenant::constant_time_eq;
use crate::domain::Tenant;
use crate::tenancy::lookup_tenant;

/// The storefront this request addresses. Unknown tenants are rejected with 404.
pub struct CurrentTenant(pub Tenant);

/// Like [`CurrentTenant`] but lets the handler decide what an unknown tenant means.
pub struct ResolvedTenant(pub Option<Tenant>);

/// Bearer master token from configuration.
pub struct RequireMasterAdmin;

/// Tenant admin key (or the master token) for the resolved tenant.
pub struct RequireTenantAdmin(pub Tenant);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim()).filter(|t| !t.is_empty())
}

fn is_master(state: &AppState, token: &str) -> bool {
    let expected = state.config.master_admin_token.as_bytes();
    !expected.is_empty() && constant_time_eq(expected, token.as_bytes())
}

async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<Tenant>, ApiError> {
    Ok(lookup_tenant(state.store.as_ref(), &parts.headers, state.config.default_tenant_slug.as_deref()).await?)
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for ResolvedTenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        Ok(ResolvedTenant(resolve(parts, state).await?))
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentTenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        resolve(parts, state).await?
            .map(CurrentTenant)
            .ok_or_else(|| ApiError::not_found("store not found"))
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for RequireMasterAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "authentication required"))?;
        if !is_master(state, token) {
            return Err(ApiError::new(StatusCode::UNAUTHORIZED, "invalid admin token"));
        }
        Ok(RequireMasterAdmin)
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for RequireTenantAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "authentication required"))?
            .to_string();
        let CurrentTenant(tenant) = CurrentTenant::from_request_parts(parts, state).await?;
        if is_master(state, &token) || tenant.verify_admin_key(&token) {
            return Ok(RequireTenantAdmin(tenant));
        }
        tracing::warn!(tenant = %tenant.id, "rejected tenant admin request with a bad key");
        Err(ApiError::new(StatusCode::FORBIDDEN, "invalid admin key for this store"))
    }
}
