use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use super::dto::{
    AuthorizeUrlResponse, DriveFilesQuery, DriveImportRequest, GoogleCallbackQuery, GoogleStatusResponse,
};
use super::extract::RequireTenantAdmin;
use super::response::{ApiError, ApiResponse, ApiResult};
use super::AppState;
use crate::drive::{DriveFileList, ImportReport};
use crate::medusa::SyncReport;

fn status_of(tenant: &crate::domain::Tenant) -> GoogleStatusResponse {
    GoogleStatusResponse {
        connected: tenant.google_connected(),
        folder_id: tenant.google_drive_folder_id.clone(),
    }
}

/// OAuth redirect target. Arrives on the platform host, so the tenant comes from `state`.
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GoogleCallbackQuery>,
) -> ApiResult<ApiResponse<GoogleStatusResponse>> {
    if let Some(error) = query.error {
        return Err(ApiError::bad_request(format!("google authorization failed: {error}")));
    }
    let code = query.code.filter(|c| !c.is_empty()).ok_or_else(|| ApiError::bad_request("missing authorization code"))?;
    let tenant_id: Uuid = query.state.as_deref().unwrap_or_default().parse()
        .map_err(|_| ApiError::bad_request("invalid state parameter"))?;
    let mut tenant = state.store.get_tenant(tenant_id).await?
        .ok_or_else(|| ApiError::not_found("store not found"))?;
    state.drive.exchange_code(&mut tenant, &code).await?;
    Ok(ApiResponse::success(status_of(&tenant)))
}

pub async fn google_status(RequireTenantAdmin(tenant): RequireTenantAdmin) -> ApiResult<ApiResponse<GoogleStatusResponse>> {
    Ok(ApiResponse::success(status_of(&tenant)))
}

pub async fn google_authorize(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
) -> ApiResult<ApiResponse<AuthorizeUrlResponse>> {
    let url = state.drive.authorize_url(tenant.id)?;
    Ok(ApiResponse::success(AuthorizeUrlResponse { url }))
}

pub async fn google_files(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(mut tenant): RequireTenantAdmin,
    Query(query): Query<DriveFilesQuery>,
) -> ApiResult<ApiResponse<DriveFileList>> {
    let files = state.drive
        .list_files(&mut tenant, query.folder_id.as_deref(), query.page_token.as_deref())
        .await?;
    Ok(ApiResponse::success(files))
}

pub async fn google_import(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(mut tenant): RequireTenantAdmin,
    Json(req): Json<DriveImportRequest>,
) -> ApiResult<ApiResponse<ImportReport>> {
    req.validate()?;
    let report = state.drive.import_files(&mut tenant, &req.file_ids, req.product_id).await?;
    Ok(ApiResponse::success(report))
}

pub async fn google_disconnect(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(mut tenant): RequireTenantAdmin,
) -> ApiResult<StatusCode> {
    state.drive.disconnect(&mut tenant).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn medusa_sync(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
) -> ApiResult<ApiResponse<SyncReport>> {
    let report = state.medusa.sync_products(state.store.as_ref(), &state.events, &tenant).await?;
    Ok(ApiResponse::success(report))
}
