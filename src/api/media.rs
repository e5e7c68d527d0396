use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use super::dto::{DeleteMediaRequest, MediaUploadResponse};
use super::extract::RequireTenantAdmin;
use super::response::{created, ApiError, ApiResponse, ApiResult};
use super::{AppState, MAX_UPLOAD_BYTES};
use crate::domain::Product;
use crate::error::CommerceError;
use crate::infra::storage::product_object_path;

const ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif", "image/avif"];

struct Upload {
    file_name: String,
    content_type: String,
    data: Bytes,
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("invalid multipart body: {e}"))
}

/// Accepts a `file` part and an optional `product_id` part. The stored image is
/// appended to the product when one is given.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, ApiResponse<MediaUploadResponse>)> {
    let mut file = None;
    let mut product_id = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or_default().to_ascii_lowercase();
                let data = field.bytes().await.map_err(bad_multipart)?;
                file = Some(Upload { file_name, content_type, data });
            }
            Some("product_id") => {
                let raw = field.text().await.map_err(bad_multipart)?;
                let id: Uuid = raw.trim().parse().map_err(|_| ApiError::bad_request("product_id: must be a UUID"))?;
                product_id = Some(id);
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::bad_request("file: a file part is required"))?;
    if !ALLOWED_TYPES.contains(&file.content_type.as_str()) {
        return Err(ApiError::bad_request(format!("file: unsupported content type {}", file.content_type)));
    }
    if file.data.is_empty() || file.data.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::bad_request("file: must be between 1 byte and 10 MiB"));
    }

    let mut product: Option<Product> = match product_id {
        Some(id) => Some(state.store.get_product(tenant.id, id).await?
            .ok_or_else(|| ApiError::not_found("product not found"))?),
        None => None,
    };
    if let Some(p) = &product {
        if p.images.len() >= crate::domain::MAX_PRODUCT_IMAGES {
            return Err(CommerceError::Conflict(format!("{} already has the maximum number of images", p.name)).into());
        }
    }

    let path = product_object_path(&tenant.slug, &file.file_name, Utc::now());
    let url = state.storage.upload(&path, file.data, &file.content_type).await.map_err(CommerceError::from)?;
    if let Some(p) = product.as_mut() {
        p.append_images(vec![url.clone()]);
        state.store.update_product(p).await?;
    }
    tracing::info!(tenant = %tenant.id, path = %path, product_id = ?product_id, "media uploaded");
    Ok(created(MediaUploadResponse { path, url, product_id }))
}

/// Removes an object from storage. Only paths under the tenant's own prefix are accepted.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    RequireTenantAdmin(tenant): RequireTenantAdmin,
    Json(req): Json<DeleteMediaRequest>,
) -> ApiResult<StatusCode> {
    let prefix = format!("{}/", tenant.slug);
    if !req.path.starts_with(&prefix) || req.path.contains("..") {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "path is outside this store's media"));
    }
    state.storage.delete(&[req.path.clone()]).await.map_err(CommerceError::from)?;
    tracing::info!(tenant = %tenant.id, path = %req.path, "media deleted");
    Ok(StatusCode::NO_CONTENT)
}
