use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, State};
use axum::http::HeaderMap;

use super::response::{ApiResponse, ApiResult};
use super::AppState;
use crate::payments::{GatewayCode, WebhookReceipt, WebhookRequest};

fn webhook_request(uri: &OriginalUri, headers: HeaderMap, body: Bytes) -> WebhookRequest {
    WebhookRequest { path: uri.0.path().to_string(), headers, body }
}

/// Gateway-agnostic callback. The gateway is recognised from headers and payload shape.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    uri: OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ApiResponse<WebhookReceipt>> {
    let receipt = state.payments.handle_webhook(None, &webhook_request(&uri, headers, body)).await?;
    Ok(ApiResponse::success(receipt))
}

pub async fn gateway_webhook(
    State(state): State<Arc<AppState>>,
    Path(gateway): Path<String>,
    uri: OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ApiResponse<WebhookReceipt>> {
    let code: GatewayCode = gateway.parse()?;
    let receipt = state.payments.handle_webhook(Some(code), &webhook_request(&uri, headers, body)).await?;
    Ok(ApiResponse::success(receipt))
}
