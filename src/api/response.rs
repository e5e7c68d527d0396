use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::drive::DriveError;
use crate::error::CommerceError;
use crate::infra::StorageError;
use crate::payments::PaymentError;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self { Self { data } }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response { Json(self).into_response() }
}

/// `201 Created` with the standard wrapper.
pub fn created<T: Serialize>(data: T) -> (StatusCode, ApiResponse<T>) {
    (StatusCode::CREATED, ApiResponse::success(data))
}

/// Paginated response for list endpoints
#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: u32) -> Self { Self { data, total, page } }
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response { Json(self).into_response() }
}

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self { Self::new(StatusCode::BAD_REQUEST, message) }

    pub fn not_found(message: impl Into<String>) -> Self { Self::new(StatusCode::NOT_FOUND, message) }

    pub fn internal(message: impl Into<String>) -> Self { Self::new(StatusCode::INTERNAL_SERVER_ERROR, message) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "data": null, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

fn payment_status(err: &PaymentError) -> StatusCode {
    match err {
        PaymentError::UnknownGateway(_)
        | PaymentError::NotConfigured(_)
        | PaymentError::InvalidCredentials(..)
        | PaymentError::UnrecognisedWebhook
        | PaymentError::MalformedWebhook(..) => StatusCode::BAD_REQUEST,
        PaymentError::InvalidSignature => StatusCode::UNAUTHORIZED,
        PaymentError::Http(_) | PaymentError::Rejected(..) => StatusCode::BAD_GATEWAY,
    }
}

fn drive_status(err: &DriveError) -> StatusCode {
    match err {
        DriveError::NotConnected | DriveError::NotAnImage(_) => StatusCode::BAD_REQUEST,
        DriveError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        DriveError::Http(_) | DriveError::Api { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl From<CommerceError> for ApiError {
    fn from(err: CommerceError) -> Self {
        let status = match &err {
            CommerceError::NotFound(_) => StatusCode::NOT_FOUND,
            CommerceError::Validation(_) => StatusCode::BAD_REQUEST,
            CommerceError::Conflict(_) | CommerceError::InvalidTransition(_) | CommerceError::InsufficientStock(_) => {
                StatusCode::CONFLICT
            }
            CommerceError::Unauthorized => StatusCode::UNAUTHORIZED,
            CommerceError::Forbidden => StatusCode::FORBIDDEN,
            CommerceError::Payment(e) => payment_status(e),
            CommerceError::Drive(e) => drive_status(e),
            CommerceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            CommerceError::Storage(StorageError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            CommerceError::Storage(_) => StatusCode::BAD_GATEWAY,
            CommerceError::Database(_) | CommerceError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        let message = match &err {
            CommerceError::Database(_) => "internal server error".to_string(),
            CommerceError::Config(_) => "service is misconfigured".to_string(),
            other => other.to_string(),
        };
        Self { status, message }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self { CommerceError::from(err).into() }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self { CommerceError::from(err).into() }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
