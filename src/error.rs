use thiserror::Error;

use crate::domain::TransitionError;
use crate::drive::DriveError;
use crate::infra::storage::StorageError;
use crate::payments::PaymentError;

#[derive(Error, Debug)]
pub enum CommerceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("insufficient stock for {0}")]
    InsufficientStock(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Drive(#[from] DriveError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<validator::ValidationErrors> for CommerceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reason = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| {
                        errs.first()
                            .map(|e| e.code.to_string())
                            .unwrap_or_else(|| "invalid".to_string())
                    });
                format!("{field}: {reason}")
            })
            .collect();
        fields.sort();
        CommerceError::Validation(fields.join(", "))
    }
}

pub type Result<T> = std::result::Result<T, CommerceError>;
