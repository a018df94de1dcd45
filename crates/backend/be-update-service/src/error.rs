use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateServiceError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Bundle not found: {0}")]
    BundleNotFound(String),

    #[error("Bundle too large: {0}")]
    PayloadTooLarge(String),

    #[error("Bundle storage failed: {0}")]
    Storage(String),
}

impl UpdateServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn bundle_not_found(id: impl Into<String>) -> Self {
        Self::BundleNotFound(id.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BundleNotFound(_))
    }

    /// Storage failures are transient infrastructure errors; callers may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            UpdateServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            UpdateServiceError::BundleNotFound(_) => StatusCode::NOT_FOUND,
            UpdateServiceError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            UpdateServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<be_storage::StorageError> for UpdateServiceError {
    fn from(err: be_storage::StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<be_remote_db::DbError> for UpdateServiceError {
    fn from(err: be_remote_db::DbError) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type UpdateServiceResult<T> = std::result::Result<T, UpdateServiceError>;

impl IntoResponse for UpdateServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_code, message, details) = match &self {
            UpdateServiceError::Validation(msg) => {
                warn!("Rejected invalid request: {}", msg);
                ("invalid_request", "Invalid request", Some(msg.clone()))
            }
            UpdateServiceError::BundleNotFound(id) => {
                warn!("Bundle not found: {}", id);
                ("bundle_not_found", "Bundle not found", None)
            }
            UpdateServiceError::PayloadTooLarge(msg) => {
                warn!("Rejected oversized upload: {}", msg);
                ("bundle_too_large", "Bundle too large", Some(msg.clone()))
            }
            UpdateServiceError::Storage(e) => {
                error!("Bundle storage failed: {}", e);
                ("storage_error", "Bundle storage unavailable", None)
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: message.to_owned(),
                code: error_code.to_owned(),
                details,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            UpdateServiceError::validation("missing label").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UpdateServiceError::bundle_not_found("abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            UpdateServiceError::PayloadTooLarge("200 MiB".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            UpdateServiceError::storage("disk full").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_only_storage_errors_are_retryable() {
        assert!(UpdateServiceError::storage("timeout").is_retryable());
        assert!(!UpdateServiceError::validation("bad").is_retryable());
        assert!(!UpdateServiceError::bundle_not_found("x").is_retryable());
    }

    #[test]
    fn test_from_storage_error() {
        let err: UpdateServiceError = be_storage::StorageError::BlobNotFound("bundles/x".into()).into();
        assert!(err.is_retryable());
    }
}
