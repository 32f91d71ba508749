use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use vm_catalog::messages::{self, Reason};
use vm_catalog::{reason, CatalogError};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(Reason),
    #[error("{0}")]
    BadRequest(Reason),
    #[error("{0}")]
    Internal(Reason),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason) = match self {
            ApiError::NotFound(reason) => (StatusCode::NOT_FOUND, reason),
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason),
            ApiError::Internal(reason) => (StatusCode::INTERNAL_SERVER_ERROR, reason),
        };

        (
            status,
            Json(json!({ "code": reason.code, "reason": reason.to_string() })),
        )
            .into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(reason) => ApiError::NotFound(reason),
            CatalogError::InvalidParameter(reason) | CatalogError::InvalidOperation(reason) => {
                ApiError::BadRequest(reason)
            }
            other => {
                tracing::error!(error = %other, "Catalog operation failed");
                ApiError::Internal(reason!(messages::INTERNAL_ERROR, detail = other))
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(reason!(
            messages::INVALID_REQUEST_BODY,
            detail = rejection.body_text()
        ))
    }
}
