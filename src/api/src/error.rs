//! API error handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crm_rbac::RbacError;
use serde_json::json;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Rbac(#[from] RbacError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited: {0}")]
    TooManyRequests(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Rbac(err) => match err {
                RbacError::InvalidCredential
                | RbacError::PrincipalNotFound
                | RbacError::Unauthenticated
                | RbacError::InvalidLogin => StatusCode::UNAUTHORIZED,
                RbacError::AccountInactive
                | RbacError::NoResourcePermissions { .. }
                | RbacError::ActionNotPermitted { .. } => StatusCode::FORBIDDEN,
                RbacError::AccountLocked { .. } => StatusCode::LOCKED,
                RbacError::Validation(_) | RbacError::Conflict(_) => StatusCode::BAD_REQUEST,
                RbacError::NotFound(_) => StatusCode::NOT_FOUND,
                RbacError::Store(_) | RbacError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Rbac(errors.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Rbac(RbacError::Validation(msg)) => msg,
            ApiError::Rbac(err @ (RbacError::Store(_) | RbacError::Internal(_))) => {
                error!("Request failed: {}", err);
                "Server error".to_string()
            }
            ApiError::Rbac(err) => err.to_string(),
            ApiError::BadRequest(msg) | ApiError::TooManyRequests(msg) => msg,
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}
