//! Ad-hoc authorization check for the caller

use crate::{
    error::{ApiError, ApiResult},
    models::{ApiResponse, CheckRequest, CheckResponse},
    permissions,
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::Method,
    Extension, Json,
};
use crm_rbac::Principal;

/// Decide a (resource, action) pair, or a listed route, for the caller
///
/// Denials are a normal answer here (`allowed: false`), not an error.
pub async fn check(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<CheckResponse>>> {
    let Json(req) = payload?;
    let (resource, action) = target(req)?;

    let response = match state.gate.check_named(Some(&principal), &resource, &action) {
        Ok(grant) => {
            state.metrics.record_allowed();
            CheckResponse {
                allowed: true,
                resource,
                action,
                grant: Some(grant),
                reason: None,
            }
        }
        Err(err) if err.is_denial() => {
            state.metrics.record_denied();
            CheckResponse {
                allowed: false,
                resource,
                action,
                grant: None,
                reason: Some(err.to_string()),
            }
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Json(ApiResponse::new(response)))
}

fn target(req: CheckRequest) -> ApiResult<(String, String)> {
    match req {
        CheckRequest {
            resource: Some(resource),
            action: Some(action),
            ..
        } => Ok((resource, action)),
        CheckRequest {
            method: Some(method),
            path: Some(path),
            ..
        } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|_| ApiError::BadRequest(format!("Invalid method '{}'", method)))?;
            let guard = permissions::lookup(&method, &path)
                .ok_or_else(|| ApiError::BadRequest(format!("No guard listed for {} {}", method, path)))?;
            Ok((guard.resource.to_string(), guard.action.to_string()))
        }
        _ => Err(ApiError::BadRequest(
            "Provide resource and action, or method and path".to_string(),
        )),
    }
}
