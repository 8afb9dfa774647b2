//! Privileged account management

use crate::{
    error::{ApiError, ApiResult},
    models::{ApiResponse, AssignRoleRequest, AssignRoleResponse},
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

fn parse_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest(format!("Invalid user id '{}'", id)))
}

/// Assign a role by name (guarded by `users:update`)
pub async fn assign_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AssignRoleRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<AssignRoleResponse>>> {
    let id = parse_id(&id)?;
    let Json(req) = payload?;
    req.validate()?;
    let (account, role) = state.auth.assign_role(id, &req.role).await?;

    Ok(Json(ApiResponse::with_message(
        "Role assigned successfully",
        AssignRoleResponse {
            account,
            role: role.name,
        },
    )))
}

/// Delete an account (guarded by `users:delete`)
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.auth.delete_account(parse_id(&id)?).await?;
    Ok(Json(ApiResponse::with_message("User deleted successfully", ())))
}
