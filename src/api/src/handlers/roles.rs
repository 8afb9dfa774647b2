//! Role catalog endpoints

use crate::{
    error::ApiResult,
    models::{ApiResponse, RolesResponse},
    state::AppState,
};
use axum::{extract::State, Extension, Json};
use crm_rbac::{reseed_roles, Principal};
use tracing::warn;

/// List all roles (guarded by `users:read`)
pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<RolesResponse>>> {
    let roles = state.roles.list_roles().await?;

    Ok(Json(ApiResponse::new(RolesResponse {
        total: roles.len(),
        roles,
    })))
}

/// Destructive reseed of the canonical roles (guarded by `settings:manage`)
pub async fn reseed(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<ApiResponse<RolesResponse>>> {
    warn!("Role reseed requested by {}", principal.account.email);
    let roles = reseed_roles(state.roles.as_ref()).await?;

    Ok(Json(ApiResponse::with_message(
        "Roles reseeded successfully",
        RolesResponse {
            total: roles.len(),
            roles,
        },
    )))
}
