//! Registration, login and self-service profile endpoints

use crate::{
    error::ApiResult,
    models::{ApiResponse, LoginRequest, ProfileResponse},
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use crm_rbac::{NewAccount, PasswordChange, Principal, ProfileUpdate, Session};
use validator::Validate;

/// Register a new account
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:5000/api/auth/register \
///   -H "Content-Type: application/json" \
///   -d '{"email": "jane@example.com", "password": "secret1", "first_name": "Jane", "last_name": "Doe"}'
/// ```
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<NewAccount>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Session>>)> {
    let Json(input) = payload?;
    let session = state.auth.register(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("User registered successfully", session)),
    ))
}

/// Log in with email and password
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Session>>> {
    let Json(req) = payload?;
    req.validate()?;
    let session = state.auth.login(&req.email, &req.password).await?;

    Ok(Json(ApiResponse::with_message("Login successful", session)))
}

/// The caller's own account
pub async fn get_profile(Extension(principal): Extension<Principal>) -> Json<ApiResponse<ProfileResponse>> {
    Json(ApiResponse::new(ProfileResponse {
        role: principal.role_name(),
        account: principal.account.public_view(),
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<ProfileResponse>>> {
    let Json(update) = payload?;
    let account = state.auth.update_profile(principal.account.id, update).await?;

    Ok(Json(ApiResponse::with_message(
        "Profile updated successfully",
        ProfileResponse {
            role: principal.role_name(),
            account,
        },
    )))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<PasswordChange>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let Json(change) = payload?;
    state.auth.change_password(principal.account.id, change).await?;

    Ok(Json(ApiResponse::with_message("Password changed successfully", ())))
}
