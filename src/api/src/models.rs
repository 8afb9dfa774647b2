//! API request and response models

use crm_rbac::{Grant, PublicAccount, Role, RoleName};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Success envelope: `{"success": true, "message"?, "data"}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Authenticated account with its role name
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub account: PublicAccount,
    pub role: Option<RoleName>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignRoleRequest {
    #[validate(length(min = 1, max = 50, message = "Role name must be between 1 and 50 characters"))]
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct AssignRoleResponse {
    pub account: PublicAccount,
    pub role: RoleName,
}

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub roles: Vec<Role>,
    pub total: usize,
}

/// Ad-hoc decision for the caller's principal
///
/// Either `resource` + `action` by name, or `method` + `path` of a
/// listed business route.
#[derive(Debug, Default, Deserialize)]
pub struct CheckRequest {
    pub resource: Option<String>,
    pub action: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub resource: String,
    pub action: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant: Option<Grant>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
