//! Error types for the RBAC core

use crate::permissions::{Action, Resource};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// RBAC errors
///
/// The first six variants are the authentication and authorization
/// outcomes callers map to transport-level rejections. None of them is
/// retried by this crate.
#[derive(Debug, Error)]
pub enum RbacError {
    /// Malformed, expired, or unverifiable bearer credential
    #[error("Invalid or expired token")]
    InvalidCredential,

    /// The credential names an account that does not exist
    #[error("User not found")]
    PrincipalNotFound,

    /// The account exists but is deactivated
    #[error("User account is inactive")]
    AccountInactive,

    /// Authorization attempted without a resolved principal
    #[error("User not authenticated")]
    Unauthenticated,

    /// The principal's role has no entry for the resource
    #[error("No permissions for {resource}")]
    NoResourcePermissions { resource: String },

    /// The principal's role forbids the action on the resource
    #[error("No permission to {action} {resource}")]
    ActionNotPermitted { resource: String, action: String },

    /// Too many failed logins
    #[error("Account is locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidLogin,

    /// Invalid input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Uniqueness violation (duplicate email or role name)
    #[error("{0} already exists")]
    Conflict(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend error
    #[error("Store error: {0}")]
    Store(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RbacError {
    pub(crate) fn no_resource(resource: impl ToString) -> Self {
        Self::NoResourcePermissions {
            resource: resource.to_string(),
        }
    }

    pub(crate) fn not_permitted(resource: Resource, action: Action) -> Self {
        Self::ActionNotPermitted {
            resource: resource.to_string(),
            action: action.to_string(),
        }
    }

    /// Whether this is a gate denial for a known, resolved principal
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::NoResourcePermissions { .. } | Self::ActionNotPermitted { .. }
        )
    }

    /// Whether the caller must (re-)authenticate
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredential
                | Self::PrincipalNotFound
                | Self::Unauthenticated
                | Self::InvalidLogin
        )
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for RbacError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RbacError::Conflict(conflict_subject(db.constraint()).to_string())
            }
            _ => RbacError::Store(err.to_string()),
        }
    }
}

/// Client-facing name for a violated uniqueness constraint
#[cfg(feature = "postgres")]
fn conflict_subject(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(name) if name.starts_with("accounts_") => "User",
        Some(name) if name.starts_with("roles_") => "Role",
        _ => "Record",
    }
}

/// Field validation failures, one message per failed rule
impl From<validator::ValidationErrors> for RbacError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, failures)| {
                failures.iter().map(move |failure| match &failure.message {
                    Some(message) => message.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        RbacError::Validation(messages.join(", "))
    }
}

/// Result type for RBAC operations
pub type Result<T> = std::result::Result<T, RbacError>;
