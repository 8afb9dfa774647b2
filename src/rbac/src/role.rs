//! Role definitions

use crate::permissions::PermissionMatrix;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique role identifier
pub type RoleId = Uuid;

/// Namespace for deterministic role ids
const ROLE_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_2a4e_9b3d_4f60_8e21_5a7c_0d94_b3e1);

/// Closed set of role names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoleName {
    #[serde(rename = "Admin")]
    Admin,
    #[serde(rename = "Manager")]
    Manager,
    #[serde(rename = "Sales Rep")]
    SalesRep,
    #[serde(rename = "Support Agent")]
    SupportAgent,
    #[serde(rename = "Viewer")]
    Viewer,
}

impl RoleName {
    /// Canonical order
    pub const ALL: [RoleName; 5] = [
        RoleName::Admin,
        RoleName::Manager,
        RoleName::SalesRep,
        RoleName::SupportAgent,
        RoleName::Viewer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RoleName::Admin => "Admin",
            RoleName::Manager => "Manager",
            RoleName::SalesRep => "Sales Rep",
            RoleName::SupportAgent => "Support Agent",
            RoleName::Viewer => "Viewer",
        }
    }

    /// Stable id for this role name
    ///
    /// A reseed recreates roles under the same ids, so account
    /// references stay valid across it.
    pub fn canonical_id(self) -> RoleId {
        Uuid::new_v5(&ROLE_NAMESPACE, self.as_str().as_bytes())
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = crate::permissions::UnknownName;

    /// Exact, case-sensitive match
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleName::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| crate::permissions::UnknownName(s.to_string()))
    }
}

/// A named role and its permission matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
    pub description: String,
    pub permissions: PermissionMatrix,

    /// Soft-disable without deletion
    #[serde(default = "default_active")]
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Role {
    /// Create an active role under its canonical id
    pub fn new(name: RoleName, description: impl Into<String>, permissions: PermissionMatrix) -> Self {
        let now = Utc::now();
        Self {
            id: name.canonical_id(),
            name,
            description: description.into(),
            permissions,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_parsing_is_case_sensitive() {
        assert_eq!("Sales Rep".parse::<RoleName>(), Ok(RoleName::SalesRep));
        assert!("sales rep".parse::<RoleName>().is_err());
        assert!("SalesRep".parse::<RoleName>().is_err());
    }

    #[test]
    fn test_canonical_ids_are_stable_and_distinct() {
        assert_eq!(RoleName::Admin.canonical_id(), RoleName::Admin.canonical_id());
        assert_ne!(RoleName::Admin.canonical_id(), RoleName::Viewer.canonical_id());
    }

    #[test]
    fn test_role_serializes_display_name() {
        let role = Role::new(RoleName::SupportAgent, "support", PermissionMatrix::new());
        let json = serde_json::to_value(&role).unwrap();
        assert_eq!(json["name"], "Support Agent");
        assert_eq!(json["active"], true);
    }
}
