//! Authorization gate: (principal, resource, action) → allow / deny
//!
//! A pure, synchronous predicate. Evaluation order:
//!
//! ```text
//! no principal ─→ Unauthenticated
//! super-role ───→ allow (matrix bypassed)
//! no resource ──→ NoResourcePermissions
//! leaf ≠ true ──→ ActionNotPermitted
//! leaf = true ──→ allow
//! ```

use crate::error::{RbacError, Result};
use crate::permissions::{Action, Lookup, Resource};
use crate::resolver::Principal;
use crate::role::RoleName;
use serde::Serialize;
use tracing::debug;

/// Why a request was allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    /// The principal holds the super-role
    SuperRole,
    /// The role's matrix grants the action
    Matrix,
}

/// Per-operation authorization decision function
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationGate {
    super_role: RoleName,
}

impl Default for AuthorizationGate {
    fn default() -> Self {
        Self::new(RoleName::Admin)
    }
}

impl AuthorizationGate {
    pub fn new(super_role: RoleName) -> Self {
        Self { super_role }
    }

    pub fn super_role(&self) -> RoleName {
        self.super_role
    }

    /// Decide a typed (resource, action) pair
    pub fn check(&self, principal: Option<&Principal>, resource: Resource, action: Action) -> Result<Grant> {
        let principal = self.authenticated(principal)?;
        if self.is_super(principal) {
            return Ok(Grant::SuperRole);
        }
        self.check_matrix(principal, resource, action)
    }

    /// Decide a (resource, action) pair given by name
    ///
    /// The super-role is allowed even for names outside the enumerations.
    /// For any other role an unknown resource has no permissions and an
    /// unknown action is not permitted.
    pub fn check_named(&self, principal: Option<&Principal>, resource: &str, action: &str) -> Result<Grant> {
        let principal = self.authenticated(principal)?;
        if self.is_super(principal) {
            return Ok(Grant::SuperRole);
        }

        let Ok(resource) = resource.parse::<Resource>() else {
            debug!("Denied unknown resource '{}'", resource);
            return Err(RbacError::no_resource(resource));
        };

        // Unknown actions still require the resource entry first
        match action.parse::<Action>() {
            Ok(action) => self.check_matrix(principal, resource, action),
            Err(_) => {
                self.resource_entry(principal, resource)?;
                debug!("Denied unknown action '{}' on {}", action, resource);
                Err(RbacError::ActionNotPermitted {
                    resource: resource.to_string(),
                    action: action.to_string(),
                })
            }
        }
    }

    fn authenticated<'p>(&self, principal: Option<&'p Principal>) -> Result<&'p Principal> {
        principal.ok_or_else(|| {
            debug!("Denied: no principal attached");
            RbacError::Unauthenticated
        })
    }

    fn is_super(&self, principal: &Principal) -> bool {
        principal.role_name() == Some(self.super_role)
    }

    /// Fails unless the principal's role is active and has an entry for `resource`
    fn resource_entry(&self, principal: &Principal, resource: Resource) -> Result<()> {
        match &principal.role {
            Some(role) if role.active && role.permissions.has_resource(resource) => Ok(()),
            role => {
                debug!(
                    "Denied {:?} on {}: no resource permissions",
                    role.as_ref().map(|r| r.name),
                    resource
                );
                Err(RbacError::no_resource(resource))
            }
        }
    }

    fn check_matrix(&self, principal: &Principal, resource: Resource, action: Action) -> Result<Grant> {
        self.resource_entry(principal, resource)?;

        let Some(role) = principal.role.as_ref() else {
            return Err(RbacError::no_resource(resource));
        };

        match role.permissions.lookup(resource, action) {
            Lookup::Defined(true) => Ok(Grant::Matrix),
            Lookup::MissingResource => Err(RbacError::no_resource(resource)),
            Lookup::Defined(false) | Lookup::MissingAction => {
                debug!("Denied {} to {} {}", role.name, action, resource);
                Err(RbacError::not_permitted(resource, action))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::permissions::PermissionMatrix;
    use crate::role::Role;
    use crate::seed::canonical_role;

    fn principal(role: Option<Role>) -> Principal {
        Principal::new(Account::new("p@example.com", "h", "Pat", "Kim"), role)
    }

    #[test]
    fn test_no_principal() {
        let gate = AuthorizationGate::default();
        assert!(matches!(
            gate.check(None, Resource::Leads, Action::Read),
            Err(RbacError::Unauthenticated)
        ));
    }

    #[test]
    fn test_super_role_bypass() {
        let gate = AuthorizationGate::default();
        let admin = principal(Some(Role::new(RoleName::Admin, "empty admin", PermissionMatrix::new())));

        assert_eq!(gate.check(Some(&admin), Resource::Settings, Action::Manage).unwrap(), Grant::SuperRole);
        assert_eq!(
            gate.check_named(Some(&admin), "nonexistent_resource", "delete").unwrap(),
            Grant::SuperRole
        );
    }

    #[test]
    fn test_roleless_principal_denied() {
        let gate = AuthorizationGate::default();
        let p = principal(None);
        assert!(matches!(
            gate.check(Some(&p), Resource::Leads, Action::Read),
            Err(RbacError::NoResourcePermissions { .. })
        ));
    }

    #[test]
    fn test_inactive_role_denied() {
        let gate = AuthorizationGate::default();
        let p = principal(Some(canonical_role(RoleName::Viewer).with_active(false)));
        assert!(matches!(
            gate.check(Some(&p), Resource::Leads, Action::Read),
            Err(RbacError::NoResourcePermissions { .. })
        ));
    }

    #[test]
    fn test_named_unknowns() {
        let gate = AuthorizationGate::default();
        let p = principal(Some(canonical_role(RoleName::Manager)));

        assert!(matches!(
            gate.check_named(Some(&p), "invoices", "read"),
            Err(RbacError::NoResourcePermissions { .. })
        ));
        assert!(matches!(
            gate.check_named(Some(&p), "leads", "archive"),
            Err(RbacError::ActionNotPermitted { .. })
        ));
        assert_eq!(gate.check_named(Some(&p), "leads", "delete").unwrap(), Grant::Matrix);
    }

    #[test]
    fn test_configurable_super_role() {
        let gate = AuthorizationGate::new(RoleName::Manager);
        let manager = principal(Some(canonical_role(RoleName::Manager)));
        let admin = principal(Some(canonical_role(RoleName::Admin)));

        assert_eq!(gate.check(Some(&manager), Resource::Settings, Action::Manage).unwrap(), Grant::SuperRole);
        // Admin falls back to its matrix, which grants everything
        assert_eq!(gate.check(Some(&admin), Resource::Settings, Action::Manage).unwrap(), Grant::Matrix);
    }
}
