//! Canonical roles and registry seeding

use crate::error::Result;
use crate::permissions::{Action, Lookup, PermissionMatrix, Resource};
use crate::registry::RoleRegistry;
use crate::role::{Role, RoleName};
use tracing::{error, info, warn};

use Action::{Create, Delete, Export, Read, Update};
use Resource::{Deals, Leads, Reports, Settings, Tasks, Users};

/// The five canonical roles with their canonical matrices
pub fn canonical_roles() -> Vec<Role> {
    RoleName::ALL.into_iter().map(canonical_role).collect()
}

/// The canonical definition of a single role
pub fn canonical_role(name: RoleName) -> Role {
    let (description, permissions) = match name {
        RoleName::Admin => (
            "Administrator with full access to all resources",
            Resource::ALL
                .into_iter()
                .fold(PermissionMatrix::builder(), |b, r| b.grant_all(r))
                .build(),
        ),
        RoleName::Manager => (
            "Manager with access to most resources",
            PermissionMatrix::builder()
                .grant_all(Leads)
                .grant_all(Deals)
                .grant_all(Tasks)
                .grant(Reports, &[Read, Export])
                .grant(Users, &[Create, Read, Update])
                .resource(Settings)
                .build(),
        ),
        RoleName::SalesRep => (
            "Sales representative with access to leads, deals, and tasks",
            PermissionMatrix::builder()
                .grant(Leads, &[Create, Read, Update])
                .grant(Deals, &[Create, Read, Update])
                .grant(Tasks, &[Create, Read, Update])
                .grant(Reports, &[Read])
                .resource(Users)
                .resource(Settings)
                .build(),
        ),
        RoleName::SupportAgent => (
            "Support agent with access to tasks and limited leads access",
            PermissionMatrix::builder()
                .grant(Leads, &[Read])
                .grant(Deals, &[Read])
                .grant(Tasks, &[Create, Read, Update])
                .grant(Reports, &[Read])
                .resource(Users)
                .resource(Settings)
                .build(),
        ),
        RoleName::Viewer => (
            "Viewer with read-only access to all resources",
            PermissionMatrix::builder()
                .grant(Leads, &[Read])
                .grant(Deals, &[Read])
                .grant(Tasks, &[Read])
                .grant(Reports, &[Read])
                .grant(Users, &[Read])
                .resource(Settings)
                .build(),
        ),
    };

    Role::new(name, description, permissions)
}

/// Outcome of the startup bootstrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The registry was empty and the canonical roles were inserted
    Seeded(usize),
    /// Roles already existed; nothing was written
    AlreadyPresent(usize),
    /// Seeding failed; the error was logged
    Failed(String),
}

/// Bootstrap the registry at startup
///
/// Inserts the canonical roles only when the registry is empty. Errors are
/// logged and reported, never propagated, so the service keeps running
/// with whatever roles exist.
pub async fn initialize_roles(registry: &dyn RoleRegistry) -> SeedOutcome {
    let existing = match registry.count().await {
        Ok(n) => n,
        Err(e) => {
            error!("Error initializing roles: {}", e);
            return SeedOutcome::Failed(e.to_string());
        }
    };

    if existing > 0 {
        info!("{} roles already exist in registry", existing);
        return SeedOutcome::AlreadyPresent(existing);
    }

    info!("No roles found, initializing default roles");
    match registry.insert_many(canonical_roles()).await {
        Ok(inserted) => {
            info!("Default roles initialized: {}", inserted.len());
            SeedOutcome::Seeded(inserted.len())
        }
        Err(e) => {
            error!("Error initializing roles: {}", e);
            SeedOutcome::Failed(e.to_string())
        }
    }
}

/// Operator-invoked full reseed
///
/// Destroys every existing role, including per-deployment edits, and
/// inserts the canonical set.
pub async fn reseed_roles(registry: &dyn RoleRegistry) -> Result<Vec<Role>> {
    warn!("Reseeding roles: existing roles will be replaced");
    let roles = registry.reseed_canonical_roles().await?;
    for role in &roles {
        info!("Created role: {}", role.name);
    }
    info!("Successfully seeded {} roles", roles.len());
    Ok(roles)
}

/// A (role, resource, action) leaf the application probes but the role
/// does not define
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageGap {
    pub role: RoleName,
    pub resource: Resource,
    pub action: Action,
    pub lookup: Lookup,
}

/// Find probed leaves that resolve to a missing key
///
/// The super-role is skipped since the gate never consults its matrix.
pub fn verify_route_coverage<'a>(
    roles: &[Role],
    probes: impl IntoIterator<Item = &'a (Resource, Action)>,
    super_role: RoleName,
) -> Vec<CoverageGap> {
    let probes: Vec<(Resource, Action)> = probes.into_iter().copied().collect();
    let mut gaps = Vec::new();

    for role in roles.iter().filter(|r| r.name != super_role) {
        for (resource, action) in &probes {
            let lookup = role.permissions.lookup(*resource, *action);
            if !matches!(lookup, Lookup::Defined(_)) {
                gaps.push(CoverageGap {
                    role: role.name,
                    resource: *resource,
                    action: *action,
                    lookup,
                });
            }
        }
    }

    gaps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_matrices_are_complete() {
        for role in canonical_roles() {
            assert!(role.permissions.is_complete(), "{} incomplete", role.name);
            for resource in Resource::ALL {
                assert!(role.permissions.has_resource(resource), "{} lacks {}", role.name, resource);
            }
        }
    }

    #[test]
    fn test_viewer_is_read_only() {
        let viewer = canonical_role(RoleName::Viewer);
        for resource in Resource::ALL {
            for action in resource.actions() {
                let expected = *action == Read;
                assert_eq!(viewer.permissions.allows(resource, *action), expected);
            }
        }
    }

    #[test]
    fn test_manager_cannot_delete_users_or_manage_settings() {
        let manager = canonical_role(RoleName::Manager);
        assert!(manager.permissions.allows(Users, Update));
        assert!(!manager.permissions.allows(Users, Delete));
        assert!(!manager.permissions.allows(Settings, Action::Manage));
        assert!(manager.permissions.allows(Leads, Delete));
    }

    #[test]
    fn test_coverage_gap_reported() {
        let mut roles = canonical_roles();
        roles.push(Role::new(RoleName::Viewer, "partial", PermissionMatrix::new()));

        let probes = [(Leads, Read)];
        let gaps = verify_route_coverage(&roles, &probes, RoleName::Admin);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].lookup, Lookup::MissingResource);
    }
}
