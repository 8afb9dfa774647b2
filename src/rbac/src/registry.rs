//! Role registry: the catalog of named roles

use crate::error::{RbacError, Result};
use crate::role::{Role, RoleId, RoleName};
use crate::seed;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Role registry trait
///
/// Injected into the resolver and services as `Arc<dyn RoleRegistry>`.
#[async_trait]
pub trait RoleRegistry: Send + Sync {
    /// Exact, case-sensitive lookup by display name
    ///
    /// Names outside the closed enumeration yield `Ok(None)`.
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;

    /// Lookup by id
    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<Role>>;

    /// All roles in canonical order
    async fn list_roles(&self) -> Result<Vec<Role>>;

    /// Number of stored roles
    async fn count(&self) -> Result<usize>;

    /// Insert roles; a duplicate name fails the whole batch
    async fn insert_many(&self, roles: Vec<Role>) -> Result<Vec<Role>>;

    /// Remove every role, returning how many were removed
    async fn delete_all(&self) -> Result<usize>;

    /// Destructively replace all roles with the canonical set
    async fn reseed_canonical_roles(&self) -> Result<Vec<Role>> {
        self.delete_all().await?;
        self.insert_many(seed::canonical_roles()).await
    }
}

/// In-memory role registry
pub struct InMemoryRoleRegistry {
    roles: Arc<RwLock<HashMap<RoleName, Role>>>,
}

impl InMemoryRoleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            roles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a registry pre-populated with the canonical roles
    pub fn seeded() -> Self {
        let roles = seed::canonical_roles()
            .into_iter()
            .map(|role| (role.name, role))
            .collect();

        Self {
            roles: Arc::new(RwLock::new(roles)),
        }
    }

    /// Replace or add a single role (fixtures and admin tooling)
    pub async fn upsert(&self, role: Role) {
        let mut roles = self.roles.write().await;
        roles.insert(role.name, role);
    }
}

impl Default for InMemoryRoleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleRegistry for InMemoryRoleRegistry {
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let Ok(name) = name.parse::<RoleName>() else {
            return Ok(None);
        };
        let roles = self.roles.read().await;
        Ok(roles.get(&name).cloned())
    }

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<Role>> {
        let roles = self.roles.read().await;
        Ok(roles.values().find(|r| r.id == id).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let roles = self.roles.read().await;
        let mut list: Vec<Role> = roles.values().cloned().collect();
        list.sort_by_key(|r| r.name);
        Ok(list)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.roles.read().await.len())
    }

    async fn insert_many(&self, new_roles: Vec<Role>) -> Result<Vec<Role>> {
        let mut roles = self.roles.write().await;

        let mut seen = Vec::with_capacity(new_roles.len());
        for role in &new_roles {
            if roles.contains_key(&role.name) || seen.contains(&role.name) {
                return Err(RbacError::Conflict(format!("Role '{}'", role.name)));
            }
            seen.push(role.name);
        }

        for role in &new_roles {
            roles.insert(role.name, role.clone());
        }

        Ok(new_roles)
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut roles = self.roles.write().await;
        let removed = roles.len();
        roles.clear();
        Ok(removed)
    }
}
