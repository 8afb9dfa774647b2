//! Principal resolution: bearer credential → account + role
//!
//! Resolution is read-only except for one deliberate write: an account with
//! no usable role is assigned the default role and the assignment is
//! persisted before the principal is returned (self-heal). The write is a
//! compare-and-set on a single record, so concurrent resolutions of the
//! same account converge on one valid role.

use crate::account::{Account, AccountStore};
use crate::credential::{bearer_token, CredentialVerifier};
use crate::error::{RbacError, Result};
use crate::registry::RoleRegistry;
use crate::role::{Role, RoleName};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Request-scoped resolved identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    pub account: Account,

    /// `None` only when the registry lacks the default role
    pub role: Option<Role>,
}

impl Principal {
    pub fn new(account: Account, role: Option<Role>) -> Self {
        Self { account, role }
    }

    pub fn role_name(&self) -> Option<RoleName> {
        self.role.as_ref().map(|r| r.name)
    }
}

/// Turns bearer credentials into principals
pub struct PrincipalResolver {
    verifier: Arc<dyn CredentialVerifier>,
    accounts: Arc<dyn AccountStore>,
    roles: Arc<dyn RoleRegistry>,
    default_role: RoleName,
}

impl PrincipalResolver {
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        accounts: Arc<dyn AccountStore>,
        roles: Arc<dyn RoleRegistry>,
        default_role: RoleName,
    ) -> Self {
        Self {
            verifier,
            accounts,
            roles,
            default_role,
        }
    }

    /// Resolve from a raw `Authorization` header value
    pub async fn resolve_header(&self, header: Option<&str>) -> Result<Principal> {
        let token = header.and_then(bearer_token).ok_or_else(|| {
            warn!("Authentication token required");
            RbacError::InvalidCredential
        })?;
        self.resolve(token).await
    }

    /// Resolve a bearer token
    ///
    /// # Pipeline
    ///
    /// 1. Verify the credential
    /// 2. Load the account with its role
    /// 3. Reject inactive accounts
    /// 4. Self-heal a missing or dangling role
    pub async fn resolve(&self, token: &str) -> Result<Principal> {
        // Step 1: Verify
        let account_id = self.verifier.verify(token).map_err(|e| {
            warn!("Authentication failed: invalid credential");
            e
        })?;

        // Step 2: Load
        let Some((account, role)) = self.accounts.find_by_id_with_role(account_id).await? else {
            warn!("Authentication failed: account {} not found", account_id);
            return Err(RbacError::PrincipalNotFound);
        };

        // Step 3: Inactive accounts never get a principal
        if !account.active {
            warn!("Authentication failed: account {} is inactive", account_id);
            return Err(RbacError::AccountInactive);
        }

        // Step 4: Self-heal
        let principal = match role {
            Some(role) => Principal::new(account, Some(role)),
            None => self.assign_default_role(account).await?,
        };

        debug!(
            "Resolved principal {} with role {:?}",
            principal.account.id,
            principal.role_name()
        );
        Ok(principal)
    }

    async fn assign_default_role(&self, account: Account) -> Result<Principal> {
        let Some(default_role) = self.roles.find_role_by_name(self.default_role.as_str()).await? else {
            warn!(
                "Default role '{}' not found; account {} continues without a role",
                self.default_role, account.id
            );
            return Ok(Principal::new(account, None));
        };

        let Some(stored) = self
            .accounts
            .compare_and_set_role(account.id, account.role_id, default_role.id)
            .await?
        else {
            // Deleted between load and write
            return Err(RbacError::PrincipalNotFound);
        };

        if stored.role_id == Some(default_role.id) {
            if account.role_id.is_none() {
                info!("Assigned default role '{}' to account {}", default_role.name, stored.id);
            } else {
                info!(
                    "Replaced dangling role reference with '{}' on account {}",
                    default_role.name, stored.id
                );
            }
            return Ok(Principal::new(stored, Some(default_role)));
        }

        // A concurrent writer won; use whatever role it set if it resolves
        let winner = match stored.role_id {
            Some(role_id) => self.roles.find_role_by_id(role_id).await?,
            None => None,
        };

        Ok(Principal::new(stored, winner.or(Some(default_role))))
    }
}
