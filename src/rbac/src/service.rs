//! Account lifecycle: registration, login with lockout, profile, role changes

use crate::account::{normalize_email, Account, AccountId, AccountStore, LoginAttempt, ProfileUpdate, PublicAccount};
use crate::config::RbacConfig;
use crate::credential::TokenIssuer;
use crate::error::{RbacError, Result};
use crate::registry::RoleRegistry;
use crate::role::Role;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// Registration input
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAccount {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 6, max = 50, message = "Password must be between 6 and 50 characters"))]
    pub password: String,

    #[validate(length(min = 2, max = 50, message = "first_name must be between 2 and 50 characters"))]
    pub first_name: String,

    #[validate(length(min = 2, max = 50, message = "last_name must be between 2 and 50 characters"))]
    pub last_name: String,

    #[serde(default)]
    #[validate(length(max = 30, message = "phone must be at most 30 characters"))]
    pub phone: Option<String>,
}

impl NewAccount {
    /// Normalize the email and trim the names
    pub fn normalized(self) -> Self {
        Self {
            email: normalize_email(&self.email),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            ..self
        }
    }
}

/// Password change for the authenticated account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PasswordChange {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 6, max = 50, message = "Password must be between 6 and 50 characters"))]
    pub new_password: String,
}

/// Authenticated session handed back to clients
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub account: PublicAccount,
    pub token: String,
}

/// Account lifecycle service
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    roles: Arc<dyn RoleRegistry>,
    issuer: Arc<TokenIssuer>,
    config: RbacConfig,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        roles: Arc<dyn RoleRegistry>,
        issuer: Arc<TokenIssuer>,
        config: RbacConfig,
    ) -> Self {
        Self {
            accounts,
            roles,
            issuer,
            config,
        }
    }

    /// Register a new account under the default role
    pub async fn register(&self, input: NewAccount) -> Result<Session> {
        let input = input.normalized();
        input.validate()?;

        if self.accounts.find_by_email(&input.email).await?.is_some() {
            return Err(RbacError::Conflict("User".to_string()));
        }

        let hash = hash_password(input.password, self.config.bcrypt_cost).await?;
        let mut account = Account::new(&input.email, hash, input.first_name, input.last_name);
        account.phone = input.phone;

        match self.roles.find_role_by_name(self.config.default_role.as_str()).await? {
            Some(role) => account.role_id = Some(role.id),
            None => warn!("Default role '{}' missing at registration", self.config.default_role),
        }

        let account = self.accounts.insert(account).await?;
        let token = self.issuer.issue(&account)?;

        info!("New user registered: {}", account.email);
        Ok(Session {
            account: account.public_view(),
            token,
        })
    }

    /// Log in with email and password
    ///
    /// Every wrong password counts toward the lockout threshold. Once
    /// locked, the account is refused until the lockout passes, even with
    /// the right password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let Some(account) = self.accounts.find_by_email(email).await? else {
            warn!("Login failed for unknown email");
            return Err(RbacError::InvalidLogin);
        };

        let now = Utc::now();
        if let Some(until) = account.locked_until.filter(|until| *until > now) {
            warn!("Login refused for locked account {}", account.id);
            return Err(RbacError::AccountLocked { until });
        }

        if !account.active {
            return Err(RbacError::AccountInactive);
        }

        if !verify_password(password.to_string(), account.password_hash.clone()).await? {
            let lock_until = self
                .config
                .lockout()
                .and_then(|lockout| now.checked_add_signed(lockout))
                .ok_or_else(|| RbacError::Internal("Lockout window out of range".to_string()))?;
            let attempt = LoginAttempt::Failed {
                max_failed: self.config.max_failed_logins,
                lock_until,
            };

            if let Some(updated) = self.accounts.record_login_attempt(account.id, attempt).await? {
                if updated.is_locked(now) {
                    warn!(
                        "Account {} locked after {} failed logins",
                        updated.id, updated.failed_logins
                    );
                }
            }
            return Err(RbacError::InvalidLogin);
        }

        let Some(account) = self
            .accounts
            .record_login_attempt(account.id, LoginAttempt::Succeeded { at: now })
            .await?
        else {
            warn!("Account {} deleted during login", account.id);
            return Err(RbacError::InvalidLogin);
        };
        let token = self.issuer.issue(&account)?;

        info!("User logged in: {}", account.email);
        Ok(Session {
            account: account.public_view(),
            token,
        })
    }

    pub async fn profile(&self, id: AccountId) -> Result<PublicAccount> {
        Ok(self.load(id).await?.public_view())
    }

    pub async fn update_profile(&self, id: AccountId, update: ProfileUpdate) -> Result<PublicAccount> {
        let update = update.normalized();
        update.validate()?;

        let account = self
            .accounts
            .update_profile(id, &update)
            .await?
            .ok_or_else(user_not_found)?;

        info!("User profile updated: {}", account.email);
        Ok(account.public_view())
    }

    pub async fn change_password(&self, id: AccountId, change: PasswordChange) -> Result<()> {
        change.validate()?;
        let account = self.load(id).await?;

        if !verify_password(change.current_password, account.password_hash.clone()).await? {
            return Err(RbacError::Validation("Current password is incorrect".to_string()));
        }

        let hash = hash_password(change.new_password, self.config.bcrypt_cost).await?;
        let account = self
            .accounts
            .set_password_hash(id, &hash)
            .await?
            .ok_or_else(user_not_found)?;

        info!("Password changed for user: {}", account.email);
        Ok(())
    }

    /// Assign a role by name; callers gate this on `users:update`
    pub async fn assign_role(&self, id: AccountId, role_name: &str) -> Result<(PublicAccount, Role)> {
        let role = self
            .roles
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| RbacError::NotFound(format!("Role '{}'", role_name)))?;

        let account = self
            .accounts
            .set_role(id, role.id)
            .await?
            .ok_or_else(user_not_found)?;

        info!("Assigned role '{}' to {}", role.name, account.email);
        Ok((account.public_view(), role))
    }

    pub async fn delete_account(&self, id: AccountId) -> Result<()> {
        if !self.accounts.delete(id).await? {
            return Err(RbacError::NotFound("User".to_string()));
        }
        info!("User account deleted: {}", id);
        Ok(())
    }

    async fn load(&self, id: AccountId) -> Result<Account> {
        self.accounts.find_by_id(id).await?.ok_or_else(user_not_found)
    }
}

fn user_not_found() -> RbacError {
    RbacError::NotFound("User".to_string())
}

async fn hash_password(password: String, cost: u32) -> Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| RbacError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(|e| RbacError::Internal(format!("Error hashing password: {}", e)))
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| RbacError::Internal(format!("Verification task failed: {}", e)))?;

    // A malformed stored hash never matches
    Ok(verified.unwrap_or(false))
}
