//! Account records and the account store interface

use crate::error::{RbacError, Result};
use crate::registry::RoleRegistry;
use crate::role::{Role, RoleId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

/// Unique account identifier
pub type AccountId = Uuid;

/// Normalize an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A user account: the source of every principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    /// Unique, stored lowercased
    pub email: String,

    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,

    #[serde(default)]
    pub phone: Option<String>,

    /// Assigned role, resolved lazily
    #[serde(default)]
    pub role_id: Option<RoleId>,

    pub active: bool,

    #[serde(default)]
    pub failed_logins: u32,

    #[serde(default)]
    pub locked_until: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create an active account with no role
    pub fn new(
        email: &str,
        password_hash: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash: password_hash.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: None,
            role_id: None,
            active: true,
            failed_logins: 0,
            locked_until: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_role(mut self, role_id: RoleId) -> Self {
        self.role_id = Some(role_id);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Whether a lockout is in effect at `now`
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// Outward projection without credentials or lockout state
    pub fn public_view(&self) -> PublicAccount {
        PublicAccount {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            role_id: self.role_id,
            active: self.active,
            last_login: self.last_login,
            created_at: self.created_at,
        }
    }
}

/// Account as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicAccount {
    pub id: AccountId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role_id: Option<RoleId>,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields an account may change on itself
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 2, max = 50, message = "first_name must be between 2 and 50 characters"))]
    pub first_name: Option<String>,

    #[validate(length(min = 2, max = 50, message = "last_name must be between 2 and 50 characters"))]
    pub last_name: Option<String>,

    #[validate(length(max = 30, message = "phone must be at most 30 characters"))]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Trim the name fields
    pub fn normalized(self) -> Self {
        Self {
            first_name: self.first_name.map(|name| name.trim().to_string()),
            last_name: self.last_name.map(|name| name.trim().to_string()),
            phone: self.phone,
        }
    }

    fn apply(&self, account: &mut Account) {
        if let Some(first_name) = &self.first_name {
            account.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            account.last_name = last_name.clone();
        }
        if let Some(phone) = &self.phone {
            account.phone = Some(phone.clone());
        }
    }
}

/// Result of a password check, applied by the store in one write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAttempt {
    /// Wrong password: count it, and lock until `lock_until` once the
    /// count reaches `max_failed`
    Failed {
        max_failed: u32,
        lock_until: DateTime<Utc>,
    },

    /// Right password: clear the counter and any lockout
    Succeeded { at: DateTime<Utc> },
}

impl LoginAttempt {
    fn apply(&self, account: &mut Account) {
        match *self {
            LoginAttempt::Failed { max_failed, lock_until } => {
                account.failed_logins = account.failed_logins.saturating_add(1);
                if account.failed_logins >= max_failed {
                    account.locked_until = Some(lock_until);
                }
            }
            LoginAttempt::Succeeded { at } => {
                account.failed_logins = 0;
                account.locked_until = None;
                account.last_login = Some(at);
            }
        }
    }
}

/// Account store trait
///
/// Every update touches only the fields it names and never recreates a
/// deleted account: updates on a missing id return `Ok(None)`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>>;

    /// Case-insensitive email lookup
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Fetch an account together with its role
    ///
    /// A dangling role reference yields `None` for the role.
    async fn find_by_id_with_role(&self, id: AccountId) -> Result<Option<(Account, Option<Role>)>>;

    /// Create an account; a taken email or id is a `Conflict`
    async fn insert(&self, account: Account) -> Result<Account>;

    /// Apply a login outcome to the lockout state
    async fn record_login_attempt(&self, id: AccountId, attempt: LoginAttempt) -> Result<Option<Account>>;

    async fn update_profile(&self, id: AccountId, update: &ProfileUpdate) -> Result<Option<Account>>;

    async fn set_password_hash(&self, id: AccountId, password_hash: &str) -> Result<Option<Account>>;

    /// Unconditionally set the role
    async fn set_role(&self, id: AccountId, role_id: RoleId) -> Result<Option<Account>>;

    async fn set_active(&self, id: AccountId, active: bool) -> Result<Option<Account>>;

    /// Set `role_id` to `new` only if it currently equals `expected`
    ///
    /// Returns the stored account after the attempt, whether or not the
    /// write happened, or `None` if the account no longer exists.
    async fn compare_and_set_role(
        &self,
        id: AccountId,
        expected: Option<RoleId>,
        new: RoleId,
    ) -> Result<Option<Account>>;

    /// Delete an account, returning whether it existed
    async fn delete(&self, id: AccountId) -> Result<bool>;
}

/// In-memory account store
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<AccountId, Account>>>,
    roles: Arc<dyn RoleRegistry>,
}

impl InMemoryAccountStore {
    /// Create an empty store joined against `roles`
    pub fn new(roles: Arc<dyn RoleRegistry>) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            roles,
        }
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    /// Modify an existing account under the write lock
    async fn update(&self, id: AccountId, change: impl FnOnce(&mut Account) + Send) -> Result<Option<Account>> {
        let mut accounts = self.accounts.write().await;
        let Some(account) = accounts.get_mut(&id) else {
            return Ok(None);
        };

        change(account);
        account.updated_at = Utc::now();
        Ok(Some(account.clone()))
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let email = normalize_email(email);
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_id_with_role(&self, id: AccountId) -> Result<Option<(Account, Option<Role>)>> {
        let Some(account) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let role = match account.role_id {
            Some(role_id) => self.roles.find_role_by_id(role_id).await?,
            None => None,
        };

        Ok(Some((account, role)))
    }

    async fn insert(&self, mut account: Account) -> Result<Account> {
        account.email = normalize_email(&account.email);

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.id) || accounts.values().any(|a| a.email == account.email) {
            return Err(RbacError::Conflict("User".to_string()));
        }

        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn record_login_attempt(&self, id: AccountId, attempt: LoginAttempt) -> Result<Option<Account>> {
        self.update(id, |account| attempt.apply(account)).await
    }

    async fn update_profile(&self, id: AccountId, update: &ProfileUpdate) -> Result<Option<Account>> {
        self.update(id, |account| update.apply(account)).await
    }

    async fn set_password_hash(&self, id: AccountId, password_hash: &str) -> Result<Option<Account>> {
        self.update(id, |account| account.password_hash = password_hash.to_string())
            .await
    }

    async fn set_role(&self, id: AccountId, role_id: RoleId) -> Result<Option<Account>> {
        self.update(id, |account| account.role_id = Some(role_id)).await
    }

    async fn set_active(&self, id: AccountId, active: bool) -> Result<Option<Account>> {
        self.update(id, |account| account.active = active).await
    }

    async fn compare_and_set_role(
        &self,
        id: AccountId,
        expected: Option<RoleId>,
        new: RoleId,
    ) -> Result<Option<Account>> {
        let mut accounts = self.accounts.write().await;
        let Some(account) = accounts.get_mut(&id) else {
            return Ok(None);
        };

        if account.role_id == expected {
            account.role_id = Some(new);
            account.updated_at = Utc::now();
        }

        Ok(Some(account.clone()))
    }

    async fn delete(&self, id: AccountId) -> Result<bool> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRoleRegistry;
    use crate::role::RoleName;
    use chrono::Duration;

    fn store() -> InMemoryAccountStore {
        InMemoryAccountStore::new(Arc::new(InMemoryRoleRegistry::seeded()))
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let store = store();
        store.insert(Account::new("Alice@Example.com", "h", "Alice", "Smith")).await.unwrap();

        let found = store.find_by_email("ALICE@example.COM").await.unwrap();
        assert_eq!(found.unwrap().email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = store();
        store.insert(Account::new("bob@example.com", "h", "Bob", "Jones")).await.unwrap();

        let err = store
            .insert(Account::new("BOB@example.com", "h", "Bob", "Other"))
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_join_with_dangling_role() {
        let store = store();
        let account = Account::new("carol@example.com", "h", "Carol", "White").with_role(Uuid::new_v4());
        let id = store.insert(account).await.unwrap().id;

        let (account, role) = store.find_by_id_with_role(id).await.unwrap().unwrap();
        assert!(account.role_id.is_some());
        assert!(role.is_none());
    }

    #[tokio::test]
    async fn test_compare_and_set_only_when_expected() {
        let store = store();
        let id = store
            .insert(Account::new("dan@example.com", "h", "Dan", "Brown"))
            .await
            .unwrap()
            .id;

        let viewer = RoleName::Viewer.canonical_id();
        let admin = RoleName::Admin.canonical_id();

        let first = store.compare_and_set_role(id, None, viewer).await.unwrap().unwrap();
        assert_eq!(first.role_id, Some(viewer));

        // Stale expectation: no write
        let second = store.compare_and_set_role(id, None, admin).await.unwrap().unwrap();
        assert_eq!(second.role_id, Some(viewer));

        assert!(store.compare_and_set_role(Uuid::new_v4(), None, admin).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_updates_never_recreate_deleted_accounts() {
        let store = store();
        let id = store
            .insert(Account::new("gone@example.com", "h", "Gil", "Ono"))
            .await
            .unwrap()
            .id;
        assert!(store.delete(id).await.unwrap());

        let now = Utc::now();
        let success = LoginAttempt::Succeeded { at: now };
        assert!(store.record_login_attempt(id, success).await.unwrap().is_none());
        assert!(store.update_profile(id, &ProfileUpdate::default()).await.unwrap().is_none());
        assert!(store.set_password_hash(id, "h2").await.unwrap().is_none());
        assert!(store.set_role(id, RoleName::Admin.canonical_id()).await.unwrap().is_none());
        assert!(store.set_active(id, false).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_login_attempts_leave_role_alone() {
        let store = store();
        let manager = RoleName::Manager.canonical_id();
        let id = store
            .insert(Account::new("hal@example.com", "h", "Hal", "Ito").with_role(manager))
            .await
            .unwrap()
            .id;

        let lock_until = Utc::now() + Duration::minutes(30);
        for expected in 1..=3u32 {
            let failed = LoginAttempt::Failed {
                max_failed: 3,
                lock_until,
            };
            let account = store.record_login_attempt(id, failed).await.unwrap().unwrap();
            assert_eq!(account.failed_logins, expected);
            assert_eq!(account.locked_until.is_some(), expected == 3);
            assert_eq!(account.role_id, Some(manager));
        }

        let success = LoginAttempt::Succeeded { at: Utc::now() };
        let account = store.record_login_attempt(id, success).await.unwrap().unwrap();
        assert_eq!(account.failed_logins, 0);
        assert!(account.locked_until.is_none());
        assert!(account.last_login.is_some());
    }

    #[test]
    fn test_lockout_window() {
        let now = Utc::now();
        let mut account = Account::new("erin@example.com", "h", "Erin", "Gray");
        assert!(!account.is_locked(now));

        account.locked_until = Some(now + Duration::minutes(30));
        assert!(account.is_locked(now));
        assert!(!account.is_locked(now + Duration::minutes(31)));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let account = Account::new("frank@example.com", "secret-hash", "Frank", "Hill");
        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
