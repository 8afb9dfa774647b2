//! PostgreSQL role registry and account store

use crate::account::{normalize_email, Account, AccountId, AccountStore, LoginAttempt, ProfileUpdate};
use crate::error::{RbacError, Result};
use crate::permissions::PermissionMatrix;
use crate::registry::RoleRegistry;
use crate::role::{Role, RoleId, RoleName};
use crate::seed;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::error;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        permissions JSONB NOT NULL DEFAULT '{}'::jsonb,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        phone TEXT,
        role_id UUID,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        failed_logins INTEGER NOT NULL DEFAULT 0,
        locked_until TIMESTAMPTZ,
        last_login TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS accounts_email_key ON accounts (email)",
];

const ROLE_COLUMNS: &str = "id, name, description, permissions, active, created_at, updated_at";

const ACCOUNT_COLUMNS: &str = "a.id, a.email, a.password_hash, a.first_name, a.last_name, a.phone, \
     a.role_id, a.active, a.failed_logins, a.locked_until, a.last_login, a.created_at, a.updated_at";

/// Open a connection pool
pub async fn connect(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(25)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(3))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .map_err(|e| RbacError::Store(format!("Failed to connect to database: {}", e)))
}

/// Create the `roles` and `accounts` tables if missing
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn row_to_role(row: &PgRow) -> Result<Role> {
    role_from_columns(row, "")
}

/// Build a role from columns named `{prefix}name`, `{prefix}permissions`, ...
fn role_from_columns(row: &PgRow, prefix: &str) -> Result<Role> {
    let col = |name: &str| format!("{}{}", prefix, name);

    let name: String = row.try_get(col("name").as_str())?;
    let name: RoleName = name
        .parse()
        .map_err(|_| RbacError::Store(format!("Unknown role name '{}' in roles table", name)))?;

    // A corrupted matrix loads as empty: every check on it denies
    let permissions: serde_json::Value = row.try_get(col("permissions").as_str())?;
    let permissions = serde_json::from_value::<PermissionMatrix>(permissions).unwrap_or_else(|e| {
        error!("Corrupted permission matrix for role '{}': {}", name, e);
        PermissionMatrix::new()
    });

    Ok(Role {
        id: row.try_get(col("id").as_str())?,
        name,
        description: row.try_get(col("description").as_str())?,
        permissions,
        active: row.try_get(col("active").as_str())?,
        created_at: row.try_get(col("created_at").as_str())?,
        updated_at: row.try_get(col("updated_at").as_str())?,
    })
}

fn row_to_account(row: &PgRow) -> Result<Account> {
    let failed_logins: i32 = row.try_get("failed_logins")?;
    Ok(Account {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        phone: row.try_get("phone")?,
        role_id: row.try_get("role_id")?,
        active: row.try_get("active")?,
        failed_logins: failed_logins.max(0) as u32,
        locked_until: row.try_get("locked_until")?,
        last_login: row.try_get("last_login")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn insert_role<'e, E>(executor: E, role: &Role) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let permissions = serde_json::to_value(&role.permissions)
        .map_err(|e| RbacError::Internal(format!("Failed to serialize permissions: {}", e)))?;

    sqlx::query(
        "INSERT INTO roles (id, name, description, permissions, active, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(role.id)
    .bind(role.name.as_str())
    .bind(&role.description)
    .bind(permissions)
    .bind(role.active)
    .bind(role.created_at)
    .bind(role.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// PostgreSQL role registry
#[derive(Clone)]
pub struct PostgresRoleRegistry {
    pool: PgPool,
}

impl PostgresRoleRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRegistry for PostgresRoleRegistry {
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        if name.parse::<RoleName>().is_err() {
            return Ok(None);
        }

        let row = sqlx::query(&format!("SELECT {} FROM roles WHERE name = $1", ROLE_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_role).transpose()
    }

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<Role>> {
        let row = sqlx::query(&format!("SELECT {} FROM roles WHERE id = $1", ROLE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_role).transpose()
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query(&format!("SELECT {} FROM roles", ROLE_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        let mut roles = rows.iter().map(row_to_role).collect::<Result<Vec<_>>>()?;
        roles.sort_by_key(|r| r.name);
        Ok(roles)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn insert_many(&self, roles: Vec<Role>) -> Result<Vec<Role>> {
        let mut tx = self.pool.begin().await?;
        for role in &roles {
            insert_role(&mut *tx, role).await?;
        }
        tx.commit().await?;
        Ok(roles)
    }

    async fn delete_all(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM roles").execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }

    /// Delete and reinsert in one transaction
    async fn reseed_canonical_roles(&self) -> Result<Vec<Role>> {
        let roles = seed::canonical_roles();

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM roles").execute(&mut *tx).await?;
        for role in &roles {
            insert_role(&mut *tx, role).await?;
        }
        tx.commit().await?;

        Ok(roles)
    }
}

/// PostgreSQL account store
#[derive(Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `None` when the update matched no row
    async fn reload_if_updated(&self, id: AccountId, rows_affected: u64) -> Result<Option<Account>> {
        if rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {} FROM accounts a WHERE a.id = $1", ACCOUNT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {} FROM accounts a WHERE a.email = $1", ACCOUNT_COLUMNS))
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn find_by_id_with_role(&self, id: AccountId) -> Result<Option<(Account, Option<Role>)>> {
        let sql = format!(
            "SELECT {}, r.id AS r_id, r.name AS r_name, r.description AS r_description, \
             r.permissions AS r_permissions, r.active AS r_active, \
             r.created_at AS r_created_at, r.updated_at AS r_updated_at \
             FROM accounts a LEFT JOIN roles r ON r.id = a.role_id WHERE a.id = $1",
            ACCOUNT_COLUMNS
        );

        let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };

        let account = row_to_account(&row)?;
        let role_id: Option<RoleId> = row.try_get("r_id")?;
        let role = match role_id {
            Some(_) => Some(role_from_columns(&row, "r_")?),
            None => None,
        };

        Ok(Some((account, role)))
    }

    async fn insert(&self, mut account: Account) -> Result<Account> {
        account.email = normalize_email(&account.email);

        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, password_hash, first_name, last_name, phone, role_id,
                                  active, failed_logins, locked_until, last_login, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.phone)
        .bind(account.role_id)
        .bind(account.active)
        .bind(i32::try_from(account.failed_logins).unwrap_or(i32::MAX))
        .bind(account.locked_until)
        .bind(account.last_login)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(account)
    }

    async fn record_login_attempt(&self, id: AccountId, attempt: LoginAttempt) -> Result<Option<Account>> {
        let query = match attempt {
            LoginAttempt::Failed { max_failed, lock_until } => sqlx::query(
                "UPDATE accounts SET failed_logins = failed_logins + 1, \
                 locked_until = CASE WHEN failed_logins + 1 >= $2 THEN $3 ELSE locked_until END, \
                 updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(i32::try_from(max_failed).unwrap_or(i32::MAX))
            .bind(lock_until),
            LoginAttempt::Succeeded { at } => sqlx::query(
                "UPDATE accounts SET failed_logins = 0, locked_until = NULL, last_login = $2, \
                 updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(at),
        };

        let result = query.execute(&self.pool).await?;
        self.reload_if_updated(id, result.rows_affected()).await
    }

    async fn update_profile(&self, id: AccountId, update: &ProfileUpdate) -> Result<Option<Account>> {
        let result = sqlx::query(
            "UPDATE accounts SET first_name = COALESCE($2, first_name), \
             last_name = COALESCE($3, last_name), phone = COALESCE($4, phone), \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.phone)
        .execute(&self.pool)
        .await?;

        self.reload_if_updated(id, result.rows_affected()).await
    }

    async fn set_password_hash(&self, id: AccountId, password_hash: &str) -> Result<Option<Account>> {
        let result = sqlx::query("UPDATE accounts SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        self.reload_if_updated(id, result.rows_affected()).await
    }

    async fn set_role(&self, id: AccountId, role_id: RoleId) -> Result<Option<Account>> {
        let result = sqlx::query("UPDATE accounts SET role_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;

        self.reload_if_updated(id, result.rows_affected()).await
    }

    async fn set_active(&self, id: AccountId, active: bool) -> Result<Option<Account>> {
        let result = sqlx::query("UPDATE accounts SET active = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        self.reload_if_updated(id, result.rows_affected()).await
    }

    async fn compare_and_set_role(
        &self,
        id: AccountId,
        expected: Option<RoleId>,
        new: RoleId,
    ) -> Result<Option<Account>> {
        sqlx::query(
            "UPDATE accounts SET role_id = $3, updated_at = NOW() \
             WHERE id = $1 AND role_id IS NOT DISTINCT FROM $2",
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await
    }

    async fn delete(&self, id: AccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
