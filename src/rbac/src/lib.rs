//! # CRM RBAC Core
//!
//! Role-based access control for the CRM API.
//!
//! ## Components
//!
//! - **Role Registry**: catalog of named roles and their permission matrices
//! - **Principal Resolver**: bearer credential → account + role, with
//!   default-role self-heal
//! - **Authorization Gate**: pure (principal, resource, action) decision
//!   with a super-role bypass
//! - **Account Store**: account lookup and targeted update primitives
//!
//! ## Example
//!
//! ```rust
//! use crm_rbac::{
//!     Account, AccountStore, AuthorizationGate, InMemoryAccountStore, InMemoryRoleRegistry,
//!     JwtVerifier, PrincipalResolver, Resource, Action, RoleName, RoleRegistry, TokenIssuer,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let roles: Arc<dyn RoleRegistry> = Arc::new(InMemoryRoleRegistry::seeded());
//! let accounts = Arc::new(InMemoryAccountStore::new(roles.clone()));
//! let account = accounts.insert(Account::new("alice@example.com", "hash", "Alice", "Smith")).await?;
//!
//! let token = TokenIssuer::new(b"secret", Duration::from_secs(3600)).issue(&account)?;
//! let resolver = PrincipalResolver::new(
//!     Arc::new(JwtVerifier::new(b"secret")),
//!     accounts,
//!     roles,
//!     RoleName::SalesRep,
//! );
//!
//! // No role yet: the resolver assigns "Sales Rep"
//! let principal = resolver.resolve(&token).await?;
//! let gate = AuthorizationGate::default();
//!
//! assert!(gate.check(Some(&principal), Resource::Leads, Action::Create).is_ok());
//! assert!(gate.check(Some(&principal), Resource::Leads, Action::Delete).is_err());
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod config;
pub mod credential;
pub mod error;
pub mod gate;
pub mod permissions;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod registry;
pub mod resolver;
pub mod role;
pub mod seed;
pub mod service;

// Re-export commonly used types
pub use account::{
    Account, AccountId, AccountStore, InMemoryAccountStore, LoginAttempt, ProfileUpdate, PublicAccount,
};
pub use config::RbacConfig;
pub use credential::{bearer_token, Claims, CredentialVerifier, JwtVerifier, TokenIssuer};
pub use error::{RbacError, Result};
pub use gate::{AuthorizationGate, Grant};
pub use permissions::{Action, Lookup, PermissionMatrix, Resource};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresAccountStore, PostgresRoleRegistry};
pub use registry::{InMemoryRoleRegistry, RoleRegistry};
pub use resolver::{Principal, PrincipalResolver};
pub use role::{Role, RoleId, RoleName};
pub use seed::{canonical_roles, initialize_roles, reseed_roles, SeedOutcome};
pub use service::{AuthService, NewAccount, PasswordChange, Session};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
