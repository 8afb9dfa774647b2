//! Principal resolver tests: credential → account → self-heal → principal

use crm_rbac::{
    Account, AccountStore, InMemoryAccountStore, InMemoryRoleRegistry, JwtVerifier, PrincipalResolver,
    RbacError, RoleName, RoleRegistry, TokenIssuer,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const SECRET: &[u8] = b"resolver-integration-secret";

struct Fixture {
    roles: Arc<InMemoryRoleRegistry>,
    accounts: Arc<InMemoryAccountStore>,
    issuer: TokenIssuer,
    resolver: PrincipalResolver,
}

fn fixture_with(roles: InMemoryRoleRegistry) -> Fixture {
    let roles = Arc::new(roles);
    let accounts = Arc::new(InMemoryAccountStore::new(roles.clone()));
    let resolver = PrincipalResolver::new(
        Arc::new(JwtVerifier::new(SECRET)),
        accounts.clone(),
        roles.clone(),
        RoleName::SalesRep,
    );

    Fixture {
        roles,
        accounts,
        issuer: TokenIssuer::new(SECRET, Duration::from_secs(3600)),
        resolver,
    }
}

fn fixture() -> Fixture {
    fixture_with(InMemoryRoleRegistry::seeded())
}

impl Fixture {
    async fn account(&self, account: Account) -> (Account, String) {
        let account = self.accounts.insert(account).await.unwrap();
        let token = self.issuer.issue(&account).unwrap();
        (account, token)
    }
}

fn new_account(email: &str) -> Account {
    Account::new(email, "hash", "Test", "User")
}

// ============================================================================
// SELF-HEAL
// ============================================================================

#[tokio::test]
async fn test_roleless_account_gets_default_role() {
    let fx = fixture();
    let (account, token) = fx.account(new_account("new@example.com")).await;
    assert!(account.role_id.is_none());

    let principal = fx.resolver.resolve(&token).await.unwrap();
    assert_eq!(principal.role_name(), Some(RoleName::SalesRep));

    // Persisted, not just attached to the principal
    let stored = fx.accounts.find_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(stored.role_id, Some(RoleName::SalesRep.canonical_id()));
}

#[tokio::test]
async fn test_self_heal_is_idempotent() {
    let fx = fixture();
    let (account, token) = fx.account(new_account("twice@example.com")).await;

    let first = fx.resolver.resolve(&token).await.unwrap();
    let after_first = fx.accounts.find_by_id(account.id).await.unwrap().unwrap();

    let second = fx.resolver.resolve(&token).await.unwrap();
    let after_second = fx.accounts.find_by_id(account.id).await.unwrap().unwrap();

    assert_eq!(first.role_name(), Some(RoleName::SalesRep));
    assert_eq!(second.role_name(), first.role_name());
    assert_eq!(after_first.role_id, after_second.role_id);
    // No second assignment write
    assert_eq!(after_first.updated_at, after_second.updated_at);
}

#[tokio::test]
async fn test_concurrent_self_heal_converges() {
    let fx = Arc::new(fixture());
    let (account, token) = fx.account(new_account("race@example.com")).await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let fx = fx.clone();
            let token = token.clone();
            tokio::spawn(async move { fx.resolver.resolve(&token).await })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        let principal = result.unwrap().unwrap();
        assert_eq!(principal.role_name(), Some(RoleName::SalesRep));
    }

    let stored = fx.accounts.find_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(stored.role_id, Some(RoleName::SalesRep.canonical_id()));
}

#[tokio::test]
async fn test_dangling_role_reference_self_heals() {
    let fx = fixture();
    let orphan = Uuid::new_v4();
    let (account, token) = fx.account(new_account("orphan@example.com").with_role(orphan)).await;

    let principal = fx.resolver.resolve(&token).await.unwrap();
    assert_eq!(principal.role_name(), Some(RoleName::SalesRep));

    let stored = fx.accounts.find_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(stored.role_id, Some(RoleName::SalesRep.canonical_id()));
}

#[tokio::test]
async fn test_unseeded_registry_yields_roleless_principal() {
    let fx = fixture_with(InMemoryRoleRegistry::new());
    let (account, token) = fx.account(new_account("early@example.com")).await;

    let principal = fx.resolver.resolve(&token).await.unwrap();
    assert!(principal.role.is_none());

    let stored = fx.accounts.find_by_id(account.id).await.unwrap().unwrap();
    assert!(stored.role_id.is_none());

    // Once seeded, the next resolution heals
    fx.roles.reseed_canonical_roles().await.unwrap();
    let principal = fx.resolver.resolve(&token).await.unwrap();
    assert_eq!(principal.role_name(), Some(RoleName::SalesRep));
}

#[tokio::test]
async fn test_assigned_role_is_kept() {
    let fx = fixture();
    let (_, token) = fx
        .account(new_account("mgr@example.com").with_role(RoleName::Manager.canonical_id()))
        .await;

    let principal = fx.resolver.resolve(&token).await.unwrap();
    assert_eq!(principal.role_name(), Some(RoleName::Manager));
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test]
async fn test_inactive_account_rejected_regardless_of_role() {
    let fx = fixture();

    for (i, role) in [None, Some(RoleName::Admin), Some(RoleName::Viewer)].into_iter().enumerate() {
        let mut account = new_account(&format!("inactive-{}@example.com", i)).with_active(false);
        account.role_id = role.map(RoleName::canonical_id);
        let (stored, token) = fx.account(account).await;

        assert!(matches!(fx.resolver.resolve(&token).await, Err(RbacError::AccountInactive)));

        // No self-heal write for inactive accounts
        let after = fx.accounts.find_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(after.role_id, stored.role_id);
    }
}

#[tokio::test]
async fn test_unknown_account_not_found() {
    let fx = fixture();
    let ghost = new_account("ghost@example.com");
    let token = fx.issuer.issue(&ghost).unwrap();

    assert!(matches!(fx.resolver.resolve(&token).await, Err(RbacError::PrincipalNotFound)));
}

#[tokio::test]
async fn test_deleted_account_not_found() {
    let fx = fixture();
    let (account, token) = fx.account(new_account("gone@example.com")).await;
    fx.accounts.delete(account.id).await.unwrap();

    assert!(matches!(fx.resolver.resolve(&token).await, Err(RbacError::PrincipalNotFound)));
}

#[tokio::test]
async fn test_invalid_credentials() {
    let fx = fixture();
    let (account, _) = fx.account(new_account("forged@example.com")).await;
    let forged = TokenIssuer::new(b"wrong-secret", Duration::from_secs(60))
        .issue(&account)
        .unwrap();

    for token in ["", "garbage", "a.b.c", forged.as_str()] {
        assert!(matches!(fx.resolver.resolve(token).await, Err(RbacError::InvalidCredential)));
    }
}

#[tokio::test]
async fn test_resolve_from_header() {
    let fx = fixture();
    let (_, token) = fx.account(new_account("header@example.com")).await;

    let principal = fx
        .resolver
        .resolve_header(Some(&format!("Bearer {}", token)))
        .await
        .unwrap();
    assert_eq!(principal.account.email, "header@example.com");
}
