//! Bearer credentials: issuing and verifying signed tokens

use crate::account::{Account, AccountId};
use crate::error::{RbacError, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Verifies a bearer credential and extracts the account identity
pub trait CredentialVerifier: Send + Sync {
    /// Fails with [`RbacError::InvalidCredential`] on any signature,
    /// expiry, or structural problem.
    fn verify(&self, token: &str) -> Result<AccountId>;
}

/// Extract the token from an `Authorization` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// HS256 token issuer
pub struct TokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Issue a token for an account
    pub fn issue(&self, account: &Account) -> Result<String> {
        let iat = Utc::now().timestamp();
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| iat.checked_add(ttl))
            .ok_or_else(|| RbacError::Internal("Token lifetime out of range".to_string()))?;
        let claims = Claims {
            sub: account.id.to_string(),
            email: account.email.clone(),
            iat,
            exp,
        };
        self.encode(&claims)
    }

    /// Encode arbitrary claims
    pub fn encode(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|e| RbacError::Internal(format!("Failed to sign token: {}", e)))
    }
}

/// HS256 token verifier
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl CredentialVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<AccountId> {
        if token.is_empty() {
            return Err(RbacError::InvalidCredential);
        }

        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            RbacError::InvalidCredential
        })?;

        Uuid::parse_str(&data.claims.sub).map_err(|_| RbacError::InvalidCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn account() -> Account {
        Account::new("alice@example.com", "hash", "Alice", "Smith")
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = TokenIssuer::new(SECRET, Duration::from_secs(3600));
        let verifier = JwtVerifier::new(SECRET);
        let account = account();

        let token = issuer.issue(&account).unwrap();
        assert_eq!(verifier.verify(&token).unwrap(), account.id);
    }

    #[test]
    fn test_oversized_lifetime_is_an_error() {
        let issuer = TokenIssuer::new(SECRET, Duration::from_secs(u64::MAX));
        assert!(matches!(issuer.issue(&account()), Err(RbacError::Internal(_))));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenIssuer::new(b"other-secret", Duration::from_secs(3600));
        let verifier = JwtVerifier::new(SECRET);

        let token = issuer.issue(&account()).unwrap();
        assert!(matches!(verifier.verify(&token), Err(RbacError::InvalidCredential)));
    }

    #[test]
    fn test_expired_rejected() {
        let issuer = TokenIssuer::new(SECRET, Duration::from_secs(3600));
        let verifier = JwtVerifier::new(SECRET);
        let now = Utc::now().timestamp();

        let token = issuer
            .encode(&Claims {
                sub: Uuid::new_v4().to_string(),
                email: "x@example.com".to_string(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(matches!(verifier.verify(&token), Err(RbacError::InvalidCredential)));
    }

    #[test]
    fn test_malformed_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        for token in ["", "not-a-token", "a.b.c"] {
            assert!(matches!(verifier.verify(token), Err(RbacError::InvalidCredential)));
        }
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let issuer = TokenIssuer::new(SECRET, Duration::from_secs(3600));
        let verifier = JwtVerifier::new(SECRET);
        let now = Utc::now().timestamp();

        let token = issuer
            .encode(&Claims {
                sub: "42".to_string(),
                email: "x@example.com".to_string(),
                iat: now,
                exp: now + 60,
            })
            .unwrap();
        assert!(matches!(verifier.verify(&token), Err(RbacError::InvalidCredential)));
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
