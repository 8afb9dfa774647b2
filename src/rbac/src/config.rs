//! RBAC configuration

use crate::error::{RbacError, Result};
use crate::role::RoleName;
use serde::Deserialize;
use std::time::Duration;

/// One year
pub const MAX_LOCKOUT_MINUTES: i64 = 525_600;

/// Authentication and authorization settings
#[derive(Debug, Clone, Deserialize)]
pub struct RbacConfig {
    /// HS256 signing secret
    pub jwt_secret: String,

    /// Token lifetime, e.g. "7d", "12h", "30m", "45s"
    pub jwt_expiry: String,

    /// bcrypt cost factor
    pub bcrypt_cost: u32,

    /// Role assigned by registration and self-heal
    pub default_role: RoleName,

    /// Role that bypasses the permission matrix
    pub super_role: RoleName,

    /// Failed logins before the account is locked
    pub max_failed_logins: u32,

    /// Lockout length in minutes
    pub lockout_minutes: i64,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "your-secret-key".to_string(),
            jwt_expiry: "7d".to_string(),
            bcrypt_cost: 10,
            default_role: RoleName::SalesRep,
            super_role: RoleName::Admin,
            max_failed_logins: 5,
            lockout_minutes: 30,
        }
    }
}

impl RbacConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(secret) = lookup("JWT_SECRET") {
            config.jwt_secret = secret;
        }
        if let Some(expiry) = lookup("JWT_EXPIRY") {
            parse_duration(&expiry)?;
            config.jwt_expiry = expiry;
        }
        if let Some(rounds) = lookup("BCRYPT_ROUNDS") {
            config.bcrypt_cost = parse_number("BCRYPT_ROUNDS", &rounds)?;
        }
        if let Some(role) = lookup("DEFAULT_ROLE") {
            config.default_role = role
                .parse()
                .map_err(|_| RbacError::Validation(format!("DEFAULT_ROLE: unknown role '{}'", role)))?;
        }
        if let Some(max) = lookup("MAX_FAILED_LOGINS") {
            config.max_failed_logins = parse_number("MAX_FAILED_LOGINS", &max)?;
        }
        if let Some(minutes) = lookup("LOCKOUT_MINUTES") {
            config.lockout_minutes = parse_number("LOCKOUT_MINUTES", &minutes)?;
            if !(1..=MAX_LOCKOUT_MINUTES).contains(&config.lockout_minutes) {
                return Err(RbacError::Validation(format!(
                    "LOCKOUT_MINUTES: must be between 1 and {}",
                    MAX_LOCKOUT_MINUTES
                )));
            }
        }

        Ok(config)
    }

    /// Token lifetime as a duration
    pub fn token_ttl(&self) -> Result<Duration> {
        parse_duration(&self.jwt_expiry)
    }

    /// Lockout length, or `None` when outside 1..=MAX_LOCKOUT_MINUTES
    pub fn lockout(&self) -> Option<chrono::Duration> {
        if !(1..=MAX_LOCKOUT_MINUTES).contains(&self.lockout_minutes) {
            return None;
        }
        chrono::Duration::try_minutes(self.lockout_minutes)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RbacError::Validation(format!("{}: invalid number '{}'", key, value)))
}

/// Parse "<n><unit>" with unit one of d, h, m, s; a bare number is seconds
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let invalid = || RbacError::Validation(format!("invalid duration '{}'", value));

    let (digits, multiplier) = match value.char_indices().last() {
        Some((i, 'd')) => (&value[..i], 86_400),
        Some((i, 'h')) => (&value[..i], 3_600),
        Some((i, 'm')) => (&value[..i], 60),
        Some((i, 's')) => (&value[..i], 1),
        Some(_) => (value, 1),
        None => return Err(invalid()),
    };

    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid());
    }
    let seconds = amount.checked_mul(multiplier).ok_or_else(invalid)?;
    Ok(Duration::from_secs(seconds))
}
