use crate::metrics::ApiMetrics;
use crate::rate_limit::{Limit, RateLimitConfig, RateLimiter};
use crm_rbac::{
    AccountStore, AuthService, AuthorizationGate, JwtVerifier, PrincipalResolver, RbacConfig,
    RbacError, RoleRegistry, TokenIssuer,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Bearer credential → principal
    pub resolver: Arc<PrincipalResolver>,

    /// Per-route permission decisions
    pub gate: AuthorizationGate,

    /// Registration, login and account management
    pub auth: Arc<AuthService>,

    /// Role catalog
    pub roles: Arc<dyn RoleRegistry>,

    /// Decision counters
    pub metrics: Arc<ApiMetrics>,

    /// Failed register/login attempts per address
    pub auth_limit: Limit,

    /// All API requests per address
    pub api_limit: Limit,

    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    /// Wire the RBAC components over the given stores
    pub fn new(
        config: RbacConfig,
        accounts: Arc<dyn AccountStore>,
        roles: Arc<dyn RoleRegistry>,
    ) -> crm_rbac::Result<Self> {
        let secret = config.jwt_secret.as_bytes();
        let issuer = Arc::new(TokenIssuer::new(secret, config.token_ttl()?));
        let resolver = PrincipalResolver::new(
            Arc::new(JwtVerifier::new(secret)),
            accounts.clone(),
            roles.clone(),
            config.default_role,
        );
        let gate = AuthorizationGate::new(config.super_role);
        let auth = AuthService::new(accounts, roles.clone(), issuer, config);
        let metrics = ApiMetrics::new()
            .map_err(|e| RbacError::Internal(format!("Failed to register metrics: {}", e)))?;
        let metrics = Arc::new(metrics);

        Ok(Self {
            resolver: Arc::new(resolver),
            gate,
            auth: Arc::new(auth),
            roles,
            auth_limit: limit(RateLimitConfig::auth(), &metrics),
            api_limit: limit(RateLimitConfig::api(100, Duration::from_secs(15 * 60)), &metrics),
            metrics,
            start_time: Instant::now(),
        })
    }

    /// Replace both rate limiters
    pub fn with_rate_limits(mut self, auth: RateLimitConfig, api: RateLimitConfig) -> Self {
        self.auth_limit = limit(auth, &self.metrics);
        self.api_limit = limit(api, &self.metrics);
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

fn limit(config: RateLimitConfig, metrics: &Arc<ApiMetrics>) -> Limit {
    Limit {
        limiter: Arc::new(RateLimiter::new(config)),
        metrics: metrics.clone(),
    }
}
