//! Per-IP sliding-window rate limiting
//!
//! Two limiters guard the API:
//!
//! - **auth**: register and login; only failed responses count, so a
//!   client that keeps getting its password wrong is cut off while normal
//!   sign-ins never are
//! - **api**: every `/api` and `/v1` request counts
//!
//! Requests without a peer address (no `ConnectInfo`) share one bucket
//! keyed on the unspecified address.

use crate::{error::ApiError, metrics::ApiMetrics};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

/// Limiter settings
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per window and address
    pub max_requests: u32,

    /// Sliding window length
    pub window: Duration,

    /// Count only responses with a 4xx or 5xx status
    pub skip_successful: bool,

    /// Distinct addresses tracked at once
    pub max_tracked_ips: usize,

    /// Body message for refused requests
    pub message: String,
}

impl RateLimitConfig {
    /// 5 failed register/login attempts per 15 minutes
    pub fn auth() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(15 * 60),
            skip_successful: true,
            max_tracked_ips: 10_000,
            message: "Too many login attempts, please try again later".to_string(),
        }
    }

    /// General limit for the API routes
    pub fn api(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            skip_successful: false,
            max_tracked_ips: 10_000,
            message: "Too many requests, please try again later".to_string(),
        }
    }
}

/// In-memory sliding-window limiter keyed by client address
pub struct RateLimiter {
    config: RateLimitConfig,
    hits: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or refuse a request from `ip` at `now`
    ///
    /// Unless only failures count, an admitted request is recorded here.
    pub fn try_acquire(&self, ip: IpAddr, now: Instant) -> bool {
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        let cutoff = now.checked_sub(self.config.window);

        if !hits.contains_key(&ip) && hits.len() >= self.config.max_tracked_ips {
            hits.retain(|_, stamps| {
                stamps.retain(|t| cutoff.map_or(true, |c| *t > c));
                !stamps.is_empty()
            });
            if hits.len() >= self.config.max_tracked_ips {
                warn!(tracked = hits.len(), "Rate limiter full, refusing new address");
                return false;
            }
        }

        let stamps = hits.entry(ip).or_default();
        stamps.retain(|t| cutoff.map_or(true, |c| *t > c));
        if stamps.len() >= self.config.max_requests as usize {
            return false;
        }

        if !self.config.skip_successful {
            stamps.push(now);
        }
        true
    }

    /// Count a failed response against `ip`
    pub fn record_failure(&self, ip: IpAddr, now: Instant) {
        if self.config.skip_successful {
            let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
            hits.entry(ip).or_default().push(now);
        }
    }
}

/// Limiter plus the counters it reports to
#[derive(Clone)]
pub struct Limit {
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<ApiMetrics>,
}

/// Middleware applying one limiter
///
/// ```ignore
/// post(login).route_layer(from_fn_with_state(limit, rate_limit))
/// ```
pub async fn rate_limit(State(limit): State<Limit>, request: Request, next: Next) -> Result<Response, ApiError> {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !limit.limiter.try_acquire(ip, Instant::now()) {
        limit.metrics.record_rate_limited();
        warn!(ip = %ip, uri = %request.uri(), "Rate limit exceeded");
        return Err(ApiError::TooManyRequests(limit.limiter.config().message.clone()));
    }

    let response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        limit.limiter.record_failure(ip, Instant::now());
    }
    Ok(response)
}
