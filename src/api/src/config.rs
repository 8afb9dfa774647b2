//! API configuration

use crate::rate_limit::RateLimitConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// PostgreSQL URL; in-memory stores when unset
    pub database_url: Option<String>,

    /// Allowed CORS origin; any origin when unset
    pub cors_origin: Option<String>,

    /// General API rate limit window in milliseconds
    pub rate_limit_window_ms: u64,

    /// Requests per address per window
    pub rate_limit_max_requests: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            log_level: "info".to_string(),
            database_url: None,
            cors_origin: None,
            rate_limit_window_ms: 15 * 60 * 1000,
            rate_limit_max_requests: 100,
        }
    }
}

impl ApiConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid PORT '{}'", port))?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }
        config.database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        config.cors_origin = lookup("CORS_ORIGIN").filter(|origin| !origin.is_empty());

        if let Some(window) = lookup("RATE_LIMIT_WINDOW_MS") {
            config.rate_limit_window_ms = window
                .parse()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| anyhow::anyhow!("Invalid RATE_LIMIT_WINDOW_MS '{}'", window))?;
        }
        if let Some(max) = lookup("RATE_LIMIT_MAX_REQUESTS") {
            config.rate_limit_max_requests = max
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("Invalid RATE_LIMIT_MAX_REQUESTS '{}'", max))?;
        }

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// General limiter for the API routes
    pub fn api_rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::api(
            self.rate_limit_max_requests,
            Duration::from_millis(self.rate_limit_window_ms),
        )
    }
}
