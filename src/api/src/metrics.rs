//! Prometheus metrics for the authorization decisions

use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

const NAMESPACE: &str = "crm";

/// Decision counters exposed at `/metrics`
pub struct ApiMetrics {
    /// Gate checks that allowed the request
    pub allowed: IntCounter,

    /// Gate checks that denied the request
    pub denied: IntCounter,

    /// Bearer credentials that did not resolve to a principal
    pub resolve_failures: IntCounter,

    /// Requests refused by a rate limiter
    pub rate_limited: IntCounter,

    /// Seconds since start, set on every scrape
    uptime: IntGauge,

    registry: Registry,
}

impl ApiMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let allowed = counter(&registry, "authz_allowed_total", "Authorization checks allowed")?;
        let denied = counter(&registry, "authz_denied_total", "Authorization checks denied")?;
        let resolve_failures = counter(
            &registry,
            "principal_resolve_failures_total",
            "Failed principal resolutions",
        )?;
        let rate_limited = counter(&registry, "rate_limited_total", "Requests refused by a rate limiter")?;

        let uptime = IntGauge::with_opts(Opts::new("uptime_seconds", "Server uptime").namespace(NAMESPACE))?;
        registry.register(Box::new(uptime.clone()))?;

        Ok(Self {
            allowed,
            denied,
            resolve_failures,
            rate_limited,
            uptime,
            registry,
        })
    }

    pub fn record_allowed(&self) {
        self.allowed.inc();
    }

    pub fn record_denied(&self) {
        self.denied.inc();
    }

    pub fn record_resolve_failure(&self) {
        self.resolve_failures.inc();
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.inc();
    }

    /// Export in Prometheus text format
    pub fn render(&self, uptime_seconds: u64) -> prometheus::Result<String> {
        self.uptime.set(i64::try_from(uptime_seconds).unwrap_or(i64::MAX));

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_counters() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.record_allowed();
        metrics.record_allowed();
        metrics.record_denied();
        metrics.record_rate_limited();

        let text = metrics.render(42).unwrap();
        assert!(text.contains("# TYPE crm_authz_allowed_total counter"));
        assert!(text.contains("crm_authz_allowed_total 2"));
        assert!(text.contains("crm_authz_denied_total 1"));
        assert!(text.contains("crm_principal_resolve_failures_total 0"));
        assert!(text.contains("crm_rate_limited_total 1"));
        assert!(text.contains("crm_uptime_seconds 42"));
    }

    #[test]
    fn test_instances_are_independent() {
        let first = ApiMetrics::new().unwrap();
        let second = ApiMetrics::new().unwrap();
        first.record_denied();

        assert_eq!(first.denied.get(), 1);
        assert_eq!(second.denied.get(), 0);
    }
}
