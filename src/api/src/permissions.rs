//! Route permission table for the CRM business routes
//!
//! The leads, deals, tasks and reports handlers live outside this crate.
//! Their guards are listed here so the server can check at startup that
//! every role defines every leaf the routes probe.

use axum::http::Method;
use crm_rbac::{Action, Resource};

/// One guarded route: (method, path) → (resource, action)
#[derive(Debug, Clone)]
pub struct RoutePermission {
    pub method: &'static str,
    pub path: &'static str,
    pub resource: Resource,
    pub action: Action,
}

const fn route(method: &'static str, path: &'static str, resource: Resource, action: Action) -> RoutePermission {
    RoutePermission {
        method,
        path,
        resource,
        action,
    }
}

pub const ROUTE_PERMISSIONS: &[RoutePermission] = &[
    // Leads
    route("GET", "/api/leads", Resource::Leads, Action::Read),
    route("GET", "/api/leads/statistics", Resource::Leads, Action::Read),
    route("POST", "/api/leads", Resource::Leads, Action::Create),
    route("GET", "/api/leads/:id", Resource::Leads, Action::Read),
    route("PUT", "/api/leads/:id", Resource::Leads, Action::Update),
    route("DELETE", "/api/leads/:id", Resource::Leads, Action::Delete),
    // Deals
    route("GET", "/api/deals", Resource::Deals, Action::Read),
    route("GET", "/api/deals/pipeline/summary", Resource::Deals, Action::Read),
    route("POST", "/api/deals", Resource::Deals, Action::Create),
    route("GET", "/api/deals/:id", Resource::Deals, Action::Read),
    route("PUT", "/api/deals/:id", Resource::Deals, Action::Update),
    route("DELETE", "/api/deals/:id", Resource::Deals, Action::Delete),
    // Tasks
    route("GET", "/api/tasks", Resource::Tasks, Action::Read),
    route("GET", "/api/tasks/statistics", Resource::Tasks, Action::Read),
    route("POST", "/api/tasks", Resource::Tasks, Action::Create),
    route("GET", "/api/tasks/:id", Resource::Tasks, Action::Read),
    route("PUT", "/api/tasks/:id", Resource::Tasks, Action::Update),
    route("PATCH", "/api/tasks/:id/complete", Resource::Tasks, Action::Update),
    route("POST", "/api/tasks/:id/notes", Resource::Tasks, Action::Update),
    route("DELETE", "/api/tasks/:id", Resource::Tasks, Action::Delete),
    // Reports
    route("GET", "/api/reports/dashboard", Resource::Reports, Action::Read),
    route("GET", "/api/reports/pipeline", Resource::Reports, Action::Read),
    route("GET", "/api/reports/conversion", Resource::Reports, Action::Read),
    route("GET", "/api/reports/deals", Resource::Reports, Action::Read),
    route("GET", "/api/reports/team", Resource::Reports, Action::Read),
];

/// Distinct (resource, action) pairs probed by the route table and by
/// the routes this crate guards itself
pub fn probed_pairs() -> Vec<(Resource, Action)> {
    let mut pairs: Vec<(Resource, Action)> = ROUTE_PERMISSIONS
        .iter()
        .map(|r| (r.resource, r.action))
        .chain([
            (Resource::Users, Action::Read),
            (Resource::Users, Action::Update),
            (Resource::Users, Action::Delete),
            (Resource::Settings, Action::Manage),
        ])
        .collect();
    pairs.sort();
    pairs.dedup();
    pairs
}

/// Guard for a business route, if listed
pub fn lookup(method: &Method, path: &str) -> Option<&'static RoutePermission> {
    ROUTE_PERMISSIONS
        .iter()
        .find(|r| r.method == method.as_str() && r.path == path)
}
