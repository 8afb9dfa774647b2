//! CRM REST API
//!
//! HTTP surface over the CRM RBAC core.
//!
//! ## Features
//!
//! - **Authentication**: bearer JWT resolved into a principal on every
//!   protected request, with default-role self-heal
//! - **Per-route authorization**: `require(resource, action)` guards run
//!   the gate before the handler
//! - **Accounts**: registration, login with lockout, profile, role
//!   assignment
//! - **Rate limiting**: per-address limits on failed sign-ins and on all
//!   API traffic
//! - **Metrics**: decision counters in Prometheus text format

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod permissions;
pub mod rate_limit;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use crm_rbac::{Action, Resource};
use middleware::{authenticate, require};
use rate_limit::rate_limit;
use tower_http::trace::TraceLayer;

/// Build the API router with all routes and middleware
///
/// CORS is left to the caller (see [`middleware::cors_layer`]).
pub fn build_router(state: AppState) -> Router {
    let guard = |resource, action| from_fn_with_state(state.clone(), require(resource, action));

    // Authenticated routes; guards run after `authenticate`
    let protected = Router::new()
        .route(
            "/api/auth/profile",
            get(handlers::auth::get_profile).put(handlers::auth::update_profile),
        )
        .route("/api/auth/change-password", post(handlers::auth::change_password))
        .route("/v1/check", post(handlers::check::check))
        .route(
            "/api/roles",
            get(handlers::roles::list_roles).route_layer(guard(Resource::Users, Action::Read)),
        )
        .route(
            "/api/roles/reseed",
            post(handlers::roles::reseed).route_layer(guard(Resource::Settings, Action::Manage)),
        )
        .route(
            "/api/users/:id/role",
            put(handlers::users::assign_role).route_layer(guard(Resource::Users, Action::Update)),
        )
        .route(
            "/api/users/:id",
            delete(handlers::users::delete_user).route_layer(guard(Resource::Users, Action::Delete)),
        )
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    // Failed register/login attempts are limited on their own
    let auth_limit = || from_fn_with_state(state.auth_limit.clone(), rate_limit);
    let api = Router::new()
        .route(
            "/api/auth/register",
            post(handlers::auth::register).route_layer(auth_limit()),
        )
        .route("/api/auth/login", post(handlers::auth::login).route_layer(auth_limit()))
        .merge(protected)
        .layer(from_fn_with_state(state.api_limit.clone(), rate_limit));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::metrics))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
