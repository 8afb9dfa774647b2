//! Authentication and authorization middleware
//!
//! `authenticate` resolves the bearer credential into a [`Principal`] and
//! stores it in request extensions. `require` runs the gate for one
//! (resource, action) pair before the handler; on denial the handler
//! never runs.

use crate::{error::ApiError, state::AppState};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use crm_rbac::{Action, Principal, Resource};
use std::future::Future;
use std::pin::Pin;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, warn};

type GuardFuture = Pin<Box<dyn Future<Output = Result<Response, ApiError>> + Send>>;

/// Resolve the principal from the `Authorization` header
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let principal = state
        .resolver
        .resolve_header(header.as_deref())
        .await
        .map_err(|e| {
            // The resolver already logged the reason
            state.metrics.record_resolve_failure();
            debug!(uri = %request.uri(), "Authentication rejected: {}", e);
            e
        })?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Guard a route on one (resource, action) pair
///
/// ```ignore
/// get(handler).route_layer(from_fn_with_state(state, require(Resource::Users, Action::Read)))
/// ```
pub fn require(
    resource: Resource,
    action: Action,
) -> impl Fn(State<AppState>, Request, Next) -> GuardFuture + Clone + Send + Sync + 'static {
    move |State(state), request, next| Box::pin(authorize(state, resource, action, request, next))
}

async fn authorize(
    state: AppState,
    resource: Resource,
    action: Action,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = request.extensions().get::<Principal>();
    let account = principal.map(|p| p.account.id);
    let decision = state.gate.check(principal, resource, action);

    match decision {
        Ok(grant) => {
            state.metrics.record_allowed();
            debug!(resource = %resource, action = %action, ?grant, "Access granted");
            Ok(next.run(request).await)
        }
        Err(err) => {
            state.metrics.record_denied();
            warn!(
                account = ?account,
                resource = %resource,
                action = %action,
                "Access denied: {}",
                err
            );
            Err(err.into())
        }
    }
}

/// CORS for the configured origin, or any origin when unset
pub fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(_)) => {
            warn!("Invalid CORS origin, allowing any origin");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600))
}
