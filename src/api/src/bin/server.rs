//! CRM REST API Server
//!
//! Usage: `crm-api-server [--reseed-roles]`
//!
//! `--reseed-roles` deletes every role, recreates the canonical set and
//! exits.

use anyhow::Context;
use crm_api::{
    build_router, middleware::cors_layer, permissions, rate_limit::RateLimitConfig, ApiConfig, AppState,
};
use crm_rbac::{
    initialize_roles, reseed_roles, seed::verify_route_coverage, AccountStore,
    InMemoryAccountStore, InMemoryRoleRegistry, RbacConfig, RoleRegistry, SeedOutcome,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ApiConfig::from_env()?;
    let rbac_config = RbacConfig::from_env().context("Invalid RBAC configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},crm_api=debug,crm_rbac=debug", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if rbac_config.jwt_secret == RbacConfig::default().jwt_secret {
        warn!("JWT_SECRET not set, using the development default");
    }

    let (accounts, roles) = stores(&config).await?;

    if std::env::args().any(|arg| arg == "--reseed-roles") {
        let seeded = reseed_roles(roles.as_ref()).await?;
        info!("Reseeded {} roles", seeded.len());
        return Ok(());
    }

    match initialize_roles(roles.as_ref()).await {
        SeedOutcome::Seeded(n) => info!("Seeded {} default roles", n),
        SeedOutcome::AlreadyPresent(n) => info!("Roles already initialized ({} present)", n),
        SeedOutcome::Failed(reason) => error!("Continuing without role bootstrap: {}", reason),
    }

    match roles.list_roles().await {
        Ok(existing) => {
            for gap in verify_route_coverage(&existing, &permissions::probed_pairs(), rbac_config.super_role) {
                warn!(
                    "Role '{}' has no {:?} entry for {}.{}",
                    gap.role, gap.lookup, gap.resource, gap.action
                );
            }
        }
        Err(e) => warn!("Skipping route coverage check: {}", e),
    }

    let state = AppState::new(rbac_config, accounts, roles)?
        .with_rate_limits(RateLimitConfig::auth(), config.api_rate_limit());
    let app = build_router(state).layer(cors_layer(config.cors_origin.as_deref()));

    let bind_addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("CRM API Server listening on http://{}", listener.local_addr()?);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(feature = "postgres")]
async fn stores(config: &ApiConfig) -> anyhow::Result<(Arc<dyn AccountStore>, Arc<dyn RoleRegistry>)> {
    use crm_rbac::{postgres, PostgresAccountStore, PostgresRoleRegistry};

    let Some(url) = config.database_url.as_deref() else {
        return Ok(in_memory_stores());
    };

    let pool = postgres::connect(url).await?;
    postgres::ensure_schema(&pool).await?;
    info!("Connected to PostgreSQL");

    Ok((
        Arc::new(PostgresAccountStore::new(pool.clone())),
        Arc::new(PostgresRoleRegistry::new(pool)),
    ))
}

#[cfg(not(feature = "postgres"))]
async fn stores(config: &ApiConfig) -> anyhow::Result<(Arc<dyn AccountStore>, Arc<dyn RoleRegistry>)> {
    if config.database_url.is_some() {
        warn!("DATABASE_URL ignored: built without the postgres feature");
    }
    Ok(in_memory_stores())
}

fn in_memory_stores() -> (Arc<dyn AccountStore>, Arc<dyn RoleRegistry>) {
    warn!("No DATABASE_URL, using in-memory stores");
    let roles: Arc<dyn RoleRegistry> = Arc::new(InMemoryRoleRegistry::new());
    let accounts: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::new(roles.clone()));
    (accounts, roles)
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
