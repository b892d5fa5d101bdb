//! Wallet Authentication Server
//!
//! Issues one-time nonces to Ethereum wallets and exchanges signed challenges
//! for JWT bearer tokens.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use wallet_auth_server::auth::{AuthService, TokenIssuer};
use wallet_auth_server::config::Config;
use wallet_auth_server::repository::{
    bootstrap_admins, IdentityRepository, InMemoryIdentityRepository, PostgresIdentityRepository,
};
use wallet_auth_server::state::AppState;
use wallet_auth_server::{db, middleware, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting wallet auth server");

    let repository = create_repository(&config).await?;

    let created = bootstrap_admins(repository.as_ref(), &config.admin_addresses)
        .await
        .context("Failed to bootstrap admin identities")?;
    if created > 0 {
        tracing::info!(created, "Admin identities bootstrapped");
    }

    let token_issuer = TokenIssuer::new(&config.jwt_secret, config.jwt_token_ttl_seconds);
    let auth_service = Arc::new(AuthService::new(repository, token_issuer));
    let app_state = AppState::new(auth_service);

    let mut app = routes::app_router(app_state).layer(configure_cors(&config));
    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Postgres when `DATABASE_URL` is set, otherwise an in-memory store
async fn create_repository(config: &Config) -> anyhow::Result<Arc<dyn IdentityRepository>> {
    match config.database_url_masked() {
        Some(masked) => {
            tracing::info!(database = %masked, "Using PostgreSQL identity store");

            let pool = db::create_pool(config).await?;
            db::check_health(&pool).await?;
            db::run_migrations(&pool).await?;

            Ok(Arc::new(PostgresIdentityRepository::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, identities are kept in memory only");
            Ok(Arc::new(InMemoryIdentityRepository::new()))
        }
    }
}

fn configure_cors(config: &Config) -> CorsLayer {
    let allowed_origins_str = config.cors_allowed_origins.clone().unwrap_or_default();

    if allowed_origins_str.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
