//! Route definitions for the wallet authentication API

mod auth;
mod user;

use axum::{routing::get, Router};

use crate::handlers::health_check;
use crate::middleware;
use crate::state::AppState;

pub use auth::auth_routes;
pub use user::user_routes;

/// Every API route with the tracing and security-header layers applied.
///
/// CORS and HSTS depend on deployment settings and are layered on in `main`.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes())
        .merge(user_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
}
