//! Identity route definitions

use axum::{routing::get, Router};

use crate::handlers::user::{count_identities, get_current_identity, get_identity, list_identities};
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_identities))
        .route("/api/users/me", get(get_current_identity))
        .route("/api/users/count", get(count_identities))
        .route("/api/users/:id", get(get_identity))
}
