//! Liveness endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::repository::RepositoryError;
use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    storage: String,
    version: String,
}

impl HealthResponse {
    /// Storage failures are logged, never echoed to the caller
    fn from_probe(probe: Result<u64, RepositoryError>) -> Self {
        let (status, storage) = match probe {
            Ok(_) => ("healthy", "connected"),
            Err(e) => {
                tracing::error!(error = %e, "Health check storage probe failed");
                ("unhealthy", "unavailable")
            }
        };

        Self {
            status: status.to_string(),
            storage: storage.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let probe = state.auth_service.repository().count().await;
    Json(HealthResponse::from_probe(probe))
}
