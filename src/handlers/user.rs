//! Identity lookup handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{AdminIdentity, AuthenticatedIdentity};
use crate::models::{CountResponse, IdentityResponse};
use crate::state::AppState;

/// GET /api/users/me - Identity behind the bearer token
pub async fn get_current_identity(
    State(state): State<AppState>,
    caller: AuthenticatedIdentity,
) -> Result<Json<IdentityResponse>, ApiError> {
    let identity = state
        .auth_service
        .get_identity_by_address(&caller.address)
        .await?;

    Ok(Json(identity.into()))
}

/// GET /api/users/:id
pub async fn get_identity(
    State(state): State<AppState>,
    _caller: AuthenticatedIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let identity = state.auth_service.get_identity(id).await?;
    Ok(Json(identity.into()))
}

/// GET /api/users - Every identity (admin only)
pub async fn list_identities(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
) -> Result<Json<Vec<IdentityResponse>>, ApiError> {
    let identities = state.auth_service.list_identities().await?;
    Ok(Json(identities.into_iter().map(Into::into).collect()))
}

/// GET /api/users/count (admin only)
pub async fn count_identities(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.auth_service.count_identities().await?;
    Ok(Json(CountResponse { count }))
}
