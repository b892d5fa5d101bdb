//! Authentication HTTP handlers
//!
//! Endpoints for wallet-based authentication.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use validator::Validate;

use crate::error::ApiError;
use crate::models::{
    AuthenticationRequest, AuthenticationResponse, EthereumAddress, NonceQuery, NonceResponse,
};
use crate::state::AppState;

fn parse_address(raw: &str) -> Result<EthereumAddress, ApiError> {
    EthereumAddress::parse(raw).map_err(|e| ApiError::ValidationError(e.to_string()))
}

/// GET /api/auth/nonce - Current nonce for an address
pub async fn get_nonce(
    State(state): State<AppState>,
    query: Result<Query<NonceQuery>, QueryRejection>,
) -> Result<Json<NonceResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    query.validate()?;
    let address = parse_address(&query.ethereum_address)?;

    tracing::info!(address = %address, "Nonce request");

    let (address, nonce) = state.auth_service.get_nonce(&address).await?;

    Ok(Json(NonceResponse {
        address,
        nonce: nonce.to_string(),
    }))
}

/// POST /api/auth - Exchange a signed challenge for a token
pub async fn authenticate(
    State(state): State<AppState>,
    request: Result<Json<AuthenticationRequest>, JsonRejection>,
) -> Result<Json<AuthenticationResponse>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    request.validate()?;
    let address = parse_address(&request.ethereum_address)?;

    tracing::info!(address = %address, "Authentication request");

    let session = state
        .auth_service
        .authenticate(&address, &request.message, &request.signature)
        .await?;

    Ok(Json(AuthenticationResponse {
        token: session.token,
        address: session.address,
    }))
}
