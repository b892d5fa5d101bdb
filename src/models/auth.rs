//! Request/response bodies for the auth and identity endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{EthereumAddress, Role};

/// Query for `GET /api/auth/nonce`
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NonceQuery {
    #[validate(custom = "validate_ethereum_address")]
    pub ethereum_address: String,
}

/// Current nonce for an address
#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    pub address: EthereumAddress,
    pub nonce: String,
}

/// Body of `POST /api/auth`
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationRequest {
    #[validate(custom = "validate_ethereum_address")]
    pub ethereum_address: String,
    #[validate(length(min = 1, message = "message must not be empty"))]
    pub message: String,
    #[validate(length(min = 1, message = "signature must not be empty"))]
    pub signature: String,
}

/// Successful authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    pub token: String,
    pub address: EthereumAddress,
}

/// Identity as exposed over the API (never includes the nonce)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    pub id: Uuid,
    pub address: EthereumAddress,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Fixed-format check: `0x` followed by 40 hex digits
pub fn validate_ethereum_address(value: &str) -> Result<(), ValidationError> {
    EthereumAddress::parse(value).map(|_| ()).map_err(|e| {
        let mut error = ValidationError::new("ethereum_address");
        error.message = Some(e.to_string().into());
        error
    })
}
