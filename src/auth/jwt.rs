//! JWT token generation and validation
//!
//! Tokens are stateless HS256 bearer credentials binding an address to its
//! roles. Nothing about issued tokens is stored server-side.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{EthereumAddress, Role};

/// JWT-related errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (checksummed wallet address)
    pub sub: String,
    /// Role codes
    pub roles: Vec<String>,
    /// JWT ID
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Freshly minted token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Identity carried by a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub address: EthereumAddress,
    pub roles: BTreeSet<Role>,
    pub jti: String,
}

/// Signs and verifies bearer tokens with the process-wide secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    pub fn issue(
        &self,
        address: &EthereumAddress,
        roles: &BTreeSet<Role>,
    ) -> Result<IssuedToken, JwtError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let claims = Claims {
            sub: address.to_checksum(),
            roles: roles.iter().map(|role| role.as_str().to_string()).collect(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<TokenIdentity, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                _ => JwtError::InvalidToken(e.to_string()),
            }
        })?;

        let claims = token_data.claims;

        let address = EthereumAddress::parse(&claims.sub)
            .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

        let roles = claims
            .roles
            .iter()
            .map(|code| {
                Role::parse(code)
                    .ok_or_else(|| JwtError::InvalidToken(format!("Unknown role {}", code)))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(TokenIdentity {
            address,
            roles,
            jti: claims.jti,
        })
    }
}
