//! Authentication middleware
//!
//! Extractors turning a bearer token into the identity it was issued for.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;

use crate::auth::{AuthService, JwtError};
use crate::error::ApiError;
use crate::models::{EthereumAddress, Role};

/// Identity extracted from a valid bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    pub address: EthereumAddress,
    pub roles: BTreeSet<Role>,
    pub jti: String,
}

impl AuthenticatedIdentity {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Error response for authentication failures
#[derive(Debug, Serialize)]
struct AuthError {
    error: AuthErrorDetails,
}

#[derive(Debug, Serialize)]
struct AuthErrorDetails {
    code: String,
    message: String,
}

impl AuthError {
    fn new(code: &str, message: &str) -> Self {
        Self {
            error: AuthErrorDetails {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// Extractor for authenticated identities
///
/// Verifies the JWT from the Authorization header. Tokens are stateless, so
/// no storage lookup happens here.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(identity: AuthenticatedIdentity) -> impl IntoResponse {
///     format!("Hello, {}", identity.address)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AuthError::new(
                        "MISSING_TOKEN",
                        "Authorization header with Bearer token required",
                    )
                    .into_response()
                })?;

        let auth_service = Arc::<AuthService>::from_ref(state);

        let identity = auth_service.verify_token(bearer.token()).map_err(|e| {
            let (code, message) = match e {
                JwtError::TokenExpired => ("TOKEN_EXPIRED", "Token has expired"),
                _ => ("INVALID_TOKEN", "Invalid token"),
            };
            AuthError::new(code, message).into_response()
        })?;

        Ok(AuthenticatedIdentity {
            address: identity.address,
            roles: identity.roles,
            jti: identity.jti,
        })
    }
}

/// Requires the admin role
pub struct AdminIdentity(pub AuthenticatedIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for AdminIdentity
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = AuthenticatedIdentity::from_request_parts(parts, state).await?;

        if !identity.has_role(Role::Admin) {
            return Err(ApiError::Forbidden("Admin access required".to_string()).into_response());
        }

        Ok(AdminIdentity(identity))
    }
}
