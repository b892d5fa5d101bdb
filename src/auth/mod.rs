//! Authentication module
//!
//! Provides wallet-based authentication using Ethereum addresses.
//! - Challenge-response authentication with per-identity nonces
//! - EIP-191 signature recovery
//! - Stateless JWT bearer tokens

mod crypto;
mod jwt;
mod message;
mod nonce;
mod service;

pub use crypto::{recover_signer, verify_ethereum_signature, CryptoError};
pub use jwt::{Claims, IssuedToken, JwtError, TokenIdentity, TokenIssuer};
pub use message::{validate_address, validate_challenge, validate_nonce, ChallengeError};
pub use nonce::{NonceError, NonceStore};
pub use service::{AuthError, AuthFailure, AuthService, AuthenticatedSession};
