//! Authentication service
//!
//! Core business logic for wallet-based authentication. An attempt runs a
//! fixed pipeline of side-effect-free guards (address in message, nonce in
//! message, signature) followed by one committing step (issue token, rotate
//! nonce). Only the committing step touches storage.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{EthereumAddress, Identity, Nonce, Role};
use crate::repository::{IdentityRepository, RepositoryError};

use super::crypto::{verify_ethereum_signature, CryptoError};
use super::jwt::{JwtError, TokenIdentity, TokenIssuer};
use super::message::{validate_challenge, ChallengeError};
use super::nonce::{NonceError, NonceStore};

/// Why an attempt was rejected. Kept for logs, never shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MalformedChallenge,
    NonceMismatch,
    InvalidSignature,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::MalformedChallenge => "malformed_challenge",
            AuthFailure::NonceMismatch => "nonce_mismatch",
            AuthFailure::InvalidSignature => "invalid_signature",
        }
    }
}

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Same text whatever the cause
    #[error("Authentication failed")]
    AuthenticationFailed(AuthFailure),

    #[error("Identity storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("Token issuance failed: {0}")]
    TokenIssuance(String),
}

impl From<ChallengeError> for AuthError {
    fn from(e: ChallengeError) -> Self {
        match e {
            ChallengeError::MalformedChallenge => {
                AuthError::AuthenticationFailed(AuthFailure::MalformedChallenge)
            }
            ChallengeError::NonceMismatch => {
                AuthError::AuthenticationFailed(AuthFailure::NonceMismatch)
            }
        }
    }
}

impl From<CryptoError> for AuthError {
    fn from(_: CryptoError) -> Self {
        AuthError::AuthenticationFailed(AuthFailure::InvalidSignature)
    }
}

impl From<NonceError> for AuthError {
    fn from(e: NonceError) -> Self {
        match e {
            // Lost a race for the same nonce: indistinguishable from a stale one
            NonceError::NonceMismatch | NonceError::UnknownIdentity(_) => {
                AuthError::AuthenticationFailed(AuthFailure::NonceMismatch)
            }
            NonceError::Storage(e) => AuthError::Storage(e),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        AuthError::TokenIssuance(e.to_string())
    }
}

/// Result of a successful authentication
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub token: String,
    pub address: EthereumAddress,
    pub roles: BTreeSet<Role>,
    pub expires_at: DateTime<Utc>,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    repository: Arc<dyn IdentityRepository>,
    nonce_store: NonceStore,
    token_issuer: TokenIssuer,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(repository: Arc<dyn IdentityRepository>, token_issuer: TokenIssuer) -> Self {
        Self {
            nonce_store: NonceStore::new(repository.clone()),
            repository,
            token_issuer,
        }
    }

    /// Current nonce for `address`, registering the address on first sight
    pub async fn get_nonce(
        &self,
        address: &EthereumAddress,
    ) -> Result<(EthereumAddress, Nonce), AuthError> {
        let identity = self.nonce_store.get_or_create(address).await?;
        Ok((identity.address, identity.nonce))
    }

    /// Exchange a signed challenge for a bearer token
    pub async fn authenticate(
        &self,
        address: &EthereumAddress,
        message: &str,
        signature: &str,
    ) -> Result<AuthenticatedSession, AuthError> {
        let result = self.run_pipeline(address, message, signature).await;

        match &result {
            Ok(_) => tracing::info!(address = %address, "Successful authentication"),
            Err(AuthError::AuthenticationFailed(kind)) => {
                tracing::warn!(address = %address, reason = kind.as_str(), "Authentication rejected")
            }
            Err(e) => tracing::error!(address = %address, error = %e, "Authentication error"),
        }

        result
    }

    async fn run_pipeline(
        &self,
        address: &EthereumAddress,
        message: &str,
        signature: &str,
    ) -> Result<AuthenticatedSession, AuthError> {
        // Unknown addresses are registered with a nonce the client cannot know,
        // so the nonce check below fails closed for them.
        let identity = self.nonce_store.get_or_create(address).await?;

        validate_challenge(message, &identity.address, &identity.nonce)?;
        verify_ethereum_signature(&identity.address, message, signature)?;

        let issued = self.token_issuer.issue(&identity.address, &identity.roles)?;
        self.nonce_store
            .rotate(&identity.address, &identity.nonce)
            .await?;

        Ok(AuthenticatedSession {
            token: issued.token,
            address: identity.address,
            roles: identity.roles,
            expires_at: issued.expires_at,
        })
    }

    /// Verify a bearer token issued by this service
    pub fn verify_token(&self, token: &str) -> Result<TokenIdentity, JwtError> {
        self.token_issuer.verify(token)
    }

    pub async fn get_identity(&self, id: uuid::Uuid) -> Result<Identity, RepositoryError> {
        self.repository.find_by_id(id).await
    }

    pub async fn get_identity_by_address(
        &self,
        address: &EthereumAddress,
    ) -> Result<Identity, RepositoryError> {
        self.repository
            .find_by_address(address)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(address.to_string()))
    }

    pub async fn list_identities(&self) -> Result<Vec<Identity>, RepositoryError> {
        self.repository.find_all().await
    }

    pub async fn count_identities(&self) -> Result<u64, RepositoryError> {
        self.repository.count().await
    }

    /// Get the identity repository (for health checks)
    pub fn repository(&self) -> &Arc<dyn IdentityRepository> {
        &self.repository
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::crypto::test_signing::TestWallet;
    use crate::repository::InMemoryIdentityRepository;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(InMemoryIdentityRepository::new()),
            TokenIssuer::new("test-secret-key", 900),
        )
    }

    fn challenge(nonce: &Nonce, address: &EthereumAddress) -> String {
        format!("Sign in, nonce: {}, address: {}", nonce, address)
    }

    #[tokio::test]
    async fn test_full_handshake() {
        let service = service();
        let wallet = TestWallet::random();

        let (address, nonce) = service.get_nonce(&wallet.address()).await.unwrap();
        let message = challenge(&nonce, &address);
        let signature = wallet.sign(&message);

        let session = service
            .authenticate(&address, &message, &signature)
            .await
            .unwrap();

        assert_eq!(session.address, wallet.address());
        assert_eq!(session.roles, Role::defaults());

        let verified = service.verify_token(&session.token).unwrap();
        assert_eq!(verified.address, wallet.address());

        let (_, next_nonce) = service.get_nonce(&address).await.unwrap();
        assert_ne!(next_nonce, nonce);
    }

    #[tokio::test]
    async fn test_get_nonce_is_idempotent() {
        let service = service();
        let wallet = TestWallet::random();

        let (_, first) = service.get_nonce(&wallet.address()).await.unwrap();
        let (_, second) = service.get_nonce(&wallet.address()).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_replay_is_rejected() {
        let service = service();
        let wallet = TestWallet::random();

        let (address, nonce) = service.get_nonce(&wallet.address()).await.unwrap();
        let message = challenge(&nonce, &address);
        let signature = wallet.sign(&message);

        service
            .authenticate(&address, &message, &signature)
            .await
            .unwrap();
        let replay = service.authenticate(&address, &message, &signature).await;

        assert!(matches!(
            replay,
            Err(AuthError::AuthenticationFailed(AuthFailure::NonceMismatch))
        ));
    }

    #[tokio::test]
    async fn test_address_binding() {
        let service = service();
        let alice = TestWallet::random();
        let bob = TestWallet::random();

        let (alice_address, alice_nonce) = service.get_nonce(&alice.address()).await.unwrap();
        let (bob_address, bob_nonce) = service.get_nonce(&bob.address()).await.unwrap();

        // Mentions Bob's nonce but is bound to, and signed by, Alice
        let message = format!(
            "{} also {}",
            challenge(&alice_nonce, &alice_address),
            bob_nonce
        );
        let signature = alice.sign(&message);

        let result = service.authenticate(&bob_address, &message, &signature).await;
        assert!(matches!(
            result,
            Err(AuthError::AuthenticationFailed(AuthFailure::MalformedChallenge))
        ));
    }

    #[tokio::test]
    async fn test_signature_from_other_wallet() {
        let service = service();
        let victim = TestWallet::random();
        let attacker = TestWallet::random();

        let (address, nonce) = service.get_nonce(&victim.address()).await.unwrap();
        let message = challenge(&nonce, &address);
        let signature = attacker.sign(&message);

        let result = service.authenticate(&address, &message, &signature).await;
        assert!(matches!(
            result,
            Err(AuthError::AuthenticationFailed(AuthFailure::InvalidSignature))
        ));

        // A failed attempt leaves the nonce alone
        let (_, unchanged) = service.get_nonce(&address).await.unwrap();
        assert_eq!(unchanged, nonce);
    }

    #[tokio::test]
    async fn test_unknown_address_fails_closed() {
        let service = service();
        let wallet = TestWallet::random();

        let message = challenge(&Nonce::from("583921"), &wallet.address());
        let signature = wallet.sign(&message);

        let result = service
            .authenticate(&wallet.address(), &message, &signature)
            .await;
        assert!(matches!(
            result,
            Err(AuthError::AuthenticationFailed(AuthFailure::NonceMismatch))
        ));

        // The attempt registered the address
        assert!(service.get_identity_by_address(&wallet.address()).await.is_ok());
    }

    #[tokio::test]
    async fn test_every_previous_nonce_is_dead() {
        let service = service();
        let wallet = TestWallet::random();
        let mut used = Vec::new();

        for _ in 0..5 {
            let (address, nonce) = service.get_nonce(&wallet.address()).await.unwrap();
            let message = challenge(&nonce, &address);
            let signature = wallet.sign(&message);
            service
                .authenticate(&address, &message, &signature)
                .await
                .unwrap();
            used.push((message, signature));
        }

        for (message, signature) in used {
            let result = service
                .authenticate(&wallet.address(), &message, &signature)
                .await;
            assert!(result.is_err());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_attempts_spend_nonce_once() {
        let service = service();
        let wallet = TestWallet::random();

        let (address, nonce) = service.get_nonce(&wallet.address()).await.unwrap();
        let message = challenge(&nonce, &address);
        let signature = wallet.sign(&message);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                let message = message.clone();
                let signature = signature.clone();
                tokio::spawn(async move {
                    service.authenticate(&address, &message, &signature).await
                })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert!(matches!(e, AuthError::AuthenticationFailed(_))),
            }
        }

        assert_eq!(successes, 1);
    }

    #[test]
    fn test_failure_display_hides_reason() {
        let kinds = [
            AuthFailure::MalformedChallenge,
            AuthFailure::NonceMismatch,
            AuthFailure::InvalidSignature,
        ];

        for kind in kinds {
            assert_eq!(
                AuthError::AuthenticationFailed(kind).to_string(),
                "Authentication failed"
            );
        }
    }
}
