//! Per-identity one-time nonces

use std::sync::Arc;

use thiserror::Error;

use crate::models::{EthereumAddress, Identity, Nonce, Role};
use crate::repository::{IdentityRepository, RepositoryError};

#[derive(Error, Debug)]
pub enum NonceError {
    /// The stored nonce moved on since it was read
    #[error("Nonce has already been consumed")]
    NonceMismatch,

    #[error("No identity registered for {0}")]
    UnknownIdentity(EthereumAddress),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

/// Issues and rotates nonces on top of the identity repository
#[derive(Clone)]
pub struct NonceStore {
    repository: Arc<dyn IdentityRepository>,
}

impl NonceStore {
    pub fn new(repository: Arc<dyn IdentityRepository>) -> Self {
        Self { repository }
    }

    /// Existing identity, or a new one with a fresh nonce and the default role
    pub async fn get_or_create(&self, address: &EthereumAddress) -> Result<Identity, NonceError> {
        if let Some(identity) = self.repository.find_by_address(address).await? {
            return Ok(identity);
        }

        let identity = self
            .repository
            .find_or_create(Identity::new(*address, Role::defaults()))
            .await?;

        tracing::info!(address = %identity.address, "Registered new identity");
        Ok(identity)
    }

    /// Replace `consumed` with a fresh nonce.
    ///
    /// Fails with [`NonceError::NonceMismatch`] if another caller already
    /// rotated it, so each nonce backs at most one successful authentication.
    pub async fn rotate(
        &self,
        address: &EthereumAddress,
        consumed: &Nonce,
    ) -> Result<Nonce, NonceError> {
        let replacement = Nonce::generate_after(consumed);

        if self
            .repository
            .compare_and_set_nonce(address, consumed, &replacement)
            .await?
        {
            tracing::debug!(address = %address, "Nonce rotated");
            return Ok(replacement);
        }

        match self.repository.find_by_address(address).await? {
            Some(_) => Err(NonceError::NonceMismatch),
            None => Err(NonceError::UnknownIdentity(*address)),
        }
    }
}
