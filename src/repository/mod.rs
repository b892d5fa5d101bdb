//! Identity persistence
//!
//! The auth core only talks to storage through [`IdentityRepository`]. Two
//! implementations ship with the server:
//! - [`PostgresIdentityRepository`] for deployments with `DATABASE_URL`
//! - [`InMemoryIdentityRepository`] for development and tests

mod memory;
mod postgres;

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{EthereumAddress, Identity, Nonce, Role};

pub use memory::InMemoryIdentityRepository;
pub use postgres::PostgresIdentityRepository;

/// Storage errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Identity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt identity record: {0}")]
    CorruptRecord(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Lookup by primary key, `NotFound` when absent
    async fn find_by_id(&self, id: Uuid) -> Result<Identity, RepositoryError>;

    async fn find_by_address(
        &self,
        address: &EthereumAddress,
    ) -> Result<Option<Identity>, RepositoryError>;

    /// Returns the stored identity for `address`, inserting `candidate` if there
    /// is none. Concurrent callers for the same address observe one identity.
    async fn find_or_create(&self, candidate: Identity) -> Result<Identity, RepositoryError>;

    /// Replaces the nonce only if the stored one still equals `expected`.
    ///
    /// Returns `false` when the identity is missing or the nonce has moved on.
    async fn compare_and_set_nonce(
        &self,
        address: &EthereumAddress,
        expected: &Nonce,
        replacement: &Nonce,
    ) -> Result<bool, RepositoryError>;

    /// Insert or overwrite by address
    async fn save(&self, identity: &Identity) -> Result<(), RepositoryError>;

    async fn count(&self) -> Result<u64, RepositoryError>;

    /// Up to `n` distinct identities chosen at random
    async fn random_sample(&self, n: usize) -> Result<Vec<Identity>, RepositoryError>;

    async fn find_all(&self) -> Result<Vec<Identity>, RepositoryError>;
}

/// Ensures every configured admin address exists with all roles.
///
/// Already-registered addresses are left untouched. Returns the number of
/// identities created.
pub async fn bootstrap_admins(
    repository: &dyn IdentityRepository,
    admin_addresses: &[EthereumAddress],
) -> Result<usize, RepositoryError> {
    let unique: BTreeSet<EthereumAddress> = admin_addresses.iter().copied().collect();
    let mut created = 0;

    for address in unique {
        if repository.find_by_address(&address).await?.is_some() {
            tracing::debug!(address = %address, "Admin already registered");
            continue;
        }

        repository.save(&Identity::new(address, Role::all())).await?;
        tracing::info!(address = %address, "Admin identity created");
        created += 1;
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(byte: u8) -> EthereumAddress {
        EthereumAddress::from(alloy_primitives::Address::repeat_byte(byte))
    }

    #[tokio::test]
    async fn test_bootstrap_admins_creates_missing_only() {
        let repository = InMemoryIdentityRepository::new();
        let existing = repository
            .find_or_create(Identity::new(address(1), Role::defaults()))
            .await
            .unwrap();

        let created = bootstrap_admins(&repository, &[address(1), address(2), address(2)])
            .await
            .unwrap();

        assert_eq!(created, 1);
        assert_eq!(repository.count().await.unwrap(), 2);

        let untouched = repository.find_by_address(&address(1)).await.unwrap().unwrap();
        assert_eq!(untouched.roles, existing.roles);

        let admin = repository.find_by_address(&address(2)).await.unwrap().unwrap();
        assert!(admin.has_role(Role::Admin));
        assert!(admin.has_role(Role::User));
    }
}
