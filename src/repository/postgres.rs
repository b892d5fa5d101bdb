//! PostgreSQL identity store
//!
//! Uniqueness of `address` is enforced by the table; creation races are
//! resolved with `ON CONFLICT DO NOTHING` followed by a read.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{IdentityRepository, RepositoryError};
use crate::models::{EthereumAddress, Identity, Nonce, Role};

const IDENTITY_COLUMNS: &str = "id, address, nonce, roles, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    address: String,
    nonce: String,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = RepositoryError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let address = EthereumAddress::parse(&row.address)
            .map_err(|e| RepositoryError::CorruptRecord(format!("{}: {}", row.address, e)))?;

        let roles = row
            .roles
            .iter()
            .map(|code| {
                Role::parse(code).ok_or_else(|| {
                    RepositoryError::CorruptRecord(format!("unknown role code {}", code))
                })
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Identity {
            id: row.id,
            address,
            nonce: Nonce::from(row.nonce),
            roles,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn role_codes(identity: &Identity) -> Vec<String> {
    identity.roles.iter().map(|role| role.as_str().to_string()).collect()
}

#[derive(Clone)]
pub struct PostgresIdentityRepository {
    db_pool: PgPool,
}

impl PostgresIdentityRepository {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    fn into_identities(rows: Vec<IdentityRow>) -> Result<Vec<Identity>, RepositoryError> {
        rows.into_iter().map(Identity::try_from).collect()
    }
}

#[async_trait]
impl IdentityRepository for PostgresIdentityRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Identity, RepositoryError> {
        let row: IdentityRow = sqlx::query_as(&format!(
            "SELECT {} FROM identities WHERE id = $1",
            IDENTITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        row.try_into()
    }

    async fn find_by_address(
        &self,
        address: &EthereumAddress,
    ) -> Result<Option<Identity>, RepositoryError> {
        let row: Option<IdentityRow> = sqlx::query_as(&format!(
            "SELECT {} FROM identities WHERE address = $1",
            IDENTITY_COLUMNS
        ))
        .bind(address.to_checksum())
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(Identity::try_from).transpose()
    }

    async fn find_or_create(&self, candidate: Identity) -> Result<Identity, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO identities (id, address, nonce, roles, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (address) DO NOTHING
            "#,
        )
        .bind(candidate.id)
        .bind(candidate.address.to_checksum())
        .bind(candidate.nonce.as_str())
        .bind(role_codes(&candidate))
        .bind(candidate.created_at)
        .bind(candidate.updated_at)
        .execute(&self.db_pool)
        .await?;

        self.find_by_address(&candidate.address)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(candidate.address.to_string()))
    }

    async fn compare_and_set_nonce(
        &self,
        address: &EthereumAddress,
        expected: &Nonce,
        replacement: &Nonce,
    ) -> Result<bool, RepositoryError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE identities
            SET nonce = $3, updated_at = NOW()
            WHERE address = $1 AND nonce = $2
            "#,
        )
        .bind(address.to_checksum())
        .bind(expected.as_str())
        .bind(replacement.as_str())
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn save(&self, identity: &Identity) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO identities (id, address, nonce, roles, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (address) DO UPDATE
            SET nonce = EXCLUDED.nonce, roles = EXCLUDED.roles, updated_at = NOW()
            "#,
        )
        .bind(identity.id)
        .bind(identity.address.to_checksum())
        .bind(identity.nonce.as_str())
        .bind(role_codes(identity))
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.db_pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn random_sample(&self, n: usize) -> Result<Vec<Identity>, RepositoryError> {
        let rows: Vec<IdentityRow> = sqlx::query_as(&format!(
            "SELECT {} FROM identities ORDER BY random() LIMIT $1",
            IDENTITY_COLUMNS
        ))
        .bind(i64::try_from(n).unwrap_or(i64::MAX))
        .fetch_all(&self.db_pool)
        .await?;

        Self::into_identities(rows)
    }

    async fn find_all(&self) -> Result<Vec<Identity>, RepositoryError> {
        let rows: Vec<IdentityRow> = sqlx::query_as(&format!(
            "SELECT {} FROM identities ORDER BY created_at ASC",
            IDENTITY_COLUMNS
        ))
        .fetch_all(&self.db_pool)
        .await?;

        Self::into_identities(rows)
    }
}
