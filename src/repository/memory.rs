//! In-memory identity store
//!
//! The map-level lock only covers lookup and insertion; each identity has its
//! own mutex, so nonce updates for different addresses never contend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::seq::SliceRandom;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{IdentityRepository, RepositoryError};
use crate::models::{EthereumAddress, Identity, Nonce};

#[derive(Clone, Default)]
pub struct InMemoryIdentityRepository {
    identities: Arc<RwLock<HashMap<EthereumAddress, Arc<Mutex<Identity>>>>>,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, address: &EthereumAddress) -> Option<Arc<Mutex<Identity>>> {
        self.identities.read().await.get(address).cloned()
    }

    async fn snapshot(&self) -> Vec<Identity> {
        let entries: Vec<_> = self.identities.read().await.values().cloned().collect();

        let mut identities = Vec::with_capacity(entries.len());
        for entry in entries {
            identities.push(entry.lock().await.clone());
        }
        identities.sort_by_key(|identity| identity.created_at);
        identities
    }
}

#[async_trait]
impl IdentityRepository for InMemoryIdentityRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Identity, RepositoryError> {
        self.snapshot()
            .await
            .into_iter()
            .find(|identity| identity.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn find_by_address(
        &self,
        address: &EthereumAddress,
    ) -> Result<Option<Identity>, RepositoryError> {
        match self.entry(address).await {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn find_or_create(&self, candidate: Identity) -> Result<Identity, RepositoryError> {
        if let Some(entry) = self.entry(&candidate.address).await {
            return Ok(entry.lock().await.clone());
        }

        let entry = {
            let mut identities = self.identities.write().await;
            identities
                .entry(candidate.address)
                .or_insert_with(|| Arc::new(Mutex::new(candidate)))
                .clone()
        };

        let identity = entry.lock().await.clone();
        Ok(identity)
    }

    async fn compare_and_set_nonce(
        &self,
        address: &EthereumAddress,
        expected: &Nonce,
        replacement: &Nonce,
    ) -> Result<bool, RepositoryError> {
        let Some(entry) = self.entry(address).await else {
            return Ok(false);
        };

        let mut identity = entry.lock().await;
        if &identity.nonce != expected {
            return Ok(false);
        }

        identity.nonce = replacement.clone();
        identity.updated_at = Utc::now();
        Ok(true)
    }

    async fn save(&self, identity: &Identity) -> Result<(), RepositoryError> {
        if let Some(entry) = self.entry(&identity.address).await {
            *entry.lock().await = identity.clone();
            return Ok(());
        }

        let mut identities = self.identities.write().await;
        match identities.get(&identity.address) {
            Some(entry) => *entry.lock().await = identity.clone(),
            None => {
                identities.insert(identity.address, Arc::new(Mutex::new(identity.clone())));
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.identities.read().await.len() as u64)
    }

    async fn random_sample(&self, n: usize) -> Result<Vec<Identity>, RepositoryError> {
        let mut identities = self.snapshot().await;
        identities.shuffle(&mut rand::thread_rng());
        identities.truncate(n);
        Ok(identities)
    }

    async fn find_all(&self) -> Result<Vec<Identity>, RepositoryError> {
        Ok(self.snapshot().await)
    }
}
