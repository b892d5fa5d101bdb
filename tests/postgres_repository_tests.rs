//! PostgreSQL identity store tests
//!
//! Run with `TEST_DATABASE_URL` pointing at a scratch database and `--ignored`.

#[cfg(test)]
mod tests {
    use sqlx::PgPool;
    use uuid::Uuid;

    use wallet_auth_server::db;
    use wallet_auth_server::models::{EthereumAddress, Identity, Nonce, Role};
    use wallet_auth_server::repository::{
        IdentityRepository, PostgresIdentityRepository, RepositoryError,
    };

    /// Helper to create a migrated test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/wallet_auth_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        db::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    /// Random address so tests never collide on the unique index
    fn random_address() -> EthereumAddress {
        let bytes: [u8; 20] = rand::random();
        EthereumAddress::parse(&format!("0x{}", hex::encode(bytes))).unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_find_or_create_keeps_first_identity() {
        let repo = PostgresIdentityRepository::new(setup_test_db().await);
        let address = random_address();

        let first = repo
            .find_or_create(Identity::new(address, Role::defaults()))
            .await
            .unwrap();
        let second = repo
            .find_or_create(Identity::new(address, Role::all()))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.nonce, second.nonce);
        assert_eq!(second.roles, Role::defaults());

        let found = repo.find_by_address(&address).await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_compare_and_set_nonce() {
        let repo = PostgresIdentityRepository::new(setup_test_db().await);
        let identity = repo
            .find_or_create(Identity::new(random_address(), Role::defaults()))
            .await
            .unwrap();

        let replacement = Nonce::generate_after(&identity.nonce);
        let swapped = repo
            .compare_and_set_nonce(&identity.address, &identity.nonce, &replacement)
            .await
            .unwrap();
        assert!(swapped);

        // The consumed nonce no longer matches
        let again = repo
            .compare_and_set_nonce(&identity.address, &identity.nonce, &Nonce::generate())
            .await
            .unwrap();
        assert!(!again);

        let stored = repo.find_by_id(identity.id).await.unwrap();
        assert_eq!(stored.nonce, replacement);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_swaps_have_one_winner() {
        let repo = PostgresIdentityRepository::new(setup_test_db().await);
        let identity = repo
            .find_or_create(Identity::new(random_address(), Role::defaults()))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            let address = identity.address;
            let expected = identity.nonce.clone();
            handles.push(tokio::spawn(async move {
                repo.compare_and_set_nonce(&address, &expected, &Nonce::generate())
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_save_updates_roles() {
        let repo = PostgresIdentityRepository::new(setup_test_db().await);
        let mut identity = repo
            .find_or_create(Identity::new(random_address(), Role::defaults()))
            .await
            .unwrap();

        identity.roles = Role::all();
        repo.save(&identity).await.unwrap();

        let stored = repo.find_by_id(identity.id).await.unwrap();
        assert!(stored.has_role(Role::Admin));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_missing_identity() {
        let repo = PostgresIdentityRepository::new(setup_test_db().await);

        let result = repo.find_by_id(Uuid::new_v4()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));

        let by_address = repo.find_by_address(&random_address()).await.unwrap();
        assert!(by_address.is_none());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_count_and_sample() {
        let repo = PostgresIdentityRepository::new(setup_test_db().await);
        for _ in 0..3 {
            repo.find_or_create(Identity::new(random_address(), Role::defaults()))
                .await
                .unwrap();
        }

        assert!(repo.count().await.unwrap() >= 3);
        assert_eq!(repo.random_sample(2).await.unwrap().len(), 2);
    }
}
