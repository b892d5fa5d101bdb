//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use alloy_primitives::{eip191_hash_message, Address};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use k256::ecdsa::SigningKey;
use serde_json::Value;
use tower::ServiceExt;

use wallet_auth_server::auth::{AuthService, TokenIssuer};
use wallet_auth_server::models::EthereumAddress;
use wallet_auth_server::repository::InMemoryIdentityRepository;
use wallet_auth_server::routes::app_router;
use wallet_auth_server::state::AppState;

pub const JWT_SECRET: &str = "integration-test-secret";

/// Browser-wallet stand-in producing `personal_sign` signatures
pub struct TestWallet {
    key: SigningKey,
}

impl TestWallet {
    pub fn random() -> Self {
        loop {
            let seed: [u8; 32] = rand::random();
            if let Ok(key) = SigningKey::from_slice(&seed) {
                return Self { key };
            }
        }
    }

    pub fn address(&self) -> EthereumAddress {
        EthereumAddress::from(Address::from_public_key(self.key.verifying_key()))
    }

    pub fn sign(&self, message: &str) -> String {
        let digest = eip191_hash_message(message);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .expect("signing failed");

        let mut raw = signature.to_bytes().to_vec();
        raw.push(27 + recovery_id.to_byte());
        format!("0x{}", hex::encode(raw))
    }
}

pub struct TestApp {
    pub router: Router,
    pub repository: Arc<InMemoryIdentityRepository>,
    pub auth_service: Arc<AuthService>,
}

impl TestApp {
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryIdentityRepository::new());
        let auth_service = Arc::new(AuthService::new(
            repository.clone(),
            TokenIssuer::new(JWT_SECRET, 900),
        ));
        let router = app_router(AppState::new(auth_service.clone()));

        Self {
            router,
            repository,
            auth_service,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn fetch_nonce(&self, address: &str) -> String {
        let (status, body) = self
            .get(&format!("/api/auth/nonce?ethereumAddress={}", address), None)
            .await;
        assert_eq!(status, StatusCode::OK, "nonce request failed: {}", body);
        body["nonce"].as_str().unwrap().to_string()
    }

    /// Full handshake, returning the issued token
    pub async fn login(&self, wallet: &TestWallet) -> String {
        let address = wallet.address().to_string();
        let nonce = self.fetch_nonce(&address).await;
        let message = challenge(&nonce, &address);

        let (status, body) = self
            .post_json(
                "/api/auth",
                serde_json::json!({
                    "ethereumAddress": address,
                    "message": message,
                    "signature": wallet.sign(&message),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }
}

pub fn challenge(nonce: &str, address: &str) -> String {
    format!("Sign in, nonce: {}, address: {}", nonce, address)
}
