//! Wallet Authentication Server Library
//!
//! Challenge-response authentication for Ethereum wallets: clients fetch a
//! one-time nonce, sign a message embedding it, and trade the signature for a
//! JWT bearer token.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod state;
