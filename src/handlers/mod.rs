//! API handlers

pub mod auth;
pub mod health;
pub mod user;

pub use health::health_check;
