//! Configuration management for the wallet authentication server
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use std::net::IpAddr;
use thiserror::Error;

use crate::models::EthereumAddress;

const DEVELOPMENT_JWT_SECRET: &str = "development-secret-change-in-production";
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 3600;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Current environment
    pub environment: Environment,

    /// Interface to bind
    pub host: IpAddr,

    /// Server port
    pub port: u16,

    /// PostgreSQL connection URL; identities are kept in memory when absent
    pub database_url: Option<String>,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// JWT secret for token signing
    pub jwt_secret: String,

    /// Token TTL in seconds (default: 3600)
    pub jwt_token_ttl_seconds: i64,

    /// Addresses granted the admin role at startup
    pub admin_addresses: Vec<EthereumAddress>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::parse(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let host = env::var("HOST")
            .unwrap_or_else(|_| "127.0.0.1".to_string())
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidValue("HOST must be an IP address".to_string()))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if database_url.is_none() && environment.is_production() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
        }

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .unwrap_or(5);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if environment.is_production() => {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()))
            }
            _ => DEVELOPMENT_JWT_SECRET.to_string(),
        };

        let jwt_token_ttl_seconds = match env::var("JWT_TOKEN_TTL_SECONDS") {
            Ok(raw) => parse_token_ttl(&raw)?,
            Err(_) => DEFAULT_TOKEN_TTL_SECONDS,
        };

        let admin_addresses =
            parse_admin_addresses(&env::var("ADMIN_ADDRESSES").unwrap_or_default())?;

        Ok(Config {
            environment,
            host,
            port,
            database_url,
            db_max_connections,
            cors_allowed_origins,
            log_level,
            jwt_secret,
            jwt_token_ttl_seconds,
            admin_addresses,
        })
    }

    /// Get database URL with the password masked, for logging
    pub fn database_url_masked(&self) -> Option<String> {
        self.database_url.as_deref().map(mask_database_url)
    }
}

/// Mask password in database URL for logging
pub fn mask_database_url(database_url: &str) -> String {
    if let Some(at_pos) = database_url.find('@') {
        if let Some(colon_pos) = database_url[..at_pos].rfind(':') {
            let prefix = &database_url[..colon_pos + 1];
            let suffix = &database_url[at_pos..];
            return format!("{}****{}", prefix, suffix);
        }
    }
    database_url.to_string()
}

/// Token lifetime in whole seconds; must be positive
pub fn parse_token_ttl(raw: &str) -> Result<i64, ConfigError> {
    match raw.trim().parse::<i64>() {
        Ok(ttl) if ttl > 0 => Ok(ttl),
        _ => Err(ConfigError::InvalidValue(format!(
            "JWT_TOKEN_TTL_SECONDS must be a positive number of seconds, got '{}'",
            raw
        ))),
    }
}

/// Parse a comma-separated list of admin addresses
pub fn parse_admin_addresses(raw: &str) -> Result<Vec<EthereumAddress>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            EthereumAddress::parse(s).map_err(|e| {
                ConfigError::InvalidValue(format!("ADMIN_ADDRESSES entry '{}': {}", s, e))
            })
        })
        .collect()
}
