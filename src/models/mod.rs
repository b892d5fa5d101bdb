//! Data models for the wallet authentication server

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

pub mod auth;
pub use auth::*;

/// Rejected address input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Ethereum address must start with 0x")]
    MissingPrefix,

    #[error("Ethereum address must have 40 hex digits, got {0}")]
    InvalidLength(usize),

    #[error("Ethereum address contains non-hex characters")]
    InvalidHex,
}

/// Ethereum account address.
///
/// Parsing accepts any letter case and equality is on the underlying 20 bytes,
/// so `0xabc…` and `0xABC…` are the same identity. The canonical textual form
/// is the EIP-55 mixed-case checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EthereumAddress(Address);

impl EthereumAddress {
    /// Parse `0x` followed by exactly 40 hex digits
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let digits = input.strip_prefix("0x").ok_or(AddressError::MissingPrefix)?;

        if digits.len() != 40 {
            return Err(AddressError::InvalidLength(digits.len()));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::InvalidHex)?;

        Ok(Self(Address::from(bytes)))
    }

    /// EIP-55 checksummed form
    pub fn to_checksum(&self) -> String {
        self.0.to_checksum(None)
    }

    /// All-lowercase `0x` form, used for case-insensitive text matching
    pub fn to_lowercase_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0.as_slice()))
    }
}

impl From<Address> for EthereumAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl fmt::Display for EthereumAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl FromStr for EthereumAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for EthereumAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for EthereumAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// One-time challenge value bound to an identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    /// Fresh nonce: 128 bits from the OS generator rendered as decimal digits
    pub fn generate() -> Self {
        let value: u128 = OsRng.gen();
        Self(value.to_string())
    }

    /// Fresh nonce guaranteed to differ from `previous`
    pub fn generate_after(previous: &Nonce) -> Self {
        loop {
            let candidate = Self::generate();
            if &candidate != previous {
                return candidate;
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Nonce {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Nonce {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authorization roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_USER")]
    User,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "ROLE_USER",
            Role::Admin => "ROLE_ADMIN",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "ROLE_USER" => Some(Role::User),
            "ROLE_ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Roles given to an identity created by the auth flow
    pub fn defaults() -> BTreeSet<Role> {
        BTreeSet::from([Role::User])
    }

    pub fn all() -> BTreeSet<Role> {
        BTreeSet::from([Role::User, Role::Admin])
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wallet-style principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub address: EthereumAddress,
    pub nonce: Nonce,
    pub roles: BTreeSet<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// New identity with a fresh nonce
    pub fn new(address: EthereumAddress, roles: BTreeSet<Role>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            address,
            nonce: Nonce::generate(),
            roles,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl From<Identity> for IdentityResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            address: identity.address,
            roles: identity.roles.into_iter().collect(),
            created_at: identity.created_at,
        }
    }
}
