//! Challenge message checks
//!
//! The client builds and signs a free-form message. Before any cryptography
//! runs, the message must mention the claimed address and the identity's
//! current nonce. Addresses match regardless of letter case, nonces match
//! exactly.

use thiserror::Error;

use crate::models::{EthereumAddress, Nonce};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("Challenge message does not contain the claimed address")]
    MalformedChallenge,

    #[error("Challenge message does not contain the current nonce")]
    NonceMismatch,
}

pub fn validate_address(message: &str, expected: &EthereumAddress) -> Result<(), ChallengeError> {
    let haystack = message.to_ascii_lowercase();

    if !haystack.contains(&expected.to_lowercase_hex()) {
        return Err(ChallengeError::MalformedChallenge);
    }

    Ok(())
}

pub fn validate_nonce(message: &str, expected: &Nonce) -> Result<(), ChallengeError> {
    if expected.as_str().is_empty() || !message.contains(expected.as_str()) {
        return Err(ChallengeError::NonceMismatch);
    }

    Ok(())
}

/// Address first, then nonce
pub fn validate_challenge(
    message: &str,
    expected_address: &EthereumAddress,
    expected_nonce: &Nonce,
) -> Result<(), ChallengeError> {
    validate_address(message, expected_address)?;
    validate_nonce(message, expected_nonce)
}
