//! Ethereum signature verification
//!
//! Signatures follow the `personal_sign` (EIP-191) convention used by browser
//! wallets: the signed digest is
//! `keccak256("\x19Ethereum Signed Message:\n" ++ len(message) ++ message)`
//! where `len` is the decimal byte length of the UTF-8 message. The signature
//! is the 65-byte `r || s || v` hex string, with or without `0x`, and `v` in
//! `{0, 1, 27, 28}`. Changing any of this breaks every client.

use alloy_primitives::{eip191_hash_message, Signature};
use thiserror::Error;

use crate::models::EthereumAddress;

const SIGNATURE_LENGTH: usize = 65;

/// Errors that can occur during signature verification
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Signer recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("Signature was produced by a different address")]
    AddressMismatch,
}

/// Recover the address that signed `message`
pub fn recover_signer(message: &str, signature_hex: &str) -> Result<EthereumAddress, CryptoError> {
    let signature = decode_signature(signature_hex)?;
    let digest = eip191_hash_message(message);

    signature
        .recover_address_from_prehash(&digest)
        .map(EthereumAddress::from)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}

/// Verify that `signature_hex` over `message` was produced by `claimed`
pub fn verify_ethereum_signature(
    claimed: &EthereumAddress,
    message: &str,
    signature_hex: &str,
) -> Result<(), CryptoError> {
    let signer = recover_signer(message, signature_hex)?;

    if &signer != claimed {
        return Err(CryptoError::AddressMismatch);
    }

    Ok(())
}

fn decode_signature(signature_hex: &str) -> Result<Signature, CryptoError> {
    let trimmed = signature_hex.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let bytes =
        hex::decode(digits).map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

    let raw: [u8; SIGNATURE_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
        CryptoError::InvalidSignatureFormat(format!(
            "Expected {} bytes, got {}",
            SIGNATURE_LENGTH,
            bytes.len()
        ))
    })?;

    Signature::from_raw_array(&raw)
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_signing {
    //! Client-side `personal_sign` for tests

    use alloy_primitives::{eip191_hash_message, Address};
    use k256::ecdsa::SigningKey;

    use crate::models::EthereumAddress;

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

        /// `0x`-prefixed 65-byte signature with `v` in {27, 28}
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
}
