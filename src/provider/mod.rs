//! Signing and encryption provider boundary
//!
//! The actual key custody lives outside this crate (hardware wallet,
//! browser extension, remote signer). This is the exact contract the
//! coordination core requires: sign a transaction for a principal,
//! encrypt a payload to a batch of public keys, decrypt a payload held
//! by a principal. Every call must be idempotent-safe: repeated calls
//! with the same input have no side effects beyond returning bytes.

pub mod local;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::chain::Transaction;
use crate::ledger::KeyClass;

pub use local::LocalSigner;

/// Errors surfaced by a signing provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("No key held for {principal} ({key_class})")]
    UnknownKey {
        principal: String,
        key_class: KeyClass,
    },
}

/// External signing and encryption primitive
#[async_trait]
pub trait SigningProvider: Send + Sync {
    /// Produce `principal`'s signature (hex) over the transaction digest
    async fn sign(
        &self,
        principal: &str,
        tx: &Transaction,
        key_class: KeyClass,
    ) -> Result<String, ProviderError>;

    /// Encrypt `plaintext` to every public key in `recipients`
    ///
    /// Returns a map keyed by recipient public key. The map may come
    /// back in arbitrary order and may omit recipients the provider
    /// cannot address; callers demultiplex by key and must tolerate
    /// absent entries.
    async fn encrypt(
        &self,
        recipients: &[String],
        plaintext: &[u8],
    ) -> Result<HashMap<String, Vec<u8>>, ProviderError>;

    /// Decrypt a ciphertext addressed to one of `principal`'s keys
    async fn decrypt(
        &self,
        principal: &str,
        ciphertext: &[u8],
        key_class: KeyClass,
    ) -> Result<Vec<u8>, ProviderError>;
}
