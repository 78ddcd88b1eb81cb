//! Keystore-backed signing provider
//!
//! Holds secp256k1 key pairs in memory, one per (account, key class).
//! Suitable for tests, demos, and processes that custody their own keys;
//! production deployments plug in their own [`SigningProvider`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::chain::Transaction;
use crate::crypto::{decode_public_key, open_box, seal_box, KeyPair};
use crate::ledger::KeyClass;
use crate::provider::{ProviderError, SigningProvider};

/// An in-memory [`SigningProvider`]
#[derive(Default)]
pub struct LocalSigner {
    keys: RwLock<HashMap<(String, KeyClass), KeyPair>>,
}

impl LocalSigner {
    /// Create an empty keystore
    pub fn new() -> Self {
        Self::default()
    }

    /// Import a key pair for an (account, key class) pair
    pub fn import_key(&self, account: &str, key_class: KeyClass, key_pair: KeyPair) {
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((account.to_string(), key_class), key_pair);
    }

    /// Generate and store a fresh key pair, returning its ledger-encoded
    /// public key
    pub fn generate_key(&self, account: &str, key_class: KeyClass) -> String {
        let key_pair = KeyPair::generate();
        let public = key_pair.public_key_string();
        self.import_key(account, key_class, key_pair);
        public
    }

    /// The ledger-encoded public key held for an (account, key class)
    pub fn public_key(&self, account: &str, key_class: KeyClass) -> Option<String> {
        self.keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(account.to_string(), key_class))
            .map(|kp| kp.public_key_string())
    }

    fn key_for(&self, account: &str, key_class: KeyClass) -> Result<KeyPair, ProviderError> {
        self.keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(account.to_string(), key_class))
            .cloned()
            .ok_or_else(|| ProviderError::UnknownKey {
                principal: account.to_string(),
                key_class,
            })
    }
}

#[async_trait]
impl SigningProvider for LocalSigner {
    async fn sign(
        &self,
        principal: &str,
        tx: &Transaction,
        key_class: KeyClass,
    ) -> Result<String, ProviderError> {
        let key_pair = self.key_for(principal, key_class)?;
        let signature = key_pair
            .sign(&tx.digest())
            .map_err(|e| ProviderError::SigningFailed(e.to_string()))?;
        Ok(hex::encode(signature))
    }

    async fn encrypt(
        &self,
        recipients: &[String],
        plaintext: &[u8],
    ) -> Result<HashMap<String, Vec<u8>>, ProviderError> {
        let mut ciphertexts = HashMap::with_capacity(recipients.len());
        for recipient in recipients {
            let public_key = decode_public_key(recipient)
                .map_err(|e| ProviderError::EncryptionFailed(format!("{}: {}", recipient, e)))?;
            let sealed = seal_box(&public_key, plaintext)
                .map_err(|e| ProviderError::EncryptionFailed(e.to_string()))?;
            ciphertexts.insert(recipient.clone(), sealed);
        }
        Ok(ciphertexts)
    }

    async fn decrypt(
        &self,
        principal: &str,
        ciphertext: &[u8],
        key_class: KeyClass,
    ) -> Result<Vec<u8>, ProviderError> {
        let key_pair = self.key_for(principal, key_class)?;
        open_box(&key_pair.secret_key, ciphertext)
            .map_err(|e| ProviderError::DecryptionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Operation;
    use crate::crypto::{decode_public_key, verify_signature};
    use chrono::Utc;
    use serde_json::json;

    fn sample_tx() -> Transaction {
        Transaction::new(
            1,
            2,
            Utc::now(),
            vec![Operation::new("transfer", json!({"from": "alice"}))],
        )
    }

    #[tokio::test]
    async fn test_sign_with_held_key() {
        let signer = LocalSigner::new();
        let public = signer.generate_key("alice", KeyClass::Active);

        let tx = sample_tx();
        let signature_hex = signer.sign("alice", &tx, KeyClass::Active).await.unwrap();

        let public_key = decode_public_key(&public).unwrap();
        let signature = hex::decode(signature_hex).unwrap();
        assert!(verify_signature(&public_key, &tx.digest(), &signature).unwrap());
    }

    #[tokio::test]
    async fn test_sign_without_key_fails() {
        let signer = LocalSigner::new();
        let result = signer.sign("alice", &sample_tx(), KeyClass::Active).await;
        assert!(matches!(result, Err(ProviderError::UnknownKey { .. })));
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_roundtrip() {
        let alice = LocalSigner::new();
        let bob = LocalSigner::new();
        let bob_key = bob.generate_key("bob", KeyClass::Active);
        let carol_signer = LocalSigner::new();
        let carol_key = carol_signer.generate_key("carol", KeyClass::Active);

        let plaintext = b"signed transaction payload";
        let recipients = vec![bob_key.clone(), carol_key.clone()];
        let ciphertexts = alice.encrypt(&recipients, plaintext).await.unwrap();
        assert_eq!(ciphertexts.len(), 2);

        let opened = bob
            .decrypt("bob", &ciphertexts[&bob_key], KeyClass::Active)
            .await
            .unwrap();
        assert_eq!(opened, plaintext);

        // Bob cannot open carol's copy
        assert!(bob
            .decrypt("bob", &ciphertexts[&carol_key], KeyClass::Active)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_encrypt_rejects_malformed_key() {
        let signer = LocalSigner::new();
        let result = signer
            .encrypt(&["not-a-key".to_string()], b"payload")
            .await;
        assert!(matches!(result, Err(ProviderError::EncryptionFailed(_))));
    }

    #[test]
    fn test_keys_independent_per_class() {
        let signer = LocalSigner::new();
        let active = signer.generate_key("alice", KeyClass::Active);
        let posting = signer.generate_key("alice", KeyClass::Posting);
        assert_ne!(active, posting);
        assert_eq!(signer.public_key("alice", KeyClass::Active), Some(active));
    }
}
