//! Per-recipient sealed boxes
//!
//! Encrypts a payload so that only the holder of a given secp256k1
//! private key can read it. An ephemeral key pair performs ECDH against
//! the recipient's public key; the shared secret keys a
//! ChaCha20-Poly1305 AEAD.
//!
//! Sealed box layout: ephemeral public key (33) || nonce (12) || ciphertext.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use secp256k1::ecdh::SharedSecret;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

/// Size of the ephemeral public key prefix
const EPHEMERAL_KEY_LEN: usize = 33;

/// Size of the AEAD nonce
const NONCE_LEN: usize = 12;

/// Errors from sealing or opening a box
#[derive(Error, Debug)]
pub enum SealError {
    #[error("Ciphertext too short")]
    Truncated,
    #[error("Invalid ephemeral key")]
    InvalidEphemeralKey,
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
}

/// Encrypt `plaintext` so only the holder of `recipient`'s private key
/// can open it
pub fn seal_box(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
    let secp = Secp256k1::new();
    let (ephemeral_secret, ephemeral_public) = secp.generate_keypair(&mut OsRng);

    let shared = SharedSecret::new(recipient, &ephemeral_secret);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&shared.secret_bytes()));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| SealError::EncryptionFailed)?;

    let mut sealed = Vec::with_capacity(EPHEMERAL_KEY_LEN + NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&ephemeral_public.serialize());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a sealed box with the recipient's private key
pub fn open_box(recipient_secret: &SecretKey, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
    if sealed.len() < EPHEMERAL_KEY_LEN + NONCE_LEN {
        return Err(SealError::Truncated);
    }

    let ephemeral_public = PublicKey::from_slice(&sealed[..EPHEMERAL_KEY_LEN])
        .map_err(|_| SealError::InvalidEphemeralKey)?;
    let nonce = Nonce::from_slice(&sealed[EPHEMERAL_KEY_LEN..EPHEMERAL_KEY_LEN + NONCE_LEN]);
    let ciphertext = &sealed[EPHEMERAL_KEY_LEN + NONCE_LEN..];

    let shared = SharedSecret::new(&ephemeral_public, recipient_secret);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&shared.secret_bytes()));

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| SealError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_seal_and_open() {
        let recipient = KeyPair::generate();
        let plaintext = b"the transaction payload";

        let sealed = seal_box(&recipient.public_key, plaintext).unwrap();
        let opened = open_box(&recipient.secret_key, &sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let recipient = KeyPair::generate();
        let other = KeyPair::generate();

        let sealed = seal_box(&recipient.public_key, b"secret").unwrap();
        assert!(matches!(
            open_box(&other.secret_key, &sealed),
            Err(SealError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let recipient = KeyPair::generate();
        let mut sealed = seal_box(&recipient.public_key, b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert!(open_box(&recipient.secret_key, &sealed).is_err());
    }

    #[test]
    fn test_truncated_input_rejected() {
        let recipient = KeyPair::generate();
        assert!(matches!(
            open_box(&recipient.secret_key, &[0u8; 10]),
            Err(SealError::Truncated)
        ));
    }
}
