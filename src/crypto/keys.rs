//! ECDSA key management
//!
//! Provides key pair generation, signing, and verification using the
//! secp256k1 elliptic curve, plus the ledger's string encoding for
//! public keys: a `PUB` prefix followed by the base58 of the compressed
//! key bytes and a 4-byte RIPEMD-160 checksum.

use rand::rngs::OsRng;
use ripemd::{Digest, Ripemd160};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::sha256;

/// Prefix for ledger-encoded public keys
pub const PUBLIC_KEY_PREFIX: &str = "PUB";

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid public key checksum")]
    InvalidChecksum,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key = SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key in ledger string encoding (`PUB...`)
    pub fn public_key_string(&self) -> String {
        encode_public_key(&self.public_key)
    }

    /// Sign a message hash with the private key
    pub fn sign(&self, message_hash: &[u8]) -> Result<Vec<u8>, KeyError> {
        sign_message(&self.secret_key, message_hash)
    }

    /// Verify a signature against this key pair's public key
    pub fn verify(&self, message_hash: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        verify_signature(&self.public_key, message_hash, signature)
    }
}

/// Encode a public key into the ledger string format
///
/// Format: `PUB` + Base58(compressed_key || RIPEMD160(compressed_key)[..4])
pub fn encode_public_key(public_key: &PublicKey) -> String {
    let raw = public_key.serialize();

    let mut ripemd = Ripemd160::new();
    ripemd.update(raw);
    let checksum = ripemd.finalize();

    let mut body = raw.to_vec();
    body.extend_from_slice(&checksum[..4]);

    format!("{}{}", PUBLIC_KEY_PREFIX, bs58::encode(body).into_string())
}

/// Parse a public key from the ledger string format, verifying its checksum
pub fn decode_public_key(encoded: &str) -> Result<PublicKey, KeyError> {
    let body = encoded
        .strip_prefix(PUBLIC_KEY_PREFIX)
        .ok_or(KeyError::InvalidPublicKey)?;
    let bytes = bs58::decode(body)
        .into_vec()
        .map_err(|_| KeyError::InvalidPublicKey)?;

    // Compressed key (33 bytes) + checksum (4 bytes)
    if bytes.len() != 37 {
        return Err(KeyError::InvalidPublicKey);
    }
    let (raw, checksum) = bytes.split_at(33);

    let mut ripemd = Ripemd160::new();
    ripemd.update(raw);
    let expected = ripemd.finalize();
    if checksum != &expected[..4] {
        return Err(KeyError::InvalidChecksum);
    }

    PublicKey::from_slice(raw).map_err(|_| KeyError::InvalidPublicKey)
}

/// Sign a message hash with a secret key
pub fn sign_message(secret_key: &SecretKey, message_hash: &[u8]) -> Result<Vec<u8>, KeyError> {
    let secp = Secp256k1::new();

    // Ensure message hash is 32 bytes
    let hash = if message_hash.len() == 32 {
        message_hash.to_vec()
    } else {
        sha256(message_hash)
    };

    let message = Message::from_digest_slice(&hash)?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(signature.serialize_compact().to_vec())
}

/// Verify a signature against a public key
pub fn verify_signature(
    public_key: &PublicKey,
    message_hash: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::new();

    let hash = if message_hash.len() == 32 {
        message_hash.to_vec()
    } else {
        sha256(message_hash)
    };

    let message = Message::from_digest_slice(&hash)?;
    let sig = secp256k1::ecdsa::Signature::from_compact(signature)
        .map_err(|_| KeyError::InvalidSignature)?;

    match secp.verify_ecdsa(&message, &sig, public_key) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}
