//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 hashing
//! - ECDSA key management (secp256k1) with ledger key-string encoding
//! - ECDH sealed boxes for per-recipient transaction ciphertexts

pub mod hash;
pub mod keys;
pub mod seal;

pub use hash::{sha256, sha256_hex};
pub use keys::{
    decode_public_key, encode_public_key, sign_message, verify_signature, KeyError, KeyPair,
    PUBLIC_KEY_PREFIX,
};
pub use seal::{open_box, seal_box, SealError};
