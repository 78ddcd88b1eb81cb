//! Signature request record
//!
//! The coordination record tracking required signers, their encrypted
//! transaction copies, and collected signatures/refusals for one
//! transaction. Serialized field names are the wire contract other
//! parties integrate against and must not change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::sha256;
use crate::ledger::{KeyClass, LedgerError};
use crate::provider::ProviderError;

/// Errors raised by signature request coordination
#[derive(Error, Debug)]
pub enum CoordinationError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Broadcaster could not be resolved from the transaction")]
    BroadcasterUnresolved,
    #[error("Initiator {initiator} holds no authority over {broadcaster}")]
    Unauthorized {
        initiator: String,
        broadcaster: String,
    },
    #[error("Signing failed: {0}")]
    Signing(ProviderError),
    #[error("Encoding failed: {0}")]
    Encoding(String),
    #[error("No decodable transactions in batch")]
    NoDecodableTransactions,
    #[error("Unknown signature request: {0}")]
    UnknownRequest(String),
    #[error("Unknown signer entry: {0}")]
    UnknownSigner(String),
    #[error("Signer entry {0} already refused")]
    AlreadyRefused(String),
    #[error("Signer entry {0} already signed")]
    AlreadySigned(String),
    #[error("Channel error: {0}")]
    Channel(#[from] crate::coordinator::ChannelError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The party that created a signature request
///
/// The initiator's signature rides here, never duplicated as a signer
/// entry, so its weight can never be double-counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiator {
    /// Account name of the initiating party
    pub principal: String,
    /// Ledger-encoded public key the signature was made with
    pub public_key: String,
    /// Hex signature over the transaction digest
    pub signature: String,
    /// The initiator's own weight toward the threshold
    pub weight: u16,
}

/// One targeted signer of a signature request
///
/// Mutated exactly once: either a signature is attached or `refused` is
/// set, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerEntry {
    pub id: String,
    /// Ledger-encoded public key this entry is addressed to
    pub public_key: String,
    /// Hex ciphertext of the signed transaction, decryptable only by
    /// the holder of `public_key`
    pub encrypted_transaction: String,
    pub weight: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notified: Option<bool>,
}

impl SignerEntry {
    /// Create an unsigned entry addressed to `public_key`
    pub fn new(public_key: String, encrypted_transaction: String, weight: u16) -> Self {
        let id_data = format!(
            "{}{}{}",
            public_key,
            Utc::now().timestamp_nanos_opt().unwrap_or(0),
            weight
        );
        Self {
            id: hex::encode(&sha256(id_data.as_bytes())[..8]),
            public_key,
            encrypted_transaction,
            weight,
            signature: None,
            refused: None,
            notified: None,
        }
    }

    /// Whether a signature has been attached
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Whether the signer declined
    pub fn is_refused(&self) -> bool {
        self.refused.unwrap_or(false)
    }
}

/// A signature request awaiting threshold satisfaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub id: String,
    pub expiration_date: DateTime<Utc>,
    pub threshold: u32,
    pub key_class: KeyClass,
    pub initiator: Initiator,
    pub signers: Vec<SignerEntry>,
    /// Set once the broadcast path has been entered; guards against
    /// duplicate broadcasts
    pub locked: bool,
    pub broadcasted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SignatureRequest {
    /// Assemble a request from its parts, generating a unique id
    pub fn new(
        threshold: u32,
        key_class: KeyClass,
        expiration_date: DateTime<Utc>,
        initiator: Initiator,
        signers: Vec<SignerEntry>,
    ) -> Self {
        let now = Utc::now();
        let id_data = format!(
            "{}{}{}{}{}",
            initiator.principal,
            key_class,
            threshold,
            now.timestamp_nanos_opt().unwrap_or(0),
            signers.len()
        );
        Self {
            id: hex::encode(&sha256(id_data.as_bytes())[..16]),
            expiration_date,
            threshold,
            key_class,
            initiator,
            signers,
            locked: false,
            broadcasted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Accumulated signed weight, including the initiator's
    pub fn signed_weight(&self) -> u32 {
        let signer_weight: u32 = self
            .signers
            .iter()
            .filter(|s| s.is_signed())
            .map(|s| u32::from(s.weight))
            .sum();
        signer_weight + u32::from(self.initiator.weight)
    }

    /// Whether accumulated signed weight has reached the threshold
    pub fn threshold_met(&self) -> bool {
        self.signed_weight() >= self.threshold
    }

    /// Maximum weight still achievable: signed weight plus every
    /// not-yet-refused unsigned entry
    ///
    /// When this drops below the threshold the request can never
    /// complete and must move to the refused terminal.
    pub fn achievable_weight(&self) -> u32 {
        let open_weight: u32 = self
            .signers
            .iter()
            .filter(|s| !s.is_signed() && !s.is_refused())
            .map(|s| u32::from(s.weight))
            .sum();
        self.signed_weight() + open_weight
    }

    /// Whether the request has passed its expiration date
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiration_date
    }

    /// Attach a signature to a signer entry
    ///
    /// Idempotent: re-applying the identical signature returns
    /// `Ok(false)` and changes nothing, so duplicate delivery can never
    /// double-count weight. A conflicting signature for an
    /// already-signed entry is ignored (first wins). Attaching to a
    /// refused entry is an error: an entry is mutated exactly once.
    pub fn attach_signature(
        &mut self,
        signer_id: &str,
        signature: &str,
    ) -> Result<bool, CoordinationError> {
        let entry = self
            .signers
            .iter_mut()
            .find(|s| s.id == signer_id)
            .ok_or_else(|| CoordinationError::UnknownSigner(signer_id.to_string()))?;

        if entry.is_refused() {
            return Err(CoordinationError::AlreadyRefused(signer_id.to_string()));
        }
        if let Some(existing) = &entry.signature {
            if existing != signature {
                log::warn!(
                    "conflicting signature for signer {} on request {}, keeping first",
                    signer_id,
                    self.id
                );
            }
            return Ok(false);
        }

        entry.signature = Some(signature.to_string());
        self.updated_at = Utc::now();
        Ok(true)
    }

    /// Mark a signer entry as refused
    ///
    /// Idempotent; refusing an already-signed entry is an error.
    pub fn refuse(&mut self, signer_id: &str) -> Result<bool, CoordinationError> {
        let entry = self
            .signers
            .iter_mut()
            .find(|s| s.id == signer_id)
            .ok_or_else(|| CoordinationError::UnknownSigner(signer_id.to_string()))?;

        if entry.is_signed() {
            return Err(CoordinationError::AlreadySigned(signer_id.to_string()));
        }
        if entry.is_refused() {
            return Ok(false);
        }

        entry.refused = Some(true);
        self.updated_at = Utc::now();
        Ok(true)
    }

    /// Entries addressed to any of the given public keys
    pub fn entries_for_keys<'a>(&'a self, keys: &[String]) -> Vec<&'a SignerEntry> {
        self.signers
            .iter()
            .filter(|s| keys.contains(&s.public_key))
            .collect()
    }
}
