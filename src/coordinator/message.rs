//! Protocol events and message shapes
//!
//! The field names of these messages are the contract surface other
//! parties integrate against; they serialize in camelCase bit-for-bit
//! and must not change.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::{decode_public_key, sha256, verify_signature, KeyError, KeyPair};
use crate::request::SignatureRequest;

// =============================================================================
// Event names
// =============================================================================

/// Emitted when a signer joins the channel
pub const SIGNER_CONNECT: &str = "SIGNER_CONNECT";
/// Emitted by an initiator to dispatch a signature request
pub const REQUEST_SIGNATURE: &str = "REQUEST_SIGNATURE";
/// Emitted by a signer returning a signature
pub const SIGN_TRANSACTION: &str = "SIGN_TRANSACTION";
/// Emitted by the initiator after the ledger accepted the transaction
pub const NOTIFY_TRANSACTION_BROADCASTED: &str = "NOTIFY_TRANSACTION_BROADCASTED";
/// Emitted by a signer declining to sign
pub const NOTIFY_TRANSACTION_REFUSED: &str = "NOTIFY_TRANSACTION_REFUSED";
/// Received by signers when a signature request targets them
pub const REQUEST_SIGN_TRANSACTION: &str = "REQUEST_SIGN_TRANSACTION";
/// Received by signers when a request they signed was broadcast
pub const TRANSACTION_BROADCASTED_NOTIFICATION: &str = "TRANSACTION_BROADCASTED_NOTIFICATION";

// =============================================================================
// Message shapes
// =============================================================================

/// Channel join handshake: a challenge signature proving key possession
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerConnectMessage {
    pub public_key: String,
    /// Hex signature over SHA-256 of `username`, made with `public_key`
    pub message: String,
    pub username: String,
}

impl SignerConnectMessage {
    /// Build a connect message by signing the username challenge
    pub fn build(key_pair: &KeyPair, username: &str) -> Result<Self, KeyError> {
        let challenge = sha256(username.as_bytes());
        let signature = key_pair.sign(&challenge)?;
        Ok(Self {
            public_key: key_pair.public_key_string(),
            message: hex::encode(signature),
            username: username.to_string(),
        })
    }

    /// Verify the challenge signature against the declared public key
    pub fn verify(&self) -> Result<bool, KeyError> {
        let public_key = decode_public_key(&self.public_key)?;
        let signature = hex::decode(&self.message).map_err(|_| KeyError::InvalidSignature)?;
        let challenge = sha256(self.username.as_bytes());
        verify_signature(&public_key, &challenge, &signature)
    }
}

/// The party a request was initiated by, as carried on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialSigner {
    pub username: String,
    pub public_key: String,
    pub weight: u16,
}

/// Dispatch of a signature request to its signers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSignatureMessage {
    pub signature_request: SignatureRequest,
    pub initial_signer: InitialSigner,
}

/// A signer returning its signature for one entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionMessage {
    pub signature: String,
    pub signer_id: String,
    pub signature_request_id: String,
}

/// Notification that a request's transaction reached the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyTxBroadcastedMessage {
    pub signature_request_id: String,
}

/// A signer declining one entry of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefuseTransactionMessage {
    pub signer_id: String,
    pub signature_request_id: String,
}

/// One message in flight on the channel
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Username of the emitting party
    pub from: String,
    /// Event name (see constants above)
    pub event: String,
    pub payload: Value,
}
