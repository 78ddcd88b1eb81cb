//! Transaction and operation model
//!
//! A transaction is an ordered list of operations, each identified by a
//! kind tag plus kind-specific fields. Operations serialize in the
//! ledger's wire format: a two-element array of `[kind, payload]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::sha256;

/// A single operation inside a transaction
///
/// The payload is kept as raw JSON because the operation taxonomy is a
/// large closed set owned by the host ledger; this core only needs to
/// inspect the acting-account field of each kind (see
/// [`crate::chain::extract_broadcaster`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "OperationRepr", into = "OperationRepr")]
pub struct Operation {
    /// Operation kind tag (e.g. `transfer`, `vote`, `custom_json`)
    pub kind: String,
    /// Kind-specific fields
    pub payload: Value,
}

/// Wire representation: `[kind, payload]`
type OperationRepr = (String, Value);

impl From<OperationRepr> for Operation {
    fn from((kind, payload): OperationRepr) -> Self {
        Self { kind, payload }
    }
}

impl From<Operation> for OperationRepr {
    fn from(op: Operation) -> Self {
        (op.kind, op.payload)
    }
}

impl Operation {
    /// Create an operation from a kind tag and payload
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// An unsigned or partially signed transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Reference block number (replay protection)
    pub ref_block_num: u16,
    /// Reference block prefix (replay protection)
    pub ref_block_prefix: u32,
    /// Transaction expiration on the ledger
    pub expiration: DateTime<Utc>,
    /// Ordered operation list
    pub operations: Vec<Operation>,
    /// Protocol extensions (unused, carried for wire fidelity)
    #[serde(default)]
    pub extensions: Vec<Value>,
    /// Collected signatures (hex-encoded)
    #[serde(default)]
    pub signatures: Vec<String>,
}

impl Transaction {
    /// Create a new unsigned transaction
    pub fn new(
        ref_block_num: u16,
        ref_block_prefix: u32,
        expiration: DateTime<Utc>,
        operations: Vec<Operation>,
    ) -> Self {
        Self {
            ref_block_num,
            ref_block_prefix,
            expiration,
            operations,
            extensions: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Compute the digest that signatures cover
    ///
    /// Signatures are excluded so the digest is stable while signatures
    /// accumulate.
    pub fn digest(&self) -> Vec<u8> {
        let mut unsigned = self.clone();
        unsigned.signatures.clear();
        // Serialization of a signature-free transaction is deterministic
        let bytes = serde_json::to_vec(&unsigned).unwrap_or_default();
        sha256(&bytes)
    }

    /// Return a copy with an additional signature attached
    pub fn with_signature(&self, signature: String) -> Self {
        let mut signed = self.clone();
        signed.signatures.push(signature);
        signed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tx() -> Transaction {
        Transaction::new(
            1234,
            567890,
            Utc::now(),
            vec![Operation::new(
                "transfer",
                json!({"from": "alice", "to": "bob", "amount": "1.000", "memo": ""}),
            )],
        )
    }

    #[test]
    fn test_operation_wire_format() {
        let op = Operation::new("vote", json!({"voter": "alice"}));
        let encoded = serde_json::to_string(&op).unwrap();
        assert_eq!(encoded, r#"["vote",{"voter":"alice"}]"#);

        let decoded: Operation = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, op);
    }

    #[test]
    fn test_digest_ignores_signatures() {
        let tx = sample_tx();
        let digest = tx.digest();

        let signed = tx.with_signature("deadbeef".to_string());
        assert_eq!(signed.digest(), digest);
        assert_eq!(signed.signatures.len(), 1);
    }

    #[test]
    fn test_digest_is_deterministic() {
        let tx = sample_tx();
        assert_eq!(tx.digest(), tx.digest());
    }

    #[test]
    fn test_transaction_roundtrip() {
        let tx = sample_tx();
        let encoded = serde_json::to_string(&tx).unwrap();
        let decoded: Transaction = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, tx);
    }
}
