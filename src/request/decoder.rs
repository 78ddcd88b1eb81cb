//! Signature request decoding
//!
//! For a recipient: find the bundle(s) addressed to their own keys,
//! decrypt them, reconstruct the transaction, and re-validate the
//! initiator's authority before accepting anything as genuine.
//!
//! Per-entry failures (decryption, parsing, authority) are soft: they
//! are logged and skipped, never aborting sibling entries or sibling
//! requests. Only an empty overall result is an error.

use serde::{Deserialize, Serialize};

use crate::chain::Transaction;
use crate::ledger::{validate_initiator_over_broadcaster, KeyClass, LedgerClient, LedgerError};
use crate::provider::SigningProvider;
use crate::request::request::{CoordinationError, SignatureRequest, SignerEntry};

/// A transaction recovered from a signature request, post-validation
///
/// Never constructed from unvalidated input: the initiator's authority
/// over the broadcaster has been re-checked against current ledger
/// state by the time one of these exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedTransaction {
    /// The signer entry this recipient decrypted
    pub signer: SignerEntry,
    pub signature_request_id: String,
    pub transaction: Transaction,
    pub key_class: KeyClass,
    pub recipient_username: String,
}

/// Decode every signature request addressed to `recipient`
///
/// Requests initiated by the recipient are skipped (no self-decoding).
/// Returns the accepted transactions, or `NoDecodableTransactions` when
/// nothing across all requests could be decoded and validated.
pub async fn decode_signature_requests(
    provider: &dyn SigningProvider,
    ledger: &dyn LedgerClient,
    requests: &[SignatureRequest],
    recipient: &str,
) -> Result<Vec<DecodedTransaction>, CoordinationError> {
    let mut decoded = Vec::new();

    for request in requests {
        if request.initiator.principal == recipient {
            continue;
        }

        let own_keys = match own_keys(ledger, recipient, request.key_class).await? {
            Some(keys) => keys,
            None => continue,
        };

        for entry in request.entries_for_keys(&own_keys) {
            match decode_entry(provider, ledger, request, entry, recipient).await {
                Some(tx) => decoded.push(tx),
                None => continue,
            }
        }
    }

    if decoded.is_empty() {
        return Err(CoordinationError::NoDecodableTransactions);
    }
    Ok(decoded)
}

/// The recipient's own keys for a key class
///
/// An unknown recipient account yields `None` (skip the request); any
/// other ledger failure is transport-level and propagates as an error.
async fn own_keys(
    ledger: &dyn LedgerClient,
    recipient: &str,
    key_class: KeyClass,
) -> Result<Option<Vec<String>>, CoordinationError> {
    match ledger.account_snapshot(recipient).await {
        Ok(snapshot) => Ok(Some(
            snapshot
                .authority(key_class)
                .key_auths
                .iter()
                .map(|(key, _)| key.clone())
                .collect(),
        )),
        Err(LedgerError::AccountNotFound(_)) => {
            log::warn!("decode: recipient account {} not found", recipient);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Decrypt, parse, and validate one signer entry; `None` on any failure
async fn decode_entry(
    provider: &dyn SigningProvider,
    ledger: &dyn LedgerClient,
    request: &SignatureRequest,
    entry: &SignerEntry,
    recipient: &str,
) -> Option<DecodedTransaction> {
    let ciphertext = match hex::decode(&entry.encrypted_transaction) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!(
                "decode: malformed ciphertext for signer {} in request {}: {}",
                entry.id,
                request.id,
                e
            );
            return None;
        }
    };

    let plaintext = match provider
        .decrypt(recipient, &ciphertext, request.key_class)
        .await
    {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!(
                "decode: decryption failed for signer {} in request {}: {}",
                entry.id,
                request.id,
                e
            );
            return None;
        }
    };

    let transaction: Transaction = match serde_json::from_slice(&plaintext) {
        Ok(tx) => tx,
        Err(e) => {
            log::warn!(
                "decode: plaintext of signer {} in request {} is not a transaction: {}",
                entry.id,
                request.id,
                e
            );
            return None;
        }
    };

    // The encoder's claims are not trusted: the initiator's authority is
    // re-checked against current ledger state on every decode.
    match validate_initiator_over_broadcaster(
        ledger,
        &request.initiator.principal,
        request.key_class,
        &transaction,
    )
    .await
    {
        Ok(true) => {}
        Ok(false) => {
            log::warn!(
                "decode: rejecting request {}: initiator {} failed authority validation",
                request.id,
                request.initiator.principal
            );
            return None;
        }
        Err(e) => {
            log::warn!(
                "decode: authority validation errored for request {}: {}",
                request.id,
                e
            );
            return None;
        }
    }

    Some(DecodedTransaction {
        signer: entry.clone(),
        signature_request_id: request.id.clone(),
        transaction,
        key_class: request.key_class,
        recipient_username: recipient.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Operation;
    use crate::ledger::{AuthoritySpec, MemoryLedger};
    use crate::provider::LocalSigner;
    use crate::request::encoder::{encode_signature_request, EncodeParams, InitiatorProfile};
    use chrono::{Duration, Utc};
    use serde_json::json;

    struct Party {
        name: &'static str,
        signer: LocalSigner,
        public_key: String,
    }

    impl Party {
        fn new(name: &'static str) -> Self {
            let signer = LocalSigner::new();
            let public_key = signer.generate_key(name, KeyClass::Active);
            Self {
                name,
                signer,
                public_key,
            }
        }

        fn params(&self) -> EncodeParams {
            EncodeParams {
                key_class: KeyClass::Active,
                expiration_date: Utc::now() + Duration::hours(1),
                initiator: InitiatorProfile {
                    username: self.name.to_string(),
                    public_key: self.public_key.clone(),
                    weight: 1,
                },
                authority: None,
            }
        }
    }

    async fn register_simple(ledger: &MemoryLedger, party: &Party) {
        let spec = AuthoritySpec {
            weight_threshold: 1,
            account_auths: vec![],
            key_auths: vec![(party.public_key.clone(), 1)],
        };
        ledger
            .register_account(party.name, spec.clone(), spec.clone(), spec, "PUBmemo")
            .await;
    }

    /// treasury is 2-of-3 over alice, bob, carol; mallory is an outsider
    async fn setup() -> (MemoryLedger, Party, Party, Party, Party) {
        let ledger = MemoryLedger::new();
        let alice = Party::new("alice");
        let bob = Party::new("bob");
        let carol = Party::new("carol");
        let mallory = Party::new("mallory");
        for party in [&alice, &bob, &carol, &mallory] {
            register_simple(&ledger, party).await;
        }
        ledger
            .register_account(
                "treasury",
                AuthoritySpec::default(),
                AuthoritySpec {
                    weight_threshold: 2,
                    account_auths: vec![
                        ("alice".to_string(), 1),
                        ("bob".to_string(), 1),
                        ("carol".to_string(), 1),
                    ],
                    key_auths: vec![],
                },
                AuthoritySpec::default(),
                "PUBtreasuryMemo",
            )
            .await;
        (ledger, alice, bob, carol, mallory)
    }

    fn treasury_tx() -> Transaction {
        Transaction::new(
            7,
            99,
            Utc::now() + Duration::hours(1),
            vec![Operation::new(
                "transfer",
                json!({"from": "treasury", "to": "vendor", "amount": "10.000", "memo": ""}),
            )],
        )
    }

    #[tokio::test]
    async fn test_decode_for_targeted_recipient() {
        let (ledger, alice, bob, _carol, _mallory) = setup().await;
        let tx = treasury_tx();
        let request = encode_signature_request(&alice.signer, &ledger, &tx, &alice.params())
            .await
            .unwrap();

        let decoded = decode_signature_requests(&bob.signer, &ledger, &[request.clone()], "bob")
            .await
            .unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].signature_request_id, request.id);
        assert_eq!(decoded[0].recipient_username, "bob");
        assert_eq!(decoded[0].transaction.operations, tx.operations);
        assert_eq!(decoded[0].signer.public_key, bob.public_key);
    }

    #[tokio::test]
    async fn test_initiator_skips_own_request() {
        let (ledger, alice, _bob, _carol, _mallory) = setup().await;
        let request =
            encode_signature_request(&alice.signer, &ledger, &treasury_tx(), &alice.params())
                .await
                .unwrap();

        let result =
            decode_signature_requests(&alice.signer, &ledger, &[request], "alice").await;
        assert!(matches!(
            result,
            Err(CoordinationError::NoDecodableTransactions)
        ));
    }

    #[tokio::test]
    async fn test_untargeted_recipient_decodes_nothing() {
        let (ledger, alice, _bob, _carol, mallory) = setup().await;
        let request =
            encode_signature_request(&alice.signer, &ledger, &treasury_tx(), &alice.params())
                .await
                .unwrap();

        let result =
            decode_signature_requests(&mallory.signer, &ledger, &[request], "mallory").await;
        assert!(matches!(
            result,
            Err(CoordinationError::NoDecodableTransactions)
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_initiator_rejected_at_decode() {
        let (ledger, _alice, bob, _carol, mallory) = setup().await;
        // Mallory forges a request using an explicit authority that
        // includes bob, posing as a legitimate initiator
        let authority = crate::ledger::resolve_authority(&ledger, "treasury", KeyClass::Active)
            .await
            .unwrap();
        let mut params = mallory.params();
        params.authority = Some(authority);

        let request =
            encode_signature_request(&mallory.signer, &ledger, &treasury_tx(), &params)
                .await
                .unwrap();
        // Bob can decrypt the entry, but validation must reject it
        let result = decode_signature_requests(&bob.signer, &ledger, &[request], "bob").await;
        assert!(matches!(
            result,
            Err(CoordinationError::NoDecodableTransactions)
        ));
    }

    #[tokio::test]
    async fn test_ledger_outage_propagates() {
        use crate::ledger::{AccountSnapshot, BroadcastConfirmation};
        use async_trait::async_trait;

        // Every read fails at the transport level
        struct OutageLedger;

        #[async_trait]
        impl LedgerClient for OutageLedger {
            async fn account_snapshot(
                &self,
                _account: &str,
            ) -> Result<AccountSnapshot, LedgerError> {
                Err(LedgerError::Rpc("connection reset".to_string()))
            }

            async fn broadcast(
                &self,
                _tx: &Transaction,
            ) -> Result<BroadcastConfirmation, LedgerError> {
                Err(LedgerError::Rpc("connection reset".to_string()))
            }
        }

        let (ledger, alice, bob, _carol, _mallory) = setup().await;
        let request =
            encode_signature_request(&alice.signer, &ledger, &treasury_tx(), &alice.params())
                .await
                .unwrap();

        // The outage must surface as a ledger error, not as an empty batch
        let result =
            decode_signature_requests(&bob.signer, &OutageLedger, &[request], "bob").await;
        assert!(matches!(
            result,
            Err(CoordinationError::Ledger(LedgerError::Rpc(_)))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_entry_does_not_abort_siblings() {
        let (ledger, alice, bob, _carol, _mallory) = setup().await;
        let mut request =
            encode_signature_request(&alice.signer, &ledger, &treasury_tx(), &alice.params())
                .await
                .unwrap();

        // Corrupt carol's entry; bob's must still decode
        for entry in &mut request.signers {
            if entry.public_key != bob.public_key {
                entry.encrypted_transaction = "00ff00ff".to_string();
            }
        }

        let mut batch = vec![request.clone()];
        // A second fully corrupt request must not poison the batch either
        let mut corrupt = request;
        for entry in &mut corrupt.signers {
            entry.encrypted_transaction = "zz-not-hex".to_string();
        }
        batch.push(corrupt);

        let decoded = decode_signature_requests(&bob.signer, &ledger, &batch, "bob")
            .await
            .unwrap();
        assert_eq!(decoded.len(), 1);
    }
}
