//! Signature request encoding
//!
//! Packages a transaction into a per-signer encrypted bundle addressed
//! to exactly the accounts/keys with authority over its broadcaster.

use chrono::{DateTime, Utc};

use crate::chain::{extract_broadcaster, Transaction};
use crate::ledger::{
    expand_authority, resolve_authority, AccountAuthority, KeyClass, LedgerClient, Principal,
};
use crate::provider::SigningProvider;
use crate::request::request::{CoordinationError, Initiator, SignatureRequest, SignerEntry};

/// Identity of the party initiating a signature request
#[derive(Debug, Clone)]
pub struct InitiatorProfile {
    /// Account name
    pub username: String,
    /// Ledger-encoded public key the initiator signs with
    pub public_key: String,
    /// The initiator's own weight toward the threshold
    pub weight: u16,
}

/// Parameters for encoding a signature request
#[derive(Debug, Clone)]
pub struct EncodeParams {
    pub key_class: KeyClass,
    pub expiration_date: DateTime<Utc>,
    pub initiator: InitiatorProfile,
    /// Explicit authority to fan out to; when absent the broadcaster is
    /// extracted from the transaction and its authority resolved live
    pub authority: Option<AccountAuthority>,
}

/// Build a signature request for `tx`
///
/// Signs as the initiator, resolves the weighted signer set, and
/// encrypts the signed transaction to every remaining signer. The
/// initiator's own principal and key are excluded from the fan-out: its
/// signature rides in the request's initiator field only. Any provider
/// failure aborts the whole request; no partial request is returned.
pub async fn encode_signature_request(
    provider: &dyn SigningProvider,
    ledger: &dyn LedgerClient,
    tx: &Transaction,
    params: &EncodeParams,
) -> Result<SignatureRequest, CoordinationError> {
    // Initiator signature first: failure here is fatal to encoding
    let initiator_signature = provider
        .sign(&params.initiator.username, tx, params.key_class)
        .await
        .map_err(CoordinationError::Signing)?;

    let authority = match &params.authority {
        Some(authority) => authority.clone(),
        None => {
            let broadcaster =
                extract_broadcaster(tx).ok_or(CoordinationError::BroadcasterUnresolved)?;
            resolve_authority(ledger, &broadcaster, params.key_class).await?
        }
    };

    // Exclude the initiator's own principal and key from the fan-out
    let mut fan_out = authority.clone();
    fan_out.entries.retain(|entry| {
        entry.principal != Principal::Account(params.initiator.username.clone())
            && entry.principal != Principal::Key(params.initiator.public_key.clone())
    });

    let signers: Vec<(String, u16)> = expand_authority(ledger, &fan_out)
        .await?
        .into_iter()
        .filter(|(key, _)| *key != params.initiator.public_key)
        .collect();

    let signed_tx = tx.with_signature(initiator_signature.clone());
    let plaintext = serde_json::to_vec(&signed_tx)?;

    let keys: Vec<String> = signers.iter().map(|(key, _)| key.clone()).collect();
    let mut ciphertexts = provider
        .encrypt(&keys, &plaintext)
        .await
        .map_err(|e| CoordinationError::Encoding(e.to_string()))?;

    // Demultiplex by public key; the provider may return results in any
    // order and may omit keys it cannot address
    let mut entries = Vec::with_capacity(signers.len());
    for (key, weight) in signers {
        match ciphertexts.remove(&key) {
            Some(ciphertext) => {
                entries.push(SignerEntry::new(key, hex::encode(ciphertext), weight));
            }
            None => {
                log::warn!(
                    "provider returned no ciphertext for {}, dropping from fan-out",
                    key
                );
            }
        }
    }

    let initiator = Initiator {
        principal: params.initiator.username.clone(),
        public_key: params.initiator.public_key.clone(),
        signature: initiator_signature,
        weight: params.initiator.weight,
    };

    let request = SignatureRequest::new(
        authority.weight_threshold,
        params.key_class,
        params.expiration_date,
        initiator,
        entries,
    );
    log::info!(
        "encoded signature request {} for {} ({} signers, threshold {})",
        request.id,
        authority.account_name,
        request.signers.len(),
        request.threshold
    );
    Ok(request)
}
