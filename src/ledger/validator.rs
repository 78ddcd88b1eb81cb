//! Authority validation
//!
//! The sole gate preventing an unauthorized party from posing as a
//! legitimate co-signer initiator. It runs on every decode, not only at
//! encode time: the decoding party cannot otherwise trust the encoder's
//! claims, and authority may have changed on the ledger in between.

use crate::chain::{extract_broadcaster, Transaction};
use crate::ledger::authority::KeyClass;
use crate::ledger::client::{LedgerClient, LedgerError};
use crate::ledger::resolver::potential_signers;

/// Check that `initiator` holds nonzero weight over the broadcaster of
/// `tx` for `key_class`
///
/// Fails closed: an unresolvable broadcaster, an unknown initiator or
/// broadcaster account, or an initiator whose keys carry no weight all
/// yield `Ok(false)`. Only transport-level ledger failures surface as
/// errors.
pub async fn validate_initiator_over_broadcaster(
    ledger: &dyn LedgerClient,
    initiator: &str,
    key_class: KeyClass,
    tx: &Transaction,
) -> Result<bool, LedgerError> {
    let broadcaster = match extract_broadcaster(tx) {
        Some(account) => account,
        None => {
            log::debug!("authority validation: broadcaster unresolved, failing closed");
            return Ok(false);
        }
    };

    let initiator_keys = match ledger.account_snapshot(initiator).await {
        Ok(snapshot) => snapshot
            .authority(key_class)
            .key_auths
            .iter()
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>(),
        Err(LedgerError::AccountNotFound(_)) => {
            log::debug!("authority validation: initiator {} unknown", initiator);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let signers = match potential_signers(ledger, &broadcaster, key_class).await {
        Ok(signers) => signers,
        Err(LedgerError::AccountNotFound(_)) => {
            log::debug!("authority validation: broadcaster {} unknown", broadcaster);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let authorized = initiator_keys.iter().any(|key| {
        signers
            .iter()
            .any(|(signer_key, weight)| signer_key == key && *weight > 0)
    });

    if !authorized {
        log::warn!(
            "initiator {} holds no {} authority over broadcaster {}",
            initiator,
            key_class,
            broadcaster
        );
    }

    Ok(authorized)
}
