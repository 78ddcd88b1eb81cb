//! Authority resolution
//!
//! Derives the weighted signer set and threshold for a (account, key
//! class) pair from ledger state, expanding account-principals one level
//! into that account's own public keys.

use crate::ledger::authority::{AccountAuthority, AuthorityEntry, KeyClass, Principal};
use crate::ledger::client::{LedgerClient, LedgerError};

/// Resolve the weighted authority of `account` for `key_class`
pub async fn resolve_authority(
    ledger: &dyn LedgerClient,
    account: &str,
    key_class: KeyClass,
) -> Result<AccountAuthority, LedgerError> {
    let snapshot = ledger.account_snapshot(account).await?;
    let spec = snapshot.authority(key_class);

    let mut entries = Vec::with_capacity(spec.account_auths.len() + spec.key_auths.len());
    for (name, weight) in &spec.account_auths {
        entries.push(AuthorityEntry {
            principal: Principal::Account(name.clone()),
            weight: *weight,
        });
    }
    for (key, weight) in &spec.key_auths {
        entries.push(AuthorityEntry {
            principal: Principal::Key(key.clone()),
            weight: *weight,
        });
    }

    Ok(AccountAuthority::new(
        account.to_string(),
        key_class,
        spec.weight_threshold,
        entries,
    ))
}

/// Expand an authority's entries into concrete (public key, weight) pairs
///
/// Key principals are emitted directly. Account principals are expanded
/// to that account's own public keys for the same key class, each
/// inheriting the parent entry's weight. Expansion is one level deep
/// only: grand-delegated accounts are not followed. Order is stable
/// (authority declaration order, then key order within an account); a
/// public key reachable through two paths keeps its first occurrence.
pub async fn expand_authority(
    ledger: &dyn LedgerClient,
    authority: &AccountAuthority,
) -> Result<Vec<(String, u16)>, LedgerError> {
    let mut signers: Vec<(String, u16)> = Vec::new();

    for entry in &authority.entries {
        match &entry.principal {
            Principal::Key(key) => {
                push_unique(&mut signers, key.clone(), entry.weight);
            }
            Principal::Account(name) => {
                // Delegated account may have been deleted since the
                // authority was declared; skip rather than fail.
                let snapshot = match ledger.account_snapshot(name).await {
                    Ok(s) => s,
                    Err(LedgerError::AccountNotFound(_)) => {
                        log::warn!(
                            "authority of {} references missing account {}, skipping",
                            authority.account_name,
                            name
                        );
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                for (key, _) in &snapshot.authority(authority.key_class).key_auths {
                    push_unique(&mut signers, key.clone(), entry.weight);
                }
            }
        }
    }

    Ok(signers)
}

fn push_unique(signers: &mut Vec<(String, u16)>, key: String, weight: u16) {
    if !signers.iter().any(|(k, _)| *k == key) {
        signers.push((key, weight));
    }
}

/// All concrete (public key, weight) pairs able to sign for `account`
/// under `key_class`
pub async fn potential_signers(
    ledger: &dyn LedgerClient,
    account: &str,
    key_class: KeyClass,
) -> Result<Vec<(String, u16)>, LedgerError> {
    let authority = resolve_authority(ledger, account, key_class).await?;
    expand_authority(ledger, &authority).await
}

/// Look up a single principal's weight over `account` without expanding
/// the full signer set
///
/// Returns `None` (never zero) when the principal is absent: absence
/// means "no assertion" and callers must treat it as unauthorized.
pub async fn weight_of(
    ledger: &dyn LedgerClient,
    principal: &Principal,
    account: &str,
    key_class: KeyClass,
) -> Result<Option<u16>, LedgerError> {
    let authority = resolve_authority(ledger, account, key_class).await?;
    Ok(authority.weight_of(principal))
}
