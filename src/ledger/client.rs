//! Ledger read/broadcast client boundary
//!
//! The real RPC client lives outside this crate; this is the exact
//! contract the coordination core requires of it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::Transaction;
use crate::ledger::authority::KeyClass;

/// Errors surfaced by a ledger client
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Broadcast rejected: {0}")]
    BroadcastRejected(String),
    #[error("Ledger RPC error: {0}")]
    Rpc(String),
}

/// Raw weighted authority of one key class, as the ledger stores it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthoritySpec {
    pub weight_threshold: u32,
    /// (account name, weight) pairs in declaration order
    pub account_auths: Vec<(String, u16)>,
    /// (ledger-encoded public key, weight) pairs in declaration order
    pub key_auths: Vec<(String, u16)>,
}

/// Snapshot of one account's authority structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub name: String,
    pub owner: AuthoritySpec,
    pub active: AuthoritySpec,
    pub posting: AuthoritySpec,
    pub memo_key: String,
}

impl AccountSnapshot {
    /// The authority spec for a key class; each branch is fully
    /// independent (no fallthrough between classes)
    pub fn authority(&self, key_class: KeyClass) -> &AuthoritySpec {
        match key_class {
            KeyClass::Owner => &self.owner,
            KeyClass::Active => &self.active,
            KeyClass::Posting => &self.posting,
        }
    }
}

/// Confirmation returned by a successful broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastConfirmation {
    /// Transaction id assigned by the ledger
    pub tx_id: String,
}

/// Read access to ledger account state plus transaction broadcast
///
/// Reads are read-only and may be served from a best-effort cache;
/// callers of this crate must tolerate stale reads (authority is always
/// re-validated at decode time).
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch an account's authority snapshot
    async fn account_snapshot(&self, account: &str) -> Result<AccountSnapshot, LedgerError>;

    /// Submit a fully signed transaction to the ledger
    async fn broadcast(&self, tx: &Transaction) -> Result<BroadcastConfirmation, LedgerError>;
}
