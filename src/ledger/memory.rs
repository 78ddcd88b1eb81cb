//! In-memory ledger client
//!
//! Backs tests and in-process demos. Accounts are registered up front;
//! broadcasts are captured rather than submitted anywhere.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::chain::Transaction;
use crate::crypto::sha256_hex;
use crate::ledger::client::{
    AccountSnapshot, AuthoritySpec, BroadcastConfirmation, LedgerClient, LedgerError,
};

/// An in-memory [`LedgerClient`]
#[derive(Default)]
pub struct MemoryLedger {
    accounts: RwLock<HashMap<String, AccountSnapshot>>,
    broadcasts: RwLock<Vec<Transaction>>,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account with its full authority structure
    pub async fn register_account(
        &self,
        name: &str,
        owner: AuthoritySpec,
        active: AuthoritySpec,
        posting: AuthoritySpec,
        memo_key: &str,
    ) {
        let snapshot = AccountSnapshot {
            name: name.to_string(),
            owner,
            active,
            posting,
            memo_key: memo_key.to_string(),
        };
        self.accounts
            .write()
            .await
            .insert(name.to_string(), snapshot);
    }

    /// Transactions broadcast through this ledger, in submission order
    pub async fn broadcasts(&self) -> Vec<Transaction> {
        self.broadcasts.read().await.clone()
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn account_snapshot(&self, account: &str) -> Result<AccountSnapshot, LedgerError> {
        self.accounts
            .read()
            .await
            .get(account)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))
    }

    async fn broadcast(&self, tx: &Transaction) -> Result<BroadcastConfirmation, LedgerError> {
        if tx.signatures.is_empty() {
            return Err(LedgerError::BroadcastRejected(
                "transaction carries no signatures".to_string(),
            ));
        }
        let tx_id = sha256_hex(&tx.digest());
        self.broadcasts.write().await.push(tx.clone());
        Ok(BroadcastConfirmation { tx_id })
    }
}
