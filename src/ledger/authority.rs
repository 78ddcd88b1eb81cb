//! Account authority model
//!
//! A weighted set of principals and the threshold required to act on an
//! account's behalf for a given key class.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named tier of authority with its own independent weighted signer set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyClass {
    Owner,
    Active,
    Posting,
}

impl fmt::Display for KeyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyClass::Owner => write!(f, "owner"),
            KeyClass::Active => write!(f, "active"),
            KeyClass::Posting => write!(f, "posting"),
        }
    }
}

/// A holder of weighted authority: an account name (indirect) or a
/// ledger-encoded public key (direct)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Principal {
    Account(String),
    Key(String),
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Account(name) => write!(f, "{}", name),
            Principal::Key(key) => write!(f, "{}", key),
        }
    }
}

/// One weighted entry of an account authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityEntry {
    pub principal: Principal,
    pub weight: u16,
}

/// The weighted signer set and threshold of one (account, key class) pair
///
/// Entries are unique by principal and keep their declaration order:
/// account principals first, then key principals, as the ledger declares
/// them. Encoders and decoders address signers positionally and by key,
/// so the order is load-bearing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountAuthority {
    pub account_name: String,
    pub key_class: KeyClass,
    pub weight_threshold: u32,
    pub entries: Vec<AuthorityEntry>,
}

impl AccountAuthority {
    /// Build an authority, dropping duplicate principals (first wins)
    pub fn new(
        account_name: String,
        key_class: KeyClass,
        weight_threshold: u32,
        entries: Vec<AuthorityEntry>,
    ) -> Self {
        let mut deduped: Vec<AuthorityEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !deduped.iter().any(|e| e.principal == entry.principal) {
                deduped.push(entry);
            }
        }
        Self {
            account_name,
            key_class,
            weight_threshold,
            entries: deduped,
        }
    }

    /// Look up a single principal's weight
    ///
    /// Absence means "no assertion", not zero: callers must treat `None`
    /// as unauthorized.
    pub fn weight_of(&self, principal: &Principal) -> Option<u16> {
        self.entries
            .iter()
            .find(|e| e.principal == *principal)
            .map(|e| e.weight)
    }

    /// An authority with no entries has no valid signers
    pub fn has_signers(&self) -> bool {
        !self.entries.is_empty()
    }
}
