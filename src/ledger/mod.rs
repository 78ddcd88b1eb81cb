//! Ledger state access and authority logic
//!
//! Provides:
//! - The weighted account-authority model (principals, key classes)
//! - The `LedgerClient` boundary the real RPC client must satisfy
//! - Authority resolution with one-level delegation expansion
//! - Initiator-over-broadcaster authority validation
//! - An in-memory ledger for tests and in-process demos

pub mod authority;
pub mod client;
pub mod memory;
pub mod resolver;
pub mod validator;

pub use authority::{AccountAuthority, AuthorityEntry, KeyClass, Principal};
pub use client::{
    AccountSnapshot, AuthoritySpec, BroadcastConfirmation, LedgerClient, LedgerError,
};
pub use memory::MemoryLedger;
pub use resolver::{expand_authority, potential_signers, resolve_authority, weight_of};
pub use validator::validate_initiator_over_broadcaster;
