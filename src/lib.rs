//! Multisig Coordinator: weighted-threshold signature coordination
//!
//! This crate coordinates collection of multiple cryptographic
//! signatures for a single blockchain transaction before it is
//! broadcast, on behalf of an account whose authority is shared among
//! several keys or sub-accounts with weighted thresholds. It provides:
//! - Authority resolution (weighted signer sets and thresholds from
//!   ledger state, with one-level delegation expansion)
//! - Broadcaster extraction (which account's authority governs a
//!   transaction, fail-closed)
//! - Initiator authority validation (re-checked on every decode)
//! - Signature request encoding (per-signer encrypted bundles) and
//!   decoding
//! - A reactive lifecycle coordinator with an edge-triggered threshold
//!   state machine
//!
//! The signing/encryption primitive, the real-time channel transport,
//! and the ledger RPC client are trait boundaries; in-process
//! implementations ([`provider::LocalSigner`], [`coordinator::LocalHub`],
//! [`ledger::MemoryLedger`]) back tests and demos.
//!
//! # Example
//!
//! ```ignore
//! use multisig_coordinator::coordinator::{Coordinator, LocalHub};
//!
//! let hub = LocalHub::new();
//! let (mut coordinator, mut inbound) =
//!     Coordinator::new("alice", provider, ledger, Box::new(hub.channel("alice")));
//!
//! // Dispatch a signature request for a 2-of-3 treasury transfer
//! let request_id = coordinator.submit(tx, &params).await?;
//!
//! // Elsewhere, a co-signer decodes and approves
//! let decoded = inbound.recv().await.unwrap();
//! coordinator.approve(&decoded).await?;
//! ```

pub mod chain;
pub mod coordinator;
pub mod crypto;
pub mod ledger;
pub mod provider;
pub mod request;

// Re-export commonly used types
pub use chain::{extract_broadcaster, Operation, Transaction};
pub use coordinator::{Coordinator, LocalHub, RequestState, SignerChannel};
pub use crypto::KeyPair;
pub use ledger::{
    potential_signers, resolve_authority, validate_initiator_over_broadcaster, weight_of,
    AccountAuthority, KeyClass, LedgerClient, MemoryLedger, Principal,
};
pub use provider::{LocalSigner, SigningProvider};
pub use request::{
    decode_signature_requests, encode_signature_request, CoordinationError, DecodedTransaction,
    EncodeParams, InitiatorProfile, SignatureRequest, SignerEntry,
};
