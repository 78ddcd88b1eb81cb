//! Signature request encoding and decoding
//!
//! A signature request packages one transaction into encrypted
//! per-signer bundles plus threshold/expiration metadata. The encoder
//! builds one on behalf of an initiating party; the decoder recovers a
//! recipient's copy and re-validates the initiator's authority before
//! accepting it.

pub mod decoder;
pub mod encoder;
pub mod request;

pub use decoder::{decode_signature_requests, DecodedTransaction};
pub use encoder::{encode_signature_request, EncodeParams, InitiatorProfile};
pub use request::{CoordinationError, Initiator, SignatureRequest, SignerEntry};
