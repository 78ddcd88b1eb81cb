//! Signature request lifecycle coordination
//!
//! Provides:
//! - The protocol event names and wire message shapes
//! - The `SignerChannel` transport boundary plus an in-process hub
//! - The per-request lifecycle state machine
//! - The reactive coordinator tying channel I/O to encode/decode logic

pub mod channel;
pub mod coordinator;
pub mod lifecycle;
pub mod message;

pub use channel::{ChannelError, HubChannel, LocalHub, SignerChannel};
pub use coordinator::Coordinator;
pub use lifecycle::{LifecycleEvent, RequestState, TrackedRequest};
pub use message::{
    Envelope, InitialSigner, NotifyTxBroadcastedMessage, RefuseTransactionMessage,
    RequestSignatureMessage, SignTransactionMessage, SignerConnectMessage,
    NOTIFY_TRANSACTION_BROADCASTED, NOTIFY_TRANSACTION_REFUSED, REQUEST_SIGNATURE,
    REQUEST_SIGN_TRANSACTION, SIGNER_CONNECT, SIGN_TRANSACTION,
    TRANSACTION_BROADCASTED_NOTIFICATION,
};
