//! Real-time signer channel boundary
//!
//! The production transport (a socket server relaying between parties)
//! lives outside this crate. `SignerChannel` is the contract it must
//! satisfy; `LocalHub` is an in-process implementation over a tokio
//! broadcast channel, sufficient for tests and multi-session demos in
//! one process.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::coordinator::message::{
    Envelope, NOTIFY_TRANSACTION_BROADCASTED, REQUEST_SIGNATURE, REQUEST_SIGN_TRANSACTION,
    TRANSACTION_BROADCASTED_NOTIFICATION,
};

/// Channel buffer for the in-process hub
const HUB_CAPACITY: usize = 256;

/// Transport-level channel failures
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Bidirectional named-event channel between signing parties
#[async_trait]
pub trait SignerChannel: Send {
    /// Emit an event to the other parties
    async fn emit(&mut self, event: &str, payload: Value) -> Result<(), ChannelError>;

    /// Wait for the next inbound event
    async fn recv(&mut self) -> Result<Envelope, ChannelError>;
}

/// The relay renames dispatch events on the receiving side, the way the
/// production socket backend does: an initiator emits
/// `REQUEST_SIGNATURE`, targeted signers receive
/// `REQUEST_SIGN_TRANSACTION`.
fn relayed_event(event: &str) -> &str {
    match event {
        REQUEST_SIGNATURE => REQUEST_SIGN_TRANSACTION,
        NOTIFY_TRANSACTION_BROADCASTED => TRANSACTION_BROADCASTED_NOTIFICATION,
        other => other,
    }
}

/// In-process relay hub connecting multiple [`SignerChannel`]s
pub struct LocalHub {
    tx: broadcast::Sender<Envelope>,
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    /// Open a channel for `username`
    pub fn channel(&self, username: &str) -> HubChannel {
        HubChannel {
            username: username.to_string(),
            tx: self.tx.clone(),
            rx: self.tx.subscribe(),
        }
    }
}

/// One party's handle onto a [`LocalHub`]
pub struct HubChannel {
    username: String,
    tx: broadcast::Sender<Envelope>,
    rx: broadcast::Receiver<Envelope>,
}

#[async_trait]
impl SignerChannel for HubChannel {
    async fn emit(&mut self, event: &str, payload: Value) -> Result<(), ChannelError> {
        let envelope = Envelope {
            from: self.username.clone(),
            event: relayed_event(event).to_string(),
            payload,
        };
        log::debug!("{} emits {}", self.username, event);
        self.tx
            .send(envelope)
            .map(|_| ())
            .map_err(|_| ChannelError::Closed)
    }

    async fn recv(&mut self) -> Result<Envelope, ChannelError> {
        loop {
            match self.rx.recv().await {
                // Own emissions are not delivered back
                Ok(envelope) if envelope.from == self.username => continue,
                Ok(envelope) => return Ok(envelope),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("{} lagged behind by {} channel events", self.username, n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(ChannelError::Closed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_hub_relays_between_parties() {
        let hub = LocalHub::new();
        let mut alice = hub.channel("alice");
        let mut bob = hub.channel("bob");

        alice
            .emit(REQUEST_SIGNATURE, json!({"hello": "bob"}))
            .await
            .unwrap();

        let envelope = bob.recv().await.unwrap();
        assert_eq!(envelope.from, "alice");
        // Dispatch events are renamed on the receiving side
        assert_eq!(envelope.event, REQUEST_SIGN_TRANSACTION);
        assert_eq!(envelope.payload, json!({"hello": "bob"}));
    }

    #[tokio::test]
    async fn test_own_events_not_echoed() {
        let hub = LocalHub::new();
        let mut alice = hub.channel("alice");
        let mut bob = hub.channel("bob");

        alice.emit("PING", json!(1)).await.unwrap();
        bob.emit("PING", json!(2)).await.unwrap();

        // Alice only sees bob's event
        let envelope = alice.recv().await.unwrap();
        assert_eq!(envelope.from, "bob");
        assert_eq!(envelope.payload, json!(2));
    }
}
