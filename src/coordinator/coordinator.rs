//! Lifecycle coordinator
//!
//! Owns the signature requests of one party, drives their state
//! machines, and exchanges protocol messages over the signer channel.
//! The coordinator is reactive: inbound channel events move requests
//! forward, and many requests run concurrently with independent state.
//!
//! Decoded transactions targeting this party are delivered to the
//! application through an mpsc receiver; the application answers with
//! [`Coordinator::approve`] or [`Coordinator::refuse`].

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::coordinator::channel::{ChannelError, SignerChannel};
use crate::coordinator::lifecycle::{LifecycleEvent, RequestState, TrackedRequest};
use crate::coordinator::message::{
    Envelope, InitialSigner, NotifyTxBroadcastedMessage, RefuseTransactionMessage,
    RequestSignatureMessage, SignTransactionMessage, SignerConnectMessage,
    NOTIFY_TRANSACTION_BROADCASTED, NOTIFY_TRANSACTION_REFUSED, REQUEST_SIGNATURE,
    REQUEST_SIGN_TRANSACTION, SIGNER_CONNECT, SIGN_TRANSACTION,
    TRANSACTION_BROADCASTED_NOTIFICATION,
};
use crate::chain::Transaction;
use crate::ledger::LedgerClient;
use crate::provider::SigningProvider;
use crate::request::{
    decode_signature_requests, encode_signature_request, CoordinationError, DecodedTransaction,
    EncodeParams,
};

/// Buffer for decoded transactions awaiting the application's verdict
const INBOUND_CAPACITY: usize = 64;

/// Coordinates signature requests for one signing party
pub struct Coordinator {
    username: String,
    provider: Arc<dyn SigningProvider>,
    ledger: Arc<dyn LedgerClient>,
    channel: Box<dyn SignerChannel>,
    requests: HashMap<String, TrackedRequest>,
    inbound: mpsc::Sender<DecodedTransaction>,
}

impl Coordinator {
    /// Create a coordinator and the receiver the application consumes
    /// decoded transactions from
    pub fn new(
        username: impl Into<String>,
        provider: Arc<dyn SigningProvider>,
        ledger: Arc<dyn LedgerClient>,
        channel: Box<dyn SignerChannel>,
    ) -> (Self, mpsc::Receiver<DecodedTransaction>) {
        let (inbound, rx) = mpsc::channel(INBOUND_CAPACITY);
        (
            Self {
                username: username.into(),
                provider,
                ledger,
                channel,
                requests: HashMap::new(),
                inbound,
            },
            rx,
        )
    }

    /// This coordinator's account name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Announce this signer on the channel with a signed challenge
    pub async fn connect(&mut self, message: SignerConnectMessage) -> Result<(), ChannelError> {
        self.channel
            .emit(SIGNER_CONNECT, serde_json::to_value(&message).unwrap_or(Value::Null))
            .await
    }

    /// Encode a signature request for `tx` and dispatch it to the
    /// channel; returns the request id
    pub async fn submit(
        &mut self,
        tx: Transaction,
        params: &EncodeParams,
    ) -> Result<String, CoordinationError> {
        let request =
            encode_signature_request(self.provider.as_ref(), self.ledger.as_ref(), &tx, params)
                .await?;
        let id = request.id.clone();

        let message = RequestSignatureMessage {
            signature_request: request.clone(),
            initial_signer: InitialSigner {
                username: params.initiator.username.clone(),
                public_key: params.initiator.public_key.clone(),
                weight: params.initiator.weight,
            },
        };

        let mut tracked = TrackedRequest::new(request, Some(tx));
        self.channel
            .emit(REQUEST_SIGNATURE, serde_json::to_value(&message)?)
            .await?;
        tracked.mark_dispatched();
        self.requests.insert(id.clone(), tracked);
        log::info!("{} dispatched signature request {}", self.username, id);
        Ok(id)
    }

    /// Sign a decoded transaction and return the signature to its
    /// initiator
    pub async fn approve(
        &mut self,
        decoded: &DecodedTransaction,
    ) -> Result<(), CoordinationError> {
        let signature = self
            .provider
            .sign(&self.username, &decoded.transaction, decoded.key_class)
            .await
            .map_err(CoordinationError::Signing)?;

        let message = SignTransactionMessage {
            signature,
            signer_id: decoded.signer.id.clone(),
            signature_request_id: decoded.signature_request_id.clone(),
        };
        self.channel
            .emit(SIGN_TRANSACTION, serde_json::to_value(&message)?)
            .await?;
        Ok(())
    }

    /// Decline a decoded transaction
    pub async fn refuse(
        &mut self,
        decoded: &DecodedTransaction,
    ) -> Result<(), CoordinationError> {
        if let Some(tracked) = self.requests.get_mut(&decoded.signature_request_id) {
            tracked.apply_refusal(&decoded.signer.id, Utc::now())?;
        }
        let message = RefuseTransactionMessage {
            signer_id: decoded.signer.id.clone(),
            signature_request_id: decoded.signature_request_id.clone(),
        };
        self.channel
            .emit(NOTIFY_TRANSACTION_REFUSED, serde_json::to_value(&message)?)
            .await?;
        Ok(())
    }

    /// Receive and handle one inbound channel event
    pub async fn step(&mut self) -> Result<(), CoordinationError> {
        let envelope = self.channel.recv().await?;
        self.handle(envelope).await
    }

    /// Drive the coordinator until the channel closes
    pub async fn run(mut self) -> Result<(), CoordinationError> {
        loop {
            match self.step().await {
                Ok(()) => {}
                Err(CoordinationError::Channel(ChannelError::Closed)) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Current lifecycle state of a request, applying the lazy
    /// expiration check
    pub fn request_state(&mut self, id: &str) -> Option<RequestState> {
        let tracked = self.requests.get_mut(id)?;
        tracked.check_expiry(Utc::now());
        Some(tracked.state)
    }

    /// Requests still awaiting signatures, expiring stale ones first
    pub fn pending_requests(&mut self) -> Vec<&TrackedRequest> {
        let now = Utc::now();
        for tracked in self.requests.values_mut() {
            tracked.check_expiry(now);
        }
        self.requests
            .values()
            .filter(|t| {
                matches!(
                    t.state,
                    RequestState::Created | RequestState::AwaitingSignatures
                )
            })
            .collect()
    }

    async fn handle(&mut self, envelope: Envelope) -> Result<(), CoordinationError> {
        match envelope.event.as_str() {
            REQUEST_SIGN_TRANSACTION => self.on_request_sign(envelope.payload).await,
            SIGN_TRANSACTION => self.on_sign_transaction(envelope.payload).await,
            NOTIFY_TRANSACTION_REFUSED => self.on_refusal(envelope.payload).await,
            TRANSACTION_BROADCASTED_NOTIFICATION => self.on_broadcast_notification(envelope.payload),
            SIGNER_CONNECT => self.on_signer_connect(envelope.payload),
            other => {
                log::debug!("{} ignoring unknown event {}", self.username, other);
                Ok(())
            }
        }
    }

    /// A signature request arrived; decode what is addressed to us and
    /// hand it to the application
    async fn on_request_sign(&mut self, payload: Value) -> Result<(), CoordinationError> {
        let message: RequestSignatureMessage = match serde_json::from_value(payload) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("{} received malformed signature request: {}", self.username, e);
                return Ok(());
            }
        };

        let request = message.signature_request;
        let decoded = match decode_signature_requests(
            self.provider.as_ref(),
            self.ledger.as_ref(),
            std::slice::from_ref(&request),
            &self.username,
        )
        .await
        {
            Ok(decoded) => decoded,
            Err(CoordinationError::NoDecodableTransactions) => {
                log::debug!(
                    "{}: request {} carries nothing decodable for us",
                    self.username,
                    request.id
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        // Track the request so later refusals and broadcast
        // notifications can be applied to it
        let mut tracked = TrackedRequest::new(request, None);
        tracked.mark_dispatched();
        self.requests.insert(tracked.request.id.clone(), tracked);

        for tx in decoded {
            if self.inbound.send(tx).await.is_err() {
                log::warn!("{}: application receiver dropped", self.username);
                break;
            }
        }
        Ok(())
    }

    /// A signer returned a signature for a request we track
    async fn on_sign_transaction(&mut self, payload: Value) -> Result<(), CoordinationError> {
        let message: SignTransactionMessage = match serde_json::from_value(payload) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("{} received malformed signature: {}", self.username, e);
                return Ok(());
            }
        };

        let tracked = match self.requests.get_mut(&message.signature_request_id) {
            Some(t) => t,
            None => {
                log::debug!(
                    "{}: signature for untracked request {}",
                    self.username,
                    message.signature_request_id
                );
                return Ok(());
            }
        };

        // Lifecycle rejections (unknown entry, already refused) come from
        // remote-supplied data and must not kill the event loop
        let event = match tracked.apply_signature(&message.signer_id, &message.signature, Utc::now())
        {
            Ok(event) => event,
            Err(e) => {
                log::warn!(
                    "{}: rejecting signature for request {}: {}",
                    self.username,
                    message.signature_request_id,
                    e
                );
                return Ok(());
            }
        };
        if event == LifecycleEvent::ThresholdReached {
            self.broadcast(&message.signature_request_id).await?;
        }
        Ok(())
    }

    /// Broadcast a threshold-satisfied request and notify the channel
    async fn broadcast(&mut self, request_id: &str) -> Result<(), CoordinationError> {
        let tracked = self
            .requests
            .get_mut(request_id)
            .ok_or_else(|| CoordinationError::UnknownRequest(request_id.to_string()))?;

        // Only the initiating side holds the transaction to broadcast
        let final_tx = match tracked.final_transaction() {
            Some(tx) => tx,
            None => return Ok(()),
        };

        let confirmation = self.ledger.broadcast(&final_tx).await?;
        tracked.mark_broadcasted();
        log::info!(
            "{} broadcast request {} as ledger tx {}",
            self.username,
            request_id,
            confirmation.tx_id
        );

        let message = NotifyTxBroadcastedMessage {
            signature_request_id: request_id.to_string(),
        };
        self.channel
            .emit(NOTIFY_TRANSACTION_BROADCASTED, serde_json::to_value(&message)?)
            .await?;
        Ok(())
    }

    /// A signer declined an entry of a request we track
    async fn on_refusal(&mut self, payload: Value) -> Result<(), CoordinationError> {
        let message: RefuseTransactionMessage = match serde_json::from_value(payload) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("{} received malformed refusal: {}", self.username, e);
                return Ok(());
            }
        };

        if let Some(tracked) = self.requests.get_mut(&message.signature_request_id) {
            if let Err(e) = tracked.apply_refusal(&message.signer_id, Utc::now()) {
                log::warn!(
                    "{}: rejecting refusal for request {}: {}",
                    self.username,
                    message.signature_request_id,
                    e
                );
            }
        }
        Ok(())
    }

    /// The initiator reports the transaction reached the ledger
    fn on_broadcast_notification(&mut self, payload: Value) -> Result<(), CoordinationError> {
        let message: NotifyTxBroadcastedMessage = match serde_json::from_value(payload) {
            Ok(m) => m,
            Err(e) => {
                log::warn!(
                    "{} received malformed broadcast notification: {}",
                    self.username,
                    e
                );
                return Ok(());
            }
        };

        if let Some(tracked) = self.requests.get_mut(&message.signature_request_id) {
            tracked.mark_broadcasted();
            log::info!(
                "{}: request {} was broadcast",
                self.username,
                message.signature_request_id
            );
        }
        Ok(())
    }

    /// Another signer joined the channel
    fn on_signer_connect(&mut self, payload: Value) -> Result<(), CoordinationError> {
        let message: SignerConnectMessage = match serde_json::from_value(payload) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("{} received malformed connect: {}", self.username, e);
                return Ok(());
            }
        };

        match message.verify() {
            Ok(true) => log::info!("{}: signer {} connected", self.username, message.username),
            _ => log::warn!(
                "{}: rejecting connect from {} (bad challenge signature)",
                self.username,
                message.username
            ),
        }
        Ok(())
    }
}
