//! Signature request lifecycle state machine
//!
//! States: `Created → AwaitingSignatures → ReadyToBroadcast →
//! Broadcasted`, with `Refused` and `Expired` as absorbing alternate
//! terminals. The threshold transition is edge-triggered from the
//! current total state, so out-of-order or duplicate delivery of the
//! same signature can never broadcast twice. Expiration is checked
//! lazily whenever a request is touched; no background timer exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::Transaction;
use crate::request::{CoordinationError, SignatureRequest};

/// Lifecycle state of one tracked signature request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    /// Encoded but not yet dispatched to the channel
    Created,
    /// Dispatched; entries accumulate signatures or refusals
    AwaitingSignatures,
    /// Threshold reached; broadcast pending
    ReadyToBroadcast,
    /// Ledger accepted the transaction (terminal)
    Broadcasted,
    /// Threshold can no longer be reached (terminal)
    Refused,
    /// Expiration date passed before completion (terminal)
    Expired,
}

impl RequestState {
    /// Whether the state accepts no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Broadcasted | RequestState::Refused | RequestState::Expired
        )
    }
}

/// Outcome of applying an event to a tracked request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The event was absorbed without a state transition
    Unchanged,
    /// Accumulated weight first reached the threshold (fires at most once)
    ThresholdReached,
    /// Remaining unsigned weight can no longer reach the threshold
    Refused,
    /// The request expired
    Expired,
}

/// A signature request owned by this coordinator, with its state
#[derive(Debug, Clone)]
pub struct TrackedRequest {
    pub request: SignatureRequest,
    pub state: RequestState,
    /// The unsigned transaction, kept by the initiating side so the
    /// final signed transaction can be assembled at broadcast time
    pub transaction: Option<Transaction>,
}

impl TrackedRequest {
    /// Track a freshly encoded request
    pub fn new(request: SignatureRequest, transaction: Option<Transaction>) -> Self {
        Self {
            request,
            state: RequestState::Created,
            transaction,
        }
    }

    /// Record dispatch to the channel
    pub fn mark_dispatched(&mut self) {
        if self.state == RequestState::Created {
            self.state = RequestState::AwaitingSignatures;
        }
    }

    /// Lazy expiration check; returns true if the request just expired
    pub fn check_expiry(&mut self, now: DateTime<Utc>) -> bool {
        if matches!(
            self.state,
            RequestState::Created | RequestState::AwaitingSignatures
        ) && self.request.is_expired(now)
        {
            log::info!("signature request {} expired", self.request.id);
            self.state = RequestState::Expired;
            return true;
        }
        false
    }

    /// Apply an inbound signature for one signer entry
    ///
    /// The threshold transition is computed from the current total, not
    /// the triggering event, and fires exactly once. Signatures arriving
    /// after the threshold was reached are accepted for bookkeeping but
    /// never re-trigger it.
    pub fn apply_signature(
        &mut self,
        signer_id: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<LifecycleEvent, CoordinationError> {
        if self.check_expiry(now) {
            return Ok(LifecycleEvent::Expired);
        }
        if matches!(self.state, RequestState::Refused | RequestState::Expired) {
            return Ok(LifecycleEvent::Unchanged);
        }

        self.request.attach_signature(signer_id, signature)?;

        let awaiting = matches!(
            self.state,
            RequestState::Created | RequestState::AwaitingSignatures
        );
        if awaiting && self.request.threshold_met() {
            self.state = RequestState::ReadyToBroadcast;
            self.request.locked = true;
            log::info!(
                "signature request {} reached threshold ({}/{})",
                self.request.id,
                self.request.signed_weight(),
                self.request.threshold
            );
            return Ok(LifecycleEvent::ThresholdReached);
        }
        Ok(LifecycleEvent::Unchanged)
    }

    /// Apply an inbound refusal for one signer entry
    ///
    /// Moves to `Refused` when the feasibility check fails: signed
    /// weight plus all not-yet-refused weight can no longer reach the
    /// threshold.
    pub fn apply_refusal(
        &mut self,
        signer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LifecycleEvent, CoordinationError> {
        if self.check_expiry(now) {
            return Ok(LifecycleEvent::Expired);
        }
        if self.state.is_terminal() || self.state == RequestState::ReadyToBroadcast {
            return Ok(LifecycleEvent::Unchanged);
        }

        self.request.refuse(signer_id)?;

        if self.request.achievable_weight() < self.request.threshold {
            log::info!(
                "signature request {} refused: achievable weight {} < threshold {}",
                self.request.id,
                self.request.achievable_weight(),
                self.request.threshold
            );
            self.state = RequestState::Refused;
            return Ok(LifecycleEvent::Refused);
        }
        Ok(LifecycleEvent::Unchanged)
    }

    /// Record a successful ledger broadcast
    pub fn mark_broadcasted(&mut self) {
        self.state = RequestState::Broadcasted;
        self.request.broadcasted = true;
    }

    /// Assemble the fully signed transaction for broadcast
    ///
    /// Initiator signature first, then entry signatures in signer order.
    pub fn final_transaction(&self) -> Option<Transaction> {
        let mut tx = self.transaction.clone()?;
        tx.signatures.push(self.request.initiator.signature.clone());
        for entry in &self.request.signers {
            if let Some(signature) = &entry.signature {
                tx.signatures.push(signature.clone());
            }
        }
        Some(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::KeyClass;
    use crate::request::{Initiator, SignerEntry};
    use chrono::Duration;

    fn tracked(threshold: u32, weights: &[u16]) -> TrackedRequest {
        let signers = weights
            .iter()
            .enumerate()
            .map(|(i, w)| SignerEntry::new(format!("PUBsigner{}", i), "00".to_string(), *w))
            .collect();
        let request = SignatureRequest::new(
            threshold,
            KeyClass::Active,
            Utc::now() + Duration::hours(1),
            Initiator {
                principal: "alice".to_string(),
                public_key: "PUBalice".to_string(),
                signature: "initsig".to_string(),
                weight: 1,
            },
            signers,
        );
        let mut tracked = TrackedRequest::new(request, None);
        tracked.mark_dispatched();
        tracked
    }

    #[test]
    fn test_threshold_edge_fires_exactly_once() {
        // threshold 3: initiator weight 1, two signers of weight 1 each
        let mut t = tracked(3, &[1, 1]);
        let now = Utc::now();
        let first = t.request.signers[0].id.clone();
        let second = t.request.signers[1].id.clone();

        // 1 + 1 = 2 < 3: stays awaiting
        let ev = t.apply_signature(&first, "sig-a", now).unwrap();
        assert_eq!(ev, LifecycleEvent::Unchanged);
        assert_eq!(t.state, RequestState::AwaitingSignatures);

        // The signature reaching 3 fires the transition once
        let ev = t.apply_signature(&second, "sig-b", now).unwrap();
        assert_eq!(ev, LifecycleEvent::ThresholdReached);
        assert_eq!(t.state, RequestState::ReadyToBroadcast);
        assert!(t.request.locked);

        // Duplicate delivery must not re-trigger
        let ev = t.apply_signature(&second, "sig-b", now).unwrap();
        assert_eq!(ev, LifecycleEvent::Unchanged);
        assert_eq!(t.state, RequestState::ReadyToBroadcast);
    }

    #[test]
    fn test_duplicate_signature_does_not_double_count() {
        let mut t = tracked(3, &[1, 1]);
        let now = Utc::now();
        let first = t.request.signers[0].id.clone();

        t.apply_signature(&first, "sig-a", now).unwrap();
        t.apply_signature(&first, "sig-a", now).unwrap();
        assert_eq!(t.request.signed_weight(), 2);
        assert_eq!(t.state, RequestState::AwaitingSignatures);
    }

    #[test]
    fn test_post_threshold_signature_is_bookkeeping_only() {
        let mut t = tracked(2, &[1, 1]);
        let now = Utc::now();
        let first = t.request.signers[0].id.clone();
        let second = t.request.signers[1].id.clone();

        assert_eq!(
            t.apply_signature(&first, "sig-a", now).unwrap(),
            LifecycleEvent::ThresholdReached
        );
        // A late signature is stored but changes nothing
        assert_eq!(
            t.apply_signature(&second, "sig-b", now).unwrap(),
            LifecycleEvent::Unchanged
        );
        assert!(t.request.signers[1].is_signed());
        assert_eq!(t.state, RequestState::ReadyToBroadcast);
    }

    #[test]
    fn test_refusal_feasibility() {
        // threshold 3: initiator 1 + signers 1,1; any refusal kills it
        let mut t = tracked(3, &[1, 1]);
        let now = Utc::now();
        let first = t.request.signers[0].id.clone();

        let ev = t.apply_refusal(&first, now).unwrap();
        assert_eq!(ev, LifecycleEvent::Refused);
        assert_eq!(t.state, RequestState::Refused);

        // Terminal: further signatures are ignored
        let second = t.request.signers[1].id.clone();
        let ev = t.apply_signature(&second, "sig", now).unwrap();
        assert_eq!(ev, LifecycleEvent::Unchanged);
        assert_eq!(t.state, RequestState::Refused);
    }

    #[test]
    fn test_refusal_with_slack_keeps_waiting() {
        // threshold 2: initiator 1 + signers 1,1; one refusal leaves
        // enough weight
        let mut t = tracked(2, &[1, 1]);
        let now = Utc::now();
        let first = t.request.signers[0].id.clone();
        let second = t.request.signers[1].id.clone();

        assert_eq!(
            t.apply_refusal(&first, now).unwrap(),
            LifecycleEvent::Unchanged
        );
        assert_eq!(t.state, RequestState::AwaitingSignatures);

        assert_eq!(
            t.apply_signature(&second, "sig", now).unwrap(),
            LifecycleEvent::ThresholdReached
        );
    }

    #[test]
    fn test_lazy_expiration() {
        let mut t = tracked(3, &[1, 1]);
        t.request.expiration_date = Utc::now() - Duration::seconds(1);
        let first = t.request.signers[0].id.clone();

        let ev = t.apply_signature(&first, "sig", Utc::now()).unwrap();
        assert_eq!(ev, LifecycleEvent::Expired);
        assert_eq!(t.state, RequestState::Expired);
        // The late signature was not attached
        assert!(!t.request.signers[0].is_signed());
    }

    #[test]
    fn test_final_transaction_signature_order() {
        use crate::chain::{Operation, Transaction};
        use serde_json::json;

        let mut t = tracked(2, &[1]);
        t.transaction = Some(Transaction::new(
            0,
            0,
            Utc::now(),
            vec![Operation::new("transfer", json!({"from": "treasury"}))],
        ));
        let first = t.request.signers[0].id.clone();
        t.apply_signature(&first, "signersig", Utc::now()).unwrap();

        let final_tx = t.final_transaction().unwrap();
        assert_eq!(
            final_tx.signatures,
            vec!["initsig".to_string(), "signersig".to_string()]
        );
    }
}
