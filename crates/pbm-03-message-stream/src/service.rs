//! # Message Stream Service
//!
//! Wraps one [`Conversation`] per peer with locking, transport I/O and the
//! retransmission timer.
//!
//! ## Concurrency
//!
//! - One `Mutex<Conversation>` per peer serializes sequence assignment,
//!   receive processing and ack handling for that peer.
//! - Transport sends happen with no lock held.
//! - Conversations with different peers never share a lock.
//! - The conversation map is locked before a conversation or the retired
//!   marks; those two are never held together.
//!
//! ## Teardown
//!
//! A torn-down conversation leaves a [`SessionMark`] behind. Reopening the
//! conversation resumes from it, so the peer's sequence state stays valid.
//!
//! ## Timers
//!
//! [`spawn_retransmitter`](MessageStreamService::spawn_retransmitter) runs
//! one task per conversation. Acked envelopes leave the outbox, so the timer
//! never resends them; teardown aborts the task.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use async_trait::async_trait;
use shared_types::{EnvelopeId, LogicalTimestamp, PeerId};

use crate::codec::{decode_envelope, encode_envelope};
use crate::domain::{
    Conversation, Disposition, Payload, ReceiveOutcome, RetransmitReport, SendReceipt,
    SessionMark, StreamConfig, TeardownReport,
};
use crate::events::StreamError;
use crate::ports::inbound::FrameHandler;
use crate::ports::outbound::{PeerTransport, StreamObserver, TransportError};

/// How often teardown checks whether the outbox drained.
const TEARDOWN_POLL: Duration = Duration::from_millis(10);

/// Message stream for every conversation of the local node.
///
/// Thread-safe; share it through `Arc`.
pub struct MessageStreamService<T, O>
where
    T: PeerTransport,
    O: StreamObserver,
{
    local_id: PeerId,
    config: StreamConfig,
    conversations: RwLock<HashMap<PeerId, Arc<Mutex<Conversation>>>>,
    retired: Mutex<HashMap<PeerId, SessionMark>>,
    timers: Mutex<HashMap<PeerId, JoinHandle<()>>>,
    transport: Arc<T>,
    observer: Arc<O>,
}

impl<T, O> MessageStreamService<T, O>
where
    T: PeerTransport + 'static,
    O: StreamObserver + 'static,
{
    pub fn new(local_id: PeerId, config: StreamConfig, transport: Arc<T>, observer: Arc<O>) -> Self {
        Self {
            local_id,
            config,
            conversations: RwLock::new(HashMap::new()),
            retired: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
            transport,
            observer,
        }
    }

    pub fn local_id(&self) -> PeerId {
        self.local_id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Tokio's clock, so paused-time tests drive retransmission.
    fn now() -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn conversation(&self, peer: PeerId) -> Arc<Mutex<Conversation>> {
        if let Some(existing) = self.conversations.read().get(&peer) {
            return existing.clone();
        }

        self.conversations
            .write()
            .entry(peer)
            .or_insert_with(|| {
                let mark = self.retired.lock().remove(&peer).unwrap_or_default();
                info!(%peer, session = mark.session, "Conversation opened");
                Arc::new(Mutex::new(Conversation::resume(
                    self.local_id,
                    peer,
                    self.config.clone(),
                    mark,
                )))
            })
            .clone()
    }

    fn existing(&self, peer: &PeerId) -> Option<Arc<Mutex<Conversation>>> {
        self.conversations.read().get(peer).cloned()
    }

    // =========================================================================
    // SEND PATH
    // =========================================================================

    /// Sequences a reliable payload and hands it to the transport.
    ///
    /// An unreachable peer does not fail the call: the envelope stays queued
    /// and the receipt says so.
    pub async fn send_reliable<F>(&self, peer: PeerId, build: F) -> Result<SendReceipt, StreamError>
    where
        F: FnOnce(LogicalTimestamp) -> Result<Payload, StreamError> + Send,
    {
        let conversation = self.conversation(peer);
        let prepared = conversation.lock().prepare_reliable(build)?;
        let envelope = &prepared.envelope;

        debug!(
            %peer,
            envelope_id = %envelope.envelope_id,
            sequence = envelope.sequence,
            kind = ?envelope.kind(),
            "Sending envelope"
        );

        let queued = match self
            .transmit(peer, &conversation, envelope.envelope_id, prepared.frame.clone())
            .await
        {
            Ok(()) => false,
            Err(StreamError::TransportUnreachable(_)) => {
                info!(%peer, envelope_id = %envelope.envelope_id, "Peer unreachable, envelope queued");
                true
            }
            Err(err) => {
                warn!(%peer, envelope_id = %envelope.envelope_id, error = %err, "Send failed, envelope queued");
                true
            }
        };

        Ok(SendReceipt {
            envelope_id: envelope.envelope_id,
            sequence: envelope.sequence,
            sent_at: envelope.sent_at,
            queued,
        })
    }

    /// Fire-and-forget typing indicator. Transport errors are ignored.
    pub async fn send_typing(&self, peer: PeerId, active: bool) -> Result<(), StreamError> {
        let envelope = self.conversation(peer).lock().prepare_typing(active);
        let frame = encode_envelope(&envelope)?;
        if let Err(err) = self.transport.send(peer, frame).await {
            debug!(%peer, error = %err, "Typing indicator dropped");
        }
        Ok(())
    }

    /// Sends one outbox frame and records the result on the conversation.
    async fn transmit(
        &self,
        peer: PeerId,
        conversation: &Mutex<Conversation>,
        envelope_id: EnvelopeId,
        frame: Vec<u8>,
    ) -> Result<(), StreamError> {
        let result = self.transport.send(peer, frame).await;
        let now = Self::now();

        let (changed, online) = {
            let mut conv = conversation.lock();
            let changed = match &result {
                Ok(()) => {
                    conv.record_transmission(&envelope_id, now);
                    conv.set_online(true)
                }
                Err(TransportError::Unreachable(_)) => conv.set_online(false),
                // The frame may have left; count it against the budget.
                Err(TransportError::Io(_)) => {
                    conv.record_transmission(&envelope_id, now);
                    false
                }
            };
            (changed, conv.is_online())
        };

        if changed {
            info!(%peer, online, "Peer reachability changed");
            self.observer.reachability_changed(peer, online);
        }
        result.map_err(StreamError::from)
    }

    // =========================================================================
    // RECEIVE PATH
    // =========================================================================

    /// Processes a frame received from `peer`.
    ///
    /// Acks go back best effort; a lost ack only causes a retransmission,
    /// which the peer's dedup absorbs.
    pub async fn handle_frame(&self, peer: PeerId, frame: &[u8]) -> Result<ReceiveOutcome, StreamError> {
        let envelope = decode_envelope(frame).map_err(|err| {
            warn!(%peer, error = %err, "Undecodable frame");
            err
        })?;

        if envelope.sender_id != peer {
            warn!(%peer, claimed = %envelope.sender_id, "Sender mismatch");
            return Err(StreamError::SenderMismatch {
                peer,
                claimed: envelope.sender_id,
            });
        }

        let envelope_id = envelope.envelope_id;
        let sequence = envelope.sequence;
        let conversation = self.conversation(peer);

        let (outcome, ack_frame, came_online) = {
            let mut conv = conversation.lock();
            let outcome = conv.receive(envelope, Self::now())?;
            let ack_frame = match outcome.ack {
                Some(id) => Some(encode_envelope(&conv.ack_for(id))?),
                None => None,
            };
            (outcome, ack_frame, conv.set_online(true))
        };

        if came_online {
            info!(%peer, "Peer back online");
            self.observer.reachability_changed(peer, true);
        }

        match outcome.disposition {
            Disposition::Delivered(count) => {
                debug!(%peer, %envelope_id, sequence, released = count, "Delivered")
            }
            Disposition::Buffered => debug!(%peer, %envelope_id, sequence, "Buffered out of order"),
            Disposition::Duplicate => debug!(%peer, %envelope_id, sequence, "Duplicate dropped"),
            Disposition::Late => debug!(%peer, %envelope_id, sequence, "Late arrival dropped"),
            Disposition::Overflow => {
                warn!(%peer, %envelope_id, sequence, "Reorder buffer full, envelope dropped")
            }
            Disposition::Acknowledged(removed) => debug!(%peer, %envelope_id, removed, "Ack received"),
            Disposition::Typing => {}
        }

        if let Some(frame) = ack_frame {
            if let Err(err) = self.transport.send(peer, frame).await {
                debug!(%peer, %envelope_id, error = %err, "Ack not sent");
            }
        }

        Ok(outcome)
    }

    // =========================================================================
    // RETRANSMISSION
    // =========================================================================

    /// Resends every outbox entry whose retry timeout elapsed.
    ///
    /// Entries whose budget ran out are parked and reported to the observer.
    /// Nothing is sent, and no budget spent, while the transport reports the
    /// peer unreachable.
    pub async fn retransmit_due(&self, peer: PeerId) -> RetransmitReport {
        let Some(conversation) = self.existing(&peer) else {
            return RetransmitReport::default();
        };

        if !self.transport.is_reachable(&peer) {
            let (still_queued, changed) = {
                let mut conv = conversation.lock();
                let waiting = conv.outbox().iter().filter(|entry| !entry.parked).count();
                (waiting, conv.set_online(false))
            };
            if changed {
                info!(%peer, online = false, "Peer reachability changed");
                self.observer.reachability_changed(peer, false);
            }
            debug!(%peer, still_queued, "Peer unreachable, retransmission skipped");
            return RetransmitReport {
                still_queued,
                ..RetransmitReport::default()
            };
        }

        let poll = conversation.lock().poll_outbox(Self::now());
        for failure in &poll.exhausted {
            warn!(
                %peer,
                envelope_id = %failure.envelope_id,
                attempts = failure.attempts,
                "Retry budget exhausted"
            );
            self.observer.delivery_failed(peer, failure.clone());
        }

        let mut report = RetransmitReport {
            failed: poll.exhausted,
            ..RetransmitReport::default()
        };

        let total = poll.due.len();
        for (index, transmission) in poll.due.into_iter().enumerate() {
            let id = transmission.envelope_id;
            match self.transmit(peer, &conversation, id, transmission.frame).await {
                Ok(()) => {
                    report.sent += 1;
                    if transmission.previous_attempts > 0 {
                        debug!(%peer, envelope_id = %id, sequence = transmission.sequence, "Retransmitted");
                        self.observer
                            .envelope_retransmitted(peer, id, transmission.previous_attempts + 1);
                    }
                }
                Err(StreamError::TransportUnreachable(_)) => {
                    report.still_queued = total - index;
                    break;
                }
                Err(err) => {
                    warn!(%peer, envelope_id = %id, error = %err, "Retransmission failed");
                }
            }
        }

        report
    }

    /// Replays the whole outbox now, reviving parked envelopes.
    pub async fn flush_outbox(&self, peer: PeerId) -> RetransmitReport {
        let Some(conversation) = self.existing(&peer) else {
            return RetransmitReport::default();
        };

        let revived = conversation.lock().replay_all();
        if !revived.is_empty() {
            info!(%peer, revived = revived.len(), "Parked envelopes revived");
        }
        self.retransmit_due(peer).await
    }

    /// Gives one parked envelope a fresh retry budget and resends it.
    pub async fn retry_delivery(
        &self,
        peer: PeerId,
        envelope_id: EnvelopeId,
    ) -> Result<RetransmitReport, StreamError> {
        let conversation = self
            .existing(&peer)
            .ok_or(StreamError::UnknownEnvelope(envelope_id))?;
        conversation.lock().revive(&envelope_id)?;
        info!(%peer, %envelope_id, "Delivery retry requested");
        Ok(self.retransmit_due(peer).await)
    }

    /// Starts the retransmission timer for `peer` if it is not running.
    pub fn spawn_retransmitter(self: &Arc<Self>, peer: PeerId) {
        let mut timers = self.timers.lock();
        if timers.get(&peer).is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let service = Arc::downgrade(self);
        let tick = self.config.retransmit_tick;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(service) = service.upgrade() else {
                    break;
                };
                service.retransmit_due(peer).await;
            }
        });

        debug!(%peer, "Retransmitter started");
        timers.insert(peer, handle);
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Stops the timer, flushes the outbox for at most `grace`, then drops the
    /// conversation and whatever is still unacknowledged.
    ///
    /// Sequencing state is kept as a [`SessionMark`] for the next conversation
    /// with `peer`.
    pub async fn teardown(&self, peer: PeerId, grace: Duration) -> TeardownReport {
        if let Some(handle) = self.timers.lock().remove(&peer) {
            handle.abort();
        }

        let Some(conversation) = self.existing(&peer) else {
            return TeardownReport::default();
        };

        let outstanding = conversation.lock().outbox().len();
        let drained = tokio::time::timeout(grace, async {
            self.flush_outbox(peer).await;
            loop {
                let empty = conversation.lock().outbox().is_empty();
                if empty {
                    break;
                }
                tokio::time::sleep(TEARDOWN_POLL).await;
            }
        })
        .await
        .is_ok();

        let (discarded, mark) = {
            let mut conversations = self.conversations.write();
            conversations.remove(&peer);
            let (discarded, mark) = {
                let mut conv = conversation.lock();
                (conv.discard_outbox(), conv.retire())
            };
            self.retired.lock().insert(peer, mark);
            (discarded, mark)
        };

        info!(
            %peer,
            outstanding,
            discarded,
            drained,
            next_session = mark.session,
            "Conversation torn down"
        );
        TeardownReport {
            flushed: outstanding.saturating_sub(discarded),
            discarded,
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Current logical time of the conversation with `peer`.
    pub fn local_timestamp(&self, peer: PeerId) -> LogicalTimestamp {
        self.existing(&peer)
            .map(|conversation| conversation.lock().timestamp())
            .unwrap_or_default()
    }

    pub fn outbox_len(&self, peer: PeerId) -> usize {
        self.existing(&peer)
            .map(|conversation| conversation.lock().outbox().len())
            .unwrap_or_default()
    }

    pub fn parked(&self, peer: PeerId) -> Vec<EnvelopeId> {
        self.existing(&peer)
            .map(|conversation| {
                conversation
                    .lock()
                    .outbox()
                    .parked()
                    .map(|entry| entry.envelope.envelope_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Unknown peers count as online until a send says otherwise.
    pub fn is_online(&self, peer: PeerId) -> bool {
        self.existing(&peer)
            .map_or(true, |conversation| conversation.lock().is_online())
    }

    pub fn last_delivered(&self, peer: PeerId) -> u64 {
        self.existing(&peer)
            .map(|conversation| conversation.lock().last_delivered())
            .unwrap_or_default()
    }

    pub fn has_conversation(&self, peer: PeerId) -> bool {
        self.conversations.read().contains_key(&peer)
    }
}

#[async_trait]
impl<T, O> FrameHandler for MessageStreamService<T, O>
where
    T: PeerTransport + 'static,
    O: StreamObserver + 'static,
{
    async fn on_receive(&self, peer: PeerId, frame: Vec<u8>) -> Result<ReceiveOutcome, StreamError> {
        self.handle_frame(peer, &frame).await
    }
}
