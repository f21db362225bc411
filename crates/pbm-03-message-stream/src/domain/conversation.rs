//! # Conversation State Machine
//!
//! Everything the stream knows about one peer, mutated from a single owner.
//!
//! ## Receive Path
//!
//! ```text
//! reliable envelope
//!   │
//!   ├─ id already seen ──────────────→ ack, drop
//!   ├─ ahead and buffer full ────────→ drop, no ack (sender retries)
//!   ├─ record id
//!   ├─ seq == last + 1 ──────────────→ deliver, drain contiguous run, ack
//!   ├─ seq >  last + 1 ──────────────→ buffer, ack
//!   └─ seq <= last ──────────────────→ ack, drop
//! ```

use std::collections::BTreeMap;
use std::time::Instant;

use shared_types::{EnvelopeId, LamportClock, LogicalTimestamp, PeerId};

use super::{
    Delivery, Disposition, Envelope, Outbox, OutboxPoll, Payload, ReceiveOutcome,
    SeenEnvelopeCache, StreamConfig, Transmission,
};
use crate::codec::encode_envelope;
use crate::events::{DeliveryFailure, StreamError};

/// Reliable envelope accepted into the outbox, ready to transmit.
#[derive(Clone, Debug)]
pub struct Prepared {
    pub envelope: Envelope,
    pub frame: Vec<u8>,
}

/// Sequencing state that outlives a torn-down conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionMark {
    /// Session outgoing envelopes are numbered in.
    pub session: u32,
    /// Newest session seen from the peer.
    pub peer_session: u32,
    /// Highest contiguous sequence consumed in `peer_session`.
    pub last_delivered: u64,
    pub clock: LogicalTimestamp,
}

/// Per-peer stream state.
#[derive(Debug)]
pub struct Conversation {
    local_id: PeerId,
    peer_id: PeerId,
    config: StreamConfig,
    clock: LamportClock,
    session: u32,
    /// Last sequence assigned to an outgoing reliable envelope in `session`.
    last_sent_sequence: u64,
    peer_session: u32,
    /// Highest contiguous sequence consumed from the peer in `peer_session`.
    last_delivered: u64,
    pending_out_of_order: BTreeMap<u64, Envelope>,
    seen: SeenEnvelopeCache,
    outbox: Outbox,
    online: bool,
}

impl Conversation {
    pub fn new(local_id: PeerId, peer_id: PeerId, config: StreamConfig) -> Self {
        Self::resume(local_id, peer_id, config, SessionMark::default())
    }

    /// Reopens a conversation where a previous one with the same peer stopped.
    pub fn resume(
        local_id: PeerId,
        peer_id: PeerId,
        config: StreamConfig,
        mark: SessionMark,
    ) -> Self {
        let mut clock = LamportClock::new();
        clock.observe(mark.clock);
        Self {
            local_id,
            peer_id,
            seen: SeenEnvelopeCache::new(config.seen_capacity, config.seen_ttl),
            config,
            clock,
            session: mark.session,
            last_sent_sequence: 0,
            peer_session: mark.peer_session,
            last_delivered: mark.last_delivered,
            pending_out_of_order: BTreeMap::new(),
            outbox: Outbox::new(),
            online: true,
        }
    }

    /// State a later [`resume`](Self::resume) continues from.
    ///
    /// Outgoing numbering moves to a fresh session once anything was sent, so
    /// envelopes discarded with the outbox leave no gap for the peer to wait on.
    pub fn retire(&self) -> SessionMark {
        let session = if self.last_sent_sequence == 0 {
            self.session
        } else {
            self.session.saturating_add(1)
        };
        SessionMark {
            session,
            peer_session: self.peer_session,
            last_delivered: self.last_delivered,
            clock: self.clock.current(),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn last_delivered(&self) -> u64 {
        self.last_delivered
    }

    pub fn session(&self) -> u32 {
        self.session
    }

    pub fn pending_len(&self) -> usize {
        self.pending_out_of_order.len()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn timestamp(&self) -> LogicalTimestamp {
        self.clock.current()
    }

    /// Updates the online flag. Returns `true` when it changed.
    pub fn set_online(&mut self, online: bool) -> bool {
        let changed = self.online != online;
        self.online = online;
        changed
    }

    // =========================================================================
    // SEND PATH
    // =========================================================================

    /// Stamps, sequences and queues a reliable envelope.
    ///
    /// `build` receives the logical send time so block timestamps and the
    /// envelope's `sent_at` agree. Nothing is committed when it fails.
    pub fn prepare_reliable<F>(&mut self, build: F) -> Result<Prepared, StreamError>
    where
        F: FnOnce(LogicalTimestamp) -> Result<Payload, StreamError>,
    {
        let sent_at = self.clock.tick();
        let payload = build(sent_at)?;
        if !payload.kind().is_reliable() {
            return Err(StreamError::NotReliable(payload.kind()));
        }

        let sequence = self.last_sent_sequence + 1;
        let envelope =
            Envelope::new(sequence, self.local_id, sent_at, payload).with_session(self.session);
        let frame = encode_envelope(&envelope)?;

        self.last_sent_sequence = sequence;
        self.outbox.push(envelope.clone(), frame.clone());
        Ok(Prepared { envelope, frame })
    }

    /// Fire-and-forget typing indicator. Never queued.
    pub fn prepare_typing(&mut self, active: bool) -> Envelope {
        Envelope::unsequenced(self.local_id, self.clock.tick(), Payload::Typing { active })
    }

    pub fn ack_for(&self, envelope_id: EnvelopeId) -> Envelope {
        Envelope::unsequenced(
            self.local_id,
            self.clock.current(),
            Payload::Ack { envelope_id },
        )
    }

    // =========================================================================
    // RECEIVE PATH
    // =========================================================================

    pub fn receive(
        &mut self,
        envelope: Envelope,
        now: Instant,
    ) -> Result<ReceiveOutcome, StreamError> {
        self.clock.observe(envelope.sent_at);

        match envelope.payload {
            Payload::Typing { active } => {
                return Ok(ReceiveOutcome::new(Disposition::Typing).with_deliveries(vec![
                    Delivery::Typing {
                        sender_id: envelope.sender_id,
                        active,
                    },
                ]));
            }
            Payload::Ack { envelope_id } => {
                let removed = self.outbox.acknowledge(&envelope_id).is_some();
                return Ok(ReceiveOutcome::new(Disposition::Acknowledged(removed)));
            }
            Payload::Block(_) | Payload::WidgetResponse { .. } => {}
        }

        let id = envelope.envelope_id;
        let sequence = envelope.sequence;
        if sequence == 0 {
            return Err(StreamError::Malformed(id));
        }

        if self.seen.contains(&id, now) {
            return Ok(ReceiveOutcome::new(Disposition::Duplicate).with_ack(id));
        }

        if envelope.session < self.peer_session {
            return Ok(ReceiveOutcome::new(Disposition::Late).with_ack(id));
        }
        if envelope.session > self.peer_session {
            // Whatever was held back belongs to a session the peer abandoned.
            self.peer_session = envelope.session;
            self.last_delivered = 0;
            self.pending_out_of_order.clear();
        }

        let expected = self.last_delivered.saturating_add(1);
        if sequence > expected
            && !self.pending_out_of_order.contains_key(&sequence)
            && self.pending_out_of_order.len() >= self.config.max_out_of_order
        {
            return Ok(ReceiveOutcome::new(Disposition::Overflow));
        }

        self.seen.insert(id, now);

        let outcome = if sequence == expected {
            let deliveries = self.deliver_and_drain(envelope);
            ReceiveOutcome::new(Disposition::Delivered(deliveries.len()))
                .with_deliveries(deliveries)
        } else if sequence > expected {
            self.pending_out_of_order.entry(sequence).or_insert(envelope);
            ReceiveOutcome::new(Disposition::Buffered)
        } else {
            ReceiveOutcome::new(Disposition::Late)
        };

        Ok(outcome.with_ack(id))
    }

    fn deliver_and_drain(&mut self, envelope: Envelope) -> Vec<Delivery> {
        self.last_delivered = envelope.sequence;
        let mut deliveries = vec![Delivery::Envelope(envelope)];

        while let Some(next) = self
            .pending_out_of_order
            .remove(&self.last_delivered.saturating_add(1))
        {
            self.last_delivered = next.sequence;
            deliveries.push(Delivery::Envelope(next));
        }
        deliveries
    }

    // =========================================================================
    // RETRANSMISSION
    // =========================================================================

    /// Selects frames to send now and parks entries whose budget ran out.
    ///
    /// Never-sent entries (first send failed on an unreachable peer) are always
    /// due and consume no budget until the transport accepts them.
    pub fn poll_outbox(&mut self, now: Instant) -> OutboxPoll {
        let retry_timeout = self.config.retry_timeout;
        let max_retries = self.config.max_retries;
        let mut poll = OutboxPoll::default();

        for entry in self.outbox.iter_mut().filter(|entry| !entry.parked) {
            let due = match entry.last_sent {
                None => true,
                Some(sent) => now.duration_since(sent) >= retry_timeout,
            };
            if !due {
                continue;
            }

            let retransmissions = entry.attempts.saturating_sub(1);
            if entry.last_sent.is_some() && retransmissions >= max_retries {
                entry.parked = true;
                poll.exhausted.push(DeliveryFailure {
                    envelope_id: entry.envelope.envelope_id,
                    sequence: entry.envelope.sequence,
                    attempts: entry.attempts,
                });
                continue;
            }

            poll.due.push(Transmission {
                envelope_id: entry.envelope.envelope_id,
                sequence: entry.envelope.sequence,
                frame: entry.frame.clone(),
                previous_attempts: entry.attempts,
            });
        }

        poll
    }

    /// Records that the transport accepted a frame. Returns the attempt count,
    /// or `None` if the envelope was acked in the meantime.
    pub fn record_transmission(&mut self, envelope_id: &EnvelopeId, now: Instant) -> Option<u32> {
        let entry = self.outbox.get_mut(envelope_id)?;
        entry.attempts = entry.attempts.saturating_add(1);
        entry.last_sent = Some(now);
        Some(entry.attempts)
    }

    /// Gives a parked envelope a fresh retry budget and makes it due.
    pub fn revive(&mut self, envelope_id: &EnvelopeId) -> Result<(), StreamError> {
        let entry = self
            .outbox
            .get_mut(envelope_id)
            .ok_or(StreamError::UnknownEnvelope(*envelope_id))?;
        entry.parked = false;
        entry.attempts = 0;
        entry.last_sent = None;
        Ok(())
    }

    /// Makes every outbox entry due now, reviving parked ones.
    ///
    /// Returns the ids that were parked.
    pub fn replay_all(&mut self) -> Vec<EnvelopeId> {
        let mut revived = Vec::new();
        for entry in self.outbox.iter_mut() {
            if entry.parked {
                entry.parked = false;
                entry.attempts = 0;
                revived.push(entry.envelope.envelope_id);
            }
            entry.last_sent = None;
        }
        revived
    }

    pub fn discard_outbox(&mut self) -> usize {
        self.outbox.clear()
    }
}
