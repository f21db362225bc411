//! Value objects for stream configuration and bounded per-peer state.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use shared_types::{EnvelopeId, LogicalTimestamp};

use super::{Delivery, Envelope};
use crate::events::DeliveryFailure;

/// Message stream configuration.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Time an envelope may stay unacknowledged before it is resent.
    pub retry_timeout: Duration,
    /// Retransmissions allowed before a delivery failure is raised.
    pub max_retries: u32,
    /// Maximum envelope ids kept for deduplication.
    pub seen_capacity: usize,
    /// Maximum age of a remembered envelope id.
    pub seen_ttl: Duration,
    /// Maximum envelopes buffered ahead of the next expected sequence.
    pub max_out_of_order: usize,
    /// Period of the per-conversation retransmission timer.
    pub retransmit_tick: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retry_timeout: Duration::from_secs(2),
            max_retries: 5,
            seen_capacity: 4096,
            seen_ttl: Duration::from_secs(600),
            max_out_of_order: 1024,
            retransmit_tick: Duration::from_millis(250),
        }
    }
}

/// Recently seen envelope ids, bounded by capacity and age.
///
/// Oldest entries are evicted first. An evicted id that shows up again is
/// still caught by the sequence check, so eviction never causes a second
/// delivery.
#[derive(Debug)]
pub struct SeenEnvelopeCache {
    seen_at: HashMap<EnvelopeId, Instant>,
    insertion_order: VecDeque<EnvelopeId>,
    capacity: usize,
    ttl: Duration,
}

impl SeenEnvelopeCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            seen_at: HashMap::with_capacity(capacity),
            insertion_order: VecDeque::with_capacity(capacity),
            capacity,
            ttl,
        }
    }

    pub fn contains(&self, id: &EnvelopeId, now: Instant) -> bool {
        self.seen_at
            .get(id)
            .is_some_and(|seen| now.duration_since(*seen) < self.ttl)
    }

    /// Records an id, evicting expired and then oldest entries as needed.
    pub fn insert(&mut self, id: EnvelopeId, now: Instant) {
        self.evict_expired(now);
        if self.seen_at.contains_key(&id) {
            return;
        }

        if self.seen_at.len() >= self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.seen_at.remove(&oldest);
            }
        }

        self.seen_at.insert(id, now);
        self.insertion_order.push_back(id);
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(oldest) = self.insertion_order.front() {
            let expired = self
                .seen_at
                .get(oldest)
                .map_or(true, |seen| now.duration_since(*seen) >= self.ttl);
            if !expired {
                break;
            }
            self.seen_at.remove(oldest);
            self.insertion_order.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.seen_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_at.is_empty()
    }
}

/// Unacknowledged envelope.
#[derive(Clone, Debug)]
pub struct OutboxEntry {
    pub envelope: Envelope,
    /// Encoded frame, resent byte for byte.
    pub frame: Vec<u8>,
    /// Transmissions the transport accepted.
    pub attempts: u32,
    pub last_sent: Option<Instant>,
    /// Retry budget exhausted. Kept until acked, revived or discarded.
    pub parked: bool,
}

/// Frame selected for (re)transmission.
#[derive(Clone, Debug)]
pub struct Transmission {
    pub envelope_id: EnvelopeId,
    pub sequence: u64,
    pub frame: Vec<u8>,
    /// Transmissions made before this one.
    pub previous_attempts: u32,
}

/// Result of scanning the outbox.
#[derive(Clone, Debug, Default)]
pub struct OutboxPoll {
    pub due: Vec<Transmission>,
    pub exhausted: Vec<DeliveryFailure>,
}

/// Unacknowledged envelopes ordered by sequence, indexed by envelope id.
#[derive(Debug, Default)]
pub struct Outbox {
    entries: BTreeMap<u64, OutboxEntry>,
    by_id: HashMap<EnvelopeId, u64>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, envelope: Envelope, frame: Vec<u8>) {
        self.by_id.insert(envelope.envelope_id, envelope.sequence);
        self.entries.insert(
            envelope.sequence,
            OutboxEntry {
                envelope,
                frame,
                attempts: 0,
                last_sent: None,
                parked: false,
            },
        );
    }

    /// Removes an acknowledged envelope.
    pub fn acknowledge(&mut self, id: &EnvelopeId) -> Option<OutboxEntry> {
        let sequence = self.by_id.remove(id)?;
        self.entries.remove(&sequence)
    }

    pub fn get(&self, id: &EnvelopeId) -> Option<&OutboxEntry> {
        self.by_id.get(id).and_then(|seq| self.entries.get(seq))
    }

    pub fn get_mut(&mut self, id: &EnvelopeId) -> Option<&mut OutboxEntry> {
        let sequence = *self.by_id.get(id)?;
        self.entries.get_mut(&sequence)
    }

    /// Entries in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = &OutboxEntry> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut OutboxEntry> {
        self.entries.values_mut()
    }

    pub fn parked(&self) -> impl Iterator<Item = &OutboxEntry> {
        self.entries.values().filter(|entry| entry.parked)
    }

    /// Drops everything, returning how many entries were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.entries.len();
        self.entries.clear();
        self.by_id.clear();
        discarded
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What happened to an inbound envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Released together with this many envelopes in total (itself plus drained).
    Delivered(usize),
    /// Ahead of the next expected sequence, held back.
    Buffered,
    /// Envelope id already seen.
    Duplicate,
    /// Sequence already consumed.
    Late,
    /// Reorder buffer full. Dropped without ack so the sender retries later.
    Overflow,
    Typing,
    /// Ack received; `true` when it removed an outbox entry.
    Acknowledged(bool),
}

/// Result of [`Conversation::receive`](super::Conversation::receive).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiveOutcome {
    pub disposition: Disposition,
    pub deliveries: Vec<Delivery>,
    /// Envelope to acknowledge back to the sender.
    pub ack: Option<EnvelopeId>,
}

impl ReceiveOutcome {
    pub fn new(disposition: Disposition) -> Self {
        Self {
            disposition,
            deliveries: Vec::new(),
            ack: None,
        }
    }

    pub fn with_ack(mut self, id: EnvelopeId) -> Self {
        self.ack = Some(id);
        self
    }

    pub fn with_deliveries(mut self, deliveries: Vec<Delivery>) -> Self {
        self.deliveries = deliveries;
        self
    }
}

/// Returned by a reliable send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendReceipt {
    pub envelope_id: EnvelopeId,
    pub sequence: u64,
    pub sent_at: LogicalTimestamp,
    /// Peer unreachable or transport failed; the envelope waits in the outbox.
    pub queued: bool,
}

/// Result of one retransmission pass.
#[derive(Clone, Debug, Default)]
pub struct RetransmitReport {
    pub sent: usize,
    pub still_queued: usize,
    pub failed: Vec<DeliveryFailure>,
}

/// Result of tearing a conversation down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Outbox entries acknowledged during the grace period.
    pub flushed: usize,
    /// Entries still unacknowledged when the grace period ended.
    pub discarded: usize,
}
