//! # In-Memory Transport
//!
//! Deterministic transport double. Sent frames are recorded instead of
//! delivered; the caller decides when, in which order and how often they
//! reach the other engine. Reachability is toggled per peer.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use pbm_03_message_stream::{PeerTransport, TransportError};
use shared_types::PeerId;
use tracing::trace;

/// One recorded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub from: PeerId,
    pub to: PeerId,
    pub bytes: Vec<u8>,
}

pub struct InMemoryTransport {
    local_id: PeerId,
    outbound: Mutex<Vec<Frame>>,
    unreachable: RwLock<HashSet<PeerId>>,
    frames_sent: AtomicU64,
}

impl InMemoryTransport {
    pub fn new(local_id: PeerId) -> Self {
        Self {
            local_id,
            outbound: Mutex::new(Vec::new()),
            unreachable: RwLock::new(HashSet::new()),
            frames_sent: AtomicU64::new(0),
        }
    }

    pub fn local_id(&self) -> PeerId {
        self.local_id
    }

    pub fn set_reachable(&self, peer: PeerId, reachable: bool) {
        let mut unreachable = self.unreachable.write();
        if reachable {
            unreachable.remove(&peer);
        } else {
            unreachable.insert(peer);
        }
    }

    /// Takes every recorded frame, oldest first.
    pub fn drain(&self) -> Vec<Frame> {
        std::mem::take(&mut *self.outbound.lock())
    }

    /// Takes the frames addressed to `peer`, leaving the rest.
    pub fn drain_to(&self, peer: PeerId) -> Vec<Vec<u8>> {
        let mut outbound = self.outbound.lock();
        let (taken, kept): (Vec<Frame>, Vec<Frame>) =
            outbound.drain(..).partition(|frame| frame.to == peer);
        *outbound = kept;
        taken.into_iter().map(|frame| frame.bytes).collect()
    }

    /// Frames recorded and not yet drained.
    pub fn pending(&self) -> usize {
        self.outbound.lock().len()
    }

    /// Frames accepted since creation.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PeerTransport for InMemoryTransport {
    async fn send(&self, peer: PeerId, frame: Vec<u8>) -> Result<(), TransportError> {
        if !self.is_reachable(&peer) {
            return Err(TransportError::Unreachable(peer));
        }

        trace!(%peer, bytes = frame.len(), "Frame recorded");
        self.outbound.lock().push(Frame {
            from: self.local_id,
            to: peer,
            bytes: frame,
        });
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn is_reachable(&self, peer: &PeerId) -> bool {
        !self.unreachable.read().contains(peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(byte: u8) -> PeerId {
        PeerId::new([byte; 32])
    }

    #[tokio::test]
    async fn test_send_records_frame() {
        let transport = InMemoryTransport::new(peer(1));
        transport.send(peer(2), vec![1, 2, 3]).await.unwrap();

        assert_eq!(transport.frames_sent(), 1);
        assert_eq!(
            transport.drain(),
            vec![Frame {
                from: peer(1),
                to: peer(2),
                bytes: vec![1, 2, 3]
            }]
        );
        assert_eq!(transport.pending(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_peer_rejected() {
        let transport = InMemoryTransport::new(peer(1));
        transport.set_reachable(peer(2), false);

        assert_eq!(
            transport.send(peer(2), vec![0]).await,
            Err(TransportError::Unreachable(peer(2)))
        );
        assert_eq!(transport.pending(), 0);

        transport.set_reachable(peer(2), true);
        assert!(transport.send(peer(2), vec![0]).await.is_ok());
    }

    #[tokio::test]
    async fn test_drain_to_keeps_other_peers() {
        let transport = InMemoryTransport::new(peer(1));
        transport.send(peer(2), vec![2]).await.unwrap();
        transport.send(peer(3), vec![3]).await.unwrap();
        transport.send(peer(2), vec![22]).await.unwrap();

        assert_eq!(transport.drain_to(peer(2)), vec![vec![2], vec![22]]);
        assert_eq!(transport.pending(), 1);
    }
}
