//! # Core Identifiers
//!
//! - [`PeerId`]: 32-byte identifier of a directly connected peer
//! - [`BlockId`]: identity of an immutable content block
//! - [`EnvelopeId`]: dedup key of a wire envelope (globally unique)
//! - [`AttemptId`]: identity of one file transfer attempt

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Peer identifier for P2P communication.
///
/// Derived from the peer's public key by the transport layer. The total
/// order (`Ord`) is used as the tiebreak when two senders stamp blocks with
/// the same logical timestamp.
///
/// # Example
///
/// ```rust
/// use shared_types::PeerId;
///
/// let peer = PeerId::new([0xAB; 32]);
/// let peer_from_bytes = PeerId::from_bytes(&[0xAB; 32]).unwrap();
/// assert_eq!(peer, peer_from_bytes);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    /// Creates a new peer ID from a 32-byte array.
    pub fn new(id: [u8; 32]) -> Self {
        Self(id)
    }

    /// Creates a peer ID from a byte slice.
    ///
    /// Returns `None` if the slice is shorter than 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 32 {
            let mut id = [0u8; 32];
            id.copy_from_slice(&bytes[..32]);
            Some(Self(id))
        } else {
            None
        }
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    /// Short hex form (first 8 bytes), enough to tell peers apart in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generates a fresh random (v4) identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The 128-bit value as bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Identity of a content block. A changed block needs a new id.
    BlockId
);

uuid_id!(
    /// Dedup key of a wire envelope.
    ///
    /// Retransmissions reuse the id; everything else gets a fresh one.
    EnvelopeId
);

uuid_id!(
    /// Identity of a single file transfer attempt. A retry gets a new one.
    AttemptId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_from_bytes() {
        let bytes = [0xABu8; 32];
        let peer = PeerId::from_bytes(&bytes);
        assert!(peer.is_some());
        assert_eq!(peer.unwrap().0, bytes);
    }

    #[test]
    fn test_peer_id_from_short_slice() {
        assert!(PeerId::from_bytes(&[1u8; 31]).is_none());
    }

    #[test]
    fn test_peer_id_display_is_short_hex() {
        let peer = PeerId::new([0x0Fu8; 32]);
        assert_eq!(peer.to_string(), "0f0f0f0f0f0f0f0f");
    }

    #[test]
    fn test_peer_id_total_order() {
        let low = PeerId::new([1u8; 32]);
        let high = PeerId::new([2u8; 32]);
        assert!(low < high);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(EnvelopeId::new(), EnvelopeId::new());
        assert_ne!(BlockId::new(), BlockId::new());
    }

    #[test]
    fn test_envelope_id_survives_binary_encoding() {
        let id = EnvelopeId::new();
        let bytes = bincode::serialize(&id).unwrap();
        // 128-bit value, no length prefix
        assert_eq!(bytes.len(), 16);
        let decoded: EnvelopeId = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_block_id_json_is_hyphenated_string() {
        let id = BlockId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
