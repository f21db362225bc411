//! # Envelope Codec
//!
//! ```text
//! ┌───────────────────────┬────────────────────────────┐
//! │ protocol version (u16 LE) │ bincode(Envelope)      │
//! └───────────────────────┴────────────────────────────┘
//! ```
//!
//! The bincode body carries the 128-bit envelope id, the u32 session, the u64
//! sequence, the sender id, the payload kind discriminant and the payload
//! schema version.

use crate::domain::Envelope;
use crate::events::CodecError;

/// Framing version written in front of every envelope.
pub const PROTOCOL_VERSION: u16 = 1;

const HEADER_LEN: usize = 2;

pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    let body = bincode::serialize(envelope).map_err(|e| CodecError::Encode(e.to_string()))?;
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub fn decode_envelope(frame: &[u8]) -> Result<Envelope, CodecError> {
    if frame.len() < HEADER_LEN {
        return Err(CodecError::Truncated { len: frame.len() });
    }

    let (header, body) = frame.split_at(HEADER_LEN);
    let version = u16::from_le_bytes([header[0], header[1]]);
    if version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: version,
            expected: PROTOCOL_VERSION,
        });
    }

    bincode::deserialize(body).map_err(|e| CodecError::Decode(e.to_string()))
}
