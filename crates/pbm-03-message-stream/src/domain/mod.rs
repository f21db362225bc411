//! # Domain Layer for the Message Stream
//!
//! Pure, synchronous protocol state. No I/O, no clocks read from inside: the
//! caller passes `now` so every decision is reproducible in tests.
//!
//! - **entities**: wire units (`Envelope`, `Payload`, `DisplayKey`)
//! - **value_objects**: configuration and bounded state (`StreamConfig`,
//!   `SeenEnvelopeCache`, `Outbox`)
//! - **conversation**: the per-peer state machine

mod conversation;
mod entities;
mod value_objects;

pub use conversation::*;
pub use entities::*;
pub use value_objects::*;
