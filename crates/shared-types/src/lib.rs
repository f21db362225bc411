//! # Shared Types Crate
//!
//! Identifiers and the logical clock used by every messaging subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Cross-subsystem identifiers are defined here.
//! - **Opaque Identifiers**: Blocks, envelopes and transfer attempts are keyed
//!   by UUID newtypes that cannot be mixed up at compile time.
//! - **Logical Time**: Ordering never depends on wall clocks; every timestamp
//!   that crosses the wire is a Lamport clock value.

pub mod clock;
pub mod entities;

pub use clock::{LamportClock, LogicalTimestamp};
pub use entities::*;
