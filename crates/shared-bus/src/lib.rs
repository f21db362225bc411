//! # Shared Bus
//!
//! Broadcast bus carrying engine notifications to any number of UI
//! subscribers.
//!
//! ```text
//! ┌──────────────┐   emit()    ┌──────────────┐  subscribe(filter)  ┌────────┐
//! │    Engine    │ ──────────→ │  Event Bus   │ ──────────────────→ │   UI   │
//! └──────────────┘             └──────────────┘                     └────────┘
//! ```
//!
//! The bus is generic over the event type; events only need a topic for
//! filtering. Slow subscribers lag and lose the oldest events rather than
//! blocking the publisher.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{BusEvent, EventFilter};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before old ones are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
