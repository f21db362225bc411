//! # Event Contract
//!
//! What the bus needs from an event type, and topic filtering.

use std::fmt;

/// An event that can travel over the bus.
pub trait BusEvent: Clone + Send + Sync + 'static {
    /// Coarse category used by subscription filters.
    type Topic: Copy + Eq + fmt::Debug + Send + Sync + Unpin + 'static;

    fn topic(&self) -> Self::Topic;
}

/// Topic filter for subscriptions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventFilter<T> {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<T>,
}

impl<T> Default for EventFilter<T> {
    fn default() -> Self {
        Self { topics: Vec::new() }
    }
}

impl<T: Copy + Eq> EventFilter<T> {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<T>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches<E>(&self, event: &E) -> bool
    where
        E: BusEvent<Topic = T>,
    {
        self.topics.is_empty() || self.topics.contains(&event.topic())
    }
}
