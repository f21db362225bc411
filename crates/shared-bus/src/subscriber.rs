//! # Event Subscriber
//!
//! Receiving side of the event bus. Subscribers that fall behind skip the
//! events they missed and keep going.

use crate::events::{BusEvent, EventFilter};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::warn;

/// Errors that can occur when receiving events.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus has been closed.
    #[error("Event bus closed")]
    Closed,
}

/// A filtered subscription to the event bus.
pub struct Subscription<E: BusEvent> {
    receiver: broadcast::Receiver<E>,
    filter: EventFilter<E::Topic>,
}

impl<E: BusEvent> Subscription<E> {
    pub(crate) fn new(receiver: broadcast::Receiver<E>, filter: EventFilter<E::Topic>) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next event matching the filter.
    ///
    /// Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Subscriber lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive.
    ///
    /// `Ok(None)` means no matching event is buffered right now.
    pub fn try_recv(&mut self) -> Result<Option<E>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Subscriber lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
            }
        }
    }

    /// Drain every matching event currently buffered.
    pub fn drain(&mut self) -> Vec<E> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter<E::Topic> {
        &self.filter
    }
}

/// Filtered event stream for use with `StreamExt` combinators.
pub struct EventStream<E: BusEvent> {
    inner: BroadcastStream<E>,
    filter: EventFilter<E::Topic>,
}

impl<E: BusEvent> EventStream<E> {
    pub(crate) fn new(receiver: broadcast::Receiver<E>, filter: EventFilter<E::Topic>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
        }
    }
}

impl<E: BusEvent> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(event)) if this.filter.matches(&event) => return Poll::Ready(Some(event)),
                Some(Ok(_)) => continue,
                Some(Err(BroadcastStreamRecvError::Lagged(missed))) => {
                    warn!(missed, "Event stream lagged, events dropped");
                    continue;
                }
                None => return Poll::Ready(None),
            }
        }
    }
}
