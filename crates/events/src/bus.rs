//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes committed events to consumers (projections, the
//! expense auto-creation hook). It is transport-agnostic and offers
//! at-least-once delivery; consumers must be idempotent. The event store is
//! the source of truth, the bus is only distribution.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of all events published to the bus
/// (broadcast semantics). Intended for single-threaded consumption.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// Events are **stored first** (in the event store), then **published** via
/// the bus. If publication fails, events are still in the store and can be
/// republished, so delivery is at-least-once.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    /// Publish a batch in order, stopping at the first failure. Messages
    /// already handed over stay delivered; the caller republishes the rest
    /// from the store.
    fn publish_all(&self, messages: Vec<M>) -> Result<(), Self::Error> {
        for message in messages {
            self.publish(message)?;
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn publish_all(&self, messages: Vec<M>) -> Result<(), Self::Error> {
        (**self).publish_all(messages)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
