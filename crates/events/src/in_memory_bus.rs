//! Process-local bus backing the single-node deployment.

use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard, mpsc};

use crate::bus::{EventBus, Subscription};

/// Broadcast bus over std mpsc channels.
///
/// Every subscriber gets its own channel and a clone of every published
/// message. Delivery is best-effort: a subscriber that hung up is swept out
/// on the next publish, and nothing is replayed for late subscribers (the
/// event store is the replay source, not the bus).
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    senders: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    // A panic while holding the lock can only leave a fully written Vec
    // behind, so a poisoned guard is safe to take over.
    fn senders(&self) -> MutexGuard<'_, Vec<mpsc::Sender<M>>> {
        self.senders.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = Infallible;

    fn publish(&self, message: M) -> Result<(), Infallible> {
        // send only fails when the receiving end hung up; drop those senders.
        self.senders()
            .retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        self.senders().push(tx);
        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_every_message() {
        let bus = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish("first".to_string()).unwrap();
        bus.publish("second".to_string()).unwrap();

        assert_eq!(a.try_recv().unwrap(), "first");
        assert_eq!(a.try_recv().unwrap(), "second");
        assert_eq!(b.try_recv().unwrap(), "first");
        assert_eq!(b.try_recv().unwrap(), "second");
    }

    #[test]
    fn hung_up_subscribers_are_swept_on_publish() {
        let bus = InMemoryEventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(7_u32).unwrap();

        assert_eq!(keep.try_recv().unwrap(), 7);
        assert_eq!(bus.senders().len(), 1);
    }
}
