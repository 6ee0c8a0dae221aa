//! In-memory event bus for the daemon and tests.

use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, thiserror::Error)]
pub enum InMemoryBusError {
    /// The publish log lock was poisoned by a panicking publisher.
    #[error("event bus lock poisoned")]
    Poisoned,
}

/// In-memory broadcast bus.
///
/// Every published message is fanned out to live subscribers. A bus built
/// with [`InMemoryEventBus::recording`] also keeps a publish log, which tests
/// read back with [`InMemoryEventBus::published`]; long-lived buses built
/// with [`InMemoryEventBus::new`] keep nothing beyond the subscriber buffers.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    sender: broadcast::Sender<M>,
    published: Option<Mutex<Vec<M>>>,
}

impl<M: Clone> InMemoryEventBus<M> {
    /// Create a bus whose subscribers buffer at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: None,
        }
    }

    /// Like [`InMemoryEventBus::new`], but also logs every published message.
    pub fn recording(capacity: usize) -> Self {
        Self {
            published: Some(Mutex::new(Vec::new())),
            ..Self::new(capacity)
        }
    }

    /// Everything published so far, in publish order; empty unless recording.
    pub fn published(&self) -> Vec<M> {
        self.published
            .as_ref()
            .and_then(|log| log.lock().ok().map(|log| log.clone()))
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<M: Clone> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self::new(256)
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + Sync + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        if let Some(log) = &self.published {
            log.lock()
                .map_err(|_| InMemoryBusError::Poisoned)?
                .push(message.clone());
        }

        // No live subscribers is fine; the message is simply not delivered.
        let _ = self.sender.send(message);
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        Subscription::new(self.sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RecvError;

    #[tokio::test]
    async fn every_subscriber_receives_each_message() {
        let bus = InMemoryEventBus::recording(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish("low-stock".to_string()).unwrap();

        assert_eq!(a.recv().await.unwrap(), "low-stock");
        assert_eq!(b.recv().await.unwrap(), "low-stock");
        assert_eq!(bus.published(), vec!["low-stock".to_string()]);
    }

    #[test]
    fn publish_without_subscribers_succeeds() {
        let bus = InMemoryEventBus::recording(4);
        bus.publish(1_u32).unwrap();
        assert_eq!(bus.published(), vec![1]);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn plain_bus_keeps_no_publish_log() {
        let bus = InMemoryEventBus::new(4);
        let mut sub = bus.subscribe();
        for n in 0..1_000_u32 {
            bus.publish(n).unwrap();
        }
        assert!(bus.published().is_empty());
        assert_eq!(sub.try_recv(), Some(996));
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_to_oldest_buffered() {
        let bus = InMemoryEventBus::new(2);
        let mut sub = bus.subscribe();
        for n in 0..5_u32 {
            bus.publish(n).unwrap();
        }
        assert_eq!(sub.recv().await.unwrap(), 3);
        assert_eq!(sub.try_recv(), Some(4));
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn dropping_the_bus_closes_subscriptions() {
        let bus = InMemoryEventBus::<u32>::new(2);
        let mut sub = bus.subscribe();
        drop(bus);
        assert_eq!(sub.recv().await, Err(RecvError::Closed));
    }
}
