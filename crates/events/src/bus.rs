//! Publish/subscribe abstraction for the push channel.
//!
//! The bus is for distribution, not storage: messages are published only after
//! the state they describe has been committed, and delivery is best-effort.
//! A subscriber that falls behind skips ahead rather than blocking publishers.

use std::sync::Arc;

use tokio::sync::broadcast;

/// Why a subscription stopped yielding messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvError {
    /// Every publisher is gone; no further messages will arrive.
    #[error("bus closed")]
    Closed,
}

/// A subscription to a bus. Each subscription sees every message published
/// after it was created.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: broadcast::Receiver<M>,
}

impl<M: Clone> Subscription<M> {
    pub fn new(receiver: broadcast::Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message.
    ///
    /// Lagged subscribers lose the overwritten messages and continue with the
    /// oldest one still buffered.
    pub async fn recv(&mut self) -> Result<M, RecvError> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Ok(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber lagged; messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(RecvError::Closed),
            }
        }
    }

    /// Take a message if one is ready, without waiting.
    pub fn try_recv(&mut self) -> Option<M> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber lagged; messages dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

/// Domain-agnostic pub/sub bus.
///
/// `publish` never waits on subscribers. Having no subscribers is not an error.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + core::fmt::Display + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

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

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
