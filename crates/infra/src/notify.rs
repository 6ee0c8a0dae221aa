//! Notification dispatch boundary for alert lifecycle events.
//!
//! Dispatch happens after the alert change has committed and is best-effort:
//! failures are logged and never reach the caller.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use replenish_alerts::AlertNotification;
use replenish_events::{EventBus, EventEnvelope};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification dispatch failed: {0}")]
pub struct DispatchError(pub String);

/// Sink for alert notifications (push channel, mail relay, ...).
#[async_trait]
pub trait NotificationDispatcher: Send + Sync + 'static {
    async fn dispatch(&self, notification: AlertNotification) -> Result<(), DispatchError>;
}

/// Publishes notifications on an event bus wrapped in an [`EventEnvelope`].
pub struct BusNotificationDispatcher<B> {
    bus: Arc<B>,
}

impl<B> BusNotificationDispatcher<B> {
    pub fn new(bus: Arc<B>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl<B> NotificationDispatcher for BusNotificationDispatcher<B>
where
    B: EventBus<EventEnvelope<AlertNotification>> + 'static,
{
    async fn dispatch(&self, notification: AlertNotification) -> Result<(), DispatchError> {
        self.bus
            .publish(EventEnvelope::wrap(notification))
            .map_err(|e| DispatchError(e.to_string()))
    }
}

/// Drops every notification; for deployments without a push channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

#[async_trait]
impl NotificationDispatcher for NoopDispatcher {
    async fn dispatch(&self, _notification: AlertNotification) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Dispatch each notification, logging failures.
pub(crate) async fn dispatch_all(
    dispatcher: &dyn NotificationDispatcher,
    notifications: Vec<AlertNotification>,
) {
    for notification in notifications {
        let alert_id = notification.alert_id;
        let lifecycle = notification.lifecycle;
        if let Err(e) = dispatcher.dispatch(notification).await {
            warn!(%alert_id, ?lifecycle, error = %e, "alert notification not delivered");
        }
    }
}
