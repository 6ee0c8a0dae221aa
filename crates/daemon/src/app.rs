use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use replenish_alerts::AlertNotification;
use replenish_core::{Clock, SystemClock};
use replenish_events::{EventBus, EventEnvelope, InMemoryEventBus, RecvError};
use replenish_infra::{
    AlertEngine, AlertScheduler, AlertSchedulerHandle, AlertService, BusNotificationDispatcher,
    EngineConfig, InMemoryStore, InventoryLedger, PurchaseOrderService, ReceivingService,
};
use replenish_purchasing::OrderNumberGenerator;

pub type NotificationBus = InMemoryEventBus<EventEnvelope<AlertNotification>>;

/// Running engine: services for callers plus the background tasks.
pub struct App {
    pub orders: PurchaseOrderService<InMemoryStore>,
    pub receiving: ReceivingService<InMemoryStore>,
    pub ledger: InventoryLedger<InMemoryStore>,
    pub alerts: AlertService<InMemoryStore>,
    pub bus: Arc<NotificationBus>,
    pub scheduler: AlertSchedulerHandle,
    feed: JoinHandle<()>,
}

impl App {
    /// Build every component and start the scheduler. Must run inside a tokio runtime.
    pub fn start(config: &EngineConfig) -> Self {
        Self::start_with(config, Arc::new(InMemoryStore::new()), Arc::new(SystemClock))
    }

    pub fn start_with(config: &EngineConfig, store: Arc<InMemoryStore>, clock: Arc<dyn Clock>) -> Self {
        let bus = Arc::new(NotificationBus::new(config.notification_capacity));
        let feed = tokio::spawn(log_notifications(bus.clone()));

        let engine = Arc::new(AlertEngine::new(
            store.clone(),
            clock.clone(),
            Arc::new(BusNotificationDispatcher::new(bus.clone())),
            config.reactivation,
        ));
        let scheduler = AlertScheduler::spawn(engine, config);

        info!(
            po_prefix = %config.order_number_prefix,
            notification_capacity = config.notification_capacity,
            "replenish engine started"
        );

        Self {
            orders: PurchaseOrderService::new(
                store.clone(),
                clock.clone(),
                OrderNumberGenerator::new(config.order_number_prefix.clone()),
                config.order_number_attempts,
            ),
            receiving: ReceivingService::new(store.clone(), clock.clone()),
            ledger: InventoryLedger::new(store.clone(), clock.clone()),
            alerts: AlertService::new(store, clock),
            bus,
            scheduler,
            feed,
        }
    }

    /// Stop the scheduler, then the notification feed.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
        self.feed.abort();
        info!("replenish engine stopped");
    }
}

/// Dashboard feed: every pushed notification is logged.
async fn log_notifications(bus: Arc<NotificationBus>) {
    let mut subscription = bus.subscribe();
    loop {
        match subscription.recv().await {
            Ok(envelope) => {
                let event_type = envelope.event_type().to_string();
                let n = envelope.into_payload();
                info!(
                    event_type = %event_type,
                    alert_id = %n.alert_id,
                    product_id = %n.product_id,
                    location_id = %n.location_id,
                    status = %n.status,
                    "{}",
                    n.message
                );
            }
            Err(RecvError::Closed) => {
                warn!("notification bus closed");
                break;
            }
        }
    }
}
