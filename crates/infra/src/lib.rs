//! Infrastructure layer: storage boundary, services, notification dispatch,
//! the alert scheduler and configuration.
//!
//! Every service operation runs in exactly one [`store::UnitOfWork`]; it
//! either commits as a whole or leaves no trace.

pub mod alerts;
pub mod config;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod purchasing;
pub mod receiving;
pub mod store;

pub use alerts::{
    AlertEngine, AlertScheduler, AlertSchedulerHandle, AlertService, EvaluationSummary,
};
pub use config::EngineConfig;
pub use error::{ServiceError, ServiceResult};
pub use ledger::InventoryLedger;
pub use notify::{BusNotificationDispatcher, DispatchError, NoopDispatcher, NotificationDispatcher};
pub use purchasing::PurchaseOrderService;
pub use receiving::{ReceivingOutcome, ReceivingService};
pub use store::{InMemoryStore, Store, StoreError, StoreResult, UnitOfWork};
