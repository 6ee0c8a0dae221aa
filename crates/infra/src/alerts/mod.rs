//! Alert evaluation engine, operator service and background scheduler.

pub mod engine;
pub mod scheduler;
pub mod service;

pub use engine::{AlertEngine, EvaluationSummary};
pub use scheduler::{AlertScheduler, AlertSchedulerHandle};
pub use service::AlertService;
