//! Stock alert rules, evaluation and the alert dedup/lifecycle policy.
//!
//! Evaluation is pure: given a rule, a product profile and a stock position it
//! yields an [`Evaluation`]; [`decide`] turns that plus the latest alert of the
//! triple into an [`AlertAction`]. The infra alert engine applies actions
//! inside a transaction and emits [`AlertNotification`]s after commit.

pub mod alert;
pub mod evaluate;
pub mod notification;
pub mod policy;
pub mod rule;
pub mod stats;

pub use alert::{AlertId, AlertStatus, StockAlert};
pub use evaluate::{Condition, Evaluation, evaluate, overstock_threshold};
pub use notification::{AlertLifecycle, AlertNotification};
pub use policy::{AlertAction, ReactivationPolicy, decide};
pub use rule::{
    AlertKind, AlertRule, AlertRuleId, MAX_THRESHOLD_PERCENTAGE, NewAlertRule, NotificationChannels,
    RuleUpdate,
};
pub use stats::AlertStats;
