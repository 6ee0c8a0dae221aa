//! Dedup/lifecycle policy: what evaluation does to the latest alert of a
//! (product, location, kind) triple.

use serde::{Deserialize, Serialize};

use crate::alert::StockAlert;
use crate::evaluate::{Condition, Evaluation};
use crate::rule::AlertKind;

/// When a resolved or dismissed alert may be re-opened by evaluation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactivationPolicy {
    /// Any renewed firing re-opens the alert.
    #[default]
    Unconditional,
    /// Re-open only when stock is strictly worse than the figure recorded on
    /// the closed alert (lower for shortages, higher for overstock).
    WorseThanResolution,
}

impl ReactivationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactivationPolicy::Unconditional => "unconditional",
            ReactivationPolicy::WorseThanResolution => "worse_than_resolution",
        }
    }
}

impl core::str::FromStr for ReactivationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unconditional" => Ok(ReactivationPolicy::Unconditional),
            "worse_than_resolution" => Ok(ReactivationPolicy::WorseThanResolution),
            other => Err(format!("unknown reactivation policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertAction {
    Create(Condition),
    Update(Condition),
    Reactivate(Condition),
    Resolve { current_quantity: i64 },
    None,
}

/// Decide the action for one triple given its latest alert (any status).
pub fn decide(
    latest: Option<&StockAlert>,
    evaluation: Evaluation,
    policy: ReactivationPolicy,
) -> AlertAction {
    match (evaluation, latest) {
        (Evaluation::NotApplicable, _) => AlertAction::None,
        (Evaluation::Firing(condition), None) => AlertAction::Create(condition),
        (Evaluation::Firing(condition), Some(alert)) if alert.status.is_open() => {
            AlertAction::Update(condition)
        }
        (Evaluation::Firing(condition), Some(alert)) => match policy {
            ReactivationPolicy::Unconditional => AlertAction::Reactivate(condition),
            ReactivationPolicy::WorseThanResolution if is_worse(alert, &condition) => {
                AlertAction::Reactivate(condition)
            }
            ReactivationPolicy::WorseThanResolution => AlertAction::None,
        },
        (Evaluation::Clear { current_quantity }, Some(alert)) if alert.status.is_open() => {
            AlertAction::Resolve { current_quantity }
        }
        (Evaluation::Clear { .. }, _) => AlertAction::None,
    }
}

fn is_worse(alert: &StockAlert, condition: &Condition) -> bool {
    match alert.kind {
        AlertKind::Overstock => condition.current_quantity > alert.current_quantity,
        _ => condition.current_quantity < alert.current_quantity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;
    use replenish_core::{LocationId, ProductId};

    use crate::alert::AlertStatus;
    use crate::rule::AlertRuleId;

    fn applicable_statuses(action: &AlertAction) -> &'static [AlertStatus] {
        match action {
            AlertAction::Create(_) | AlertAction::None => &[],
            AlertAction::Update(_) | AlertAction::Resolve { .. } => {
                &[AlertStatus::Active, AlertStatus::Acknowledged]
            }
            AlertAction::Reactivate(_) => &[AlertStatus::Resolved, AlertStatus::Dismissed],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn low(qty: i64) -> Condition {
        Condition {
            kind: AlertKind::LowStock,
            current_quantity: qty,
            threshold_quantity: 5,
            message: format!("low {qty}"),
        }
    }

    fn alert_with(status: AlertStatus, qty: i64) -> StockAlert {
        let mut alert = StockAlert::open(
            AlertRuleId::new(),
            ProductId::new(),
            LocationId::new(),
            &low(qty),
            now(),
        );
        alert.status = status;
        alert
    }

    #[test]
    fn first_firing_creates() {
        assert_eq!(
            decide(None, Evaluation::Firing(low(3)), ReactivationPolicy::Unconditional),
            AlertAction::Create(low(3))
        );
    }

    #[test]
    fn open_alert_is_updated_on_every_firing() {
        let alert = alert_with(AlertStatus::Acknowledged, 3);
        assert_eq!(
            decide(Some(&alert), Evaluation::Firing(low(3)), ReactivationPolicy::Unconditional),
            AlertAction::Update(low(3))
        );
        assert_eq!(
            decide(Some(&alert), Evaluation::Firing(low(2)), ReactivationPolicy::Unconditional),
            AlertAction::Update(low(2))
        );
    }

    #[test]
    fn clearing_resolves_only_open_alerts() {
        let open = alert_with(AlertStatus::Active, 3);
        let clear = Evaluation::Clear {
            current_quantity: 9,
        };
        assert_eq!(
            decide(Some(&open), clear.clone(), ReactivationPolicy::Unconditional),
            AlertAction::Resolve {
                current_quantity: 9
            }
        );
        let closed = alert_with(AlertStatus::Dismissed, 3);
        assert_eq!(
            decide(Some(&closed), clear.clone(), ReactivationPolicy::Unconditional),
            AlertAction::None
        );
        assert_eq!(
            decide(None, clear, ReactivationPolicy::Unconditional),
            AlertAction::None
        );
    }

    #[test]
    fn unconditional_policy_reactivates_closed_alerts() {
        let closed = alert_with(AlertStatus::Resolved, 3);
        assert_eq!(
            decide(Some(&closed), Evaluation::Firing(low(4)), ReactivationPolicy::Unconditional),
            AlertAction::Reactivate(low(4))
        );
    }

    #[test]
    fn worse_than_resolution_policy_needs_a_lower_figure() {
        let closed = alert_with(AlertStatus::Dismissed, 3);
        let policy = ReactivationPolicy::WorseThanResolution;
        assert_eq!(
            decide(Some(&closed), Evaluation::Firing(low(3)), policy),
            AlertAction::None
        );
        assert_eq!(
            decide(Some(&closed), Evaluation::Firing(low(2)), policy),
            AlertAction::Reactivate(low(2))
        );
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!(
            "Worse_Than_Resolution".parse::<ReactivationPolicy>(),
            Ok(ReactivationPolicy::WorseThanResolution)
        );
        assert!("sometimes".parse::<ReactivationPolicy>().is_err());
    }

    fn status() -> impl Strategy<Value = AlertStatus> {
        prop_oneof![
            Just(AlertStatus::Active),
            Just(AlertStatus::Acknowledged),
            Just(AlertStatus::Resolved),
            Just(AlertStatus::Dismissed),
        ]
    }

    proptest! {
        #[test]
        fn actions_only_apply_to_matching_statuses(
            prior in prop::option::of((status(), 0_i64..20)),
            firing in any::<bool>(),
            qty in 0_i64..20,
            worse_only in any::<bool>(),
        ) {
            let alert = prior.map(|(s, q)| alert_with(s, q));
            let evaluation = if firing {
                Evaluation::Firing(low(qty))
            } else {
                Evaluation::Clear { current_quantity: qty }
            };
            let policy = if worse_only {
                ReactivationPolicy::WorseThanResolution
            } else {
                ReactivationPolicy::Unconditional
            };
            let action = decide(alert.as_ref(), evaluation, policy);
            match (&alert, &action) {
                (None, AlertAction::Create(_) | AlertAction::None) => {}
                (None, other) => prop_assert!(false, "unexpected {:?} without prior alert", other),
                (Some(_), AlertAction::Create(_)) => prop_assert!(false, "duplicate lineage created"),
                (Some(a), AlertAction::None) => {
                    prop_assert!(!(firing && a.status.is_open()), "open alert left stale");
                }
                (Some(a), act) => prop_assert!(applicable_statuses(act).contains(&a.status)),
            }
        }
    }
}
