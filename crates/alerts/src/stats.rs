//! Alert counts for dashboards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::alert::{AlertStatus, StockAlert};
use crate::rule::AlertKind;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStats {
    pub total: usize,
    pub active: usize,
    pub acknowledged: usize,
    pub resolved: usize,
    pub dismissed: usize,
    /// Open (active or acknowledged) alerts per kind.
    pub open_by_kind: BTreeMap<AlertKind, usize>,
}

impl AlertStats {
    pub fn tally<'a>(alerts: impl IntoIterator<Item = &'a StockAlert>) -> Self {
        let mut stats = AlertStats {
            open_by_kind: AlertKind::ALL.iter().map(|k| (*k, 0)).collect(),
            ..AlertStats::default()
        };
        for alert in alerts {
            stats.total += 1;
            match alert.status {
                AlertStatus::Active => stats.active += 1,
                AlertStatus::Acknowledged => stats.acknowledged += 1,
                AlertStatus::Resolved => stats.resolved += 1,
                AlertStatus::Dismissed => stats.dismissed += 1,
            }
            if alert.status.is_open() {
                *stats.open_by_kind.entry(alert.kind).or_insert(0) += 1;
            }
        }
        stats
    }
}
