//! Alert lifecycle notifications handed to the push channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use replenish_core::{LocationId, ProductId};
use replenish_events::Event;

use crate::alert::{AlertId, AlertStatus, StockAlert};
use crate::rule::{AlertKind, NotificationChannels};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLifecycle {
    Created,
    Updated,
    Resolved,
}

/// Structured alert event: `{alert_id, product_id, location_id, alert_type,
/// message, current_quantity, threshold_quantity, status}` plus lifecycle tag,
/// channel flags and occurrence time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub lifecycle: AlertLifecycle,
    pub alert_id: AlertId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub alert_type: AlertKind,
    pub message: String,
    pub current_quantity: i64,
    pub threshold_quantity: i64,
    pub status: AlertStatus,
    pub channels: NotificationChannels,
    pub occurred_at: DateTime<Utc>,
}

impl AlertNotification {
    pub fn from_alert(
        alert: &StockAlert,
        lifecycle: AlertLifecycle,
        channels: NotificationChannels,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            lifecycle,
            alert_id: alert.id,
            product_id: alert.product_id,
            location_id: alert.location_id,
            alert_type: alert.kind,
            message: alert.message.clone(),
            current_quantity: alert.current_quantity,
            threshold_quantity: alert.threshold_quantity,
            status: alert.status,
            channels,
            occurred_at,
        }
    }
}

impl Event for AlertNotification {
    fn event_type(&self) -> &'static str {
        match self.lifecycle {
            AlertLifecycle::Created => "alerts.stock_alert.created",
            AlertLifecycle::Updated => "alerts.stock_alert.updated",
            AlertLifecycle::Resolved => "alerts.stock_alert.resolved",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use replenish_events::EventEnvelope;

    use crate::evaluate::Condition;
    use crate::rule::AlertRuleId;

    #[test]
    fn envelope_carries_the_boundary_fields() {
        let at = Utc.with_ymd_and_hms(2026, 4, 2, 10, 0, 0).unwrap();
        let alert = StockAlert::open(
            AlertRuleId::new(),
            ProductId::new(),
            LocationId::new(),
            &Condition {
                kind: AlertKind::OutOfStock,
                current_quantity: 0,
                threshold_quantity: 0,
                message: "Out of stock alert: Widget is out of stock".into(),
            },
            at,
        );
        let note = AlertNotification::from_alert(
            &alert,
            AlertLifecycle::Created,
            NotificationChannels::default(),
            at,
        );
        let json = serde_json::to_value(EventEnvelope::wrap(note)).unwrap();

        assert_eq!(json["type"], "alerts.stock_alert.created");
        assert_eq!(json["data"]["alert_type"], "out_of_stock");
        assert_eq!(json["data"]["status"], "active");
        assert_eq!(json["data"]["alert_id"], alert.id.to_string());
    }
}
