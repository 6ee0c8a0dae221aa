//! Materialized alert firings and their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use replenish_core::{DomainError, DomainResult, Entity, LocationId, ProductId, UserId, uuid_newtype};

use crate::evaluate::Condition;
use crate::rule::{AlertKind, AlertRuleId};

uuid_newtype!(
    /// Identifier of a stock alert.
    AlertId,
    "AlertId"
);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Dismissed => "dismissed",
        }
    }

    /// Still demands attention (not resolved or dismissed).
    pub fn is_open(&self) -> bool {
        matches!(self, AlertStatus::Active | AlertStatus::Acknowledged)
    }
}

impl core::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One firing lineage of (product, location, kind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub id: AlertId,
    /// Rule that last fired this alert.
    pub rule_id: Option<AlertRuleId>,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub kind: AlertKind,
    pub status: AlertStatus,
    pub current_quantity: i64,
    pub threshold_quantity: i64,
    pub message: String,
    pub acknowledged_by: Option<UserId>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockAlert {
    pub fn open(
        rule_id: AlertRuleId,
        product_id: ProductId,
        location_id: LocationId,
        condition: &Condition,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AlertId::new(),
            rule_id: Some(rule_id),
            product_id,
            location_id,
            kind: condition.kind,
            status: AlertStatus::Active,
            current_quantity: condition.current_quantity,
            threshold_quantity: condition.threshold_quantity,
            message: condition.message.clone(),
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the figures of an open alert in place; status is kept.
    pub fn refresh(&mut self, rule_id: AlertRuleId, condition: &Condition, now: DateTime<Utc>) {
        self.rule_id = Some(rule_id);
        self.current_quantity = condition.current_quantity;
        self.threshold_quantity = condition.threshold_quantity;
        self.message = condition.message.clone();
        self.updated_at = now;
    }

    /// Re-open a resolved/dismissed alert, clearing its handling stamps.
    pub fn reactivate(&mut self, rule_id: AlertRuleId, condition: &Condition, now: DateTime<Utc>) {
        self.refresh(rule_id, condition, now);
        self.status = AlertStatus::Active;
        self.acknowledged_by = None;
        self.acknowledged_at = None;
        self.resolved_by = None;
        self.resolved_at = None;
    }

    /// The condition cleared during evaluation.
    pub fn auto_resolve(&mut self, current_quantity: i64, now: DateTime<Utc>) {
        self.status = AlertStatus::Resolved;
        self.current_quantity = current_quantity;
        self.resolved_at = Some(now);
        self.updated_at = now;
    }

    pub fn acknowledge(&mut self, user: UserId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_open(AlertStatus::Acknowledged)?;
        self.status = AlertStatus::Acknowledged;
        self.acknowledged_by = Some(user);
        self.acknowledged_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn resolve(&mut self, user: UserId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_open(AlertStatus::Resolved)?;
        self.status = AlertStatus::Resolved;
        self.resolved_by = Some(user);
        self.resolved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn dismiss(&mut self, user: UserId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_open(AlertStatus::Dismissed)?;
        self.status = AlertStatus::Dismissed;
        self.resolved_by = Some(user);
        self.resolved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_open(&self, target: AlertStatus) -> DomainResult<()> {
        if self.status.is_open() {
            Ok(())
        } else {
            Err(DomainError::invalid_transition(self.status, target))
        }
    }
}

impl Entity for StockAlert {
    type Id = AlertId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
