//! Alert rules: standing stock conditions configured by operators.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use replenish_core::{
    Actor, Capability, CategoryId, DomainError, DomainResult, Entity, LocationId, ProductId,
    UserId, uuid_newtype,
};

uuid_newtype!(
    /// Identifier of an alert rule.
    AlertRuleId,
    "AlertRuleId"
);

/// Upper bound for `threshold_percentage`, in percent.
pub const MAX_THRESHOLD_PERCENTAGE: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowStock,
    OutOfStock,
    Overstock,
    /// Accepted for configuration; no expiry data is tracked so it never fires.
    ExpiryWarning,
}

impl AlertKind {
    pub const ALL: [AlertKind; 4] = [
        AlertKind::LowStock,
        AlertKind::OutOfStock,
        AlertKind::Overstock,
        AlertKind::ExpiryWarning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowStock => "low_stock",
            AlertKind::OutOfStock => "out_of_stock",
            AlertKind::Overstock => "overstock",
            AlertKind::ExpiryWarning => "expiry_warning",
        }
    }
}

impl core::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where firings of a rule should be delivered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannels {
    pub email: bool,
    pub sms: bool,
    pub dashboard: bool,
}

impl NotificationChannels {
    pub const NONE: Self = Self {
        email: false,
        sms: false,
        dashboard: false,
    };

    /// Channels enabled on either side.
    pub fn union(self, other: Self) -> Self {
        Self {
            email: self.email || other.email,
            sms: self.sms || other.sms,
            dashboard: self.dashboard || other.dashboard,
        }
    }
}

impl Default for NotificationChannels {
    fn default() -> Self {
        Self {
            email: true,
            sms: false,
            dashboard: true,
        }
    }
}

/// Input for [`AlertRule::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAlertRule {
    pub name: String,
    pub kind: AlertKind,
    pub product_id: Option<ProductId>,
    pub category_id: Option<CategoryId>,
    pub location_id: Option<LocationId>,
    pub threshold_quantity: i64,
    pub threshold_percentage: Option<Decimal>,
    pub channels: NotificationChannels,
}

impl NewAlertRule {
    pub fn new(name: impl Into<String>, kind: AlertKind) -> Self {
        Self {
            name: name.into(),
            kind,
            product_id: None,
            category_id: None,
            location_id: None,
            threshold_quantity: 0,
            threshold_percentage: None,
            channels: NotificationChannels::default(),
        }
    }

    pub fn for_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn for_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn at_location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn threshold(mut self, quantity: i64) -> Self {
        self.threshold_quantity = quantity;
        self
    }

    pub fn percentage(mut self, percentage: Decimal) -> Self {
        self.threshold_percentage = Some(percentage);
        self
    }
}

/// Partial edit of a rule; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub threshold_quantity: Option<i64>,
    pub threshold_percentage: Option<Decimal>,
    pub location_id: Option<LocationId>,
    pub channels: Option<NotificationChannels>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: AlertRuleId,
    pub name: String,
    pub kind: AlertKind,
    /// Scope; `None` everywhere means every product at every location.
    pub product_id: Option<ProductId>,
    pub category_id: Option<CategoryId>,
    pub location_id: Option<LocationId>,
    pub threshold_quantity: i64,
    pub threshold_percentage: Option<Decimal>,
    pub is_active: bool,
    pub channels: NotificationChannels,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRule {
    /// Requires `can_edit`.
    pub fn create(input: NewAlertRule, actor: &Actor, now: DateTime<Utc>) -> DomainResult<Self> {
        actor.require(Capability::Edit)?;
        let rule = Self {
            id: AlertRuleId::new(),
            name: input.name.trim().to_string(),
            kind: input.kind,
            product_id: input.product_id,
            category_id: input.category_id,
            location_id: input.location_id,
            threshold_quantity: input.threshold_quantity,
            threshold_percentage: input.threshold_percentage,
            is_active: true,
            channels: input.channels,
            created_by: actor.user_id,
            created_at: now,
            updated_at: now,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn update(
        &mut self,
        update: RuleUpdate,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        actor.require(Capability::Edit)?;
        let mut next = self.clone();
        if let Some(name) = update.name {
            next.name = name.trim().to_string();
        }
        if let Some(quantity) = update.threshold_quantity {
            next.threshold_quantity = quantity;
        }
        if update.threshold_percentage.is_some() {
            next.threshold_percentage = update.threshold_percentage;
        }
        if update.location_id.is_some() {
            next.location_id = update.location_id;
        }
        if let Some(channels) = update.channels {
            next.channels = channels;
        }
        next.validate()?;
        next.updated_at = now;
        *self = next;
        Ok(())
    }

    pub fn set_active(
        &mut self,
        active: bool,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        actor.require(Capability::Edit)?;
        self.is_active = active;
        self.updated_at = now;
        Ok(())
    }

    pub fn covers_location(&self, location_id: LocationId) -> bool {
        self.location_id.is_none_or(|l| l == location_id)
    }

    fn validate(&self) -> DomainResult<()> {
        if self.name.is_empty() {
            return Err(DomainError::validation("rule name cannot be empty"));
        }
        if self.threshold_quantity < 0 {
            return Err(DomainError::validation(
                "threshold quantity must not be negative",
            ));
        }
        if let Some(pct) = self.threshold_percentage {
            if pct <= Decimal::ZERO {
                return Err(DomainError::validation(
                    "threshold percentage must be positive",
                ));
            }
            if pct > MAX_THRESHOLD_PERCENTAGE {
                return Err(DomainError::validation(format!(
                    "threshold percentage must not exceed {MAX_THRESHOLD_PERCENTAGE}"
                )));
            }
        }
        if self.kind == AlertKind::Overstock && self.threshold_percentage.is_none() {
            return Err(DomainError::validation(
                "overstock rules need a threshold percentage",
            ));
        }
        Ok(())
    }
}

impl Entity for AlertRule {
    type Id = AlertRuleId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
