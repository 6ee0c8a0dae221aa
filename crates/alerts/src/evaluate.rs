//! Rule condition evaluation against one stock position.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use replenish_core::{DomainError, DomainResult};
use replenish_inventory::{InventoryRecord, ProductProfile};

use crate::rule::{AlertKind, AlertRule};

/// A firing condition, ready to be written onto an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub kind: AlertKind,
    pub current_quantity: i64,
    pub threshold_quantity: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Firing(Condition),
    /// The condition was checked and does not hold.
    Clear { current_quantity: i64 },
    /// The rule cannot be checked for this position (e.g. no maximum stock
    /// level configured); existing alerts are left alone.
    NotApplicable,
}

/// Evaluate `rule` against the available quantity of `record`.
///
/// Fails only when the overstock threshold cannot be represented.
pub fn evaluate(
    rule: &AlertRule,
    product: &ProductProfile,
    record: &InventoryRecord,
) -> DomainResult<Evaluation> {
    let available = record.available();
    let evaluation = match rule.kind {
        AlertKind::LowStock => {
            if available <= rule.threshold_quantity {
                Evaluation::Firing(Condition {
                    kind: AlertKind::LowStock,
                    current_quantity: available,
                    threshold_quantity: rule.threshold_quantity,
                    message: format!(
                        "Low stock alert: {} has {} units available (threshold: {})",
                        product.name, available, rule.threshold_quantity
                    ),
                })
            } else {
                Evaluation::Clear {
                    current_quantity: available,
                }
            }
        }
        AlertKind::OutOfStock => {
            if available == 0 {
                Evaluation::Firing(Condition {
                    kind: AlertKind::OutOfStock,
                    current_quantity: 0,
                    threshold_quantity: 0,
                    message: format!("Out of stock alert: {} is out of stock", product.name),
                })
            } else {
                Evaluation::Clear {
                    current_quantity: available,
                }
            }
        }
        AlertKind::Overstock => {
            let Some(threshold) = overstock_threshold(rule, product)? else {
                return Ok(Evaluation::NotApplicable);
            };
            if Decimal::from(available) > threshold {
                Evaluation::Firing(Condition {
                    kind: AlertKind::Overstock,
                    current_quantity: available,
                    threshold_quantity: threshold.floor().to_i64().unwrap_or(i64::MAX),
                    message: format!(
                        "Overstock alert: {} has {} units (threshold: {})",
                        product.name,
                        available,
                        threshold.normalize()
                    ),
                })
            } else {
                Evaluation::Clear {
                    current_quantity: available,
                }
            }
        }
        AlertKind::ExpiryWarning => Evaluation::NotApplicable,
    };
    Ok(evaluation)
}

/// `max_stock_level × threshold_percentage / 100`, when both are configured.
pub fn overstock_threshold(
    rule: &AlertRule,
    product: &ProductProfile,
) -> DomainResult<Option<Decimal>> {
    let (Some(pct), Some(max)) = (
        rule.threshold_percentage,
        product.max_stock_level.filter(|m| *m > 0),
    ) else {
        return Ok(None);
    };
    Decimal::from(max)
        .checked_mul(pct)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .map(Some)
        .ok_or_else(|| {
            DomainError::validation(format!(
                "overstock threshold overflows ({max} x {pct}%) for {}",
                product.sku
            ))
        })
}
