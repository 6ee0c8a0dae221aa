//! Stock position of one product at one location.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use replenish_core::{
    DomainError, DomainResult, Entity, LocationId, Money, ProductId, UserId, uuid_newtype,
};

use crate::movement::{MovementId, MovementReference, MovementType, StockMovement};

uuid_newtype!(
    /// Identifier of an inventory record.
    InventoryRecordId,
    "InventoryRecordId"
);

/// A requested quantity change, before it is applied to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub movement_type: MovementType,
    /// Positive amount for `in`/`out`/`transfer`; signed for `adjustment`.
    pub delta: i64,
    pub unit_cost: Option<Money>,
    pub reference: Option<MovementReference>,
    pub from_location: Option<LocationId>,
    pub notes: Option<String>,
}

impl StockChange {
    pub fn new(movement_type: MovementType, delta: i64) -> Self {
        Self {
            movement_type,
            delta,
            unit_cost: None,
            reference: None,
            from_location: None,
            notes: None,
        }
    }

    pub fn inbound(quantity: i64) -> Self {
        Self::new(MovementType::In, quantity)
    }

    pub fn adjustment(delta: i64) -> Self {
        Self::new(MovementType::Adjustment, delta)
    }

    pub fn with_unit_cost(mut self, unit_cost: Money) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    pub fn with_reference(mut self, reference: MovementReference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Unique per (product, location).
///
/// Invariants, held after every mutation:
/// - `quantity >= 0` and `0 <= reserved <= quantity`
/// - `available == quantity - reserved`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    id: InventoryRecordId,
    product_id: ProductId,
    location_id: LocationId,
    quantity: i64,
    reserved: i64,
    available: i64,
    unit_cost: Option<Money>,
    last_restocked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// An empty position. Records are created lazily by the first movement.
    pub fn new(product_id: ProductId, location_id: LocationId, now: DateTime<Utc>) -> Self {
        Self {
            id: InventoryRecordId::new(),
            product_id,
            location_id,
            quantity: 0,
            reserved: 0,
            available: 0,
            unit_cost: None,
            last_restocked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    pub fn available(&self) -> i64 {
        self.available
    }

    pub fn unit_cost(&self) -> Option<Money> {
        self.unit_cost
    }

    pub fn last_restocked_at(&self) -> Option<DateTime<Utc>> {
        self.last_restocked_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Apply a quantity change and return the movement describing it.
    ///
    /// On error the record is left untouched.
    pub fn apply(
        &mut self,
        change: StockChange,
        performed_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<StockMovement> {
        if change.delta == 0 {
            return Err(DomainError::validation("movement quantity cannot be zero"));
        }
        if change.movement_type != MovementType::Adjustment && change.delta < 0 {
            return Err(DomainError::validation(format!(
                "{} movement quantity must be positive (got {})",
                change.movement_type, change.delta
            )));
        }

        let before = self.quantity;
        let after = match change.movement_type {
            MovementType::In => before
                .checked_add(change.delta)
                .ok_or_else(|| DomainError::validation("quantity overflow"))?,
            MovementType::Out | MovementType::Transfer => {
                if change.delta > before {
                    return Err(DomainError::InsufficientStock {
                        requested: change.delta,
                        on_hand: before,
                    });
                }
                before - change.delta
            }
            // Manual corrections never error on underflow; they clamp.
            MovementType::Adjustment => before.saturating_add(change.delta).max(0),
        };

        self.quantity = after;
        if change.movement_type == MovementType::In {
            self.last_restocked_at = Some(now);
            // Unit cost is initialized by the first costed receipt only.
            if self.unit_cost.is_none() {
                self.unit_cost = change.unit_cost;
            }
        }
        self.recompute(now);

        Ok(StockMovement {
            id: MovementId::new(),
            record_id: self.id,
            product_id: self.product_id,
            location_id: self.location_id,
            movement_type: change.movement_type,
            quantity: change.delta.saturating_abs(),
            quantity_before: before,
            quantity_after: after,
            unit_cost: change.unit_cost,
            reference: change.reference,
            from_location: match change.movement_type {
                MovementType::Transfer => Some(change.from_location.unwrap_or(self.location_id)),
                _ => change.from_location,
            },
            notes: change.notes,
            performed_by,
            occurred_at: now,
        })
    }

    /// Earmark `quantity` units. Fails when more than is available.
    pub fn reserve(&mut self, quantity: i64, now: DateTime<Utc>) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("reservation quantity must be positive"));
        }
        if quantity > self.available {
            return Err(DomainError::InsufficientStock {
                requested: quantity,
                on_hand: self.available,
            });
        }
        self.reserved += quantity;
        self.recompute(now);
        Ok(())
    }

    /// Return `quantity` reserved units to the available pool.
    pub fn release(&mut self, quantity: i64, now: DateTime<Utc>) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("release quantity must be positive"));
        }
        if quantity > self.reserved {
            return Err(DomainError::validation(format!(
                "cannot release {quantity}: only {} reserved",
                self.reserved
            )));
        }
        self.reserved -= quantity;
        self.recompute(now);
        Ok(())
    }

    // Reservations cannot outlive the stock they earmark.
    fn recompute(&mut self, now: DateTime<Utc>) {
        self.reserved = self.reserved.clamp(0, self.quantity);
        self.available = self.quantity - self.reserved;
        self.updated_at = now;
    }
}

impl Entity for InventoryRecord {
    type Id = InventoryRecordId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
