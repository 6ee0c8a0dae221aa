//! Append-only stock movement entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use replenish_core::{Entity, LocationId, Money, ProductId, UserId, uuid_newtype};

use crate::record::InventoryRecordId;

uuid_newtype!(
    /// Identifier of a stock movement.
    MovementId,
    "MovementId"
);

/// Direction/cause of a quantity change. The sign lives here, never in the
/// movement quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    In,
    Out,
    /// Outbound leg of a transfer to another location.
    Transfer,
    /// Manual correction; signed, clamps on-hand at zero.
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Transfer => "transfer",
            MovementType::Adjustment => "adjustment",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of document a movement originates from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    PurchaseOrder,
    Sale,
    Transfer,
    Adjustment,
}

/// Back-reference to the originating document.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementReference {
    pub kind: ReferenceKind,
    pub id: Uuid,
}

impl MovementReference {
    pub fn purchase_order(id: impl Into<Uuid>) -> Self {
        Self {
            kind: ReferenceKind::PurchaseOrder,
            id: id.into(),
        }
    }
}

/// One immutable ledger entry.
///
/// `quantity` is always positive; `quantity_before`/`quantity_after` record the
/// effect actually applied (which differs from `quantity` when an adjustment
/// was clamped at zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub record_id: InventoryRecordId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub unit_cost: Option<Money>,
    pub reference: Option<MovementReference>,
    pub from_location: Option<LocationId>,
    pub notes: Option<String>,
    pub performed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
