//! Purchase order lines.

use serde::{Deserialize, Serialize};

use replenish_core::{DomainError, DomainResult, Entity, Money, ProductId, uuid_newtype};

uuid_newtype!(
    /// Identifier of a purchase order line.
    LineId,
    "LineId"
);

/// Input for a new line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub supplier_sku: Option<String>,
    pub notes: Option<String>,
}

impl NewLine {
    pub fn new(product_id: ProductId, quantity: i64, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
            supplier_sku: None,
            notes: None,
        }
    }

    pub fn with_supplier_sku(mut self, sku: impl Into<String>) -> Self {
        self.supplier_sku = Some(sku.into());
        self
    }
}

/// Partial edit of a line; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineUpdate {
    pub quantity: Option<i64>,
    pub unit_price: Option<Money>,
    pub supplier_sku: Option<String>,
    pub notes: Option<String>,
}

/// One ordered product. `0 <= received_quantity <= quantity` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    id: LineId,
    product_id: ProductId,
    quantity: i64,
    unit_price: Money,
    total_price: Money,
    received_quantity: i64,
    supplier_sku: Option<String>,
    notes: Option<String>,
}

impl PurchaseOrderLine {
    pub(crate) fn from_new(line: NewLine) -> DomainResult<Self> {
        ensure_quantity(line.quantity)?;
        Ok(Self {
            id: LineId::new(),
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            total_price: line.unit_price.times(line.quantity)?,
            received_quantity: 0,
            supplier_sku: line.supplier_sku,
            notes: line.notes,
        })
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn received_quantity(&self) -> i64 {
        self.received_quantity
    }

    pub fn supplier_sku(&self) -> Option<&str> {
        self.supplier_sku.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn remaining(&self) -> i64 {
        self.quantity - self.received_quantity
    }

    pub fn is_fully_received(&self) -> bool {
        self.received_quantity == self.quantity
    }

    pub(crate) fn apply_update(&mut self, update: LineUpdate) -> DomainResult<()> {
        let quantity = update.quantity.unwrap_or(self.quantity);
        ensure_quantity(quantity)?;
        if quantity < self.received_quantity {
            return Err(DomainError::validation(format!(
                "quantity {quantity} is below the {} units already received",
                self.received_quantity
            )));
        }
        let unit_price = update.unit_price.unwrap_or(self.unit_price);
        let total_price = unit_price.times(quantity)?;

        self.quantity = quantity;
        self.unit_price = unit_price;
        self.total_price = total_price;
        if update.supplier_sku.is_some() {
            self.supplier_sku = update.supplier_sku;
        }
        if update.notes.is_some() {
            self.notes = update.notes;
        }
        Ok(())
    }

    pub(crate) fn receive(&mut self, quantity: i64) {
        self.received_quantity += quantity;
    }
}

impl Entity for PurchaseOrderLine {
    type Id = LineId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

fn ensure_quantity(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!(
            "ordered quantity must be positive (got {quantity})"
        )));
    }
    Ok(())
}
