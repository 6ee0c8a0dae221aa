//! Purchase order document and its lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use replenish_core::{
    Actor, Capability, DomainError, DomainResult, Entity, Money, SupplierId, UserId,
    uuid_newtype,
};

use crate::line::{LineId, LineUpdate, NewLine, PurchaseOrderLine};

uuid_newtype!(
    /// Identifier of a purchase order.
    PurchaseOrderId,
    "PurchaseOrderId"
);

pub const DEFAULT_CURRENCY: &str = "USD";

/// Purchase order status lifecycle.
///
/// `Received` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    PendingApproval,
    Approved,
    Ordered,
    PartiallyReceived,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::PendingApproval => "pending_approval",
            PurchaseOrderStatus::Approved => "approved",
            PurchaseOrderStatus::Ordered => "ordered",
            PurchaseOrderStatus::PartiallyReceived => "partially_received",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses reachable in one step.
    pub fn allowed_targets(&self) -> &'static [PurchaseOrderStatus] {
        use PurchaseOrderStatus::*;
        match self {
            Draft => &[PendingApproval, Cancelled],
            PendingApproval => &[Approved, Cancelled],
            Approved => &[Ordered, Cancelled],
            Ordered => &[PartiallyReceived, Received, Cancelled],
            PartiallyReceived => &[Received, Cancelled],
            Received | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: PurchaseOrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Received | PurchaseOrderStatus::Cancelled
        )
    }

    /// Goods can be booked against the order (it has been placed with the supplier).
    pub fn accepts_receipts(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Ordered
                | PurchaseOrderStatus::PartiallyReceived
                | PurchaseOrderStatus::Received
        )
    }

    fn required_capability(&self) -> Capability {
        match self {
            PurchaseOrderStatus::Approved => Capability::Approve,
            PurchaseOrderStatus::Cancelled => Capability::Cancel,
            PurchaseOrderStatus::PartiallyReceived | PurchaseOrderStatus::Received => {
                Capability::Receive
            }
            _ => Capability::Edit,
        }
    }
}

impl core::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for [`PurchaseOrder::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier_id: SupplierId,
    /// Defaults to the creation time.
    pub order_date: Option<DateTime<Utc>>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub tax_amount: Money,
    pub shipping_cost: Money,
    pub currency: Option<String>,
    pub payment_terms: Option<String>,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<NewLine>,
}

impl NewPurchaseOrder {
    pub fn new(supplier_id: SupplierId, lines: Vec<NewLine>) -> Self {
        Self {
            supplier_id,
            order_date: None,
            expected_delivery_date: None,
            tax_amount: Money::ZERO,
            shipping_cost: Money::ZERO,
            currency: None,
            payment_terms: None,
            shipping_address: None,
            billing_address: None,
            notes: None,
            lines,
        }
    }

    pub fn with_charges(mut self, tax_amount: Money, shipping_cost: Money) -> Self {
        self.tax_amount = tax_amount;
        self.shipping_cost = shipping_cost;
        self
    }
}

/// Header edit; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsUpdate {
    pub supplier_id: Option<SupplierId>,
    pub order_date: Option<DateTime<Utc>>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub tax_amount: Option<Money>,
    pub shipping_cost: Option<Money>,
    pub currency: Option<String>,
    pub payment_terms: Option<String>,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub notes: Option<String>,
}

/// A procurement document.
///
/// Invariants, held after every mutation:
/// - `subtotal == Σ line.total_price`
/// - `total_amount == subtotal + tax_amount + shipping_cost`
/// - status only changes along [`PurchaseOrderStatus::allowed_targets`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    po_number: String,
    supplier_id: SupplierId,
    status: PurchaseOrderStatus,
    order_date: DateTime<Utc>,
    expected_delivery_date: Option<DateTime<Utc>>,
    delivery_date: Option<DateTime<Utc>>,
    subtotal: Money,
    tax_amount: Money,
    shipping_cost: Money,
    total_amount: Money,
    currency: String,
    payment_terms: Option<String>,
    shipping_address: Option<String>,
    billing_address: Option<String>,
    notes: Option<String>,
    created_by: UserId,
    approved_by: Option<UserId>,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    lines: Vec<PurchaseOrderLine>,
}

impl PurchaseOrder {
    /// Create a draft order. Requires `can_edit`.
    pub fn create(
        po_number: String,
        input: NewPurchaseOrder,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        actor.require(Capability::Edit)?;
        if po_number.trim().is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }

        let lines = input
            .lines
            .into_iter()
            .map(PurchaseOrderLine::from_new)
            .collect::<DomainResult<Vec<_>>>()?;

        let mut order = Self {
            id: PurchaseOrderId::new(),
            po_number,
            supplier_id: input.supplier_id,
            status: PurchaseOrderStatus::Draft,
            order_date: input.order_date.unwrap_or(now),
            expected_delivery_date: input.expected_delivery_date,
            delivery_date: None,
            subtotal: Money::ZERO,
            tax_amount: input.tax_amount,
            shipping_cost: input.shipping_cost,
            total_amount: Money::ZERO,
            currency: input
                .currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            payment_terms: input.payment_terms,
            shipping_address: input.shipping_address,
            billing_address: input.billing_address,
            notes: input.notes,
            created_by: actor.user_id,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
            lines,
        };
        order.validate_dates()?;
        order.recompute_totals();
        Ok(order)
    }

    pub fn po_number(&self) -> &str {
        &self.po_number
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn expected_delivery_date(&self) -> Option<DateTime<Utc>> {
        self.expected_delivery_date
    }

    pub fn delivery_date(&self) -> Option<DateTime<Utc>> {
        self.delivery_date
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_amount
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn payment_terms(&self) -> Option<&str> {
        self.payment_terms.as_deref()
    }

    pub fn shipping_address(&self) -> Option<&str> {
        self.shipping_address.as_deref()
    }

    pub fn billing_address(&self) -> Option<&str> {
        self.billing_address.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn lines(&self) -> &[PurchaseOrderLine] {
        &self.lines
    }

    pub fn line(&self, line_id: LineId) -> DomainResult<&PurchaseOrderLine> {
        self.lines
            .iter()
            .find(|l| l.id() == line_id)
            .ok_or_else(|| DomainError::not_found("purchase order line", line_id))
    }

    pub fn has_receipts(&self) -> bool {
        self.lines.iter().any(|l| l.received_quantity() > 0)
    }

    /// The creator and `can_view_all` holders may read an order.
    pub fn ensure_visible_to(&self, actor: &Actor) -> DomainResult<()> {
        if actor.user_id == self.created_by {
            return Ok(());
        }
        actor.require(Capability::ViewAll)
    }

    pub fn update_details(
        &mut self,
        update: DetailsUpdate,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_editable(actor)?;

        let mut next = self.clone();
        if let Some(supplier_id) = update.supplier_id {
            next.supplier_id = supplier_id;
        }
        if let Some(order_date) = update.order_date {
            next.order_date = order_date;
        }
        if update.expected_delivery_date.is_some() {
            next.expected_delivery_date = update.expected_delivery_date;
        }
        if let Some(tax) = update.tax_amount {
            next.tax_amount = tax;
        }
        if let Some(shipping) = update.shipping_cost {
            next.shipping_cost = shipping;
        }
        if let Some(currency) = update.currency {
            if currency.trim().is_empty() {
                return Err(DomainError::validation("currency cannot be empty"));
            }
            next.currency = currency;
        }
        if update.payment_terms.is_some() {
            next.payment_terms = update.payment_terms;
        }
        if update.shipping_address.is_some() {
            next.shipping_address = update.shipping_address;
        }
        if update.billing_address.is_some() {
            next.billing_address = update.billing_address;
        }
        if update.notes.is_some() {
            next.notes = update.notes;
        }
        next.validate_dates()?;
        next.touch(now);

        *self = next;
        Ok(())
    }

    pub fn add_line(
        &mut self,
        line: NewLine,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DomainResult<LineId> {
        self.ensure_editable(actor)?;
        let line = PurchaseOrderLine::from_new(line)?;
        let id = line.id();
        self.lines.push(line);
        self.touch(now);
        Ok(id)
    }

    pub fn update_line(
        &mut self,
        line_id: LineId,
        update: LineUpdate,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_editable(actor)?;
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id() == line_id)
            .ok_or_else(|| DomainError::not_found("purchase order line", line_id))?;
        line.apply_update(update)?;
        self.touch(now);
        self.resettle(now);
        Ok(())
    }

    /// Remove a line that has not received any stock.
    pub fn remove_line(
        &mut self,
        line_id: LineId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_editable(actor)?;
        let line = self.line(line_id)?;
        if line.received_quantity() > 0 {
            return Err(DomainError::invariant(format!(
                "line {line_id} has received stock and cannot be removed"
            )));
        }
        self.lines.retain(|l| l.id() != line_id);
        self.touch(now);
        self.resettle(now);
        Ok(())
    }

    /// Replace every line. Rejected once any line has received stock.
    pub fn replace_lines(
        &mut self,
        lines: Vec<NewLine>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_editable(actor)?;
        if self.has_receipts() {
            return Err(DomainError::invariant(
                "lines cannot be replaced after stock was received",
            ));
        }
        self.lines = lines
            .into_iter()
            .map(PurchaseOrderLine::from_new)
            .collect::<DomainResult<Vec<_>>>()?;
        self.touch(now);
        Ok(())
    }

    /// Move to `target` if the lifecycle table allows it.
    ///
    /// Approval stamps approver and time, ordering stamps the order date and
    /// reaching `Received` stamps the delivery date.
    pub fn transition(
        &mut self,
        target: PurchaseOrderStatus,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        actor.require(target.required_capability())?;
        if !self.status.can_transition_to(target) {
            return Err(DomainError::invalid_transition(self.status, target));
        }

        match target {
            PurchaseOrderStatus::Approved => {
                self.approved_by = Some(actor.user_id);
                self.approved_at = Some(now);
            }
            PurchaseOrderStatus::Ordered => self.order_date = now,
            PurchaseOrderStatus::Received => self.delivery_date = Some(now),
            _ => {}
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    pub fn submit(&mut self, actor: &Actor, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(PurchaseOrderStatus::PendingApproval, actor, now)
    }

    pub fn approve(&mut self, actor: &Actor, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(PurchaseOrderStatus::Approved, actor, now)
    }

    pub fn mark_ordered(&mut self, actor: &Actor, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(PurchaseOrderStatus::Ordered, actor, now)
    }

    pub fn cancel(&mut self, actor: &Actor, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(PurchaseOrderStatus::Cancelled, actor, now)
    }

    /// Check that the order (and its lines) may be physically removed.
    pub fn ensure_deletable(&self, actor: &Actor) -> DomainResult<()> {
        actor.require(Capability::Edit)?;
        if self.status == PurchaseOrderStatus::Received || self.has_receipts() {
            return Err(DomainError::invariant(
                "an order with received stock cannot be deleted",
            ));
        }
        Ok(())
    }

    fn ensure_editable(&self, actor: &Actor) -> DomainResult<()> {
        actor.require(Capability::Edit)?;
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "cannot edit a {} purchase order",
                self.status
            )));
        }
        Ok(())
    }

    fn validate_dates(&self) -> DomainResult<()> {
        match self.expected_delivery_date {
            Some(expected) if expected < self.order_date => Err(DomainError::validation(
                "expected delivery date is before the order date",
            )),
            _ => Ok(()),
        }
    }

    fn recompute_totals(&mut self) {
        self.subtotal = self.lines.iter().map(PurchaseOrderLine::total_price).sum();
        self.total_amount = self.subtotal + self.tax_amount + self.shipping_cost;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.recompute_totals();
        self.updated_at = now;
    }

    pub(crate) fn lines_mut(&mut self) -> &mut [PurchaseOrderLine] {
        &mut self.lines
    }

    /// Line edits on a partly received order can complete it.
    fn resettle(&mut self, now: DateTime<Utc>) {
        if self.status == PurchaseOrderStatus::PartiallyReceived {
            self.settle_after_receipt(now);
        }
    }

    /// Derive the aggregate status from every line.
    pub(crate) fn settle_after_receipt(&mut self, now: DateTime<Utc>) {
        if self.lines.iter().all(PurchaseOrderLine::is_fully_received) {
            if self.status != PurchaseOrderStatus::Received {
                self.delivery_date = Some(now);
            }
            self.status = PurchaseOrderStatus::Received;
        } else {
            self.status = PurchaseOrderStatus::PartiallyReceived;
        }
        self.updated_at = now;
    }
}

impl Entity for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
