//! Receiving reconciliation against purchase order lines.
//!
//! Only the order side lives here; the infra receiving service books the
//! returned [`ReceivedLine`]s into the inventory ledger in the same
//! transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use replenish_core::{Actor, Capability, DomainError, DomainResult, Entity, Money, ProductId};

use crate::line::LineId;
use crate::order::{PurchaseOrder, PurchaseOrderStatus};

/// One `(line, quantity)` pair of a receiving request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub line_id: LineId,
    pub received_quantity: i64,
}

impl ReceiptLine {
    pub fn new(line_id: LineId, received_quantity: i64) -> Self {
        Self {
            line_id,
            received_quantity,
        }
    }
}

/// Quantity accepted onto a line, with what the ledger needs to book it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub line_id: LineId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl PurchaseOrder {
    /// Apply received quantities to the lines and settle the order status.
    ///
    /// All-or-nothing: every pair is validated before any line changes, so an
    /// error leaves the order untouched. Zero quantities are skipped and
    /// repeated pairs for one line are summed before the over-receipt check.
    pub fn receive(
        &mut self,
        receipts: &[ReceiptLine],
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<ReceivedLine>> {
        actor.require(Capability::Receive)?;
        if !self.status().accepts_receipts() {
            return Err(DomainError::invalid_transition(
                self.status(),
                PurchaseOrderStatus::PartiallyReceived,
            ));
        }

        // Request order is kept so movements are written in the order asked for.
        let mut requested: Vec<(LineId, i64)> = Vec::new();
        let mut index: HashMap<LineId, usize> = HashMap::new();
        for receipt in receipts {
            if receipt.received_quantity < 0 {
                return Err(DomainError::validation(format!(
                    "received quantity must not be negative (line {}: {})",
                    receipt.line_id, receipt.received_quantity
                )));
            }
            if receipt.received_quantity == 0 {
                continue;
            }
            match index.get(&receipt.line_id) {
                Some(&i) => {
                    requested[i].1 = requested[i]
                        .1
                        .checked_add(receipt.received_quantity)
                        .ok_or_else(|| {
                            DomainError::validation(format!(
                                "received quantity overflows for line {}",
                                receipt.line_id
                            ))
                        })?;
                }
                None => {
                    index.insert(receipt.line_id, requested.len());
                    requested.push((receipt.line_id, receipt.received_quantity));
                }
            }
        }
        if requested.is_empty() {
            return Err(DomainError::validation("nothing to receive"));
        }

        let mut received = Vec::with_capacity(requested.len());
        for &(line_id, quantity) in &requested {
            let line = self.line(line_id)?;
            let exceeds = line
                .received_quantity()
                .checked_add(quantity)
                .is_none_or(|total| total > line.quantity());
            if exceeds {
                return Err(DomainError::OverReceipt {
                    line_id: line_id.to_string(),
                    ordered: line.quantity(),
                    received: line.received_quantity(),
                    requested: quantity,
                });
            }
            received.push(ReceivedLine {
                line_id,
                product_id: line.product_id(),
                quantity,
                unit_price: line.unit_price(),
            });
        }

        for r in &received {
            if let Some(line) = self.lines_mut().iter_mut().find(|l| l.id() == r.line_id) {
                line.receive(r.quantity);
            }
        }
        self.settle_after_receipt(now);
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::{LineUpdate, NewLine};
    use crate::order::NewPurchaseOrder;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use replenish_core::{Capabilities, SupplierId, UserId};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).unwrap()
    }

    fn actor() -> Actor {
        Actor::new(UserId::new(), Capabilities::all())
    }

    fn ordered(quantities: &[i64]) -> PurchaseOrder {
        let actor = actor();
        let lines = quantities
            .iter()
            .map(|&q| NewLine::new(ProductId::new(), q, Money::new(dec!(5.00)).unwrap()))
            .collect();
        let mut order = PurchaseOrder::create(
            "PO2026RCVTST".into(),
            NewPurchaseOrder::new(SupplierId::new(), lines),
            &actor,
            now(),
        )
        .unwrap();
        order.submit(&actor, now()).unwrap();
        order.approve(&actor, now()).unwrap();
        order.mark_ordered(&actor, now()).unwrap();
        order
    }

    fn first_line(order: &PurchaseOrder) -> LineId {
        order.lines()[0].id()
    }

    #[test]
    fn partial_then_full_receipt() {
        let mut order = ordered(&[10]);
        let line = first_line(&order);

        let received = order
            .receive(&[ReceiptLine::new(line, 6)], &actor(), now())
            .unwrap();
        assert_eq!(received[0].quantity, 6);
        assert_eq!(order.status(), PurchaseOrderStatus::PartiallyReceived);
        assert_eq!(order.delivery_date(), None);

        order
            .receive(&[ReceiptLine::new(line, 4)], &actor(), now())
            .unwrap();
        assert_eq!(order.status(), PurchaseOrderStatus::Received);
        assert_eq!(order.delivery_date(), Some(now()));
        assert_eq!(order.lines()[0].received_quantity(), 10);

        let err = order
            .receive(&[ReceiptLine::new(line, 1)], &actor(), now())
            .unwrap_err();
        assert!(matches!(err, DomainError::OverReceipt { .. }));
    }

    #[test]
    fn one_bad_pair_rejects_the_whole_request() {
        let mut order = ordered(&[10, 3]);
        let (a, b) = (order.lines()[0].id(), order.lines()[1].id());
        let snapshot = order.clone();

        let err = order
            .receive(
                &[ReceiptLine::new(a, 5), ReceiptLine::new(b, 4)],
                &actor(),
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::OverReceipt { .. }));
        assert_eq!(order, snapshot);
    }

    #[test]
    fn duplicate_pairs_are_summed() {
        let mut order = ordered(&[5]);
        let line = first_line(&order);
        let err = order
            .receive(
                &[ReceiptLine::new(line, 3), ReceiptLine::new(line, 3)],
                &actor(),
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::OverReceipt { requested: 6, .. }));
    }

    #[test]
    fn summing_huge_pairs_is_rejected_without_overflow() {
        let mut order = ordered(&[5]);
        let line = first_line(&order);
        let snapshot = order.clone();
        let err = order
            .receive(
                &[ReceiptLine::new(line, i64::MAX), ReceiptLine::new(line, 1)],
                &actor(),
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(order, snapshot);
    }

    #[test]
    fn huge_quantity_on_partly_received_line_is_over_receipt() {
        let mut order = ordered(&[5]);
        let line = first_line(&order);
        order
            .receive(&[ReceiptLine::new(line, 2)], &actor(), now())
            .unwrap();
        let err = order
            .receive(&[ReceiptLine::new(line, i64::MAX)], &actor(), now())
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::OverReceipt {
                received: 2,
                requested: i64::MAX,
                ..
            }
        ));
        assert_eq!(order.lines()[0].received_quantity(), 2);
    }

    #[test]
    fn trimming_lines_to_what_arrived_completes_the_order() {
        let mut order = ordered(&[10, 4]);
        let (a, b) = (order.lines()[0].id(), order.lines()[1].id());
        order
            .receive(&[ReceiptLine::new(a, 6)], &actor(), now())
            .unwrap();
        assert_eq!(order.status(), PurchaseOrderStatus::PartiallyReceived);

        order.remove_line(b, &actor(), now()).unwrap();
        assert_eq!(order.status(), PurchaseOrderStatus::PartiallyReceived);

        order
            .update_line(
                a,
                LineUpdate {
                    quantity: Some(6),
                    ..LineUpdate::default()
                },
                &actor(),
                now(),
            )
            .unwrap();
        assert_eq!(order.status(), PurchaseOrderStatus::Received);
        assert_eq!(order.delivery_date(), Some(now()));
    }

    #[test]
    fn unknown_line_is_not_found() {
        let mut order = ordered(&[5]);
        let err = order
            .receive(&[ReceiptLine::new(LineId::new(), 1)], &actor(), now())
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn draft_orders_cannot_receive() {
        let actor = actor();
        let mut order = PurchaseOrder::create(
            "PO2026DRAFT1".into(),
            NewPurchaseOrder::new(
                SupplierId::new(),
                vec![NewLine::new(ProductId::new(), 1, Money::ZERO)],
            ),
            &actor,
            now(),
        )
        .unwrap();
        let line = first_line(&order);
        let err = order
            .receive(&[ReceiptLine::new(line, 1)], &actor, now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn zero_only_request_is_invalid() {
        let mut order = ordered(&[5]);
        let line = first_line(&order);
        let err = order
            .receive(&[ReceiptLine::new(line, 0)], &actor(), now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(order.status(), PurchaseOrderStatus::Ordered);
    }

    proptest! {
        #[test]
        fn received_never_exceeds_ordered(
            ordered_qty in prop::collection::vec(1_i64..20, 1..5),
            batches in prop::collection::vec(prop::collection::vec((0_usize..5, 0_i64..12), 1..4), 1..10),
        ) {
            let mut order = ordered(&ordered_qty);
            let ids: Vec<LineId> = order.lines().iter().map(|l| l.id()).collect();
            for batch in batches {
                let receipts: Vec<ReceiptLine> = batch
                    .iter()
                    .map(|&(i, q)| ReceiptLine::new(ids[i % ids.len()], q))
                    .collect();
                let before = order.clone();
                if order.receive(&receipts, &actor(), now()).is_err() {
                    prop_assert_eq!(&order, &before);
                }
                for line in order.lines() {
                    prop_assert!(line.received_quantity() >= 0);
                    prop_assert!(line.received_quantity() <= line.quantity());
                }
                let all_done = order.lines().iter().all(|l| l.is_fully_received());
                if order.status() == PurchaseOrderStatus::Received {
                    prop_assert!(all_done);
                }
            }
        }
    }
}
