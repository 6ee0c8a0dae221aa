//! Receiving reconciliation: books received PO quantities into the ledger.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use replenish_core::{Actor, Clock, Entity, LocationId};
use replenish_inventory::{MovementReference, StockChange, StockMovement};
use replenish_purchasing::{PurchaseOrder, PurchaseOrderId, ReceiptLine};

use crate::error::ServiceResult;
use crate::ledger::book;
use crate::purchasing::load;
use crate::store::{Store, UnitOfWork};

/// The updated order and the `in` movements written for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivingOutcome {
    pub order: PurchaseOrder,
    pub movements: Vec<StockMovement>,
}

pub struct ReceivingService<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> ReceivingService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Receive goods against `po_id` into `location_id`.
    ///
    /// One unit of work: lines, stock positions, movements and the PO status
    /// are committed together, or nothing is.
    #[instrument(skip(self, receipts, actor), fields(pairs = receipts.len(), user_id = %actor.user_id))]
    pub async fn receive(
        &self,
        po_id: PurchaseOrderId,
        location_id: LocationId,
        receipts: &[ReceiptLine],
        actor: &Actor,
    ) -> ServiceResult<ReceivingOutcome> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut order = load(&mut tx, po_id).await?;

        let received = order.receive(receipts, actor, now)?;

        let mut movements = Vec::with_capacity(received.len());
        for line in &received {
            let change = StockChange::inbound(line.quantity)
                .with_unit_cost(line.unit_price)
                .with_reference(MovementReference::purchase_order(order.id()))
                .with_notes(format!("Received from PO {}", order.po_number()));
            let (_, movement) = book(
                &mut tx,
                line.product_id,
                location_id,
                change,
                actor.user_id,
                now,
            )
            .await?;
            movements.push(movement);
        }

        tx.save_purchase_order(&order).await?;
        tx.commit().await?;

        info!(
            po_id = %order.id(),
            po_number = order.po_number(),
            status = %order.status(),
            units = received.iter().map(|r| r.quantity).sum::<i64>(),
            "goods received"
        );
        Ok(ReceivingOutcome { order, movements })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use replenish_core::{Capabilities, DomainError, ManualClock, Money, ProductId, SupplierId, UserId};
    use replenish_inventory::MovementType;
    use replenish_purchasing::{NewLine, NewPurchaseOrder, OrderNumberGenerator, PurchaseOrderStatus};
    use rust_decimal_macros::dec;

    use crate::ledger::InventoryLedger;
    use crate::purchasing::PurchaseOrderService;
    use crate::store::InMemoryStore;

    struct Fixture {
        orders: PurchaseOrderService<InMemoryStore>,
        receiving: ReceivingService<InMemoryStore>,
        ledger: InventoryLedger<InMemoryStore>,
        actor: Actor,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        Fixture {
            orders: PurchaseOrderService::new(
                store.clone(),
                clock.clone(),
                OrderNumberGenerator::default(),
                3,
            ),
            receiving: ReceivingService::new(store.clone(), clock.clone()),
            ledger: InventoryLedger::new(store, clock),
            actor: Actor::new(UserId::new(), Capabilities::all()),
        }
    }

    async fn placed_order(f: &Fixture, lines: Vec<NewLine>) -> PurchaseOrder {
        let order = f
            .orders
            .create(NewPurchaseOrder::new(SupplierId::new(), lines), &f.actor)
            .await
            .unwrap();
        f.orders.submit(order.id(), &f.actor).await.unwrap();
        f.orders.approve(order.id(), &f.actor).await.unwrap();
        f.orders.mark_ordered(order.id(), &f.actor).await.unwrap()
    }

    #[tokio::test]
    async fn movements_reference_the_order() {
        let f = fixture();
        let product = ProductId::new();
        let location = LocationId::new();
        let price = Money::new(dec!(5.00)).unwrap();
        let order = placed_order(&f, vec![NewLine::new(product, 10, price)]).await;
        let line = order.lines()[0].id();

        let outcome = f
            .receiving
            .receive(order.id(), location, &[ReceiptLine::new(line, 6)], &f.actor)
            .await
            .unwrap();

        assert_eq!(outcome.order.status(), PurchaseOrderStatus::PartiallyReceived);
        let movement = &outcome.movements[0];
        assert_eq!(movement.movement_type, MovementType::In);
        assert_eq!(movement.quantity, 6);
        assert_eq!(movement.unit_cost, Some(price));
        assert_eq!(
            movement.reference,
            Some(MovementReference::purchase_order(order.id()))
        );

        let record = f.ledger.read(product, location).await.unwrap().unwrap();
        assert_eq!(record.unit_cost(), Some(price));
    }

    #[tokio::test]
    async fn receiving_requires_capability() {
        let f = fixture();
        let order = placed_order(
            &f,
            vec![NewLine::new(ProductId::new(), 1, Money::ZERO)],
        )
        .await;
        let clerk = Actor::new(
            UserId::new(),
            Capabilities {
                can_edit: true,
                ..Capabilities::none()
            },
        );
        let err = f
            .receiving
            .receive(
                order.id(),
                LocationId::new(),
                &[ReceiptLine::new(order.lines()[0].id(), 1)],
                &clerk,
            )
            .await
            .unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::Forbidden("can_receive")));
    }

    #[tokio::test]
    async fn approved_but_not_ordered_is_rejected() {
        let f = fixture();
        let order = f
            .orders
            .create(
                NewPurchaseOrder::new(
                    SupplierId::new(),
                    vec![NewLine::new(ProductId::new(), 1, Money::ZERO)],
                ),
                &f.actor,
            )
            .await
            .unwrap();
        f.orders.submit(order.id(), &f.actor).await.unwrap();
        f.orders.approve(order.id(), &f.actor).await.unwrap();

        let err = f
            .receiving
            .receive(
                order.id(),
                LocationId::new(),
                &[ReceiptLine::new(order.lines()[0].id(), 1)],
                &f.actor,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(DomainError::InvalidTransition { .. })
        ));
    }
}
