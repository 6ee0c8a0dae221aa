//! Purchase order service: transaction boundary around the PO state machine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use replenish_core::{Actor, Clock, DomainError, DomainResult, Entity};
use replenish_purchasing::{
    DetailsUpdate, LineId, LineUpdate, NewLine, NewPurchaseOrder, OrderNumberGenerator,
    PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus,
};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{Store, UnitOfWork};

pub struct PurchaseOrderService<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    numbers: OrderNumberGenerator,
    number_attempts: u32,
}

impl<S: Store> PurchaseOrderService<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        numbers: OrderNumberGenerator,
        number_attempts: u32,
    ) -> Self {
        Self {
            store,
            clock,
            numbers,
            number_attempts: number_attempts.max(1),
        }
    }

    /// Create a draft order under a freshly generated number.
    ///
    /// A number collision reported by the store is retried with a new number
    /// up to the configured attempt count.
    #[instrument(skip(self, input, actor), fields(supplier_id = %input.supplier_id))]
    pub async fn create(
        &self,
        input: NewPurchaseOrder,
        actor: &Actor,
    ) -> ServiceResult<PurchaseOrder> {
        let mut last_conflict = None;
        for attempt in 1..=self.number_attempts {
            let now = self.clock.now();
            let po_number = self.numbers.next(now);
            let order = PurchaseOrder::create(po_number, input.clone(), actor, now)?;

            match self.insert(&order).await {
                Ok(()) => {
                    info!(po_id = %order.id(), po_number = order.po_number(), total = %order.total_amount(), "purchase order created");
                    return Ok(order);
                }
                Err(e) if e.is_conflict() => {
                    warn!(attempt, po_number = order.po_number(), "order number collision");
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_conflict
            .unwrap_or_else(|| DomainError::conflict("could not allocate an order number").into()))
    }

    async fn insert(&self, order: &PurchaseOrder) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        if tx.purchase_order_by_number(order.po_number()).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "purchase order number {} already exists",
                order.po_number()
            ))
            .into());
        }
        tx.save_purchase_order(order).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Read an order; visible to its creator and to `can_view_all` holders.
    pub async fn get(&self, id: PurchaseOrderId, actor: &Actor) -> ServiceResult<PurchaseOrder> {
        let mut tx = self.store.begin().await?;
        let order = load(&mut tx, id).await?;
        order.ensure_visible_to(actor)?;
        Ok(order)
    }

    pub async fn update_details(
        &self,
        id: PurchaseOrderId,
        update: DetailsUpdate,
        actor: &Actor,
    ) -> ServiceResult<PurchaseOrder> {
        self.mutate(id, |order, now| order.update_details(update, actor, now))
            .await
            .map(|(order, ())| order)
    }

    pub async fn add_line(
        &self,
        id: PurchaseOrderId,
        line: NewLine,
        actor: &Actor,
    ) -> ServiceResult<(PurchaseOrder, LineId)> {
        self.mutate(id, |order, now| order.add_line(line, actor, now))
            .await
    }

    pub async fn update_line(
        &self,
        id: PurchaseOrderId,
        line_id: LineId,
        update: LineUpdate,
        actor: &Actor,
    ) -> ServiceResult<PurchaseOrder> {
        self.mutate(id, |order, now| order.update_line(line_id, update, actor, now))
            .await
            .map(|(order, ())| order)
    }

    pub async fn remove_line(
        &self,
        id: PurchaseOrderId,
        line_id: LineId,
        actor: &Actor,
    ) -> ServiceResult<PurchaseOrder> {
        self.mutate(id, |order, now| order.remove_line(line_id, actor, now))
            .await
            .map(|(order, ())| order)
    }

    pub async fn replace_lines(
        &self,
        id: PurchaseOrderId,
        lines: Vec<NewLine>,
        actor: &Actor,
    ) -> ServiceResult<PurchaseOrder> {
        self.mutate(id, |order, now| order.replace_lines(lines, actor, now))
            .await
            .map(|(order, ())| order)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn transition(
        &self,
        id: PurchaseOrderId,
        target: PurchaseOrderStatus,
        actor: &Actor,
    ) -> ServiceResult<PurchaseOrder> {
        let (order, from) = self
            .mutate(id, |order, now| {
                let from = order.status();
                order.transition(target, actor, now).map(|()| from)
            })
            .await?;
        info!(po_id = %id, %from, to = %target, "purchase order status changed");
        Ok(order)
    }

    pub async fn submit(&self, id: PurchaseOrderId, actor: &Actor) -> ServiceResult<PurchaseOrder> {
        self.transition(id, PurchaseOrderStatus::PendingApproval, actor)
            .await
    }

    pub async fn approve(&self, id: PurchaseOrderId, actor: &Actor) -> ServiceResult<PurchaseOrder> {
        self.transition(id, PurchaseOrderStatus::Approved, actor).await
    }

    pub async fn mark_ordered(
        &self,
        id: PurchaseOrderId,
        actor: &Actor,
    ) -> ServiceResult<PurchaseOrder> {
        self.transition(id, PurchaseOrderStatus::Ordered, actor).await
    }

    pub async fn cancel(&self, id: PurchaseOrderId, actor: &Actor) -> ServiceResult<PurchaseOrder> {
        self.transition(id, PurchaseOrderStatus::Cancelled, actor).await
    }

    /// Remove an order together with its lines.
    #[instrument(skip(self, actor))]
    pub async fn delete(&self, id: PurchaseOrderId, actor: &Actor) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let order = load(&mut tx, id).await?;
        order.ensure_deletable(actor)?;
        tx.delete_purchase_order(id).await?;
        tx.commit().await?;
        info!(po_id = %id, po_number = order.po_number(), "purchase order deleted");
        Ok(())
    }

    /// Load, mutate and save one order in a single unit of work.
    async fn mutate<T, F>(&self, id: PurchaseOrderId, f: F) -> ServiceResult<(PurchaseOrder, T)>
    where
        F: FnOnce(&mut PurchaseOrder, DateTime<Utc>) -> DomainResult<T> + Send,
        T: Send,
    {
        let mut tx = self.store.begin().await?;
        let mut order = load(&mut tx, id).await?;
        let out = f(&mut order, self.clock.now())?;
        tx.save_purchase_order(&order).await?;
        tx.commit().await?;
        Ok((order, out))
    }
}

pub(crate) async fn load<T: UnitOfWork>(
    tx: &mut T,
    id: PurchaseOrderId,
) -> Result<PurchaseOrder, ServiceError> {
    tx.purchase_order(id)
        .await?
        .ok_or_else(|| DomainError::not_found("purchase order", id).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use replenish_core::{Capabilities, ManualClock, Money, ProductId, SupplierId, UserId};
    use rust_decimal_macros::dec;

    use crate::store::InMemoryStore;

    fn service(store: Arc<InMemoryStore>) -> PurchaseOrderService<InMemoryStore> {
        PurchaseOrderService::new(
            store,
            Arc::new(ManualClock::new(Utc::now())),
            OrderNumberGenerator::default(),
            3,
        )
    }

    fn admin() -> Actor {
        Actor::new(UserId::new(), Capabilities::all())
    }

    fn input() -> NewPurchaseOrder {
        NewPurchaseOrder::new(
            SupplierId::new(),
            vec![NewLine::new(ProductId::new(), 10, Money::new(dec!(5.00)).unwrap())],
        )
    }

    #[tokio::test]
    async fn created_order_is_persisted_with_number() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store);
        let actor = admin();
        let order = svc.create(input(), &actor).await.unwrap();

        assert!(order.po_number().starts_with("PO"));
        assert_eq!(svc.get(order.id(), &actor).await.unwrap(), order);
    }

    #[tokio::test]
    async fn failed_transition_leaves_stored_order_unchanged() {
        let svc = service(Arc::new(InMemoryStore::new()));
        let actor = admin();
        let order = svc.create(input(), &actor).await.unwrap();

        let err = svc.mark_ordered(order.id(), &actor).await.unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(
            svc.get(order.id(), &actor).await.unwrap().status(),
            PurchaseOrderStatus::Draft
        );
    }

    #[tokio::test]
    async fn other_users_need_view_all() {
        let svc = service(Arc::new(InMemoryStore::new()));
        let creator = Actor::new(
            UserId::new(),
            Capabilities {
                can_edit: true,
                ..Capabilities::none()
            },
        );
        let order = svc.create(input(), &creator).await.unwrap();
        let stranger = Actor::new(UserId::new(), Capabilities::none());
        assert!(matches!(
            svc.get(order.id(), &stranger).await.unwrap_err().domain(),
            Some(DomainError::Forbidden("can_view_all"))
        ));
    }

    #[tokio::test]
    async fn delete_removes_order_and_lines() {
        let svc = service(Arc::new(InMemoryStore::new()));
        let actor = admin();
        let order = svc.create(input(), &actor).await.unwrap();
        svc.delete(order.id(), &actor).await.unwrap();
        assert!(matches!(
            svc.get(order.id(), &actor).await.unwrap_err().domain(),
            Some(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn number_collisions_are_retried_then_surfaced() {
        let store = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let actor = admin();
        let first = PurchaseOrderService::new(
            store.clone(),
            clock.clone(),
            OrderNumberGenerator::seeded("PO", 42),
            1,
        );
        let taken = first.create(input(), &actor).await.unwrap();

        // Same seed: the first candidate is already taken.
        let single_shot = PurchaseOrderService::new(
            store.clone(),
            clock.clone(),
            OrderNumberGenerator::seeded("PO", 42),
            1,
        );
        assert!(single_shot.create(input(), &actor).await.unwrap_err().is_conflict());

        let retrying = PurchaseOrderService::new(
            store,
            clock,
            OrderNumberGenerator::seeded("PO", 42),
            3,
        );
        let order = retrying.create(input(), &actor).await.unwrap();
        assert_ne!(order.po_number(), taken.po_number());
    }
}
