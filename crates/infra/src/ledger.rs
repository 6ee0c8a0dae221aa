//! Inventory ledger service: the only write path into stock positions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use replenish_core::{Actor, Capability, Clock, DomainError, Entity, LocationId, ProductId, UserId};
use replenish_inventory::{
    InventoryRecord, InventoryRecordId, MovementType, StockChange, StockMovement,
};

use crate::error::ServiceResult;
use crate::store::{Store, UnitOfWork};

/// Apply `change` to the (product, location) position inside `tx`, creating
/// the record on first use, and append its movement.
///
/// Outbound movements against a position that does not exist fail with
/// `InsufficientStock` and write nothing.
pub(crate) async fn book<T: UnitOfWork>(
    tx: &mut T,
    product_id: ProductId,
    location_id: LocationId,
    change: StockChange,
    performed_by: UserId,
    now: DateTime<Utc>,
) -> ServiceResult<(InventoryRecord, StockMovement)> {
    let mut record = match tx.inventory_record(product_id, location_id).await? {
        Some(record) => record,
        None => {
            if matches!(
                change.movement_type,
                MovementType::Out | MovementType::Transfer
            ) {
                return Err(DomainError::InsufficientStock {
                    requested: change.delta,
                    on_hand: 0,
                }
                .into());
            }
            InventoryRecord::new(product_id, location_id, now)
        }
    };

    let movement = record.apply(change, performed_by, now)?;
    tx.save_inventory_record(&record).await?;
    tx.append_movement(&movement).await?;
    debug!(
        record_id = %record.id(),
        movement = %movement.movement_type,
        quantity = movement.quantity,
        on_hand = record.quantity(),
        "stock movement booked"
    );
    Ok((record, movement))
}

pub struct InventoryLedger<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> InventoryLedger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Manual stock change (requires `can_edit`).
    #[instrument(skip(self, change, actor), fields(movement = %change.movement_type, delta = change.delta))]
    pub async fn adjust(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        change: StockChange,
        actor: &Actor,
    ) -> ServiceResult<(InventoryRecord, StockMovement)> {
        actor.require(Capability::Edit)?;
        let mut tx = self.store.begin().await?;
        let booked = book(
            &mut tx,
            product_id,
            location_id,
            change,
            actor.user_id,
            self.clock.now(),
        )
        .await?;
        tx.commit().await?;
        Ok(booked)
    }

    pub async fn read(
        &self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> ServiceResult<Option<InventoryRecord>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.inventory_record(product_id, location_id).await?)
    }

    pub async fn reserve(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        quantity: i64,
        actor: &Actor,
    ) -> ServiceResult<InventoryRecord> {
        self.update_reservation(product_id, location_id, actor, |record, now| {
            record.reserve(quantity, now)
        })
        .await
    }

    pub async fn release(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        quantity: i64,
        actor: &Actor,
    ) -> ServiceResult<InventoryRecord> {
        self.update_reservation(product_id, location_id, actor, |record, now| {
            record.release(quantity, now)
        })
        .await
    }

    /// Movement history of a position, newest first.
    pub async fn movements(
        &self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> ServiceResult<Vec<StockMovement>> {
        let mut tx = self.store.begin().await?;
        match tx.inventory_record(product_id, location_id).await? {
            Some(record) => Ok(tx.movements(record.id()).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Delete the movement history of a record; returns how many were removed.
    #[instrument(skip(self, actor))]
    pub async fn purge_movements(
        &self,
        record_id: InventoryRecordId,
        actor: &Actor,
    ) -> ServiceResult<usize> {
        actor.require(Capability::Edit)?;
        let mut tx = self.store.begin().await?;
        if tx.inventory_record_by_id(record_id).await?.is_none() {
            return Err(DomainError::not_found("inventory record", record_id).into());
        }
        let purged = tx.purge_movements(record_id).await?;
        tx.commit().await?;
        Ok(purged)
    }

    /// Delete a record. Its movements must have been purged first.
    #[instrument(skip(self, actor))]
    pub async fn delete_record(
        &self,
        record_id: InventoryRecordId,
        actor: &Actor,
    ) -> ServiceResult<()> {
        actor.require(Capability::Edit)?;
        let mut tx = self.store.begin().await?;
        if !tx.delete_inventory_record(record_id).await? {
            return Err(DomainError::not_found("inventory record", record_id).into());
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_reservation<F>(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        actor: &Actor,
        f: F,
    ) -> ServiceResult<InventoryRecord>
    where
        F: FnOnce(&mut InventoryRecord, DateTime<Utc>) -> replenish_core::DomainResult<()> + Send,
    {
        actor.require(Capability::Edit)?;
        let mut tx = self.store.begin().await?;
        let mut record = tx
            .inventory_record(product_id, location_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found("inventory record", format!("{product_id}@{location_id}"))
            })?;
        f(&mut record, self.clock.now())?;
        tx.save_inventory_record(&record).await?;
        tx.commit().await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replenish_core::{Capabilities, ManualClock};

    use crate::store::InMemoryStore;

    fn ledger() -> InventoryLedger<InMemoryStore> {
        InventoryLedger::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(ManualClock::new(Utc::now())),
        )
    }

    fn actor() -> Actor {
        Actor::new(UserId::new(), Capabilities::all())
    }

    #[tokio::test]
    async fn first_movement_creates_the_record() {
        let ledger = ledger();
        let (p, l) = (ProductId::new(), LocationId::new());
        let (record, movement) = ledger
            .adjust(p, l, StockChange::inbound(8), &actor())
            .await
            .unwrap();
        assert_eq!(record.quantity(), 8);
        assert_eq!(movement.quantity, 8);
        assert_eq!(ledger.read(p, l).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn rejected_out_movement_writes_nothing() {
        let ledger = ledger();
        let (p, l) = (ProductId::new(), LocationId::new());
        ledger
            .adjust(p, l, StockChange::inbound(2), &actor())
            .await
            .unwrap();

        let err = ledger
            .adjust(p, l, StockChange::new(MovementType::Out, 5), &actor())
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(DomainError::InsufficientStock { requested: 5, on_hand: 2 })
        ));
        assert_eq!(ledger.movements(p, l).await.unwrap().len(), 1);
        assert_eq!(ledger.read(p, l).await.unwrap().unwrap().quantity(), 2);
    }

    #[tokio::test]
    async fn out_of_unknown_position_is_insufficient() {
        let ledger = ledger();
        let err = ledger
            .adjust(
                ProductId::new(),
                LocationId::new(),
                StockChange::new(MovementType::Out, 1),
                &actor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(DomainError::InsufficientStock { .. })
        ));
    }

    #[tokio::test]
    async fn history_is_newest_first_and_must_be_purged_before_delete() {
        let ledger = ledger();
        let (p, l) = (ProductId::new(), LocationId::new());
        let (record, _) = ledger
            .adjust(p, l, StockChange::inbound(5), &actor())
            .await
            .unwrap();
        ledger
            .adjust(p, l, StockChange::adjustment(-2), &actor())
            .await
            .unwrap();

        let history = ledger.movements(p, l).await.unwrap();
        assert_eq!(history[0].movement_type, MovementType::Adjustment);
        assert_eq!(history[1].movement_type, MovementType::In);

        let err = ledger.delete_record(record.id(), &actor()).await.unwrap_err();
        assert!(err.is_conflict());

        assert_eq!(ledger.purge_movements(record.id(), &actor()).await.unwrap(), 2);
        ledger.delete_record(record.id(), &actor()).await.unwrap();
        assert!(ledger.read(p, l).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reservations_do_not_write_movements() {
        let ledger = ledger();
        let (p, l) = (ProductId::new(), LocationId::new());
        ledger
            .adjust(p, l, StockChange::inbound(10), &actor())
            .await
            .unwrap();

        let record = ledger.reserve(p, l, 4, &actor()).await.unwrap();
        assert_eq!(record.available(), 6);
        let record = ledger.release(p, l, 1, &actor()).await.unwrap();
        assert_eq!(record.available(), 7);
        assert_eq!(ledger.movements(p, l).await.unwrap().len(), 1);
    }
}
