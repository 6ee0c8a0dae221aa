use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use replenish_alerts::{AlertId, AlertKind, AlertRule, AlertRuleId, StockAlert};
use replenish_core::{CategoryId, Entity, LocationId, ProductId};
use replenish_inventory::{InventoryRecord, InventoryRecordId, ProductProfile, StockMovement};
use replenish_purchasing::{PurchaseOrder, PurchaseOrderId};

use super::{Store, StoreError, StoreResult, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct Tables {
    orders: HashMap<PurchaseOrderId, PurchaseOrder>,
    records: HashMap<InventoryRecordId, InventoryRecord>,
    record_keys: HashMap<(ProductId, LocationId), InventoryRecordId>,
    movements: Vec<StockMovement>,
    products: HashMap<ProductId, ProductProfile>,
    rules: Vec<AlertRule>,
    alerts: Vec<StockAlert>,
}

/// In-memory transactional store.
///
/// Units of work are fully serialized: `begin` takes the store lock and works
/// on a private copy of the tables, which `commit` swaps in. Intended for
/// tests/dev. Not optimized for performance.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    failing_begins: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `begin` fail with `Unavailable`.
    pub fn fail_next_begins(&self, n: usize) {
        self.failing_begins.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> StoreResult<InMemoryTx> {
        let injected = self
            .failing_begins
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }

        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTx { guard, staged })
    }
}

/// Unit of work over [`InMemoryStore`]. Holds the store lock until dropped.
#[derive(Debug)]
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl UnitOfWork for InMemoryTx {
    async fn purchase_order(&mut self, id: PurchaseOrderId) -> StoreResult<Option<PurchaseOrder>> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn purchase_order_by_number(
        &mut self,
        po_number: &str,
    ) -> StoreResult<Option<PurchaseOrder>> {
        Ok(self
            .staged
            .orders
            .values()
            .find(|o| o.po_number() == po_number)
            .cloned())
    }

    async fn save_purchase_order(&mut self, order: &PurchaseOrder) -> StoreResult<()> {
        let duplicate = self
            .staged
            .orders
            .values()
            .any(|o| o.po_number() == order.po_number() && o.id() != order.id());
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "purchase order number {} already exists",
                order.po_number()
            )));
        }
        self.staged.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn delete_purchase_order(&mut self, id: PurchaseOrderId) -> StoreResult<bool> {
        Ok(self.staged.orders.remove(&id).is_some())
    }

    async fn inventory_record(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> StoreResult<Option<InventoryRecord>> {
        Ok(self
            .staged
            .record_keys
            .get(&(product_id, location_id))
            .and_then(|id| self.staged.records.get(id))
            .cloned())
    }

    async fn inventory_record_by_id(
        &mut self,
        id: InventoryRecordId,
    ) -> StoreResult<Option<InventoryRecord>> {
        Ok(self.staged.records.get(&id).cloned())
    }

    async fn inventory_records(
        &mut self,
        products: Option<&[ProductId]>,
        location_id: Option<LocationId>,
    ) -> StoreResult<Vec<InventoryRecord>> {
        let mut records: Vec<InventoryRecord> = self
            .staged
            .records
            .values()
            .filter(|r| products.is_none_or(|p| p.contains(&r.product_id())))
            .filter(|r| location_id.is_none_or(|l| l == r.location_id()))
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.created_at(), r.id()));
        Ok(records)
    }

    async fn save_inventory_record(&mut self, record: &InventoryRecord) -> StoreResult<()> {
        let key = (record.product_id(), record.location_id());
        if let Some(existing) = self.staged.record_keys.get(&key) {
            if *existing != record.id() {
                return Err(StoreError::Conflict(format!(
                    "inventory record for product {} at location {} already exists",
                    key.0, key.1
                )));
            }
        }
        self.staged.record_keys.insert(key, record.id());
        self.staged.records.insert(record.id(), record.clone());
        Ok(())
    }

    async fn delete_inventory_record(&mut self, id: InventoryRecordId) -> StoreResult<bool> {
        if self.staged.movements.iter().any(|m| m.record_id == id) {
            return Err(StoreError::Conflict(format!(
                "inventory record {id} still has movement history"
            )));
        }
        match self.staged.records.remove(&id) {
            Some(record) => {
                self.staged
                    .record_keys
                    .remove(&(record.product_id(), record.location_id()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_movement(&mut self, movement: &StockMovement) -> StoreResult<()> {
        if !self.staged.records.contains_key(&movement.record_id) {
            return Err(StoreError::Conflict(format!(
                "movement references unknown inventory record {}",
                movement.record_id
            )));
        }
        self.staged.movements.push(movement.clone());
        Ok(())
    }

    async fn movements(&mut self, record_id: InventoryRecordId) -> StoreResult<Vec<StockMovement>> {
        Ok(self
            .staged
            .movements
            .iter()
            .rev()
            .filter(|m| m.record_id == record_id)
            .cloned()
            .collect())
    }

    async fn purge_movements(&mut self, record_id: InventoryRecordId) -> StoreResult<usize> {
        let before = self.staged.movements.len();
        self.staged.movements.retain(|m| m.record_id != record_id);
        Ok(before - self.staged.movements.len())
    }

    async fn product(&mut self, product_id: ProductId) -> StoreResult<Option<ProductProfile>> {
        Ok(self.staged.products.get(&product_id).cloned())
    }

    async fn products_in_category(
        &mut self,
        category_id: CategoryId,
    ) -> StoreResult<Vec<ProductId>> {
        let mut ids: Vec<ProductId> = self
            .staged
            .products
            .values()
            .filter(|p| p.category_id == Some(category_id))
            .map(|p| p.product_id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn save_product(&mut self, product: &ProductProfile) -> StoreResult<()> {
        self.staged
            .products
            .insert(product.product_id, product.clone());
        Ok(())
    }

    async fn alert_rule(&mut self, id: AlertRuleId) -> StoreResult<Option<AlertRule>> {
        Ok(self.staged.rules.iter().find(|r| r.id == id).cloned())
    }

    async fn alert_rules(&mut self, active_only: bool) -> StoreResult<Vec<AlertRule>> {
        Ok(self
            .staged
            .rules
            .iter()
            .filter(|r| !active_only || r.is_active)
            .cloned()
            .collect())
    }

    async fn save_alert_rule(&mut self, rule: &AlertRule) -> StoreResult<()> {
        match self.staged.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule.clone(),
            None => self.staged.rules.push(rule.clone()),
        }
        Ok(())
    }

    async fn alert(&mut self, id: AlertId) -> StoreResult<Option<StockAlert>> {
        Ok(self.staged.alerts.iter().find(|a| a.id == id).cloned())
    }

    async fn alerts(&mut self) -> StoreResult<Vec<StockAlert>> {
        Ok(self.staged.alerts.clone())
    }

    async fn latest_alert(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
        kind: AlertKind,
    ) -> StoreResult<Option<StockAlert>> {
        Ok(self
            .staged
            .alerts
            .iter()
            .rev()
            .find(|a| a.product_id == product_id && a.location_id == location_id && a.kind == kind)
            .cloned())
    }

    async fn save_alert(&mut self, alert: &StockAlert) -> StoreResult<()> {
        match self.staged.alerts.iter_mut().find(|a| a.id == alert.id) {
            Some(existing) => *existing = alert.clone(),
            None => self.staged.alerts.push(alert.clone()),
        }
        Ok(())
    }

    async fn commit(mut self) -> StoreResult<()> {
        *self.guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}
