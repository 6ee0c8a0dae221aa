//! Storage boundary: a transactional unit of work over every persisted entity.
//!
//! A [`UnitOfWork`] sees its own writes immediately and publishes them
//! atomically on [`UnitOfWork::commit`]. Dropping it without committing rolls
//! everything back. Implementations must serialize conflicting units of work
//! (at minimum per purchase order and per inventory record).

use async_trait::async_trait;
use thiserror::Error;

use replenish_alerts::{AlertId, AlertKind, AlertRule, AlertRuleId, StockAlert};
use replenish_core::{CategoryId, LocationId, ProductId};
use replenish_inventory::{InventoryRecord, InventoryRecordId, ProductProfile, StockMovement};
use replenish_purchasing::{PurchaseOrder, PurchaseOrderId};

mod in_memory;

pub use in_memory::InMemoryStore;

/// Storage failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A unique key or referential constraint was violated.
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// The backend could not be reached or timed out; safe to retry later.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One transaction.
#[async_trait]
pub trait UnitOfWork: Send {
    // Purchase orders (lines are owned and stored with their order).
    async fn purchase_order(&mut self, id: PurchaseOrderId) -> StoreResult<Option<PurchaseOrder>>;
    async fn purchase_order_by_number(&mut self, po_number: &str)
    -> StoreResult<Option<PurchaseOrder>>;
    /// Insert or replace. A different order with the same number is a `Conflict`.
    async fn save_purchase_order(&mut self, order: &PurchaseOrder) -> StoreResult<()>;
    async fn delete_purchase_order(&mut self, id: PurchaseOrderId) -> StoreResult<bool>;

    // Inventory ledger.
    async fn inventory_record(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> StoreResult<Option<InventoryRecord>>;
    async fn inventory_record_by_id(
        &mut self,
        id: InventoryRecordId,
    ) -> StoreResult<Option<InventoryRecord>>;
    /// Records filtered by product set (`None` = all products) and location.
    async fn inventory_records(
        &mut self,
        products: Option<&[ProductId]>,
        location_id: Option<LocationId>,
    ) -> StoreResult<Vec<InventoryRecord>>;
    /// Insert or replace. A different record for the same (product, location)
    /// is a `Conflict`.
    async fn save_inventory_record(&mut self, record: &InventoryRecord) -> StoreResult<()>;
    /// Fails with `Conflict` while movements still reference the record.
    async fn delete_inventory_record(&mut self, id: InventoryRecordId) -> StoreResult<bool>;
    async fn append_movement(&mut self, movement: &StockMovement) -> StoreResult<()>;
    /// Newest first.
    async fn movements(&mut self, record_id: InventoryRecordId) -> StoreResult<Vec<StockMovement>>;
    async fn purge_movements(&mut self, record_id: InventoryRecordId) -> StoreResult<usize>;

    // Product configuration (owned by the catalog, read here).
    async fn product(&mut self, product_id: ProductId) -> StoreResult<Option<ProductProfile>>;
    async fn products_in_category(&mut self, category_id: CategoryId)
    -> StoreResult<Vec<ProductId>>;
    async fn save_product(&mut self, product: &ProductProfile) -> StoreResult<()>;

    // Alerts.
    async fn alert_rule(&mut self, id: AlertRuleId) -> StoreResult<Option<AlertRule>>;
    /// In creation order.
    async fn alert_rules(&mut self, active_only: bool) -> StoreResult<Vec<AlertRule>>;
    async fn save_alert_rule(&mut self, rule: &AlertRule) -> StoreResult<()>;
    async fn alert(&mut self, id: AlertId) -> StoreResult<Option<StockAlert>>;
    async fn alerts(&mut self) -> StoreResult<Vec<StockAlert>>;
    /// Most recently created alert of the triple, whatever its status.
    async fn latest_alert(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
        kind: AlertKind,
    ) -> StoreResult<Option<StockAlert>>;
    async fn save_alert(&mut self, alert: &StockAlert) -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>
    where
        Self: Sized;
}

/// Opens units of work.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: UnitOfWork;

    async fn begin(&self) -> StoreResult<Self::Tx>;
}
