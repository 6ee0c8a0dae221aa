//! Inventory ledger domain: stock positions and their movement history.
//!
//! Pure domain code; persistence and transactions live in the infra crate.

pub mod catalog;
pub mod movement;
pub mod record;

pub use catalog::ProductProfile;
pub use movement::{MovementId, MovementReference, MovementType, ReferenceKind, StockMovement};
pub use record::{InventoryRecord, InventoryRecordId, StockChange};
