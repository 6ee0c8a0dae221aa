//! Purchase order lifecycle and receiving reconciliation.
//!
//! Pure domain code: capability checks use the [`replenish_core::Actor`]
//! handed in by the caller and time is always passed explicitly.

pub mod line;
pub mod number;
pub mod order;
pub mod receipt;

pub use line::{LineId, LineUpdate, NewLine, PurchaseOrderLine};
pub use number::OrderNumberGenerator;
pub use order::{DetailsUpdate, NewPurchaseOrder, PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus};
pub use receipt::{ReceiptLine, ReceivedLine};
