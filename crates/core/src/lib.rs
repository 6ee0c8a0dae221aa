//! `replenish-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod access;
pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use access::{Actor, Capabilities, Capability};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CategoryId, LocationId, ProductId, SupplierId, UserId};
pub use value_object::{Money, ValueObject};
