//! Event mechanics shared by the replenishment crates.
//!
//! Contains the [`Event`] trait, the [`EventEnvelope`] handed to the push
//! channel, and a broadcast [`EventBus`] with an in-memory implementation.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, RecvError, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
