//! Composition root: wires the store, the notification bus, the services and
//! the alert scheduler.

pub mod app;
