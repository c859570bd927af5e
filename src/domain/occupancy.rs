pub mod claim;
pub mod deadlock;
pub mod event_bus;
pub mod events;
pub mod registry;
pub mod signal;
