//! Query registry and update service: named queries, the transport that
//! executes them, and the event bus that tells widgets when they changed.

pub mod config;
pub mod event_bus;
pub mod registry;
pub mod transport;
