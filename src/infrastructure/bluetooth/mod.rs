//! Bluetooth Module
//!
//! BLE communication with the smartwatch.
//!
//! ## Modules
//!
//! - [`protocol`] - GATT identifiers and characteristic payload decoding
//! - [`adapter`] - capability traits the driver is written against, plus the
//!   link event type
//! - [`backend`] - production implementation of the traits on btleplug
//! - [`session`] - ownership of one connected peripheral and its
//!   subscriptions; routes notifications into the telemetry store
//! - [`service`] - public connect/disconnect lifecycle state machine

pub mod adapter;
pub mod backend;
pub mod protocol;
pub mod session;
pub mod service;

// Re-export main service for convenience
pub use service::{SessionState, SmartwatchService};
