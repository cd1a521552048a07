//! Capability traits the driver is written against.
//!
//! The platform BLE stack sits behind these two traits so the lifecycle
//! state machine can be exercised against a scripted double as well as the
//! real btleplug backend.

use crate::error::SessionError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// An asynchronous event from a connected peripheral.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A notification payload pushed by the peripheral for one
    /// characteristic.
    Notification { characteristic: Uuid, payload: Vec<u8> },
    /// The peripheral dropped the connection. Terminal for the link.
    LinkLost,
}

/// Discovery: finds one peripheral advertising any of the given services.
#[async_trait]
pub trait GattAdapter: Send + Sync {
    async fn discover(
        &self,
        services: &[Uuid],
        timeout: Duration,
    ) -> Result<Box<dyn GattLink>, SessionError>;
}

/// One discovered peripheral and, once opened, its transport connection.
///
/// `unsubscribe_all` and `close` must be idempotent; calling them on an
/// already-torn-down link is a no-op, not an error.
#[async_trait]
pub trait GattLink: Send {
    /// Establish the transport-level connection and resolve services.
    async fn open(&mut self) -> Result<(), SessionError>;

    /// Resolve the characteristic inside the service and enable
    /// notifications on it.
    async fn subscribe(&mut self, service: Uuid, characteristic: Uuid)
        -> Result<(), SessionError>;

    /// Disable notifications on everything currently subscribed.
    async fn unsubscribe_all(&mut self) -> Result<(), SessionError>;

    /// Tear down the transport-level connection.
    async fn close(&mut self) -> Result<(), SessionError>;

    /// Take the link's event stream. Yields `Some` exactly once, after
    /// `open` has succeeded.
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<LinkEvent>>;
}
