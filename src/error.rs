//! Error taxonomy for the driver.
//!
//! Session errors cover the connection lifecycle; decode errors cover
//! malformed notification payloads. Decode errors are never fatal to a
//! session - the offending notification is dropped and the link stays up.

use thiserror::Error;
use uuid::Uuid;

/// Failures surfaced by `connect()` and the underlying GATT operations.
///
/// Link loss is deliberately absent: it is not returned from any call, it
/// is observed as `is_connected()` turning false.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The host has no usable Bluetooth adapter.
    #[error("no usable bluetooth adapter: {0}")]
    AdapterUnavailable(String),

    /// Discovery ran its course without a matching peripheral being selected.
    #[error("no peripheral advertising the requested services was selected")]
    NoDeviceSelected,

    /// The discovery request itself failed at the platform layer.
    #[error("device discovery failed: {0}")]
    DiscoveryFailed(String),

    /// The transport-level connection could not be established.
    #[error("transport link could not be established: {0}")]
    LinkFailed(String),

    /// Enabling notifications on one characteristic failed.
    #[error("subscription to characteristic {characteristic} failed: {reason}")]
    SubscriptionFailed { characteristic: Uuid, reason: String },

    /// A `disconnect()` arrived while `connect()` was still in flight; the
    /// attempt was abandoned at the next step boundary.
    #[error("connection attempt cancelled by disconnect request")]
    Cancelled,
}

/// Failures decoding a single notification payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload shorter than the minimum the characteristic's layout requires.
    #[error("payload truncated: got {got} bytes, need at least {need}")]
    Truncated { got: usize, need: usize },

    /// No decoder is registered for this characteristic id.
    #[error("unknown characteristic {0}")]
    UnknownCharacteristic(Uuid),
}
