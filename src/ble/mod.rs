//! BLE side of the bridge
//!
//! Link-layer abstraction traits, the fixed advertising payload, an
//! in-process stack simulator, the single-connection lifecycle manager and
//! the `Ble` object exposed to script code.

pub mod advertising;
pub mod api;
pub mod connection;
pub mod simulated;
pub mod transport;

use thiserror::Error;

pub use api::{Ble, ADVERTISING_START_EVENT, POWERED_ON, STATE_CHANGE_EVENT};
pub use connection::{ConnectionHandle, ConnectionManager, ConnectionState};
pub use transport::{BleAddress, BleConnection, BleStack, ConnectionObserver, ReadyCallback};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BleError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Stack is not powered on")]
    NotPowered,

    #[error("Peer disconnected")]
    Disconnected,
}
