//! BLE stack trait definitions and core types
//!
//! The bridge drives the link layer only through `BleStack`, and hears
//! back from it through `ConnectionObserver` and the ready callback. Both
//! may be invoked from the stack's own thread.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::advertising::AdStructure;

/// A BLE device address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BleAddress {
    /// A real 6-byte BLE MAC address.
    Real([u8; 6]),
    /// A simulated address identified by UUID.
    Simulated(Uuid),
}

impl fmt::Display for BleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BleAddress::Real(bytes) => {
                // most significant byte first, as printed by BLE tooling
                let parts: Vec<String> = bytes.iter().rev().map(|b| format!("{:02X}", b)).collect();
                f.write_str(&parts.join(":"))
            }
            BleAddress::Simulated(id) => write!(f, "sim-{}", id),
        }
    }
}

/// A live link to a peer, as handed out by the stack.
pub trait BleConnection: Send + Sync {
    /// Get the peer's BLE address.
    fn peer_address(&self) -> &BleAddress;

    /// Check whether the link is still up.
    fn is_connected(&self) -> bool;

    /// Tear the link down locally.
    fn disconnect(&self);
}

/// Receives connection events from the stack.
pub trait ConnectionObserver: Send + Sync {
    /// A connection attempt finished; `err` is 0 on success.
    fn connected(&self, conn: &Arc<dyn BleConnection>, err: u8);

    fn disconnected(&self, conn: &Arc<dyn BleConnection>, reason: u8);

    /// Pairing with `conn` was cancelled by the peer or the user.
    fn pairing_cancelled(&self, _conn: &Arc<dyn BleConnection>) {}
}

/// Invoked once by the stack when power-on completes, with its error code.
pub type ReadyCallback = Box<dyn FnOnce(i32) + Send>;

/// Link-layer operations the bridge needs. Result codes follow the stack's
/// convention: 0 is success, anything else is a stack-defined failure.
pub trait BleStack: Send + Sync {
    /// Start powering on. `ready` runs when the stack is up.
    fn enable(&self, ready: ReadyCallback) -> i32;

    /// Install the observer that receives connect/disconnect events.
    fn register_observer(&self, observer: Arc<dyn ConnectionObserver>);

    /// Begin connectable advertising with the given data and scan response.
    fn start_advertising(&self, ad: &[AdStructure], sd: &[AdStructure]) -> i32;

    fn stop_advertising(&self) -> i32;
}
