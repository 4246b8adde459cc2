//! Single-connection lifecycle
//!
//! Holds at most one peer connection. A successful connect acquires a
//! reference to the stack's connection object; the matching disconnect
//! releases it. The stack serializes connect and disconnect events, so the
//! slot lock only guards against misuse, not against real contention.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::transport::{BleAddress, BleConnection, ConnectionObserver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connected,
}

/// An acquired reference to the active peer link.
///
/// Dropping the handle releases the reference.
pub struct ConnectionHandle {
    id: Uuid,
    conn: Arc<dyn BleConnection>,
    connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    pub fn acquire(conn: &Arc<dyn BleConnection>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conn: Arc::clone(conn),
            connected_at: Utc::now(),
        }
    }

    pub fn release(self) {
        log::debug!("Releasing connection {} to {}", self.id, self.conn.peer_address());
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn connection(&self) -> &Arc<dyn BleConnection> {
        &self.conn
    }

    pub fn peer_address(&self) -> &BleAddress {
        self.conn.peer_address()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}

/// Tracks the one active connection.
pub struct ConnectionManager {
    current: Mutex<Option<ConnectionHandle>>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ConnectionHandle>> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Connection slot lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Handle a finished connection attempt. `err` is 0 on success.
    pub fn on_connect(&self, conn: &Arc<dyn BleConnection>, err: u8) -> ConnectionState {
        let mut slot = self.slot();
        if err != 0 {
            log::warn!("Connection to {} failed (err {})", conn.peer_address(), err);
            return Self::state_of(&slot);
        }

        if let Some(previous) = slot.take() {
            log::warn!(
                "Connect from {} while holding {}, releasing the old handle",
                conn.peer_address(),
                previous.peer_address()
            );
            previous.release();
        }

        let handle = ConnectionHandle::acquire(conn);
        log::info!("Connected to {} ({})", handle.peer_address(), handle.id());
        *slot = Some(handle);
        ConnectionState::Connected
    }

    /// Handle a disconnect. Releases the held handle, if there is one.
    pub fn on_disconnect(&self, reason: u8) -> ConnectionState {
        let mut slot = self.slot();
        match slot.take() {
            Some(handle) => {
                log::info!("Disconnected from {} (reason {})", handle.peer_address(), reason);
                handle.release();
            }
            None => log::debug!("Disconnect (reason {}) with no connection held", reason),
        }
        ConnectionState::Idle
    }

    pub fn state(&self) -> ConnectionState {
        Self::state_of(&self.slot())
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The active connection, if any.
    pub fn current(&self) -> Option<Arc<dyn BleConnection>> {
        self.slot().as_ref().map(|h| Arc::clone(h.connection()))
    }

    fn state_of(slot: &Option<ConnectionHandle>) -> ConnectionState {
        if slot.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Idle
        }
    }
}

impl ConnectionObserver for ConnectionManager {
    fn connected(&self, conn: &Arc<dyn BleConnection>, err: u8) {
        self.on_connect(conn, err);
    }

    fn disconnected(&self, _conn: &Arc<dyn BleConnection>, reason: u8) {
        self.on_disconnect(reason);
    }

    fn pairing_cancelled(&self, conn: &Arc<dyn BleConnection>) {
        log::info!("Pairing cancelled: {}", conn.peer_address());
    }
}
