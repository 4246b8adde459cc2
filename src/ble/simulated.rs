//! In-process BLE stack simulator
//!
//! Stands in for the link layer in tests and the demo binary. The test
//! drives the "radio": it completes power-on, makes peers connect and
//! disconnect, and picks the result codes the stack reports. Events are
//! delivered on whatever thread calls the driver methods, just like a real
//! stack delivering from its own context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use super::advertising::{self, AdStructure};
use super::transport::{BleAddress, BleConnection, BleStack, ConnectionObserver, ReadyCallback};
use super::BleError;

/// A simulated peer link.
pub struct SimBleConnection {
    peer_address: BleAddress,
    connected: AtomicBool,
}

impl SimBleConnection {
    fn new(peer_address: BleAddress) -> Self {
        Self {
            peer_address,
            connected: AtomicBool::new(true),
        }
    }
}

impl BleConnection for SimBleConnection {
    fn peer_address(&self) -> &BleAddress {
        &self.peer_address
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct SimState {
    powered: bool,
    ready: Option<ReadyCallback>,
    observers: Vec<Arc<dyn ConnectionObserver>>,
    advertising: bool,
    advertisement: Option<(Vec<AdStructure>, Vec<AdStructure>)>,
    enable_result: i32,
    advertising_result: i32,
    auto_ready: bool,
}

/// Simulated BLE stack with a single local controller.
pub struct SimBleStack {
    state: Mutex<SimState>,
}

impl SimBleStack {
    /// A stack whose power-on completes only when `complete_power_on` is called.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SimState::default()),
        })
    }

    /// A stack that completes power-on by itself on a separate thread.
    pub fn with_auto_ready() -> Arc<Self> {
        let stack = Self::new();
        stack.lock().auto_ready = true;
        stack
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn observers(&self) -> Vec<Arc<dyn ConnectionObserver>> {
        self.lock().observers.clone()
    }

    /// Result code the next `enable` call returns.
    pub fn set_enable_result(&self, code: i32) {
        self.lock().enable_result = code;
    }

    /// Result code the next `start_advertising` call returns.
    pub fn set_advertising_result(&self, code: i32) {
        self.lock().advertising_result = code;
    }

    /// Finish power-on, invoking the ready callback with `err`.
    ///
    /// Returns false if `enable` has not been called or power-on already
    /// completed.
    pub fn complete_power_on(&self, err: i32) -> bool {
        let ready = {
            let mut state = self.lock();
            let ready = state.ready.take();
            if ready.is_some() && err == 0 {
                state.powered = true;
            }
            ready
        };
        match ready {
            Some(ready) => {
                ready(err);
                true
            }
            None => false,
        }
    }

    pub fn is_powered(&self) -> bool {
        self.lock().powered
    }

    pub fn is_advertising(&self) -> bool {
        self.lock().advertising
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// Advertisement data and scan response of the last successful start.
    pub fn last_advertisement(&self) -> Option<(Vec<AdStructure>, Vec<AdStructure>)> {
        self.lock().advertisement.clone()
    }

    /// A central connects to us. Requires power and active advertising.
    pub fn connect_peer(&self) -> Result<Arc<dyn BleConnection>, BleError> {
        {
            let mut state = self.lock();
            if !state.powered {
                return Err(BleError::NotPowered);
            }
            if !state.advertising {
                return Err(BleError::ConnectionError("not advertising".into()));
            }
            // connectable advertising stops once a central connects
            state.advertising = false;
        }

        let conn: Arc<dyn BleConnection> = Arc::new(SimBleConnection::new(
            BleAddress::Simulated(Uuid::new_v4()),
        ));
        for observer in self.observers() {
            observer.connected(&conn, 0);
        }
        Ok(conn)
    }

    /// A connection attempt fails with link-layer error `err`.
    pub fn fail_connect(&self, err: u8) {
        let conn: Arc<dyn BleConnection> = Arc::new(SimBleConnection::new(
            BleAddress::Simulated(Uuid::new_v4()),
        ));
        conn.disconnect();
        for observer in self.observers() {
            observer.connected(&conn, err);
        }
    }

    /// Drop the link to `conn` with the given reason code.
    pub fn disconnect_peer(&self, conn: &Arc<dyn BleConnection>, reason: u8) -> Result<(), BleError> {
        if !conn.is_connected() {
            return Err(BleError::Disconnected);
        }
        conn.disconnect();
        for observer in self.observers() {
            observer.disconnected(conn, reason);
        }
        Ok(())
    }

    /// The peer or user aborts pairing on `conn`.
    pub fn cancel_pairing(&self, conn: &Arc<dyn BleConnection>) {
        for observer in self.observers() {
            observer.pairing_cancelled(conn);
        }
    }
}

impl BleStack for SimBleStack {
    fn enable(&self, ready: ReadyCallback) -> i32 {
        let mut state = self.lock();
        if state.enable_result != 0 {
            return state.enable_result;
        }
        if state.auto_ready {
            state.powered = true;
            drop(state);
            std::thread::spawn(move || ready(0));
        } else {
            state.ready = Some(ready);
        }
        0
    }

    fn register_observer(&self, observer: Arc<dyn ConnectionObserver>) {
        self.lock().observers.push(observer);
    }

    fn start_advertising(&self, ad: &[AdStructure], sd: &[AdStructure]) -> i32 {
        let mut state = self.lock();
        if !state.powered {
            // -EAGAIN: controller not ready
            return -11;
        }
        if state.advertising_result != 0 {
            return state.advertising_result;
        }
        log::debug!(
            "Sim advertising: ad=[{}] sd=[{}]",
            advertising::describe(ad),
            advertising::describe(sd)
        );
        state.advertising = true;
        state.advertisement = Some((ad.to_vec(), sd.to_vec()));
        0
    }

    fn stop_advertising(&self) -> i32 {
        self.lock().advertising = false;
        0
    }
}
