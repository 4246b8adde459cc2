//! The `Ble` object exposed to script code
//!
//! Script code calls `on` to subscribe, then `enable` and
//! `start_advertising`. Outcomes come back asynchronously through the
//! subscribed callbacks, always on the cooperative task that drains the
//! `CooperativeRunner` returned by `Ble::new`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::advertising::{self, AdStructure};
use super::connection::ConnectionManager;
use super::transport::BleStack;
use crate::config::{BridgeConfig, ConfigError};
use crate::dispatch::{dispatch_channel, CooperativeRunner, Dispatch, DispatchBridge, EventPayload};
use crate::error::{BridgeError, ScriptError};
use crate::registry::{CallbackRegistry, RegistryToken};
use crate::script::{CallbackRef, ScriptArg, ScriptValue};

/// Fired once the stack has powered on.
pub const STATE_CHANGE_EVENT: &str = "stateChange";
/// Fired with the stack's result code after `start_advertising`.
pub const ADVERTISING_START_EVENT: &str = "advertisingStart";
/// Payload of `stateChange` after power-on.
pub const POWERED_ON: &str = "poweredOn";

pub struct Ble {
    stack: Arc<dyn BleStack>,
    bridge: DispatchBridge,
    connections: Arc<ConnectionManager>,
    observer_registered: AtomicBool,
    advertisement: Vec<AdStructure>,
    scan_response: Vec<AdStructure>,
}

impl Ble {
    /// Build the BLE object and the runner the script task must drain.
    pub fn new(
        config: &BridgeConfig,
        stack: Arc<dyn BleStack>,
    ) -> Result<(Self, CooperativeRunner), ConfigError> {
        config.validate()?;
        let registry = Arc::new(CallbackRegistry::new(
            config.registry_capacity,
            config.max_event_type_len,
        ));
        let (bridge, runner) = dispatch_channel(registry, config.queue_capacity)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let ble = Self {
            stack,
            bridge,
            connections: Arc::new(ConnectionManager::new()),
            observer_registered: AtomicBool::new(false),
            advertisement: advertising::eddystone_advertisement(),
            scan_response: advertising::scan_response(&config.device_name),
        };
        Ok((ble, runner))
    }

    /// Subscribe `handler` to `event_type`.
    pub fn on(&self, event_type: &str, handler: CallbackRef) -> Result<RegistryToken, BridgeError> {
        self.bridge.registry().register(event_type, handler)
    }

    /// `on` for an untyped script argument list: an event name followed by
    /// a function. Extra arguments are ignored.
    pub fn on_args(&self, args: &[ScriptArg]) -> Result<RegistryToken, ScriptError> {
        match args {
            [ScriptArg::Value(ScriptValue::String(event_type)), ScriptArg::Function(handler), ..] => {
                Ok(self.on(event_type, Arc::clone(handler))?)
            }
            _ => {
                log::warn!("on: invalid arguments {:?}", args);
                Err(ScriptError::type_error(
                    "on expects (eventType: string, callback: function)",
                ))
            }
        }
    }

    /// Register connection observers and start powering on the stack.
    ///
    /// `stateChange` fires with `"poweredOn"` once the stack is up.
    pub fn enable(&self) -> Result<(), BridgeError> {
        if !self.observer_registered.swap(true, Ordering::SeqCst) {
            self.stack.register_observer(self.connections.clone());
        }

        let bridge = self.bridge.clone();
        let code = self.stack.enable(Box::new(move |err| on_ready(&bridge, err)));
        if code != 0 {
            log::warn!("Stack refused to enable (err {})", code);
            return Err(BridgeError::Stack(code));
        }
        log::info!("Bluetooth enable requested");
        Ok(())
    }

    /// Start advertising the fixed payload. The stack's result code is
    /// delivered to `advertisingStart` subscribers.
    pub fn start_advertising(&self) -> Result<Dispatch, BridgeError> {
        let code = self
            .stack
            .start_advertising(&self.advertisement, &self.scan_response);
        if code == 0 {
            log::info!("Advertising started");
        } else {
            log::warn!("Advertising failed to start (err {})", code);
        }
        self.bridge
            .notify(ADVERTISING_START_EVENT, EventPayload::ResultCode(code))
    }

    /// Acknowledge a stop request. No event is synthesized.
    pub fn stop_advertising(&self) {
        let code = self.stack.stop_advertising();
        if code != 0 {
            log::warn!("Stack failed to stop advertising (err {})", code);
        } else {
            log::info!("Advertising stopped");
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Handle for notifying events from other threads.
    pub fn bridge(&self) -> &DispatchBridge {
        &self.bridge
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        self.bridge.registry()
    }

    /// Drop all subscriptions.
    pub fn teardown(&self) {
        self.bridge.registry().clear();
    }
}

/// Runs on the stack's context when power-on completes.
fn on_ready(bridge: &DispatchBridge, err: i32) {
    if bridge.registry().is_empty() {
        log::info!("Bluetooth ready but no event handlers present");
        return;
    }
    if err != 0 {
        log::warn!("Bluetooth ready reported err {}", err);
    }
    match bridge.notify(STATE_CHANGE_EVENT, EventPayload::State(POWERED_ON.to_string())) {
        Ok(_) => {}
        Err(e) => log::warn!("Could not queue {}: {}", STATE_CHANGE_EVENT, e),
    }
}
