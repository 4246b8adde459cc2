// BLE script bridge - deferred dispatch of BLE stack events to script callbacks

pub mod ble;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod script;

pub use ble::{Ble, ConnectionManager, ConnectionState};
pub use config::BridgeConfig;
pub use dispatch::{CooperativeRunner, Dispatch, DispatchBridge, EventPayload};
pub use error::{make_error, BridgeError, ErrorKind, ScriptError};
pub use registry::{CallbackRegistry, RegistryToken};
pub use script::{CallbackRef, FnCallback, ScriptArg, ScriptCallback, ScriptValue};
