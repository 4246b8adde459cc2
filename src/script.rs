//! Script engine seam
//!
//! The bridge never touches the engine directly. Script-level callbacks are
//! opaque `ScriptCallback` references shared through `Arc`: cloning the
//! `Arc` acquires a reference, dropping it releases one.

use std::fmt;
use std::sync::Arc;

use crate::error::ScriptError;

/// A single value passed to or returned from a script callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptValue {
    Undefined,
    String(String),
    UInt32(u32),
}

impl ScriptValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ScriptValue::UInt32(v) => Some(*v),
            _ => None,
        }
    }
}

/// A script-level function the bridge can invoke.
///
/// Implementations must only be invoked from the cooperative script task;
/// the bridge guarantees this by routing every call through the dispatch
/// queue.
pub trait ScriptCallback: Send + Sync {
    fn call(&self, arg: ScriptValue) -> Result<ScriptValue, ScriptError>;
}

/// Shared reference to a registered callback.
pub type CallbackRef = Arc<dyn ScriptCallback>;

/// A callback backed by a Rust closure.
pub struct FnCallback<F> {
    func: F,
}

impl<F> FnCallback<F>
where
    F: Fn(ScriptValue) -> Result<ScriptValue, ScriptError> + Send + Sync + 'static,
{
    pub fn new(func: F) -> Arc<Self> {
        Arc::new(Self { func })
    }
}

impl<F> ScriptCallback for FnCallback<F>
where
    F: Fn(ScriptValue) -> Result<ScriptValue, ScriptError> + Send + Sync,
{
    fn call(&self, arg: ScriptValue) -> Result<ScriptValue, ScriptError> {
        (self.func)(arg)
    }
}

/// An untyped argument as it arrives from a script call site.
#[derive(Clone)]
pub enum ScriptArg {
    Value(ScriptValue),
    Function(CallbackRef),
}

impl fmt::Debug for ScriptArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptArg::Value(v) => f.debug_tuple("Value").field(v).finish(),
            ScriptArg::Function(_) => f.write_str("Function(..)"),
        }
    }
}
