//! Error taxonomy for the bridge
//!
//! Two layers live here. `ScriptError` is the value handed back to script
//! code: a fixed set of kinds, each with the class name the script sees.
//! `BridgeError` covers the failures the bridge itself can produce while
//! registering callbacks or queueing dispatches.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed set of script-visible error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Assertion,
    Network,
    NotSupported,
    Range,
    Security,
    Syntax,
    System,
    Timeout,
    Type,
    /// Plain `Error`, no subclass.
    Generic,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::Assertion,
        ErrorKind::Network,
        ErrorKind::NotSupported,
        ErrorKind::Range,
        ErrorKind::Security,
        ErrorKind::Syntax,
        ErrorKind::System,
        ErrorKind::Timeout,
        ErrorKind::Type,
        ErrorKind::Generic,
    ];

    /// Name of the error class as seen from script code.
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::Assertion => "AssertionError",
            ErrorKind::Network => "NetworkError",
            ErrorKind::NotSupported => "NotSupportedError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Security => "SecurityError",
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::System => "SystemError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Generic => "Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// An error object destined for script code.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ScriptError {
    kind: ErrorKind,
    message: String,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message)
    }

    pub fn assertion_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Assertion, message)
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn not_supported_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupported, message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Range, message)
    }

    pub fn security_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Security, message)
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    pub fn system_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::System, message)
    }

    pub fn timeout_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }
}

/// Build a standard error object of the given kind.
pub fn make_error(kind: ErrorKind, message: &str) -> ScriptError {
    ScriptError::new(kind, message)
}

/// Failures produced by the bridge itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// No storage left for a registry entry or a queued dispatch.
    #[error("Allocation error: {0}")]
    Allocation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A link-layer or advertising failure code.
    #[error("Stack error (code {0})")]
    Stack(i32),
}

impl BridgeError {
    /// The script error kind used when this failure reaches script code.
    pub fn script_kind(&self) -> ErrorKind {
        match self {
            BridgeError::Allocation(_) => ErrorKind::System,
            BridgeError::InvalidArgument(_) => ErrorKind::Type,
            BridgeError::Stack(_) => ErrorKind::Network,
        }
    }
}

impl From<BridgeError> for ScriptError {
    fn from(err: BridgeError) -> Self {
        ScriptError::new(err.script_kind(), err.to_string())
    }
}
