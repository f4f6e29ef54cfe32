// packages/intercept/src/utils/errors.rs
//! Error types for the interception layer
//!
//! Every failure propagates to the call site that triggered it. Nothing in
//! this crate swallows an error to "fall back" silently.

use crate::gate::CallContext;
use crate::proxy::exception::RemoteException;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, InterceptError>;

/// Errors produced while intercepting, forwarding or decoding
#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("Endpoint variable {0} is not set")]
    EndpointNotConfigured(String),

    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Transport failure talking to {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {timeout:?} while {operation} {endpoint}")]
    Timeout {
        endpoint: String,
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Malformed response at offset {offset}: {message}")]
    Decode { offset: usize, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Raised by the remote side. `Display` names a remote exception object by
    /// class and handle without a round trip; [`InterceptError::message`]
    /// fetches its text.
    #[error("{0}")]
    Remote(RemoteException),

    #[error("'{owner}' has no attribute '{name}'")]
    AttributeNotFound { owner: String, name: String },

    #[error("Attribute '{name}' of '{owner}' cannot be rebound")]
    ReadOnlyAttribute { owner: String, name: String },

    #[error("'{0}' object is not callable")]
    NotCallable(String),

    #[error("No module named '{0}'")]
    ModuleNotFound(String),

    #[error("Conflicting interception targets: {0}")]
    ConflictingTargets(String),

    #[error("Interception is already installed on this loader")]
    AlreadyInstalled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Local(String),
}

impl InterceptError {
    pub fn attribute_not_found(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AttributeNotFound {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn read_only(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ReadOnlyAttribute {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// The remote exception carried by this error, if any
    pub fn remote(&self) -> Option<&RemoteException> {
        match self {
            Self::Remote(exc) => Some(exc),
            _ => None,
        }
    }

    /// Text the system under test would see for this error.
    ///
    /// Remote exception objects are asked for their message; if that request
    /// fails the `Display` form is used instead.
    pub fn message(&self, cx: &CallContext) -> String {
        match self {
            Self::Remote(exc) => exc.message(cx).unwrap_or_else(|_| exc.to_string()),
            other => other.to_string(),
        }
    }
}

impl From<config::ConfigError> for InterceptError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
