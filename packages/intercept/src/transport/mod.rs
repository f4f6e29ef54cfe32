// packages/intercept/src/transport/mod.rs
//! Transport to the capture/replay server
//!
//! One connection per logical operation: connect, write the request,
//! half-close the write side, read until the server closes. No pooling and
//! no pipelining, so operations reach the server in the order they were
//! issued.

pub mod endpoint;
pub mod scripted;
pub mod tcp;

pub use endpoint::EndpointSource;
pub use scripted::ScriptedTransport;
pub use tcp::TcpTransport;

use crate::utils::errors::Result;

/// Delivers framed messages to the remote side
pub trait Transport: Send + Sync {
    /// Send a message and read the full reply. An empty reply is a valid
    /// answer meaning "nothing bound remotely".
    fn exchange(&self, message: &str) -> Result<String>;

    /// Send a message without waiting for any reply
    fn post(&self, message: &str) -> Result<()>;
}
