// packages/intercept/src/lib.rs
//! SUT Intercept
//!
//! Call interception for a capture/replay harness. Selected modules, or
//! selected attributes of real modules, are replaced with proxies that
//! forward every attribute read, assignment and call to a capture/replay
//! server over a line-free text protocol, one TCP connection per operation.
//!
//! # Architecture
//!
//! - **object**: the dynamic object model the system under test works with
//! - **gate**: explicit caller context and the exclusion decision
//! - **protocol**: request encoding and the closed response grammar
//! - **transport**: blocking TCP exchange with per-call endpoint lookup
//! - **proxy**: module, path, instance and class proxies
//! - **interception**: module loader, import hook and bootstrap
//! - **stub**: canned-response replay server
//! - **observability**: tracing and metrics setup
//! - **utils**: configuration and errors

pub mod gate;
pub mod interception;
pub mod object;
pub mod observability;
pub mod protocol;
pub mod proxy;
pub mod stub;
pub mod transport;
pub mod utils;

pub use gate::{CallContext, Caller, CallerGate};
pub use interception::{intercept, intercept_from_config, Interception, ModuleLoader};
pub use object::{Args, Object, Value};
pub use proxy::{ProxyBackend, RemoteException};
pub use utils::config::InterceptConfig;
pub use utils::errors::{InterceptError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
