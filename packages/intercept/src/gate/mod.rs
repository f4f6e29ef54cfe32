// packages/intercept/src/gate/mod.rs
//! Caller gate
//!
//! Decides whether the code issuing an attribute access is the system under
//! test (which must see the proxy) or code that must keep using the real
//! implementation: the platform runtime, designated bridging modules, and
//! this crate itself.
//!
//! The caller is carried explicitly in a [`CallContext`] created once at the
//! outermost entry point and handed unchanged through every forwarding call,
//! so the decision never depends on how many internal calls sit in between.

pub mod caller_gate;
pub mod context;

pub use caller_gate::CallerGate;
pub use context::{CallContext, Caller, MACHINERY_CALLER};
