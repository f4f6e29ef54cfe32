// packages/intercept/src/stub/mod.rs
//! Replay stub
//!
//! A minimal stand-in for the capture/replay server: requests are matched
//! verbatim against a script and answered with the recorded text.

pub mod script;
pub mod server;

pub use script::{Exchange, ReplayScript, ResponseTable};
pub use server::{spawn_background, ReplayStub, StubHandle};
