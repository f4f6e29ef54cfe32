// packages/intercept/src/transport/scripted.rs
//! In-memory transport answering from a response table

use crate::stub::script::{ReplayScript, ResponseTable};
use crate::transport::Transport;
use crate::utils::errors::{InterceptError, Result};
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};

/// Records every message it is handed and answers from canned responses
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: ResponseTable,
    sent: Mutex<Vec<String>>,
    refuse: AtomicBool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_script(script: &ReplayScript) -> Self {
        Self {
            responses: ResponseTable::from_script(script),
            ..Self::default()
        }
    }

    /// Builder-style canned answer
    pub fn respond(self, request: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.push(request, response);
        self
    }

    /// Make every further message fail as if the server were down
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Messages received so far, in order
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    fn record(&self, message: &str) -> Result<()> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(InterceptError::Transport {
                endpoint: "scripted".to_string(),
                source: std::io::Error::new(ErrorKind::ConnectionRefused, "connection refused"),
            });
        }
        self.sent.lock().push(message.to_string());
        Ok(())
    }
}

impl Transport for ScriptedTransport {
    fn exchange(&self, message: &str) -> Result<String> {
        self.record(message)?;
        Ok(self.responses.respond(message))
    }

    fn post(&self, message: &str) -> Result<()> {
        self.record(message)
    }
}
