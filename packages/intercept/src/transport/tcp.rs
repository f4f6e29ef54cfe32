// packages/intercept/src/transport/tcp.rs
//! Blocking TCP transport

use crate::transport::endpoint::EndpointSource;
use crate::transport::Transport;
use crate::utils::config::TransportConfig;
use crate::utils::errors::{InterceptError, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};
use tracing::debug;

/// Opens a fresh connection for every message
#[derive(Debug, Clone)]
pub struct TcpTransport {
    endpoint: EndpointSource,
    connect_timeout: Duration,
    io_timeout: Option<Duration>,
}

impl TcpTransport {
    pub fn new(endpoint: EndpointSource) -> Self {
        let defaults = TransportConfig::default();
        Self {
            endpoint,
            connect_timeout: defaults.connect_timeout(),
            io_timeout: defaults.io_timeout(),
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            endpoint: EndpointSource::Env(config.endpoint_var.clone()),
            connect_timeout: config.connect_timeout(),
            io_timeout: config.io_timeout(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &EndpointSource {
        &self.endpoint
    }

    fn connect(&self) -> Result<(TcpStream, String)> {
        let (endpoint, addrs) = self.endpoint.resolve()?;

        let mut last_error = None;
        for addr in &addrs {
            match TcpStream::connect_timeout(addr, self.connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(self.io_timeout)
                        .and_then(|_| stream.set_write_timeout(self.io_timeout))
                        .and_then(|_| stream.set_nodelay(true))
                        .map_err(|e| self.io_error(&endpoint, "configuring", e))?;
                    return Ok((stream, endpoint));
                }
                Err(e) => {
                    debug!("Failed to connect to {}: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        let err = last_error
            .unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "no addresses"));
        Err(self.io_error(&endpoint, "connecting to", err))
    }

    fn io_error(&self, endpoint: &str, operation: &'static str, err: std::io::Error) -> InterceptError {
        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => InterceptError::Timeout {
                endpoint: endpoint.to_string(),
                operation,
                timeout: if operation == "connecting to" {
                    self.connect_timeout
                } else {
                    self.io_timeout.unwrap_or_default()
                },
            },
            _ => InterceptError::Transport {
                endpoint: endpoint.to_string(),
                source: err,
            },
        }
    }
}

impl Transport for TcpTransport {
    fn exchange(&self, message: &str) -> Result<String> {
        let start = Instant::now();
        let (mut stream, endpoint) = self.connect()?;

        stream
            .write_all(message.as_bytes())
            .map_err(|e| self.io_error(&endpoint, "writing to", e))?;
        stream
            .shutdown(Shutdown::Write)
            .map_err(|e| self.io_error(&endpoint, "writing to", e))?;

        let mut reply = Vec::new();
        stream
            .read_to_end(&mut reply)
            .map_err(|e| self.io_error(&endpoint, "reading from", e))?;

        let reply = String::from_utf8(reply).map_err(|e| {
            InterceptError::Protocol(format!("reply from {} is not valid UTF-8: {}", endpoint, e))
        })?;

        let elapsed = start.elapsed();
        metrics::histogram!("sut_intercept_exchange_seconds").record(elapsed.as_secs_f64());
        debug!(
            endpoint = %endpoint,
            sent = message.len(),
            received = reply.len(),
            "Exchange completed in {:?}",
            elapsed
        );
        Ok(reply)
    }

    fn post(&self, message: &str) -> Result<()> {
        let (mut stream, endpoint) = self.connect()?;
        stream
            .write_all(message.as_bytes())
            .map_err(|e| self.io_error(&endpoint, "writing to", e))?;
        stream
            .shutdown(Shutdown::Both)
            .map_err(|e| self.io_error(&endpoint, "writing to", e))?;
        debug!(endpoint = %endpoint, sent = message.len(), "Posted message");
        Ok(())
    }
}
