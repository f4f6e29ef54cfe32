// packages/intercept/src/transport/endpoint.rs
//! Endpoint discovery
//!
//! The address is resolved at every request rather than once at startup,
//! so the harness may repoint it between operations.

use crate::utils::errors::{InterceptError, Result};
use std::net::{SocketAddr, ToSocketAddrs};

/// Where the `host:port` of the remote server comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSource {
    /// Read from an environment variable
    Env(String),

    /// Fixed address
    Fixed(String),
}

impl EndpointSource {
    /// Current `host:port` text
    pub fn current(&self) -> Result<String> {
        match self {
            EndpointSource::Env(var) => std::env::var(var)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| InterceptError::EndpointNotConfigured(var.clone())),
            EndpointSource::Fixed(addr) => Ok(addr.clone()),
        }
    }

    /// Resolve the current endpoint to socket addresses
    pub fn resolve(&self) -> Result<(String, Vec<SocketAddr>)> {
        let endpoint = self.current()?;
        let addrs = parse_endpoint(&endpoint)?;
        Ok((endpoint, addrs))
    }
}

/// Split `host:port` and resolve it
pub fn parse_endpoint(endpoint: &str) -> Result<Vec<SocketAddr>> {
    let invalid = |reason: &str| InterceptError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = endpoint
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    let port: u16 = port.parse().map_err(|_| invalid("port is not a number"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| invalid(&e.to_string()))?
        .collect();
    if addrs.is_empty() {
        return Err(invalid("host did not resolve"));
    }
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        let addrs = parse_endpoint("127.0.0.1:7070").unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:7070".parse().unwrap()]);

        let addrs = parse_endpoint("[::1]:7070").unwrap();
        assert_eq!(addrs, vec!["[::1]:7070".parse().unwrap()]);
    }

    #[test]
    fn test_invalid_endpoints() {
        for endpoint in ["localhost", ":7070", "127.0.0.1:http", "127.0.0.1:99999"] {
            assert!(
                matches!(
                    parse_endpoint(endpoint),
                    Err(InterceptError::InvalidEndpoint { .. })
                ),
                "{} should be rejected",
                endpoint
            );
        }
    }

    #[test]
    fn test_env_source_read_per_call() {
        let var = "SUT_INTERCEPT_TEST_ENDPOINT_SOURCE";
        let source = EndpointSource::Env(var.to_string());

        std::env::remove_var(var);
        assert!(matches!(
            source.current(),
            Err(InterceptError::EndpointNotConfigured(_))
        ));

        std::env::set_var(var, "127.0.0.1:1001");
        assert_eq!(source.current().unwrap(), "127.0.0.1:1001");

        std::env::set_var(var, "127.0.0.1:1002");
        assert_eq!(source.current().unwrap(), "127.0.0.1:1002");
        std::env::remove_var(var);
    }

    #[test]
    fn test_fixed_source() {
        let source = EndpointSource::Fixed("127.0.0.1:9".to_string());
        let (endpoint, addrs) = source.resolve().unwrap();
        assert_eq!(endpoint, "127.0.0.1:9");
        assert_eq!(addrs.len(), 1);
    }
}
