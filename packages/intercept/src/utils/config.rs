// packages/intercept/src/utils/config.rs
//! Configuration loading
//!
//! Layers an optional config file under `SUT_INTERCEPT__*` environment
//! overrides, e.g. `SUT_INTERCEPT__TRANSPORT__IO_TIMEOUT_MS=500`.

use crate::utils::errors::{InterceptError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable read for the capture/replay server address
pub const DEFAULT_ENDPOINT_VAR: &str = "TEXTTEST_MIM_SERVER";

/// Separator token placed between request fields
pub const DEFAULT_SEPARATOR: &str = ":SEP:";

/// Default config file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sut-intercept";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterceptConfig {
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub wire: WireConfig,

    #[serde(default)]
    pub gate: GateConfig,

    /// Modules or dotted attribute paths to intercept
    #[serde(default)]
    pub targets: Vec<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stub: StubConfig,
}

/// How requests reach the remote endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Variable holding `host:port`, read at every request
    #[serde(default = "default_endpoint_var")]
    pub endpoint_var: String,

    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Read/write timeout in milliseconds; `None` blocks indefinitely
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: Option<u64>,
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint_var: default_endpoint_var(),
            connect_timeout_ms: default_connect_timeout_ms(),
            io_timeout_ms: default_io_timeout_ms(),
        }
    }
}

/// Wire format settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireConfig {
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
        }
    }
}

/// Callers that always see the real implementation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub excluded_callers: Vec<String>,

    /// Directory holding the platform's own runtime code
    #[serde(default)]
    pub runtime_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

/// Settings for the replay stub binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubConfig {
    #[serde(default = "default_stub_listen")]
    pub listen: String,

    /// YAML replay script
    #[serde(default)]
    pub script: Option<PathBuf>,

    /// Prometheus exporter address; disabled when unset
    #[serde(default)]
    pub metrics_listen: Option<String>,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            listen: default_stub_listen(),
            script: None,
            metrics_listen: None,
        }
    }
}

fn default_endpoint_var() -> String {
    DEFAULT_ENDPOINT_VAR.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_io_timeout_ms() -> Option<u64> {
    Some(30_000)
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_stub_listen() -> String {
    "127.0.0.1:7070".to_string()
}

impl InterceptConfig {
    /// Load from `sut-intercept.{toml,yaml,json}` if present, then the environment
    pub fn load() -> Result<Self> {
        Self::build(File::with_name(DEFAULT_CONFIG_FILE).required(false))
    }

    /// Load from an explicit file, then the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(InterceptError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Self::build(File::from(path))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: Self = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix("SUT_INTERCEPT").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every request unusable
    pub fn validate(&self) -> Result<()> {
        if self.wire.separator.is_empty() {
            return Err(InterceptError::Config(
                "wire.separator must not be empty".to_string(),
            ));
        }
        if self.transport.endpoint_var.trim().is_empty() {
            return Err(InterceptError::Config(
                "transport.endpoint_var must not be empty".to_string(),
            ));
        }
        if self.transport.io_timeout_ms == Some(0) {
            return Err(InterceptError::Config(
                "transport.io_timeout_ms must be positive; omit it to disable".to_string(),
            ));
        }
        Ok(())
    }
}
