//! Configuration structures for Rendezvous
//!
//! This module defines all configuration types used by the dispatcher, workers and clients.
//! Configurations are loaded from YAML files; command-line flags override individual fields.

use crate::error::{RendezvousError, Result};
use rendezvous_proto::{StrategyTag, MAX_LINE_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "RENDEZVOUS_CONFIG";

/// Top-level configuration for Rendezvous components
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RendezvousConfig {
    /// Dispatcher configuration
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Worker configuration
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Client configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Rendezvous binding address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Rendezvous port
    #[serde(default = "default_dispatcher_port")]
    pub port: u16,

    /// How many times the listening bind is attempted
    #[serde(default = "default_bind_attempts")]
    pub bind_attempts: u32,

    /// Delay between bind attempts in milliseconds
    #[serde(default = "default_bind_retry_delay")]
    pub bind_retry_delay_ms: u64,

    /// Longest accepted protocol line
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Dispatcher to register with (host:port)
    #[serde(default = "default_dispatcher_address")]
    pub dispatcher_address: String,

    /// Address the payload listener binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Payload port advertised at JOIN (0 = pick a free port)
    #[serde(default = "default_worker_port")]
    pub port: u16,

    /// Strategy pool to join
    #[serde(default = "default_tag")]
    pub tag: StrategyTag,

    /// Length of one computation unit in milliseconds
    #[serde(default = "default_unit_ms")]
    pub compute_unit_ms: u64,

    /// Delay between streamed frames in milliseconds
    #[serde(default = "default_unit_ms")]
    pub frame_interval_ms: u64,
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Dispatcher to ask for a worker (host:port)
    #[serde(default = "default_dispatcher_address")]
    pub dispatcher_address: String,

    /// Attempts before giving up on NO_SERVER
    #[serde(default = "default_request_attempts")]
    pub request_attempts: u32,

    /// Delay between attempts in milliseconds
    #[serde(default = "default_unit_ms")]
    pub retry_delay_ms: u64,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_metrics")]
    pub enable_metrics: bool,

    /// Emit logs as JSON
    #[serde(default)]
    pub structured_logging: bool,
}

/// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_dispatcher_port() -> u16 {
    6789
}

fn default_bind_attempts() -> u32 {
    5
}

fn default_bind_retry_delay() -> u64 {
    1000
}

fn default_max_line_length() -> usize {
    MAX_LINE_LENGTH
}

fn default_dispatcher_address() -> String {
    "127.0.0.1:6789".to_string()
}

fn default_worker_port() -> u16 {
    7000
}

fn default_tag() -> StrategyTag {
    StrategyTag::Static
}

fn default_unit_ms() -> u64 {
    1000
}

fn default_request_attempts() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics() -> bool {
    true
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_dispatcher_port(),
            bind_attempts: default_bind_attempts(),
            bind_retry_delay_ms: default_bind_retry_delay(),
            max_line_length: default_max_line_length(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            dispatcher_address: default_dispatcher_address(),
            bind_address: default_bind_address(),
            port: default_worker_port(),
            tag: default_tag(),
            compute_unit_ms: default_unit_ms(),
            frame_interval_ms: default_unit_ms(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dispatcher_address: default_dispatcher_address(),
            request_attempts: default_request_attempts(),
            retry_delay_ms: default_unit_ms(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            enable_metrics: default_metrics(),
            structured_logging: false,
        }
    }
}

impl RendezvousConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            RendezvousError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: RendezvousConfig = serde_yaml::from_str(&content).map_err(|e| {
            RendezvousError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file named by `RENDEZVOUS_CONFIG`, or defaults when it is unset
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.dispatcher.bind_attempts == 0 {
            return Err(RendezvousError::config("dispatcher.bind_attempts must be at least 1"));
        }
        if self.dispatcher.max_line_length == 0 {
            return Err(RendezvousError::config("dispatcher.max_line_length must be positive"));
        }
        if self.client.request_attempts == 0 {
            return Err(RendezvousError::config("client.request_attempts must be at least 1"));
        }
        if self.worker.dispatcher_address.is_empty() || self.client.dispatcher_address.is_empty() {
            return Err(RendezvousError::config("dispatcher_address must not be empty"));
        }
        Ok(())
    }
}

impl DispatcherConfig {
    /// Listening address as `host:port`
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Get bind retry delay as Duration
    pub fn bind_retry_delay(&self) -> Duration {
        Duration::from_millis(self.bind_retry_delay_ms)
    }
}

impl WorkerConfig {
    pub fn compute_unit(&self) -> Duration {
        Duration::from_millis(self.compute_unit_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl ClientConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
