//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every section falls back to defaults so an empty file is valid.

use serde::{Deserialize, Serialize};

use crate::http::reader::DEFAULT_BUFFER_SIZE;

/// Port the server listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 42069;

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, port).
    pub listener: ListenerConfig,

    /// Per-connection read settings.
    pub connection: ConnectionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// Default configuration listening on `port`.
    pub fn with_port(port: u16) -> Self {
        let mut config = Self::default();
        config.listener.port = port;
        config
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenerConfig {
    /// IP address to bind (e.g., "0.0.0.0").
    pub bind_address: String,

    /// TCP port; 0 picks an ephemeral port.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Settings applied to every accepted connection.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Capacity of the accumulation buffer in bytes.
    pub read_buffer_size: usize,

    /// Time allowed to receive a complete request, in seconds. 0 disables it.
    pub read_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            read_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
