//! Configuration for the client engine.
//!
//! Either use defaults, override via environment variables, or load a TOML
//! file. Every key is optional and falls back to its default.
//!
//! - `SMB2_SERVER_ADDR`        (default: "127.0.0.1")
//! - `SMB2_PORT`               (default: "445")
//! - `SMB2_TCP_NODELAY`        (default: "true")
//! - `SMB2_MAX_FRAME_LEN`      (default: "16777216")
//! - `SMB2_READ_BUFFER`        (default: "65536")
//! - `SMB2_CONNECT_TIMEOUT_MS` (default: "10000", 0 disables)
//! - `SMB2_PROCESS_ID`         (default: "65279")

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Env {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host name or IP address of the server.
    pub server_addr: String,

    /// TCP port to connect to.
    pub port: u16,

    pub tcp_nodelay: bool,

    /// Frames announcing a larger length are treated as a transport error.
    pub max_frame_len: usize,

    /// Initial capacity of the per-connection receive buffer.
    pub read_buffer_capacity: usize,

    /// Applies to the TCP connect only. 0 waits indefinitely.
    pub connect_timeout_ms: u64,

    /// Process id stamped into every new request.
    pub process_id: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: "127.0.0.1".to_string(),
            port: 445,
            tcp_nodelay: true,
            max_frame_len: 16 * 1024 * 1024,
            read_buffer_capacity: 64 * 1024,
            connect_timeout_ms: 10_000,
            process_id: 0xFEFF,
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server_addr: env::var("SMB2_SERVER_ADDR").unwrap_or(defaults.server_addr),
            port: read_env_or_default("SMB2_PORT", defaults.port)?,
            tcp_nodelay: read_env_or_default("SMB2_TCP_NODELAY", defaults.tcp_nodelay)?,
            max_frame_len: read_env_or_default("SMB2_MAX_FRAME_LEN", defaults.max_frame_len)?,
            read_buffer_capacity: read_env_or_default(
                "SMB2_READ_BUFFER",
                defaults.read_buffer_capacity,
            )?,
            connect_timeout_ms: read_env_or_default(
                "SMB2_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout_ms,
            )?,
            process_id: read_env_or_default("SMB2_PROCESS_ID", defaults.process_id)?,
        })
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.server_addr, self.port)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

fn read_env_or_default<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(value) => value.trim().parse::<T>().map_err(|e| ConfigError::Env {
            key,
            reason: e.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}
