//! Server configuration module.
//!
//! This module provides configuration loading for the conductor server from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `CONDUCTOR_LISTEN_PORT`: Port to listen on (default: `3000`)
//! - `CONDUCTOR_TICK_INTERVAL_MS`: Local clock tick interval (default: `1000`)
//! - `CONDUCTOR_START_OFFSET_MS`: Follow-mode start offset (default: `900000`)
//! - `CONDUCTOR_END_OFFSET_MS`: Follow-mode end offset (default: `0`)
//! - `CONDUCTOR_OBJECT_DIRECTORY`: Directory for persisted objects (default: `./data`)
//!
//! # Invariants
//!
//! - `listen_port` and `tick_interval` are never zero
//! - `offsets` always pass offset validation

use std::path::PathBuf;
use std::time::Duration;

use crate::time::ClockOffsets;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ConductorConfig {
    /// Port to listen on for HTTP and WebSocket connections.
    pub listen_port: u16,
    /// Interval between local clock ticks.
    pub tick_interval: Duration,
    /// Offsets used when following the local clock at startup.
    pub offsets: ClockOffsets,
    /// Directory where the object store keeps its file.
    pub object_directory: PathBuf,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

const LISTEN_PORT: &str = "CONDUCTOR_LISTEN_PORT";
const TICK_INTERVAL_MS: &str = "CONDUCTOR_TICK_INTERVAL_MS";
const START_OFFSET_MS: &str = "CONDUCTOR_START_OFFSET_MS";
const END_OFFSET_MS: &str = "CONDUCTOR_END_OFFSET_MS";
const OBJECT_DIRECTORY: &str = "CONDUCTOR_OBJECT_DIRECTORY";

impl ConductorConfig {
    /// Default port for the server.
    pub const DEFAULT_PORT: u16 = 3000;
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
    /// Fifteen minutes.
    pub const DEFAULT_START_OFFSET_MS: f64 = 900_000.0;
    pub const DEFAULT_END_OFFSET_MS: f64 = 0.0;
    pub const DEFAULT_OBJECT_DIRECTORY: &'static str = "./data";

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but invalid:
    /// - `CONDUCTOR_LISTEN_PORT` is not a port number
    /// - `CONDUCTOR_TICK_INTERVAL_MS` is not a positive integer
    /// - an offset is not a finite, non-negative number
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen_port = match lookup(LISTEN_PORT) {
            Some(value) => match value.parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: LISTEN_PORT.to_string(),
                        message: format!("'{value}' is not a valid port number (must be 1-65535)"),
                    });
                }
            },
            None => Self::DEFAULT_PORT,
        };

        let tick_interval_ms = match lookup(TICK_INTERVAL_MS) {
            Some(value) => match value.parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: TICK_INTERVAL_MS.to_string(),
                        message: format!("'{value}' is not a positive number of milliseconds"),
                    });
                }
            },
            None => Self::DEFAULT_TICK_INTERVAL_MS,
        };

        let offsets = ClockOffsets::new(
            load_offset(&lookup, START_OFFSET_MS, Self::DEFAULT_START_OFFSET_MS)?,
            load_offset(&lookup, END_OFFSET_MS, Self::DEFAULT_END_OFFSET_MS)?,
        );

        let object_directory = lookup(OBJECT_DIRECTORY)
            .map_or_else(|| PathBuf::from(Self::DEFAULT_OBJECT_DIRECTORY), PathBuf::from);

        Ok(Self {
            listen_port,
            tick_interval: Duration::from_millis(tick_interval_ms),
            offsets,
            object_directory,
        })
    }
}

fn load_offset(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(default);
    };
    match value.parse::<f64>() {
        Ok(offset) if offset.is_finite() && offset >= 0.0 => Ok(offset),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a non-negative number of milliseconds"),
        }),
    }
}
