//! Configuration schema definitions.
//!
//! All sections use `#[serde(default)]`, so a file only needs the keys it
//! changes.

use crate::device::{LineConfig, LineFormat, Parity, DEFAULT_BAUD, DEFAULT_FIFO_CAPACITY};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device settings applied at initialization
    pub device: DeviceConfig,
    /// Simulated interrupt source
    pub producer: ProducerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Device section: fifo size and the line settings the device starts with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Receive fifo capacity in bytes
    pub fifo_capacity: usize,
    /// Initial baud rate
    pub baud: u32,
    /// Initial data bits
    pub data_bits: u8,
    /// Initial parity
    pub parity: Parity,
    /// Initial stop bits
    pub stop_bits: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let format = LineFormat::default();
        Self {
            fifo_capacity: DEFAULT_FIFO_CAPACITY,
            baud: DEFAULT_BAUD,
            data_bits: format.data_bits,
            parity: format.parity,
            stop_bits: format.stop_bits,
        }
    }
}

impl DeviceConfig {
    /// Line configuration the device is initialized with.
    pub fn line(&self) -> LineConfig {
        LineConfig {
            baud: self.baud,
            format: LineFormat {
                data_bits: self.data_bits,
                parity: self.parity,
                stop_bits: self.stop_bits,
            },
        }
    }
}

/// Producer section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Fire the trigger periodically from a timer thread
    pub periodic: bool,
    /// Period of the simulated interrupt in milliseconds
    pub trigger_interval_ms: u64,
    /// Seed for a reproducible byte sequence
    pub seed: Option<u64>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            periodic: true,
            trigger_interval_ms: 100,
            seed: None,
        }
    }
}

impl ProducerConfig {
    /// Get the trigger interval as Duration
    pub fn trigger_interval(&self) -> Duration {
        Duration::from_millis(self.trigger_interval_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. "info" or "vser=debug"; `RUST_LOG` wins
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line format with colors
    Pretty,
    /// Single-line format
    #[default]
    Compact,
    /// Default tracing-subscriber format
    Full,
}
