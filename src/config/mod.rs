//! Configuration for the virtual serial device.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `VSER_CONFIG` environment variable (explicit path)
//! 2. `./vser.toml` (current directory)
//! 3. The platform config directory (`~/.config/vser/vser.toml` on Linux)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Values can be overridden with `VSER_<SECTION>_<KEY>`, e.g.
//! `VSER_DEVICE_BAUD=9600` or `VSER_PRODUCER_TRIGGER_INTERVAL_MS=50`.
//!
//! # Example
//!
//! ```rust,ignore
//! use vser::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! println!("fifo capacity: {}", loader.config().device.fifo_capacity);
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigKey, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{Config, DeviceConfig, LogFormat, LoggingConfig, ProducerConfig};
