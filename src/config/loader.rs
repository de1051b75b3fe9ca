//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigKey, ConfigResult};
use super::schema::{Config, LogFormat};
use crate::device::Parity;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "VSER";

/// Config file name
const CONFIG_FILE_NAME: &str = "vser.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "VSER_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order, then apply
    /// environment overrides and validate.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        validate(&config)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        validate(&config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults, but never end up invalid
        if apply_env_overrides(&mut config).is_err() || validate(&config).is_err() {
            config = Config::default();
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    if let Some(app_config) = get_default_config_path() {
        if app_config.exists() {
            return Some(app_config);
        }
    }

    // 4. No config file found - will use defaults
    None
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "vser").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Parse `VSER_<key>` with `parse` if it is set.
fn env_with<T>(
    key: &str,
    expected: &'static str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> ConfigResult<Option<T>> {
    let var = format!("{}_{}", ENV_PREFIX, key);
    match std::env::var(&var) {
        Ok(value) => match parse(&value) {
            Some(v) => Ok(Some(v)),
            None => Err(ConfigError::EnvOverride {
                var,
                value,
                expected,
            }),
        },
        Err(_) => Ok(None),
    }
}

fn env_override<T: FromStr>(key: &str, expected: &'static str) -> ConfigResult<Option<T>> {
    env_with(key, expected, |v| v.parse().ok())
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `VSER_<SECTION>_<KEY>`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Device overrides
    if let Some(v) = env_override("DEVICE_FIFO_CAPACITY", "a byte count")? {
        config.device.fifo_capacity = v;
    }
    if let Some(v) = env_override("DEVICE_BAUD", "an unsigned integer")? {
        config.device.baud = v;
    }
    if let Some(v) = env_override("DEVICE_DATA_BITS", "a value 0-255")? {
        config.device.data_bits = v;
    }
    if let Some(v) = env_override("DEVICE_STOP_BITS", "a value 0-255")? {
        config.device.stop_bits = v;
    }
    if let Some(v) = env_with("DEVICE_PARITY", "none, odd or even", |v| {
        match v.to_lowercase().as_str() {
            "none" | "n" => Some(Parity::None),
            "odd" | "o" => Some(Parity::Odd),
            "even" | "e" => Some(Parity::Even),
            _ => None,
        }
    })? {
        config.device.parity = v;
    }

    // Producer overrides
    if let Ok(val) = std::env::var(format!("{}_PRODUCER_PERIODIC", ENV_PREFIX)) {
        config.producer.periodic = val.to_lowercase() == "true" || val == "1";
    }
    if let Some(v) = env_override("PRODUCER_TRIGGER_INTERVAL_MS", "milliseconds")? {
        config.producer.trigger_interval_ms = v;
    }
    if let Some(v) = env_override("PRODUCER_SEED", "a 64-bit seed")? {
        config.producer.seed = Some(v);
    }

    // Logging overrides
    if let Ok(val) = std::env::var(format!("{}_LOGGING_LEVEL", ENV_PREFIX)) {
        config.logging.level = val;
    }
    if let Some(v) = env_with("LOGGING_FORMAT", "pretty, compact or full", |v| {
        match v.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            "full" => Some(LogFormat::Full),
            _ => None,
        }
    })? {
        config.logging.format = v;
    }

    Ok(())
}

/// Reject values the device cannot be built with.
fn validate(config: &Config) -> ConfigResult<()> {
    if config.device.fifo_capacity == 0 {
        return Err(ConfigError::Invalid {
            key: ConfigKey::FifoCapacity,
            reason: "must be at least 1",
        });
    }
    if config.producer.periodic && config.producer.trigger_interval_ms == 0 {
        return Err(ConfigError::Invalid {
            key: ConfigKey::TriggerInterval,
            reason: "must be non-zero while the periodic trigger is enabled",
        });
    }
    Ok(())
}
