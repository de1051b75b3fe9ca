//! Errors raised while resolving, parsing or validating `vser.toml`.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Settings the loader checks after overrides are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    FifoCapacity,
    TriggerInterval,
}

impl ConfigKey {
    /// Dotted TOML path of the setting.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FifoCapacity => "device.fifo_capacity",
            Self::TriggerInterval => "producer.trigger_interval_ms",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid vser configuration: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot encode configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value the device cannot be built with.
    #[error("{key} {reason}")]
    Invalid { key: ConfigKey, reason: &'static str },

    /// A `VSER_*` override that does not parse.
    #[error("{var}={value:?}: expected {expected}")]
    EnvOverride {
        var: String,
        value: String,
        expected: &'static str,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_names_the_toml_key() {
        let err = ConfigError::Invalid {
            key: ConfigKey::FifoCapacity,
            reason: "must be at least 1",
        };
        assert_eq!(err.to_string(), "device.fifo_capacity must be at least 1");
    }

    #[test]
    fn test_env_override_shows_value() {
        let err = ConfigError::EnvOverride {
            var: "VSER_DEVICE_BAUD".into(),
            value: "fast".into(),
            expected: "an unsigned integer",
        };
        assert_eq!(
            err.to_string(),
            "VSER_DEVICE_BAUD=\"fast\": expected an unsigned integer"
        );
    }
}
