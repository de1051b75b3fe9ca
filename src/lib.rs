//! vser: a single-instance virtual serial device.
//!
//! A simulated interrupt source feeds random uppercase letters into a small
//! bounded receive fifo. Sessions read them in blocking, non-blocking,
//! readiness-polled or signal-driven mode, and configure the line through a
//! private control channel.
//!
//! # Modules
//!
//! - `device`: fifo, line config, open gate, notification hub, producer and sessions
//! - `trigger`: periodic interrupt source
//! - `config`: configuration management with TOML support
//! - `logging`: tracing subscriber setup
//! - `error`: device error type
//!
//! # Example
//!
//! ```no_run
//! use vser::{OpenFlags, VirtualSerial};
//!
//! let device = VirtualSerial::with_defaults()?;
//! let session = device.open(OpenFlags::blocking())?;
//! device.trigger();
//! let data = session.read_up_to(32)?;
//! assert!(data.iter().all(u8::is_ascii_uppercase));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod trigger;

// Re-export commonly used types for convenience
pub use device::{
    ByteFifo, ByteSource, ControlCommand, ControlReply, DeviceStats, Interrupter, LineConfig,
    LineFormat, OpenFlags, Parity, RandomLetters, Readiness, Scripted, Session, Signal,
    SignalListener, TriggerLine, VirtualSerial,
};
pub use error::{DeviceError, DeviceResult};
pub use trigger::PeriodicTrigger;

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
