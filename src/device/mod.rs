//! The virtual serial device.
//!
//! ```text
//! trigger ──> DeferredProducer ──(worker)──> ByteFifo::push ──> NotificationHub::notify
//!                                                 ▲                 │  wake blocked reads
//!                                                 │                 │  wake poll wakers
//! Session::read ── wait_until_nonempty ───────────┘                 └─ signal listeners
//! ```
//!
//! One `parking_lot::Mutex` guards the fifo, the line configuration and all
//! waiter bookkeeping; its condition variable is the blocking-read wait queue.

pub mod control;
pub mod fifo;
pub mod gate;
pub mod line;
pub mod notify;
pub mod producer;
pub mod session;
mod vser;

pub use control::{ControlCommand, ControlReply, VS_GET_BAUD, VS_GET_FFMT, VS_MAGIC, VS_SET_BAUD, VS_SET_FFMT};
pub use fifo::{ByteFifo, DEFAULT_FIFO_CAPACITY};
pub use gate::SessionGate;
pub use line::{LineConfig, LineFormat, Parity, DEFAULT_BAUD};
pub use notify::{Readiness, SessionId, Signal, SignalListener};
pub use producer::{ByteSource, RandomLetters, Scripted};
pub use session::{Interrupter, Session};
pub use vser::{DeviceStats, OpenFlags, TriggerLine, VirtualSerial};
