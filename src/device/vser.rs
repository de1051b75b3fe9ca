//! The device instance.
//!
//! `VirtualSerial` owns everything shared between sessions: the receive fifo,
//! the line configuration, the open gate, the notification hub and the
//! producer's worker thread. It is constructed explicitly and torn down by
//! [`VirtualSerial::shutdown`] or on drop; nothing survives a restart.

use super::fifo::ByteFifo;
use super::gate::SessionGate;
use super::line::LineConfig;
use super::notify::{NotificationHub, SessionId, Waiters};
use super::producer::{worker_loop, ByteSource, DeferredProducer, RandomLetters};
use super::session::Session;
use crate::config::{Config, DeviceConfig};
use crate::error::{DeviceError, DeviceResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info};

/// Everything guarded by the device lock.
pub(crate) struct DeviceState {
    pub(crate) fifo: ByteFifo,
    pub(crate) line: LineConfig,
    pub(crate) waiters: Waiters,
    pub(crate) stats: Counters,
}

impl DeviceState {
    pub(crate) fn new(fifo: ByteFifo, line: LineConfig) -> Self {
        Self {
            fifo,
            line,
            waiters: Waiters::default(),
            stats: Counters::default(),
        }
    }
}

/// Counters updated under the device lock.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    pub(crate) bytes_produced: u64,
    pub(crate) bytes_dropped: u64,
    pub(crate) bytes_read: u64,
    pub(crate) bytes_written: u64,
    pub(crate) signals_delivered: u64,
    pub(crate) sessions_opened: u64,
    pub(crate) busy_rejections: u64,
}

/// Snapshot of device activity since initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub triggers: u64,
    pub triggers_coalesced: u64,
    pub bytes_produced: u64,
    pub bytes_dropped: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub signals_delivered: u64,
    pub sessions_opened: u64,
    pub busy_rejections: u64,
    pub fifo_len: usize,
    pub fifo_capacity: usize,
    pub session_open: bool,
}

/// State shared by the device handle, its sessions and the worker thread.
pub(crate) struct DeviceCore {
    pub(crate) state: Mutex<DeviceState>,
    pub(crate) hub: NotificationHub,
    pub(crate) gate: SessionGate,
    pub(crate) producer: DeferredProducer,
    next_session: AtomicU64,
}

impl DeviceCore {
    pub(crate) fn next_session_id(&self) -> SessionId {
        self.next_session.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// How a session is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags {
    /// Reads on an empty fifo fail with `WouldBlock` instead of waiting.
    pub nonblocking: bool,
}

impl OpenFlags {
    pub fn blocking() -> Self {
        Self { nonblocking: false }
    }

    pub fn nonblocking() -> Self {
        Self { nonblocking: true }
    }
}

/// Cloneable handle to the device's trigger entry point.
///
/// This is what the platform's interrupt delivery would hold.
#[derive(Clone)]
pub struct TriggerLine {
    core: Arc<DeviceCore>,
}

impl TriggerLine {
    /// Raise the interrupt. Returns immediately.
    pub fn fire(&self) -> bool {
        self.core.producer.on_trigger()
    }
}

impl std::fmt::Debug for TriggerLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerLine").finish_non_exhaustive()
    }
}

/// A single virtual serial device instance.
pub struct VirtualSerial {
    core: Arc<DeviceCore>,
    worker: Option<JoinHandle<()>>,
}

impl VirtualSerial {
    /// Create a device with the given settings and byte source, and start the
    /// producer's worker thread.
    pub fn new(config: &DeviceConfig, source: Box<dyn ByteSource>) -> std::io::Result<Self> {
        let line = config.line();
        let core = Arc::new(DeviceCore {
            state: Mutex::new(DeviceState::new(
                ByteFifo::with_capacity(config.fifo_capacity.max(1)),
                line,
            )),
            hub: NotificationHub::new(),
            gate: SessionGate::new(),
            producer: DeferredProducer::new(source),
            next_session: AtomicU64::new(0),
        });

        let worker_core = Arc::clone(&core);
        let worker = std::thread::Builder::new()
            .name("vser-worker".into())
            .spawn(move || worker_loop(&worker_core))?;
        core.producer.bind_worker(worker.thread().clone());

        info!(
            "virtual serial device ready: fifo {} bytes, line {}",
            config.fifo_capacity, line
        );
        Ok(Self {
            core,
            worker: Some(worker),
        })
    }

    /// Device with default settings and a random letter source.
    pub fn with_defaults() -> std::io::Result<Self> {
        Self::new(&DeviceConfig::default(), Box::new(RandomLetters::from_entropy()))
    }

    /// Device built from a loaded configuration.
    pub fn from_config(config: &Config) -> std::io::Result<Self> {
        let source = match config.producer.seed {
            Some(seed) => RandomLetters::seeded(seed),
            None => RandomLetters::from_entropy(),
        };
        Self::new(&config.device, Box::new(source))
    }

    /// Open a session. Fails with `Busy` while another session is open.
    pub fn open(&self, flags: OpenFlags) -> DeviceResult<Session> {
        if !self.core.gate.try_acquire() {
            self.core.state.lock().stats.busy_rejections += 1;
            debug!("open rejected: device busy");
            return Err(DeviceError::Busy);
        }
        self.core.state.lock().stats.sessions_opened += 1;
        Ok(Session::new(Arc::clone(&self.core), flags))
    }

    /// External trigger entry point. Returns immediately.
    pub fn trigger(&self) -> bool {
        self.core.producer.on_trigger()
    }

    pub fn trigger_line(&self) -> TriggerLine {
        TriggerLine {
            core: Arc::clone(&self.core),
        }
    }

    /// Run one unit of production on the calling thread, bypassing the worker.
    pub fn produce_now(&self) {
        self.core.producer.run_deferred(&self.core);
    }

    pub fn is_open(&self) -> bool {
        self.core.gate.is_held()
    }

    pub fn line_config(&self) -> LineConfig {
        self.core.state.lock().line
    }

    pub fn stats(&self) -> DeviceStats {
        let state = self.core.state.lock();
        let c = state.stats;
        DeviceStats {
            triggers: self.core.producer.triggers(),
            triggers_coalesced: self.core.producer.coalesced(),
            bytes_produced: c.bytes_produced,
            bytes_dropped: c.bytes_dropped,
            bytes_read: c.bytes_read,
            bytes_written: c.bytes_written,
            signals_delivered: c.signals_delivered,
            sessions_opened: c.sessions_opened,
            busy_rejections: c.busy_rejections,
            fifo_len: state.fifo.len(),
            fifo_capacity: state.fifo.capacity(),
            session_open: self.core.gate.is_held(),
        }
    }

    /// Stop the producer's worker. Pending work is abandoned; sessions stay
    /// usable but no more bytes arrive.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.core.producer.request_stop();
            let _ = worker.join();
            debug!("producer worker stopped");
        }
    }
}

impl Drop for VirtualSerial {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for VirtualSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualSerial")
            .field("producer", &self.core.producer)
            .field("open", &self.is_open())
            .finish()
    }
}
