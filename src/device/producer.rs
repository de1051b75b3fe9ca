//! Interrupt-driven byte producer.
//!
//! The trigger entry point only marks one unit of work as pending and unparks
//! the worker thread. The worker generates the byte, pushes it under the device
//! lock and notifies readers.

use super::vser::DeviceCore;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::thread::Thread;
use tracing::{trace, warn};

/// Source of the bytes the simulated hardware receives.
pub trait ByteSource: Send {
    fn next_byte(&mut self) -> u8;
}

/// Uniformly random uppercase ASCII letters.
#[derive(Debug)]
pub struct RandomLetters {
    rng: StdRng,
}

impl RandomLetters {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence for tests and demos.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ByteSource for RandomLetters {
    fn next_byte(&mut self) -> u8 {
        self.rng.gen::<u8>() % 26 + b'A'
    }
}

/// Replays a fixed byte sequence, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct Scripted {
    bytes: Vec<u8>,
    pos: usize,
}

impl Scripted {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        assert!(!bytes.is_empty(), "scripted source needs at least one byte");
        Self { bytes, pos: 0 }
    }
}

impl ByteSource for Scripted {
    fn next_byte(&mut self) -> u8 {
        let b = self.bytes[self.pos];
        self.pos = (self.pos + 1) % self.bytes.len();
        b
    }
}

/// Single-slot deferred work scheduler plus the byte source it drives.
pub struct DeferredProducer {
    pending: AtomicBool,
    stopping: AtomicBool,
    worker: OnceLock<Thread>,
    source: Mutex<Box<dyn ByteSource>>,
    triggers: AtomicU64,
    coalesced: AtomicU64,
}

impl DeferredProducer {
    pub fn new(source: Box<dyn ByteSource>) -> Self {
        Self {
            pending: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            worker: OnceLock::new(),
            source: Mutex::new(source),
            triggers: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Trigger entry point. Never blocks, allocates or takes the device lock.
    ///
    /// Returns `false` when a unit was already pending and this trigger was
    /// folded into it.
    pub fn on_trigger(&self) -> bool {
        self.triggers.fetch_add(1, Ordering::Relaxed);
        if self.pending.swap(true, Ordering::AcqRel) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if let Some(worker) = self.worker.get() {
            worker.unpark();
        }
        true
    }

    /// Claim the pending unit. Cleared before the work runs, so a trigger that
    /// arrives while it runs schedules the next one.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Produce one byte into the device fifo and notify readers.
    ///
    /// A full fifo drops the byte; that is logged and counted, never reported.
    pub(crate) fn run_deferred(&self, core: &DeviceCore) {
        let byte = self.source.lock().next_byte();

        let mut state = core.state.lock();
        let was_empty = state.fifo.is_empty();
        if state.fifo.push(byte) {
            state.stats.bytes_produced += 1;
            trace!("produced byte {:?}", byte as char);
        } else {
            state.stats.bytes_dropped += 1;
            warn!("receive fifo full, dropping byte {:?}", byte as char);
        }
        core.hub.notify(state, was_empty);
    }

    pub(crate) fn bind_worker(&self, worker: Thread) {
        let _ = self.worker.set(worker);
    }

    pub(crate) fn request_stop(&self) {
        self.stopping.store(true, Ordering::Release);
        if let Some(worker) = self.worker.get() {
            worker.unpark();
        }
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    pub fn triggers(&self) -> u64 {
        self.triggers.load(Ordering::Relaxed)
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for DeferredProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredProducer")
            .field("pending", &self.is_pending())
            .field("triggers", &self.triggers())
            .field("coalesced", &self.coalesced())
            .finish()
    }
}

/// Body of the worker thread: park until triggered, run one unit per claim.
pub(crate) fn worker_loop(core: &DeviceCore) {
    let producer = &core.producer;
    loop {
        std::thread::park();
        if producer.is_stopping() {
            break;
        }
        if producer.take_pending() {
            producer.run_deferred(core);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_letters_in_range() {
        let mut src = RandomLetters::seeded(42);
        for _ in 0..1000 {
            let b = src.next_byte();
            assert!(b.is_ascii_uppercase(), "byte {b} outside A..Z");
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = RandomLetters::seeded(7);
        let mut b = RandomLetters::seeded(7);
        let xs: Vec<u8> = (0..16).map(|_| a.next_byte()).collect();
        let ys: Vec<u8> = (0..16).map(|_| b.next_byte()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_scripted_cycles() {
        let mut src = Scripted::new(b"AB".to_vec());
        assert_eq!(src.next_byte(), b'A');
        assert_eq!(src.next_byte(), b'B');
        assert_eq!(src.next_byte(), b'A');
    }

    #[test]
    fn test_trigger_is_single_slot() {
        let producer = DeferredProducer::new(Box::new(Scripted::new(b"X".to_vec())));
        assert!(producer.on_trigger());
        assert!(!producer.on_trigger());
        assert!(!producer.on_trigger());
        assert_eq!(producer.triggers(), 3);
        assert_eq!(producer.coalesced(), 2);

        assert!(producer.take_pending());
        assert!(!producer.take_pending());
        assert!(producer.on_trigger());
    }
}
