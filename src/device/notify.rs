//! Reader notification: blocking waits, readiness polling and input-ready signals.
//!
//! All of the hub's bookkeeping lives inside [`DeviceState`] so that checking the
//! fifo and going to sleep happen under the same lock the producer takes to push.
//! The hub itself only owns the condition variable bound to that lock.

use super::vser::DeviceState;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Waker;
use tracing::trace;

/// Identifier of an open session.
pub type SessionId = u64;

/// Out-of-band event delivered to registered listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum Signal {
    /// The receive fifo went from empty to non-empty.
    InputReady,
}

/// Recipient of asynchronous input-ready signals.
///
/// `deliver` runs on the producer's worker thread after the device lock has been
/// released, so it may call back into the device. It should not block for long.
pub trait SignalListener: Send + Sync {
    fn deliver(&self, signal: Signal);
}

impl SignalListener for std::sync::mpsc::Sender<Signal> {
    fn deliver(&self, signal: Signal) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(signal);
    }
}

impl SignalListener for tokio::sync::mpsc::UnboundedSender<Signal> {
    fn deliver(&self, signal: Signal) {
        let _ = self.send(signal);
    }
}

/// Outcome of waiting for the fifo to become non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Data is available; the lock is still held.
    Ready,
    /// Empty and the caller asked not to block.
    WouldBlock,
    /// An interrupt was delivered before data arrived.
    Interrupted,
}

/// Readiness reported to poll/select style callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Readiness {
    pub readable: bool,
    /// There is no bounded transmit path, so this is always true.
    pub writable: bool,
}

/// Pending-interrupt flag of one session.
#[derive(Debug, Default)]
pub struct InterruptFlag {
    pending: AtomicBool,
}

impl InterruptFlag {
    fn raise(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Consume a pending interrupt, if any.
    fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

/// Waiter registries, stored inside the device state.
#[derive(Default)]
pub(crate) struct Waiters {
    wakers: Vec<Waker>,
    listeners: Vec<(SessionId, Arc<dyn SignalListener>)>,
}

impl Waiters {
    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

/// Condition variable plus the operations that drive it.
#[derive(Debug, Default)]
pub struct NotificationHub {
    readable: Condvar,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the fifo holds at least one byte.
    ///
    /// The guard stays locked on return. A blocking wait only gives up the lock
    /// while suspended on the condition variable, and re-checks the fifo on every
    /// wake-up, so a broadcast that another reader won is absorbed here.
    pub(crate) fn wait_until_nonempty(
        &self,
        state: &mut MutexGuard<'_, DeviceState>,
        blocking: bool,
        interrupt: &InterruptFlag,
    ) -> WaitOutcome {
        loop {
            if !state.fifo.is_empty() {
                return WaitOutcome::Ready;
            }
            if !blocking {
                return WaitOutcome::WouldBlock;
            }
            if interrupt.take() {
                return WaitOutcome::Interrupted;
            }
            self.readable.wait(state);
        }
    }

    /// Report current readiness and remember `waker` for the next notify.
    pub(crate) fn poll_readiness(
        &self,
        state: &mut DeviceState,
        waker: Option<&Waker>,
    ) -> Readiness {
        if let Some(waker) = waker {
            let wakers = &mut state.waiters.wakers;
            if !wakers.iter().any(|w| w.will_wake(waker)) {
                wakers.push(waker.clone());
            }
        }

        Readiness {
            readable: !state.fifo.is_empty(),
            writable: true,
        }
    }

    pub(crate) fn register_listener(
        &self,
        state: &mut DeviceState,
        id: SessionId,
        listener: Arc<dyn SignalListener>,
    ) {
        let listeners = &mut state.waiters.listeners;
        match listeners.iter_mut().find(|(sid, _)| *sid == id) {
            Some(entry) => entry.1 = listener,
            None => listeners.push((id, listener)),
        }
    }

    /// Returns whether `id` was registered.
    pub(crate) fn unregister_listener(&self, state: &mut DeviceState, id: SessionId) -> bool {
        let listeners = &mut state.waiters.listeners;
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    /// Wake readers after a producer-side push.
    ///
    /// Consumes the guard: wake-ups and signal delivery happen after the lock is
    /// released. Nothing is woken if the fifo is still empty. Listeners are
    /// signalled only when `was_empty` says this push made the fifo non-empty.
    /// Returns the number of signals delivered.
    pub(crate) fn notify(&self, mut state: MutexGuard<'_, DeviceState>, was_empty: bool) -> usize {
        if state.fifo.is_empty() {
            return 0;
        }

        let wakers = std::mem::take(&mut state.waiters.wakers);
        let listeners: Vec<Arc<dyn SignalListener>> = if was_empty {
            state
                .waiters
                .listeners
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect()
        } else {
            Vec::new()
        };
        state.stats.signals_delivered += listeners.len() as u64;
        drop(state);

        self.readable.notify_all();
        for waker in wakers {
            waker.wake();
        }
        for listener in &listeners {
            listener.deliver(Signal::InputReady);
        }
        trace!("notified readers, {} signal(s) delivered", listeners.len());
        listeners.len()
    }

    /// Deliver an interrupt to waiters holding `flag`.
    ///
    /// Taking the lock before broadcasting closes the window between a waiter's
    /// flag check and its suspension.
    pub(crate) fn interrupt(&self, lock: &Mutex<DeviceState>, flag: &InterruptFlag) {
        flag.raise();
        let _state = lock.lock();
        self.readable.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fifo::ByteFifo;
    use crate::device::line::LineConfig;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn state() -> Mutex<DeviceState> {
        Mutex::new(DeviceState::new(ByteFifo::default(), LineConfig::default()))
    }

    #[test]
    fn test_nonblocking_empty_would_block() {
        let hub = NotificationHub::new();
        let lock = state();
        let flag = InterruptFlag::default();
        let mut guard = lock.lock();
        assert_eq!(
            hub.wait_until_nonempty(&mut guard, false, &flag),
            WaitOutcome::WouldBlock
        );
    }

    #[test]
    fn test_ready_when_nonempty() {
        let hub = NotificationHub::new();
        let lock = state();
        let flag = InterruptFlag::default();
        let mut guard = lock.lock();
        guard.fifo.push(b'Q');
        assert_eq!(
            hub.wait_until_nonempty(&mut guard, true, &flag),
            WaitOutcome::Ready
        );
    }

    #[test]
    fn test_pending_interrupt_fires_on_blocking_wait() {
        let hub = NotificationHub::new();
        let lock = state();
        let flag = InterruptFlag::default();
        hub.interrupt(&lock, &flag);

        let mut guard = lock.lock();
        assert_eq!(
            hub.wait_until_nonempty(&mut guard, true, &flag),
            WaitOutcome::Interrupted
        );
        assert!(!flag.is_pending());
    }

    #[test]
    fn test_blocked_waiter_wakes_on_notify() {
        let hub = Arc::new(NotificationHub::new());
        let lock = Arc::new(state());

        let waiter = {
            let (hub, lock) = (Arc::clone(&hub), Arc::clone(&lock));
            thread::spawn(move || {
                let flag = InterruptFlag::default();
                let mut guard = lock.lock();
                let outcome = hub.wait_until_nonempty(&mut guard, true, &flag);
                (outcome, guard.fifo.pop_up_to(8))
            })
        };

        thread::sleep(Duration::from_millis(50));
        let mut guard = lock.lock();
        guard.fifo.push(b'Z');
        hub.notify(guard, true);

        let (outcome, data) = waiter.join().unwrap();
        assert_eq!(outcome, WaitOutcome::Ready);
        assert_eq!(data, b"Z");
    }

    #[test]
    fn test_signal_only_on_empty_to_nonempty() {
        let hub = NotificationHub::new();
        let lock = state();
        let (tx, rx) = mpsc::channel::<Signal>();
        hub.register_listener(&mut lock.lock(), 1, Arc::new(tx));

        let mut guard = lock.lock();
        guard.fifo.push(b'A');
        assert_eq!(hub.notify(guard, true), 1);

        let mut guard = lock.lock();
        guard.fifo.push(b'B');
        assert_eq!(hub.notify(guard, false), 0);

        assert_eq!(rx.try_recv(), Ok(Signal::InputReady));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_notify_on_empty_fifo_is_silent() {
        let hub = NotificationHub::new();
        let lock = state();
        let (tx, rx) = mpsc::channel::<Signal>();
        hub.register_listener(&mut lock.lock(), 7, Arc::new(tx));

        assert_eq!(hub.notify(lock.lock(), true), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unregister_listener() {
        let hub = NotificationHub::new();
        let lock = state();
        let (tx, _rx) = mpsc::channel::<Signal>();
        let mut guard = lock.lock();
        hub.register_listener(&mut guard, 3, Arc::new(tx));
        assert!(hub.unregister_listener(&mut guard, 3));
        assert!(!hub.unregister_listener(&mut guard, 3));
        assert_eq!(guard.waiters.listener_count(), 0);
    }

    #[test]
    fn test_poll_readiness() {
        let hub = NotificationHub::new();
        let lock = state();
        let mut guard = lock.lock();

        let r = hub.poll_readiness(&mut guard, None);
        assert!(!r.readable);
        assert!(r.writable);

        guard.fifo.push(b'x');
        let r = hub.poll_readiness(&mut guard, None);
        assert!(r.readable);
        assert!(r.writable);
    }
}
