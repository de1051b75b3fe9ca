//! Periodic interrupt source.
//!
//! Stands in for the hardware interrupt line: a timer thread that calls the
//! device's trigger entry point at a fixed interval until stopped.

use crate::device::TriggerLine;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Timer thread firing a [`TriggerLine`].
#[derive(Debug)]
pub struct PeriodicTrigger {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<u64>>,
}

impl PeriodicTrigger {
    /// Start firing `line` every `interval`.
    pub fn start(line: TriggerLine, interval: Duration) -> std::io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name("vser-irq".into())
            .spawn(move || {
                let mut fired = 0u64;
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            line.fire();
                            fired += 1;
                        }
                        // Explicit stop or the owner went away.
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                fired
            })?;

        debug!("periodic trigger started every {:?}", interval);
        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stop the timer and return how many times it fired.
    pub fn stop(mut self) -> u64 {
        self.halt()
    }

    fn halt(&mut self) -> u64 {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or(0)
    }
}

impl Drop for PeriodicTrigger {
    fn drop(&mut self) {
        self.halt();
    }
}
