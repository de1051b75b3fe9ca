//! Shared test utilities for device integration tests.
//!
//! This module provides:
//! - Devices with a scripted, predictable byte source
//! - Polling helpers for assertions that depend on other threads

#![allow(dead_code)]

use std::time::{Duration, Instant};
use vser::config::DeviceConfig;
use vser::{Scripted, VirtualSerial};

/// The alphabet in order; scripted devices cycle through it.
pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Device with the default 32-byte fifo producing `A`, `B`, `C`, ... in order.
pub fn alphabet_device() -> VirtualSerial {
    scripted_device(ALPHABET)
}

/// Device with the default configuration replaying `script`.
pub fn scripted_device(script: &[u8]) -> VirtualSerial {
    VirtualSerial::new(&DeviceConfig::default(), Box::new(Scripted::new(script.to_vec())))
        .expect("device construction")
}

/// Poll `cond` until it holds or five seconds pass.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Give a spawned thread time to reach its blocking wait.
pub fn settle() {
    std::thread::sleep(Duration::from_millis(50));
}
