//! Exclusive-open gate.

use std::sync::atomic::{AtomicBool, Ordering};

/// Permits at most one open session at a time.
#[derive(Debug, Default)]
pub struct SessionGate {
    held: AtomicBool,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically move from free to held.
    ///
    /// Returns `false` if the gate is already held; the caller must not set up
    /// any session state in that case.
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Release a gate acquired by [`try_acquire`](Self::try_acquire).
    ///
    /// Must be called exactly once per successful acquire.
    pub fn release(&self) {
        let was_held = self.held.swap(false, Ordering::Release);
        debug_assert!(was_held, "session gate released while free");
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_release() {
        let gate = SessionGate::new();
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
        gate.release();
        assert!(gate.try_acquire());
    }

    #[test]
    fn test_only_one_winner_under_contention() {
        let gate = Arc::new(SessionGate::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.try_acquire())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(gate.is_held());
    }
}
