//! Fixed-capacity byte fifo.
//!
//! The receive buffer of the virtual serial device. A full fifo drops the
//! incoming byte rather than overwriting unread data, and an empty fifo yields
//! nothing instead of blocking; waiting is the notification hub's job.
//!
//! `ByteFifo` has no locking of its own. The device keeps it behind the single
//! device lock together with the wait/notify state.

/// Receive fifo capacity of the device, in bytes.
pub const DEFAULT_FIFO_CAPACITY: usize = 32;

/// Circular byte buffer with a fixed capacity.
#[derive(Clone)]
pub struct ByteFifo {
    buf: Box<[u8]>,
    /// Index of the oldest byte.
    head: usize,
    len: usize,
}

impl ByteFifo {
    /// Create an empty fifo holding at most `capacity` bytes.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "fifo capacity must be non-zero");
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Append one byte at the tail.
    ///
    /// Returns `false` and leaves the fifo untouched when it is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        let tail = (self.head + self.len) % self.capacity();
        self.buf[tail] = byte;
        self.len += 1;
        true
    }

    /// Remove up to `buf.len()` bytes from the front into `buf`.
    ///
    /// Returns the number of bytes copied, zero when the fifo is empty.
    pub fn pop_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len);
        let cap = self.capacity();

        // At most two contiguous runs: head..end, then 0..wrap.
        let first = n.min(cap - self.head);
        out[..first].copy_from_slice(&self.buf[self.head..self.head + first]);
        out[first..n].copy_from_slice(&self.buf[..n - first]);

        self.head = (self.head + n) % cap;
        self.len -= n;
        if self.len == 0 {
            self.head = 0;
        }
        n
    }

    /// Remove and return up to `max_len` bytes from the front.
    pub fn pop_up_to(&mut self, max_len: usize) -> Vec<u8> {
        let mut out = vec![0u8; max_len.min(self.len)];
        let n = self.pop_into(&mut out);
        out.truncate(n);
        out
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }
}

impl Default for ByteFifo {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_FIFO_CAPACITY)
    }
}

impl std::fmt::Debug for ByteFifo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteFifo")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fill_overflow_drain() {
        let mut fifo = ByteFifo::default();
        for i in 0..32u8 {
            assert!(fifo.push(b'A' + i % 26));
        }
        assert!(fifo.is_full());

        assert!(!fifo.push(b'!'));
        assert_eq!(fifo.len(), 32);

        let drained = fifo.pop_up_to(32);
        let expected: Vec<u8> = (0..32u8).map(|i| b'A' + i % 26).collect();
        assert_eq!(drained, expected);
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_empty_pop() {
        let mut fifo = ByteFifo::default();
        assert!(fifo.pop_up_to(8).is_empty());
        let mut buf = [0u8; 4];
        assert_eq!(fifo.pop_into(&mut buf), 0);
    }

    #[test]
    fn test_partial_pop_keeps_remainder() {
        let mut fifo = ByteFifo::with_capacity(8);
        for &b in b"HELLO" {
            fifo.push(b);
        }
        assert_eq!(fifo.pop_up_to(2), b"HE");
        assert_eq!(fifo.len(), 3);
        assert_eq!(fifo.pop_up_to(10), b"LLO");
    }

    #[test]
    fn test_wraparound_order() {
        let mut fifo = ByteFifo::with_capacity(4);
        for &b in b"ABC" {
            fifo.push(b);
        }
        assert_eq!(fifo.pop_up_to(2), b"AB");
        for &b in b"DEF" {
            assert!(fifo.push(b));
        }
        assert!(fifo.is_full());
        assert_eq!(fifo.pop_up_to(4), b"CDEF");
    }

    #[test]
    fn test_clear() {
        let mut fifo = ByteFifo::with_capacity(4);
        fifo.push(b'X');
        fifo.clear();
        assert!(fifo.is_empty());
        assert!(fifo.push(b'Y'));
        assert_eq!(fifo.pop_up_to(1), b"Y");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(u8),
        Pop(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::Push),
            (0usize..40).prop_map(Op::Pop),
        ]
    }

    proptest! {
        /// The fifo behaves like a bounded VecDeque that drops the newest byte when full.
        #[test]
        fn prop_matches_bounded_model(ops in proptest::collection::vec(op(), 0..200)) {
            let mut fifo = ByteFifo::default();
            let mut model = std::collections::VecDeque::new();

            for op in ops {
                match op {
                    Op::Push(b) => {
                        let accepted = fifo.push(b);
                        prop_assert_eq!(accepted, model.len() < DEFAULT_FIFO_CAPACITY);
                        if accepted {
                            model.push_back(b);
                        }
                    }
                    Op::Pop(n) => {
                        let got = fifo.pop_up_to(n);
                        prop_assert!(got.len() <= n);
                        let want: Vec<u8> = model.drain(..n.min(model.len())).collect();
                        prop_assert_eq!(got, want);
                    }
                }
                prop_assert!(fifo.len() <= fifo.capacity());
                prop_assert_eq!(fifo.len(), model.len());
            }
        }
    }
}
