//! Per-open-handle façade over the device.
//!
//! A `Session` exists only between a successful open and its close, so the
//! `Closed → Open → Closed` state machine is the value's lifetime: opening
//! returns one, [`Session::close`] (or dropping it) releases the device.

use super::control::{ControlCommand, ControlReply};
use super::line::LineFormat;
use super::notify::{InterruptFlag, Readiness, SessionId, SignalListener, WaitOutcome};
use super::vser::{DeviceCore, OpenFlags};
use crate::error::{DeviceError, DeviceResult};
use std::io::{IoSlice, IoSliceMut};
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, trace};

/// An open handle on the virtual serial device.
pub struct Session {
    id: SessionId,
    core: Arc<DeviceCore>,
    nonblocking: bool,
    interrupt: Arc<InterruptFlag>,
    owner: Option<Arc<dyn SignalListener>>,
    async_registered: bool,
    released: bool,
}

/// Handle that interrupts a session's blocking reads from another thread.
///
/// The analogue of a signal delivered to a process sleeping in `read(2)`: the
/// wait ends with [`DeviceError::Interrupted`] and consumes nothing. An
/// interrupt raised while nobody waits stays pending until the next blocking
/// wait on an empty fifo.
#[derive(Clone)]
pub struct Interrupter {
    core: Arc<DeviceCore>,
    flag: Arc<InterruptFlag>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.core.hub.interrupt(&self.core.state, &self.flag);
    }
}

impl std::fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupter")
            .field("pending", &self.flag.is_pending())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(core: Arc<DeviceCore>, flags: OpenFlags) -> Self {
        let id = core.next_session_id();
        debug!("session {} opened (nonblocking={})", id, flags.nonblocking);
        Self {
            id,
            core,
            nonblocking: flags.nonblocking,
            interrupt: Arc::new(InterruptFlag::default()),
            owner: None,
            async_registered: false,
            released: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }

    /// Switch between blocking and non-blocking reads.
    pub fn set_nonblocking(&mut self, nonblocking: bool) {
        self.nonblocking = nonblocking;
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            core: Arc::clone(&self.core),
            flag: Arc::clone(&self.interrupt),
        }
    }

    /// Read up to `buf.len()` bytes using the session's blocking mode.
    pub fn read(&self, buf: &mut [u8]) -> DeviceResult<usize> {
        self.read_with(buf, !self.nonblocking)
    }

    /// Read up to `buf.len()` bytes, blocking or not regardless of the open mode.
    ///
    /// Short reads are normal. An empty `buf` still waits for the fifo like
    /// any other read, then returns `Ok(0)` and leaves the data in place.
    pub fn read_with(&self, buf: &mut [u8], blocking: bool) -> DeviceResult<usize> {
        let mut state = self.core.state.lock();
        match self
            .core
            .hub
            .wait_until_nonempty(&mut state, blocking, &self.interrupt)
        {
            WaitOutcome::Ready => {}
            WaitOutcome::WouldBlock => return Err(DeviceError::WouldBlock),
            WaitOutcome::Interrupted => {
                debug!("session {} read interrupted", self.id);
                return Err(DeviceError::Interrupted);
            }
        }

        let n = state.fifo.pop_into(buf);
        state.stats.bytes_read += n as u64;
        trace!("session {} read {} byte(s)", self.id, n);
        Ok(n)
    }

    /// Convenience wrapper returning the bytes read.
    pub fn read_up_to(&self, max_len: usize) -> DeviceResult<Vec<u8>> {
        let mut buf = vec![0u8; max_len];
        let n = self.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Accept bytes for transmission.
    ///
    /// There is no transmit path: the whole buffer is accepted, counted and
    /// discarded. Never blocks, never fails.
    pub fn write(&self, data: &[u8]) -> DeviceResult<usize> {
        let mut state = self.core.state.lock();
        state.stats.bytes_written += data.len() as u64;
        trace!("session {} wrote {} byte(s) to the sink", self.id, data.len());
        Ok(data.len())
    }

    /// Read into each segment in turn.
    ///
    /// Stops at the first failing segment. Returns the accumulated total if
    /// anything was read, otherwise the failure.
    pub fn read_vectored(&self, bufs: &mut [IoSliceMut<'_>]) -> DeviceResult<usize> {
        let mut total = 0;
        for buf in bufs.iter_mut() {
            match self.read(buf) {
                Ok(n) => total += n,
                Err(e) if total == 0 => return Err(e),
                Err(_) => break,
            }
        }
        Ok(total)
    }

    /// Write each segment in turn, with the same accounting as
    /// [`read_vectored`](Self::read_vectored).
    pub fn write_vectored(&self, bufs: &[IoSlice<'_>]) -> DeviceResult<usize> {
        let mut total = 0;
        for buf in bufs {
            match self.write(buf) {
                Ok(n) => total += n,
                Err(e) if total == 0 => return Err(e),
                Err(_) => break,
            }
        }
        Ok(total)
    }

    /// Apply a typed control request.
    pub fn control(&self, cmd: ControlCommand) -> ControlReply {
        let mut state = self.core.state.lock();
        match cmd {
            ControlCommand::SetBaud(baud) => {
                state.line.baud = baud;
                debug!("session {} set baud {}", self.id, baud);
                ControlReply::Done
            }
            ControlCommand::GetBaud => ControlReply::Baud(state.line.baud),
            ControlCommand::SetLineFormat(fmt) => {
                state.line.format = fmt;
                debug!("session {} set line format {:?}", self.id, fmt);
                ControlReply::Done
            }
            ControlCommand::GetLineFormat => ControlReply::LineFormat(state.line.format),
        }
    }

    /// Raw control entry point: `arg` carries the input payload and receives
    /// the output payload.
    pub fn ioctl(&self, code: u32, arg: &mut [u8]) -> DeviceResult<()> {
        let cmd = ControlCommand::decode(code, arg)?;
        self.control(cmd).encode_into(arg)
    }

    pub fn baud(&self) -> u32 {
        self.core.state.lock().line.baud
    }

    pub fn set_baud(&self, baud: u32) {
        self.control(ControlCommand::SetBaud(baud));
    }

    pub fn line_format(&self) -> LineFormat {
        self.core.state.lock().line.format
    }

    pub fn set_line_format(&self, format: LineFormat) {
        self.control(ControlCommand::SetLineFormat(format));
    }

    /// Current readiness, without registering for wake-ups.
    pub fn poll(&self) -> Readiness {
        let mut state = self.core.state.lock();
        self.core.hub.poll_readiness(&mut state, None)
    }

    /// Readiness check that registers `cx`'s waker for the next notify.
    pub fn poll_ready(&self, cx: &mut Context<'_>) -> Readiness {
        let mut state = self.core.state.lock();
        self.core.hub.poll_readiness(&mut state, Some(cx.waker()))
    }

    /// Resolve once the fifo is readable.
    pub async fn readable(&self) {
        std::future::poll_fn(|cx| {
            if self.poll_ready(cx).readable {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }

    /// Set the recipient of this session's input-ready signals.
    ///
    /// Replaces a registered recipient immediately if async delivery is on.
    pub fn set_signal_owner(&mut self, listener: Arc<dyn SignalListener>) {
        if self.async_registered {
            let mut state = self.core.state.lock();
            self.core
                .hub
                .register_listener(&mut state, self.id, Arc::clone(&listener));
        }
        self.owner = Some(listener);
    }

    /// Turn asynchronous input-ready signals on or off for this session.
    ///
    /// Enabling requires a signal owner set via
    /// [`set_signal_owner`](Self::set_signal_owner).
    pub fn register_async(&mut self, on: bool) -> DeviceResult<()> {
        let mut state = self.core.state.lock();
        if on {
            let owner = self
                .owner
                .as_ref()
                .ok_or(DeviceError::InvalidCommand("no signal owner set"))?;
            self.core
                .hub
                .register_listener(&mut state, self.id, Arc::clone(owner));
        } else {
            self.core.hub.unregister_listener(&mut state, self.id);
        }
        self.async_registered = on;
        debug!("session {} async notification {}", self.id, if on { "on" } else { "off" });
        Ok(())
    }

    pub fn is_async_registered(&self) -> bool {
        self.async_registered
    }

    /// Close the session and release the device.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        if self.async_registered {
            let mut state = self.core.state.lock();
            self.core.hub.unregister_listener(&mut state, self.id);
            self.async_registered = false;
        }
        self.core.gate.release();
        self.released = true;
        debug!("session {} closed", self.id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::io::Read for Session {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Session::read(self, buf).map_err(Into::into)
    }

    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> std::io::Result<usize> {
        Session::read_vectored(self, bufs).map_err(Into::into)
    }
}

impl std::io::Write for Session {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Session::write(self, buf).map_err(Into::into)
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> std::io::Result<usize> {
        Session::write_vectored(self, bufs).map_err(Into::into)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("nonblocking", &self.nonblocking)
            .field("async_registered", &self.async_registered)
            .finish()
    }
}
