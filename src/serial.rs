//! Collaborator traits for the serial link and the time base.
//!
//! The driver never touches hardware directly. It consumes a [`Serial`]
//! port offering a blocking single-byte read with timeout, block writes and
//! an "available bytes" query, plus a [`Clock`] that provides a monotonic
//! millisecond counter and a delay. Any UART driver, a USB CDC bridge or a
//! test double can implement both.
//!
//! ```rust
//! use libespat::serial::{Clock, Serial};
//!
//! struct Loopback {
//!     rx: heapless::Deque<u8, 64>,
//! }
//!
//! impl Serial for Loopback {
//!     type Error = ();
//!
//!     fn read_byte(&mut self, _timeout_ms: u32) -> Result<Option<u8>, Self::Error> {
//!         Ok(self.rx.pop_front())
//!     }
//!
//!     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
//!         for &b in buf {
//!             self.rx.push_back(b).map_err(|_| ())?;
//!         }
//!         Ok(buf.len())
//!     }
//!
//!     fn flush(&mut self) -> Result<(), Self::Error> {
//!         Ok(())
//!     }
//!
//!     fn available(&mut self) -> usize {
//!         self.rx.len()
//!     }
//! }
//! ```

/// A byte-stream duplex channel to the co-processor.
pub trait Serial {
    /// Error reported by the underlying port.
    type Error: core::fmt::Debug;

    /// Reads one byte, blocking for at most `timeout_ms`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    fn read_byte(&mut self, timeout_ms: u32) -> Result<Option<u8>, Self::Error>;

    /// Writes as many bytes from `buf` as the port accepts.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;

    /// Blocks until all written bytes have left the port.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Number of received bytes that can be read without blocking.
    fn available(&mut self) -> usize;
}

/// Monotonic millisecond time base.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch. Wraps on overflow.
    fn now_ms(&mut self) -> u32;

    /// Blocks for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// A wall-clock deadline computed at the start of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    start: u32,
    timeout_ms: u32,
}

impl Deadline {
    /// Starts a deadline `timeout_ms` from now.
    pub fn start<C: Clock>(clock: &mut C, timeout_ms: u32) -> Self {
        Self {
            start: clock.now_ms(),
            timeout_ms,
        }
    }

    /// Milliseconds elapsed since the deadline started.
    pub fn elapsed<C: Clock>(&self, clock: &mut C) -> u32 {
        clock.now_ms().wrapping_sub(self.start)
    }

    /// Returns `true` once the deadline has passed.
    pub fn expired<C: Clock>(&self, clock: &mut C) -> bool {
        self.elapsed(clock) >= self.timeout_ms
    }

    /// Milliseconds left, zero once expired.
    pub fn remaining<C: Clock>(&self, clock: &mut C) -> u32 {
        self.timeout_ms.saturating_sub(self.elapsed(clock))
    }
}
