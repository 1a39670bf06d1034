//! Line framing over a [`Serial`] port.
//!
//! The transport strips `\r` and `\n` from incoming bytes and stores each
//! complete line in the [`ResponseBuffer`]. Every wait is bounded by a
//! deadline taken from the [`Clock`] at entry; nothing here retries, that
//! policy belongs to the dispatcher.

use super::buffer::ResponseBuffer;
use super::{PROMPT, STR_ERR_CODE, STR_ERROR, contains, trim};
use crate::error::{Error, StatusCode};
use crate::serial::{Clock, Deadline, Serial};

/// Outcome of a length-prefixed binary read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Prefixed {
    /// This many bytes were copied into the destination.
    Data(usize),
    /// The device rejected the command as busy.
    Busy,
}

/// Serial port, clock and reply buffer of one device.
#[derive(Debug)]
pub struct Transport<S, C> {
    serial: S,
    clock: C,
    buffer: ResponseBuffer,
    line_start: usize,
}

impl<S: Serial, C: Clock> Transport<S, C> {
    /// Wraps a serial port and a clock.
    pub fn new(serial: S, clock: C) -> Self {
        Self {
            serial,
            clock,
            buffer: ResponseBuffer::new(),
            line_start: 0,
        }
    }

    /// Releases the serial port and the clock.
    pub fn into_parts(self) -> (S, C) {
        (self.serial, self.clock)
    }

    /// The serial port.
    pub fn serial(&self) -> &S {
        &self.serial
    }

    /// The serial port, mutably.
    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    /// The clock.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Current time in milliseconds.
    pub fn now_ms(&mut self) -> u32 {
        self.clock.now_ms()
    }

    /// Blocks for `ms` milliseconds.
    pub fn delay_ms(&mut self, ms: u32) {
        self.clock.delay_ms(ms);
    }

    /// Starts a deadline `timeout_ms` from now.
    pub fn deadline(&mut self, timeout_ms: u32) -> Deadline {
        Deadline::start(&mut self.clock, timeout_ms)
    }

    /// Milliseconds left before `deadline` passes.
    pub fn remaining(&mut self, deadline: &Deadline) -> u32 {
        deadline.remaining(&mut self.clock)
    }

    /// The reply buffer.
    pub fn buffer(&self) -> &ResponseBuffer {
        &self.buffer
    }

    /// Empties the reply buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.line_start = 0;
    }

    /// The line captured by the last successful [`Transport::read_line`].
    pub fn last_line(&self) -> &[u8] {
        self.buffer.line_at(self.line_start)
    }

    /// Removes the last captured line from the buffer.
    pub fn discard_last_line(&mut self) {
        self.buffer.truncate(self.line_start);
    }

    /// Bytes that can be read without blocking.
    pub fn available(&mut self) -> usize {
        self.serial.available()
    }

    /// Reads one byte, `Ok(None)` if nothing arrived within `timeout_ms`.
    pub fn read_byte(&mut self, timeout_ms: u32) -> Result<Option<u8>, Error> {
        self.serial.read_byte(timeout_ms).map_err(|_e| {
            error!("serial read failed");
            Error::Serial
        })
    }

    /// Reads one byte, failing with [`Error::Timeout`] once `deadline` passes.
    pub fn read_byte_until(&mut self, deadline: &Deadline) -> Result<u8, Error> {
        loop {
            let remaining = self.remaining(deadline);
            if remaining == 0 {
                return Err(Error::Timeout);
            }
            if let Some(byte) = self.read_byte(remaining)? {
                return Ok(byte);
            }
        }
    }

    /// Reads one line into the buffer.
    ///
    /// Returns the number of data bytes of the line. `Ok(0)` is an empty
    /// line, which is not stored. A timeout rolls back any partial line and
    /// yields [`Error::Timeout`]. A line longer than the free space is read
    /// to its end, dropped, and reported as [`Error::BufferOverflow`].
    pub fn read_line(&mut self, timeout_ms: u32) -> Result<usize, Error> {
        let deadline = self.deadline(timeout_ms);
        let start = self.buffer.len();
        let mut overflow = false;

        loop {
            let byte = match self.read_byte_until(&deadline) {
                Ok(byte) => byte,
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(e);
                }
            };

            match byte {
                b'\r' => {}
                b'\n' => {
                    let len = self.buffer.len() - start;
                    if overflow || (len > 0 && self.buffer.end_line().is_err()) {
                        self.buffer.truncate(start);
                        warn!("reply line dropped, buffer full");
                        return Err(Error::BufferOverflow);
                    }
                    self.line_start = start;
                    if len > 0 {
                        trace!("<- {=[u8]:a}", self.last_line());
                    }
                    return Ok(len);
                }
                b => {
                    if !overflow && self.buffer.push(b).is_err() {
                        overflow = true;
                    }
                }
            }
        }
    }

    /// Reads lines until one contains `pattern`.
    ///
    /// Lines that do not match are dropped. The matching line stays in the
    /// buffer and is available through [`Transport::last_line`].
    pub fn wait_string(&mut self, pattern: &[u8], timeout_ms: u32) -> Result<(), Error> {
        let deadline = self.deadline(timeout_ms);
        loop {
            let remaining = self.remaining(&deadline);
            if remaining == 0 {
                return Err(Error::Timeout);
            }
            match self.read_line(remaining) {
                Ok(0) => {}
                Ok(_) if contains(self.last_line(), pattern) => return Ok(()),
                Ok(_) => self.discard_last_line(),
                Err(Error::BufferOverflow) => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Waits for the `>` prompt that opens a raw data transfer.
    ///
    /// Line endings left over from the preceding reply are skipped; any other
    /// byte is a [`Error::Protocol`] violation.
    pub fn wait_prompt(&mut self, timeout_ms: u32) -> Result<(), Error> {
        let deadline = self.deadline(timeout_ms);
        loop {
            match self.read_byte_until(&deadline)? {
                PROMPT => return Ok(()),
                b'\r' | b'\n' | b' ' => {}
                _other => {
                    warn!("expected prompt, got {=u8:#x}", _other);
                    return Err(Error::Protocol);
                }
            }
        }
    }

    /// Reads a `<marker><decimal length><sep><raw bytes>` reply into `dest`.
    ///
    /// Bytes before the marker are framed as lines so that an `ERROR` or
    /// `ERR CODE:` reply ends the wait early. After the marker the payload is
    /// copied verbatim, CR and LF included. A payload larger than `dest` is
    /// consumed and reported as [`Error::BufferOverflow`].
    pub(crate) fn read_prefixed(
        &mut self,
        marker: &[u8],
        dest: &mut [u8],
        timeout_ms: u32,
    ) -> Result<Prefixed, Error> {
        let deadline = self.deadline(timeout_ms);
        let mut matched = 0;
        let mut code: Option<StatusCode> = None;
        let line_base = self.buffer.len();

        while matched < marker.len() {
            let byte = self.read_byte_until(&deadline)?;
            if byte == marker[matched] {
                matched += 1;
                continue;
            }
            matched = usize::from(byte == marker[0]);

            if byte == b'\n' {
                let line = trim(self.buffer.line_at(line_base));
                if contains(line, super::STR_BUSY) {
                    self.buffer.truncate(line_base);
                    return Ok(Prefixed::Busy);
                }
                if let Some(c) = parse_error_code(line) {
                    code = Some(c);
                } else if line == STR_ERROR {
                    self.buffer.truncate(line_base);
                    return Err(match code {
                        Some(c) if !c.is_ok() => Error::Device(c),
                        _ => Error::Common,
                    });
                }
                self.buffer.truncate(line_base);
            } else if byte != b'\r' && self.buffer.push(byte).is_err() {
                self.buffer.truncate(line_base);
            }
        }
        self.buffer.truncate(line_base);

        let mut len: usize = 0;
        let mut digits = 0;
        loop {
            let byte = self.read_byte_until(&deadline)?;
            if byte.is_ascii_digit() {
                len = len
                    .checked_mul(10)
                    .and_then(|l| l.checked_add(usize::from(byte - b'0')))
                    .ok_or(Error::Protocol)?;
                digits += 1;
            } else {
                break;
            }
        }
        if digits == 0 {
            return Err(Error::Protocol);
        }

        for i in 0..len {
            let byte = self.read_byte_until(&deadline)?;
            if let Some(slot) = dest.get_mut(i) {
                *slot = byte;
            }
        }
        if len > dest.len() {
            warn!("binary reply of {} bytes exceeds destination", len);
            return Err(Error::BufferOverflow);
        }
        Ok(Prefixed::Data(len))
    }

    /// Writes all of `bytes` and flushes.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut sent = 0;
        while sent < bytes.len() {
            let n = self
                .serial
                .write(&bytes[sent..])
                .map_err(|_| Error::Serial)?;
            if n == 0 {
                return Err(Error::Serial);
            }
            sent += n;
        }
        self.serial.flush().map_err(|_| Error::Serial)
    }

    /// Writes a string verbatim.
    pub fn send_str(&mut self, text: &str) -> Result<(), Error> {
        self.send_raw(text.as_bytes())
    }
}

/// Decodes the value of an `ERR CODE:<hex>` line.
pub(crate) fn parse_error_code(line: &[u8]) -> Option<StatusCode> {
    let at = super::find(line, STR_ERR_CODE)?;
    let mut rest = trim(&line[at + STR_ERR_CODE.len()..]);
    if rest.len() >= 2 && rest[0] == b'0' && (rest[1] == b'x' || rest[1] == b'X') {
        rest = &rest[2..];
    }

    let mut value: u32 = 0;
    let mut digits = 0;
    for &b in rest.iter().take_while(|b| b.is_ascii_hexdigit()) {
        if digits == 8 {
            return None;
        }
        let nibble = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            _ => b - b'A' + 10,
        };
        value = (value << 4) | u32::from(nibble);
        digits += 1;
    }
    (digits > 0).then_some(StatusCode(value))
}
