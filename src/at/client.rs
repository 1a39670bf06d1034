use core::fmt::Write as _;

use heapless::String;

use super::transport::{Prefixed, parse_error_code};
use super::{
    AtConfig, COMMAND_BUFFER_SIZE, RESULT_BUFFER_SIZE, ResponseBuffer, STR_BUSY, STR_ERROR,
    STR_OK, Transport, contains, find, trim,
};
use crate::error::Error;
use crate::serial::{Clock, Deadline, Serial};

/// Terminal classification of one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Ok { marker_seen: bool },
    Busy,
}

/// Executes AT commands against one device.
///
/// The client owns the [`Transport`], the outgoing command line and the
/// result token. Tokens returned by [`AtClient::query`] and
/// [`AtClient::send_command_async`] borrow the client and so cannot outlive
/// the next command.
#[derive(Debug)]
pub struct AtClient<S, C> {
    transport: Transport<S, C>,
    config: AtConfig,
    command: String<COMMAND_BUFFER_SIZE>,
    result: String<RESULT_BUFFER_SIZE>,
}

impl<S: Serial, C: Clock> AtClient<S, C> {
    /// Creates a client on top of a serial port and a clock.
    pub fn new(serial: S, clock: C, config: AtConfig) -> Self {
        Self {
            transport: Transport::new(serial, clock),
            config,
            command: String::new(),
            result: String::new(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &AtConfig {
        &self.config
    }

    /// Replaces the configuration.
    pub fn set_config(&mut self, config: AtConfig) {
        self.config = config;
    }

    /// The underlying transport.
    pub fn transport_mut(&mut self) -> &mut Transport<S, C> {
        &mut self.transport
    }

    /// Releases the serial port and the clock.
    pub fn into_parts(self) -> (S, C) {
        self.transport.into_parts()
    }

    /// Lines kept from the last reply.
    pub fn response(&self) -> &ResponseBuffer {
        self.transport.buffer()
    }

    /// The last command line sent, without `\r\n`.
    pub fn last_command(&self) -> &str {
        self.command.trim_end()
    }

    /// Current time in milliseconds.
    pub fn now_ms(&mut self) -> u32 {
        self.transport.now_ms()
    }

    /// Blocks for `ms` milliseconds.
    pub fn delay_ms(&mut self, ms: u32) {
        self.transport.delay_ms(ms);
    }

    /// Sends `AT<command><params>` and waits for `OK` within the default timeout.
    pub fn send_command(&mut self, command: &str, params: &str) -> Result<(), Error> {
        self.send_command_timeout(command, params, self.config.command_timeout_ms)
    }

    /// Sends `AT<command><params>` and waits for `OK` within `timeout_ms`.
    pub fn send_command_timeout(
        &mut self,
        command: &str,
        params: &str,
        timeout_ms: u32,
    ) -> Result<(), Error> {
        self.execute(command, params, None, timeout_ms).map(|_| ())
    }

    /// Sends a command and returns the value of its `<command>:` line.
    ///
    /// ```rust,no_run
    /// # use libespat::at::{AtClient, AtConfig};
    /// # fn demo<S: libespat::serial::Serial, C: libespat::serial::Clock>(
    /// #     at: &mut AtClient<S, C>,
    /// # ) -> Result<(), libespat::Error> {
    /// // AT+SYSLOG?  ->  +SYSLOG:1 / OK
    /// let level = at.query("+SYSLOG", "?")?;
    /// assert_eq!(level, "1");
    /// # Ok(())
    /// # }
    /// ```
    pub fn query(&mut self, command: &str, params: &str) -> Result<&str, Error> {
        self.query_timeout(command, params, self.config.command_timeout_ms)
    }

    /// [`AtClient::query`] with an explicit timeout.
    pub fn query_timeout(
        &mut self,
        command: &str,
        params: &str,
        timeout_ms: u32,
    ) -> Result<&str, Error> {
        self.execute(command, params, None, timeout_ms)?;

        let mut found = None;
        for line in self.transport.buffer().lines() {
            if let Some(value) = token_after(line, command.as_bytes()) {
                found = Some(value);
                break;
            }
        }
        let value = found.ok_or(Error::Protocol)?;
        store_token(&mut self.result, value)?;
        Ok(self.result.as_str())
    }

    /// Sends a command whose confirmation may arrive out of band.
    ///
    /// `marker` is the prefix of the confirmation line, for instance
    /// `+MQTTCONNECTED:`. It may show up before or after `OK`. If it has not
    /// appeared by the time `OK` is read, the remainder of the timeout is
    /// spent waiting for it. On success the text following the marker is
    /// returned.
    ///
    /// # Errors
    ///
    /// * [`Error::Timeout`] if the command itself got no terminal reply
    /// * [`Error::AsyncTimeout`] if `OK` arrived but the marker did not
    pub fn send_command_async(
        &mut self,
        command: &str,
        params: &str,
        marker: &str,
        timeout_ms: u32,
    ) -> Result<&str, Error> {
        let deadline = self.transport.deadline(timeout_ms);
        let seen = self.execute_until(command, params, Some(marker.as_bytes()), &deadline)?;

        if !seen {
            let remaining = self.transport.remaining(&deadline);
            debug!("waiting {}ms for async marker", remaining);
            self.transport
                .wait_string(marker.as_bytes(), remaining)
                .map_err(|e| match e {
                    Error::Timeout => Error::AsyncTimeout,
                    other => other,
                })?;
        }

        let mut found = None;
        for line in self.transport.buffer().lines() {
            if let Some(at) = find(line, marker.as_bytes()) {
                found = Some(&line[at + marker.len()..]);
            }
        }
        let value = found.ok_or(Error::Protocol)?;
        store_token(&mut self.result, value)?;
        Ok(self.result.as_str())
    }

    /// Sends a command that is answered by a `>` prompt, then writes `payload`.
    ///
    /// Whatever the device sends after the payload is left for the caller.
    pub fn send_with_payload(
        &mut self,
        command: &str,
        params: &str,
        payload: &[u8],
        timeout_ms: u32,
    ) -> Result<(), Error> {
        self.execute(command, params, None, timeout_ms)?;
        self.transport.wait_prompt(self.config.prompt_timeout_ms)?;
        debug!("-> {} raw bytes", payload.len());
        self.transport.send_raw(payload)
    }

    /// Reads a reply terminated by `OK` or `ERROR` without sending anything.
    ///
    /// Only a line reading exactly `OK` or `ERROR` once trimmed ends the
    /// reply, so status lines such as `SEND OK` are skipped.
    pub fn wait_ok(&mut self, timeout_ms: u32) -> Result<(), Error> {
        let deadline = self.transport.deadline(timeout_ms);
        match self.wait_reply(&deadline, None, false)? {
            Reply::Ok { .. } => Ok(()),
            Reply::Busy => Err(Error::Protocol),
        }
    }

    /// Reads lines until one contains `pattern` and returns that line.
    pub fn wait_string(&mut self, pattern: &str, timeout_ms: u32) -> Result<&[u8], Error> {
        self.transport.clear();
        self.transport.wait_string(pattern.as_bytes(), timeout_ms)?;
        Ok(self.transport.last_line())
    }

    /// Sends a command answered by `<marker><len>,<len raw bytes>` and `OK`.
    ///
    /// The raw bytes are copied into `dest`; the count is returned.
    pub fn read_binary(
        &mut self,
        command: &str,
        params: &str,
        marker: &str,
        dest: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize, Error> {
        let deadline = self.transport.deadline(timeout_ms);
        loop {
            self.transport.clear();
            self.write_command(command, params)?;
            let remaining = self.transport.remaining(&deadline);
            match self.transport.read_prefixed(marker.as_bytes(), dest, remaining) {
                Ok(Prefixed::Data(len)) => {
                    let remaining = self.transport.remaining(&deadline);
                    self.wait_ok(remaining)?;
                    return Ok(len);
                }
                Ok(Prefixed::Busy) => self.back_off(&deadline)?,
                Err(Error::BufferOverflow) => {
                    // Payload was consumed; drain the terminal line too.
                    let remaining = self.transport.remaining(&deadline);
                    self.wait_ok(remaining)?;
                    return Err(Error::BufferOverflow);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Writes raw bytes to the port.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.transport.send_raw(bytes)
    }

    /// Writes a string verbatim, no `AT` prefix or line ending is added.
    pub fn send_str(&mut self, text: &str) -> Result<(), Error> {
        self.transport.send_str(text)
    }

    fn execute(
        &mut self,
        command: &str,
        params: &str,
        marker: Option<&[u8]>,
        timeout_ms: u32,
    ) -> Result<bool, Error> {
        let deadline = self.transport.deadline(timeout_ms);
        self.execute_until(command, params, marker, &deadline)
    }

    fn execute_until(
        &mut self,
        command: &str,
        params: &str,
        marker: Option<&[u8]>,
        deadline: &Deadline,
    ) -> Result<bool, Error> {
        loop {
            self.transport.clear();
            self.write_command(command, params)?;
            match self.wait_reply(deadline, marker, true)? {
                Reply::Ok { marker_seen } => return Ok(marker_seen),
                Reply::Busy => self.back_off(deadline)?,
            }
        }
    }

    fn back_off(&mut self, deadline: &Deadline) -> Result<(), Error> {
        let delay = self.config.busy_retry_delay_ms;
        if self.transport.remaining(deadline) <= delay {
            warn!("device busy until deadline");
            return Err(Error::Timeout);
        }
        debug!("device busy, retrying in {}ms", delay);
        self.transport.delay_ms(delay);
        Ok(())
    }

    fn write_command(&mut self, command: &str, params: &str) -> Result<(), Error> {
        self.command.clear();
        write!(self.command, "AT{}{}\r\n", command, params).map_err(|_| Error::BufferOverflow)?;
        debug!("-> {=str}", self.command.trim_end());
        self.transport.send_str(&self.command)
    }

    /// Reads lines until `OK`, `ERROR` or a busy marker.
    ///
    /// Only information lines (`+...`) and marker lines are kept in the
    /// buffer; echo and status lines are dropped as they are read. When
    /// `retryable` is false a busy line is treated like any other line.
    ///
    /// A line is terminal only when it is exactly `OK` or `ERROR` after
    /// trimming. `SEND OK` or `SEND ERROR` never end the reply.
    fn wait_reply(
        &mut self,
        deadline: &Deadline,
        marker: Option<&[u8]>,
        retryable: bool,
    ) -> Result<Reply, Error> {
        let mut code = None;
        let mut marker_seen = false;
        let mut overflow = false;

        loop {
            let remaining = self.transport.remaining(deadline);
            if remaining == 0 {
                return Err(Error::Timeout);
            }
            match self.transport.read_line(remaining) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(Error::BufferOverflow) => {
                    overflow = true;
                    continue;
                }
                Err(e) => return Err(e),
            }

            let line = self.transport.last_line();
            if retryable && contains(line, STR_BUSY) {
                return Ok(Reply::Busy);
            }
            if let Some(c) = parse_error_code(line) {
                debug!("device error code {}", c.0);
                code = Some(c);
                self.transport.discard_last_line();
                continue;
            }

            let status = trim(line);
            if status == STR_OK {
                self.transport.discard_last_line();
                if overflow {
                    return Err(Error::BufferOverflow);
                }
                return Ok(Reply::Ok { marker_seen });
            }
            if status == STR_ERROR {
                self.transport.discard_last_line();
                return Err(match code {
                    Some(c) if !c.is_ok() => Error::Device(c),
                    _ => Error::Common,
                });
            }

            let is_marker = marker.is_some_and(|m| contains(line, m));
            marker_seen |= is_marker;
            if !is_marker && line.first() != Some(&b'+') {
                self.transport.discard_last_line();
            }
        }
    }
}

/// Value of a `<command>:<value>` line, `None` for any other line.
fn token_after<'a>(line: &'a [u8], command: &[u8]) -> Option<&'a [u8]> {
    let rest = line.strip_prefix(command)?;
    rest.strip_prefix(b":")
}

fn store_token(result: &mut String<RESULT_BUFFER_SIZE>, value: &[u8]) -> Result<(), Error> {
    let text = core::str::from_utf8(value).map_err(|_| Error::Protocol)?;
    result.clear();
    result.push_str(text).map_err(|_| Error::BufferOverflow)
}
