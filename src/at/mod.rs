//! # AT command engine
//!
//! The engine is split in three layers, each owning one concern:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ AtClient       build "AT<cmd><params>\r\n", classify reply  │
//! │                busy retry, ERR CODE, async marker, token    │
//! ├────────────────────────────────────────────────────────────┤
//! │ Transport      read_line / wait_string / wait_prompt /      │
//! │                read_prefixed / send_raw                     │
//! ├────────────────────────────────────────────────────────────┤
//! │ ResponseBuffer fixed-capacity, '|'-delimited lines          │
//! └────────────────────────────────────────────────────────────┘
//!            │                                   ▲
//!            ▼            Serial + Clock         │
//! ```
//!
//! Only one command may be in flight at a time. The response buffer, the
//! command line and the result token are all owned by the [`AtClient`] and
//! are overwritten by the next call, which the borrow checker enforces: a
//! returned token borrows the client.
//!
//! ## Reply grammar
//!
//! A reply is a sequence of `\r\n` terminated lines ending with a line that
//! reads `OK` or `ERROR`. When `AT+SYSLOG=1` is active the device emits an
//! `ERR CODE:0x<hex>` line ahead of `ERROR`; that code wins over the plain
//! error. A line containing `busy p...` means the device did not accept the
//! command and it is sent again after a short delay.
//!
//! ```rust,no_run
//! use libespat::at::{AtClient, AtConfig, Params};
//! # use libespat::serial::{Clock, Serial};
//! # struct Uart;
//! # impl Serial for Uart {
//! #     type Error = ();
//! #     fn read_byte(&mut self, _t: u32) -> Result<Option<u8>, ()> { Ok(None) }
//! #     fn write(&mut self, b: &[u8]) -> Result<usize, ()> { Ok(b.len()) }
//! #     fn flush(&mut self) -> Result<(), ()> { Ok(()) }
//! #     fn available(&mut self) -> usize { 0 }
//! # }
//! # struct Ticks;
//! # impl Clock for Ticks {
//! #     fn now_ms(&mut self) -> u32 { 0 }
//! #     fn delay_ms(&mut self, _ms: u32) {}
//! # }
//!
//! let mut at = AtClient::new(Uart, Ticks, AtConfig::default());
//! let mut params = Params::assign();
//! params.number(1)?;
//! at.send_command("+SYSLOG", params.as_str())?;
//! let level = at.query("+SYSLOG", "?")?;
//! # Ok::<(), libespat::Error>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Fixed-capacity reply storage.
pub mod buffer;
/// Command dispatcher.
pub mod client;
/// Command parameter builder.
pub mod params;
/// Line framing on top of the serial port.
pub mod transport;


pub use buffer::ResponseBuffer;
pub use client::AtClient;
pub use params::Params;
pub use transport::Transport;

/// Capacity of the response buffer in bytes.
pub const RESPONSE_BUFFER_SIZE: usize = 1024;
/// Capacity of one outgoing command line, including `AT` and `\r\n`.
pub const COMMAND_BUFFER_SIZE: usize = 512;
/// Capacity of a parameter string built with [`Params`].
pub const PARAMS_BUFFER_SIZE: usize = 512;
/// Capacity of a result token returned by [`AtClient::query`].
pub const RESULT_BUFFER_SIZE: usize = 128;

/// Separator stored between lines in the response buffer.
pub const LINE_DELIMITER: u8 = b'|';

pub(crate) const STR_OK: &[u8] = b"OK";
pub(crate) const STR_ERROR: &[u8] = b"ERROR";
pub(crate) const STR_ERR_CODE: &[u8] = b"ERR CODE:";
pub(crate) const STR_BUSY: &[u8] = b"busy p...";
pub(crate) const PROMPT: u8 = b'>';

/// Timing configuration of the AT engine.
///
/// Every field has a default matching the firmware's documented behaviour,
/// so a partial JSON document is enough:
///
/// ```rust
/// use libespat::at::AtConfig;
///
/// let config = AtConfig::from_json(br#"{"command_timeout_ms": 5000}"#).unwrap();
/// assert_eq!(config.command_timeout_ms, 5000);
/// assert_eq!(config.busy_retry_delay_ms, 250);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtConfig {
    /// Deadline for a whole command cycle, busy retries included.
    pub command_timeout_ms: u32,
    /// Deadline for one line inside a binary reply.
    pub line_timeout_ms: u32,
    /// Pause before a command rejected as busy is sent again.
    pub busy_retry_delay_ms: u32,
    /// Deadline for the `>` data prompt.
    pub prompt_timeout_ms: u32,
    /// Deadline for the `+MQTTPUB:` line after a raw publish.
    pub publish_confirm_timeout_ms: u32,
    /// Per-byte deadline while decoding an unsolicited message.
    pub urc_byte_timeout_ms: u32,
    /// Deadline for `AT+SYSFLASH` reads and writes.
    pub flash_timeout_ms: u32,
    /// Interval between `AT+CIPSNTPTIME?` polls until the time is valid.
    pub ntp_poll_interval_ms: u32,
}

impl Default for AtConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 10_000,
            line_timeout_ms: 2_000,
            busy_retry_delay_ms: 250,
            prompt_timeout_ms: 2_000,
            publish_confirm_timeout_ms: 2_000,
            urc_byte_timeout_ms: 500,
            flash_timeout_ms: 2_000,
            ntp_poll_interval_ms: 1_000,
        }
    }
}

impl AtConfig {
    /// Parses a configuration from a JSON document.
    ///
    /// Missing fields keep their defaults.
    pub fn from_json(json: &[u8]) -> Result<Self, Error> {
        serde_json_core::from_slice::<Self>(json)
            .map(|(config, _)| config)
            .map_err(|_| Error::InvalidParameter)
    }
}

/// Returns `true` if `needle` occurs anywhere in `haystack`.
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

/// Position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Strips leading and trailing ASCII whitespace.
pub(crate) fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}
