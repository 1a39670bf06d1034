//! Unified status codes and the crate-wide error type.
//!
//! The device reports failures in a 32-bit space laid out as
//! `(class << 16) | detail`. The class byte identifies a generic AT
//! transport condition; the low half carries a subsystem detail such as an
//! MQTT error from the firmware table. [`StatusCode`] keeps that layout so
//! callers can split a code with [`StatusCode::at_error`] and
//! [`StatusCode::mqtt_error`], while [`Error`] is what every fallible
//! operation in this crate returns.
//!
//! ```rust
//! use libespat::error::{Error, StatusCode};
//! use libespat::mqtt::MqttError;
//!
//! let code = Error::Mqtt(MqttError::TopicIsOverlength).code();
//! assert_eq!(code.at_error(), StatusCode::CMD_PROCESSING.at_error());
//! assert_eq!(code.mqtt_error(), 0x6043);
//! ```

use crate::mqtt::MqttError;

/// A status value in the device's unified `(class << 16) | detail` space.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Success.
    pub const OK: Self = Self(0);
    /// Generic failure, the device answered `ERROR` without a code.
    pub const COMMON_ERROR: Self = Self(0x0101_0000);
    /// The command line had no terminator.
    pub const NO_TERMINATOR: Self = Self(0x0102_0000);
    /// The command did not start with `AT`.
    pub const NO_AT: Self = Self(0x0103_0000);
    /// Parameter count or length mismatch.
    pub const PARA_LENGTH_MISMATCH: Self = Self(0x0104_0000);
    /// Parameter type mismatch.
    pub const PARA_TYPE_MISMATCH: Self = Self(0x0105_0000);
    /// Wrong number of parameters.
    pub const PARA_NUM_MISMATCH: Self = Self(0x0106_0000);
    /// A parameter was out of range.
    pub const PARA_INVALID: Self = Self(0x0107_0000);
    /// A parameter could not be parsed.
    pub const PARA_PARSE_FAIL: Self = Self(0x0108_0000);
    /// The command is not supported by the firmware.
    pub const UNSUPPORT_CMD: Self = Self(0x0109_0000);
    /// The command failed to execute.
    pub const CMD_EXEC_FAIL: Self = Self(0x010a_0000);
    /// The command failed while processing, detail carries the subsystem code.
    pub const CMD_PROCESSING: Self = Self(0x010b_0000);
    /// The command failed in an operation step.
    pub const CMD_OP_ERROR: Self = Self(0x010c_0000);
    /// The reply violated the expected protocol.
    pub const CMD_ERROR: Self = Self(0x010d_0000);
    /// No terminal reply within the deadline.
    pub const CMD_TIMEOUT: Self = Self(0x010e_0000);
    /// Synchronous confirmation received.
    pub const CONN_SYNCH: Self = Self(0x010f_0000);
    /// Confirmation is pending and will arrive out of band.
    pub const CONN_ASYNCH: Self = Self(0x0110_0000);
    /// The device was busy, the command should be retried.
    pub const CMD_RETRY: Self = Self(0x0111_0000);
    /// The PKI partition does not carry a valid header.
    pub const INVALID_PKI_PART: Self = Self(0x0112_0000);
    /// A fixed-capacity buffer would have overflowed.
    pub const BUFFER_OVERFLOW: Self = Self(0x0113_0000);
    /// The serial port reported a fault.
    pub const SERIAL_FAULT: Self = Self(0x0114_0000);
    /// The command was accepted but its asynchronous marker never arrived.
    pub const ASYNC_TIMEOUT: Self = Self(0x0115_0000);

    /// Class part of the code, bits 16..24.
    pub const fn at_error(self) -> u32 {
        self.0 & 0x00ff_0000
    }

    /// Subsystem detail, the low 16 bits.
    pub const fn mqtt_error(self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    /// Returns this class combined with a subsystem detail.
    pub const fn with_detail(self, detail: u16) -> Self {
        Self((self.0 & 0xffff_0000) | detail as u32)
    }

    /// Returns `true` for [`StatusCode::OK`].
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for StatusCode {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "StatusCode({=u32:#010x})", self.0)
    }
}

/// The error type returned by every operation in this crate.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// No terminal reply arrived within the deadline. Busy replies that
    /// exhaust the deadline also end up here.
    Timeout,
    /// The command itself was accepted but its asynchronous marker did not
    /// arrive within the follow-up window.
    AsyncTimeout,
    /// The device answered `ERROR` without an error code.
    Common,
    /// The device reported an `ERR CODE:` value.
    Device(StatusCode),
    /// A reply did not follow the expected shape.
    Protocol,
    /// A local MQTT validation failed or the device reported an MQTT failure.
    Mqtt(MqttError),
    /// The operation requires a connected MQTT session.
    Disconnected,
    /// The PKI partition does not start with the file magic.
    InvalidPartition,
    /// A parameter was rejected before anything was sent.
    InvalidParameter,
    /// The caller's buffer cannot hold the stored item.
    BufferTooSmall,
    /// A fixed-capacity internal buffer would have overflowed.
    BufferOverflow,
    /// The serial port failed.
    Serial,
}

impl Error {
    /// Maps the error into the unified status space.
    pub fn code(&self) -> StatusCode {
        match *self {
            Error::Timeout => StatusCode::CMD_TIMEOUT,
            Error::AsyncTimeout => StatusCode::ASYNC_TIMEOUT,
            Error::Common => StatusCode::COMMON_ERROR,
            Error::Device(code) => code,
            Error::Protocol => StatusCode::CMD_ERROR,
            Error::Mqtt(e) => StatusCode::CMD_PROCESSING.with_detail(e as u16),
            Error::Disconnected => {
                StatusCode::CMD_PROCESSING.with_detail(MqttError::InDisconnectedState as u16)
            }
            Error::InvalidPartition => StatusCode::INVALID_PKI_PART,
            Error::InvalidParameter => StatusCode::PARA_INVALID,
            Error::BufferTooSmall => StatusCode::PARA_NUM_MISMATCH,
            Error::BufferOverflow => StatusCode::BUFFER_OVERFLOW,
            Error::Serial => StatusCode::SERIAL_FAULT,
        }
    }
}

impl From<Error> for StatusCode {
    fn from(error: Error) -> Self {
        error.code()
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Timeout => f.write_str("command timed out"),
            Error::AsyncTimeout => f.write_str("asynchronous confirmation timed out"),
            Error::Common => f.write_str("device reported ERROR"),
            Error::Device(code) => write!(f, "device error code {:#010x}", code.0),
            Error::Protocol => f.write_str("unexpected reply"),
            Error::Mqtt(e) => write!(f, "mqtt error {:#06x}", *e as u16),
            Error::Disconnected => f.write_str("mqtt session not connected"),
            Error::InvalidPartition => f.write_str("invalid pki partition"),
            Error::InvalidParameter => f.write_str("invalid parameter"),
            Error::BufferTooSmall => f.write_str("destination buffer too small"),
            Error::BufferOverflow => f.write_str("internal buffer overflow"),
            Error::Serial => f.write_str("serial port fault"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::AsyncTimeout => defmt::write!(f, "AsyncTimeout"),
            Error::Common => defmt::write!(f, "Common"),
            Error::Device(code) => defmt::write!(f, "Device({})", code),
            Error::Protocol => defmt::write!(f, "Protocol"),
            Error::Mqtt(e) => defmt::write!(f, "Mqtt({})", e),
            Error::Disconnected => defmt::write!(f, "Disconnected"),
            Error::InvalidPartition => defmt::write!(f, "InvalidPartition"),
            Error::InvalidParameter => defmt::write!(f, "InvalidParameter"),
            Error::BufferTooSmall => defmt::write!(f, "BufferTooSmall"),
            Error::BufferOverflow => defmt::write!(f, "BufferOverflow"),
            Error::Serial => defmt::write!(f, "Serial"),
        }
    }
}
