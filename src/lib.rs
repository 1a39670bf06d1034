//! # libespat - ESP-AT driver
//!
//! A `no_std` driver for Espressif co-processors running the ESP-AT
//! firmware. The host talks to the module over a plain UART; this crate
//! frames that byte stream into command replies, runs the firmware's MQTT
//! client and manages the certificate partitions it authenticates with.
//!
//! ## Layers
//!
//! ```text
//! ┌───────────────────────────────┐  ┌──────────────────────────────┐
//! │ mqtt::MqttClient              │  │ pki::PkiStore                │
//! │ configure, connect, publish,  │  │ read, compare, write, update │
//! │ subscribe, process() URCs     │  │ one item per partition       │
//! └───────────────┬───────────────┘  └──────────────┬───────────────┘
//!                 │                                 │ storage traits
//!                 │                    ┌────────────┴───────────────┐
//!                 │                    │ pki::SysFlash (AT+SYSFLASH) │
//!                 ▼                    └────────────┬───────────────┘
//! ┌─────────────────────────────────────────────────┴───────────────┐
//! │ at::AtClient  busy retry, ERR CODE, async markers, result token │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ at::Transport line framing, prompts, length-prefixed binary     │
//! └────────────────────────────────┬────────────────────────────────┘
//!                                  ▼
//!                     serial::Serial + serial::Clock
//! ```
//!
//! All buffers have fixed capacity and report [`Error::BufferOverflow`]
//! instead of truncating. Every operation returns a [`Result`]; the
//! [`Error::code`] of a failure lives in the same 32-bit space the firmware
//! uses for its own error codes.
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Log through `defmt` and implement `defmt::Format` for public types

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

/// AT command engine: line transport, reply classification and parameters.
pub mod at;

/// Unified status codes and the crate error type.
pub mod error;

/// MQTT session layer on top of the firmware's `AT+MQTT*` commands.
///
/// Configuration, connection handling, publish and subscribe, plus the
/// decoder for messages the device pushes on its own.
pub mod mqtt;

/// Certificate and key partitions used by the MQTT client.
pub mod pki;

/// Serial port and clock collaborators.
pub mod serial;

/// Storage traits shared by the PKI codec and its backends.
pub mod storage;

pub use error::{Error, StatusCode};
