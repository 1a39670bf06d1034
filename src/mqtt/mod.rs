//! # MQTT over AT
//!
//! The ESP-AT firmware runs the MQTT client itself; this module drives it
//! with the `AT+MQTT*` command family and decodes the unsolicited messages
//! it pushes back.
//!
//! ## Connection states
//!
//! ```text
//!                  connect()
//!  Unconnected ─────────────────► Pending ──── +MQTTCONNECTED: ───► Connected
//!       ▲                            │   (seen before OK: immediate)     │
//!       │                            │                                   │
//!       └────── close() / begin() ───┴───────────────────────────────────┘
//! ```
//!
//! Publish, subscribe, unsubscribe and close require [`ConnectionState::Connected`]
//! and fail with [`Error::Disconnected`](crate::Error::Disconnected) otherwise,
//! without sending anything.
//!
//! ## Unsolicited messages
//!
//! [`MqttClient::process`] must be called from the main loop. It decodes
//! subscription deliveries, connection and disconnection notices and NTP
//! time reports, and hands them to the [`EventHandler`] on the caller's
//! thread.
//!
//! ```rust,no_run
//! use libespat::at::{AtClient, AtConfig};
//! use libespat::mqtt::{ConnectStatus, EventHandler, MqttClient, QoS, DEFAULT_LINK_ID};
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
//! struct Printer;
//!
//! impl EventHandler for Printer {
//!     fn on_message(&mut self, topic: &str, payload: &[u8]) {
//!         let _ = (topic, payload);
//!     }
//! }
//!
//! let at = AtClient::new(Uart, Ticks, AtConfig::default());
//! let mut mqtt = MqttClient::new(at, Printer);
//! mqtt.begin()?;
//! if mqtt.connect(DEFAULT_LINK_ID, "broker.local", 1883, true, 5_000)? == ConnectStatus::Pending {
//!     // confirmation arrives through process()
//! }
//! mqtt.subscribe(DEFAULT_LINK_ID, "sensors/#", QoS::AtLeastOnce)?;
//! loop {
//!     mqtt.process()?;
//! }
//! # Ok::<(), libespat::Error>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// MQTT session operations.
pub mod client;
/// Firmware MQTT error table.
pub mod error;
/// Per-device session state.
pub mod session;
/// Unsolicited message decoding.
pub mod urc;

pub use client::MqttClient;
pub use error::MqttError;
pub use session::Session;
pub use urc::Urc;

/// Link ID used by the firmware, which supports a single MQTT link.
pub const DEFAULT_LINK_ID: u8 = 0;
/// Longest last-will topic accepted by `AT+MQTTCONNCFG`.
pub const MAX_LWT_TOPIC_LEN: usize = 128;
/// Longest last-will message accepted by `AT+MQTTCONNCFG`.
pub const MAX_LWT_MESSAGE_LEN: usize = 64;
/// Largest keepalive in seconds.
pub const MAX_KEEPALIVE: u32 = 7200;
/// Most ALPN protocols `AT+MQTTALPN` takes.
pub const MAX_ALPN: usize = 5;
/// Most NTP servers `AT+CIPSNTPCFG` takes.
pub const MAX_NTP_SERVERS: usize = 3;
/// Capacity for a received payload or a URC line.
pub const MQTT_BUFFER_SIZE: usize = 1024;
/// Capacity for a received topic.
pub const MAX_TOPIC_LEN: usize = 256;

/// Transport and security scheme of the MQTT link.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[repr(u8)]
pub enum Scheme {
    /// Plain TCP.
    Tcp = 1,
    /// TLS without certificate verification.
    TlsNoVerify = 2,
    /// TLS, verify the server certificate.
    TlsVerifyServer = 3,
    /// TLS, provide a client certificate.
    TlsClientCert = 4,
    /// TLS, mutual authentication.
    TlsMutual = 5,
    /// WebSocket over TCP.
    WebSocket = 6,
    /// WebSocket over TLS without certificate verification.
    WssNoVerify = 7,
    /// WebSocket over TLS, verify the server certificate.
    WssVerifyServer = 8,
    /// WebSocket over TLS, provide a client certificate.
    WssClientCert = 9,
    /// WebSocket over TLS, mutual authentication.
    WssMutual = 10,
}

/// Quality of Service of a publish or subscription.
///
/// ```rust
/// use libespat::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::ExactlyOnce as u8, 2);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[repr(u8)]
pub enum QoS {
    /// **QoS 0**: fire and forget.
    AtMostOnce = 0,
    /// **QoS 1**: acknowledged, duplicates possible.
    AtLeastOnce = 1,
    /// **QoS 2**: exactly once.
    ExactlyOnce = 2,
}

/// Parameters of `AT+MQTTUSERCFG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig<'a> {
    /// Transport and security scheme.
    pub scheme: Scheme,
    /// Client identifier.
    pub client_id: &'a str,
    /// User name, may be empty.
    pub username: &'a str,
    /// Password, may be empty.
    pub password: &'a str,
    /// Index of the client certificate and key in the PKI partitions.
    pub cert_key_id: u8,
    /// Index of the CA certificate in the PKI partitions.
    pub ca_id: u8,
    /// Resource path for WebSocket schemes, may be empty.
    pub path: &'a str,
}

/// Parameters of `AT+MQTTCONNCFG`.
///
/// Fields carry the raw values the firmware takes so that a configuration
/// loaded from JSON is checked by [`ConnectionConfig::validate`] before it
/// reaches the device.
///
/// ```rust
/// use libespat::mqtt::{ConnectionConfig, MqttError};
/// use libespat::Error;
///
/// let mut config = ConnectionConfig::new(120, "devices/42/status", "offline");
/// assert_eq!(config.validate(), Ok(()));
///
/// config.lwt_qos = 3;
/// assert_eq!(config.validate(), Err(Error::Mqtt(MqttError::LwtQosValueIsWrong)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig<'a> {
    /// Keepalive in seconds, at most [`MAX_KEEPALIVE`].
    pub keepalive: u32,
    /// `1` to keep the broker session across connections, `0` for a clean one.
    pub disable_clean_session: u8,
    /// Last-will topic, at most [`MAX_LWT_TOPIC_LEN`] bytes.
    pub lwt_topic: &'a str,
    /// Last-will message, at most [`MAX_LWT_MESSAGE_LEN`] bytes.
    pub lwt_message: &'a str,
    /// Last-will QoS, `0..=2`.
    pub lwt_qos: u8,
    /// Last-will retain flag, `0` or `1`.
    pub lwt_retain: u8,
}

impl<'a> ConnectionConfig<'a> {
    /// A clean session with a QoS 0, non-retained last will.
    pub fn new(keepalive: u32, lwt_topic: &'a str, lwt_message: &'a str) -> Self {
        Self {
            keepalive,
            disable_clean_session: 0,
            lwt_topic,
            lwt_message,
            lwt_qos: 0,
            lwt_retain: 0,
        }
    }

    /// Checks every field against the firmware limits.
    pub fn validate(&self) -> Result<(), Error> {
        let failure = if self.lwt_topic.len() > MAX_LWT_TOPIC_LEN {
            MqttError::TopicIsOverlength
        } else if self.lwt_message.len() > MAX_LWT_MESSAGE_LEN {
            MqttError::DataIsOverlength
        } else if self.keepalive > MAX_KEEPALIVE {
            MqttError::KeepaliveValueIsWrong
        } else if self.disable_clean_session > 1 {
            MqttError::DisableCleanSessionValueIsWrong
        } else if self.lwt_qos > 2 {
            MqttError::LwtQosValueIsWrong
        } else if self.lwt_retain > 1 {
            MqttError::LwtRetainValueIsWrong
        } else {
            return Ok(());
        };
        Err(Error::Mqtt(failure))
    }
}

/// Parameters of `AT+CIPSNTPCFG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtpConfig<'a> {
    /// Time zone, either an hour offset (`-12..=14`) or `HHMM`.
    pub timezone: i32,
    /// Up to [`MAX_NTP_SERVERS`] server names. Empty uses the firmware defaults.
    pub servers: &'a [&'a str],
}

/// Result of [`MqttClient::connect`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectStatus {
    /// The broker connection was confirmed within the call.
    Connected,
    /// The command was issued; confirmation will arrive through
    /// [`MqttClient::process`].
    Pending,
}

/// Connection state of the MQTT link.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum ConnectionState {
    /// No connection requested.
    #[default]
    Unconnected,
    /// Connection requested, waiting for `+MQTTCONNECTED:`.
    Pending,
    /// Connected to the broker.
    Connected,
}

/// Receiver for events decoded by [`MqttClient::process`].
///
/// All methods default to doing nothing. They run synchronously inside
/// `process()`.
pub trait EventHandler {
    /// A message arrived on a subscribed topic.
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        let _ = (topic, payload);
    }

    /// A connection requested by [`MqttClient::connect`] was confirmed
    /// asynchronously. `info` is the rest of the `+MQTTCONNECTED:` line.
    fn on_connected(&mut self, info: &str) {
        let _ = info;
    }

    /// The device reported the broker connection lost.
    fn on_disconnected(&mut self, info: &str) {
        let _ = info;
    }

    /// NTP delivered a valid time for the first time.
    fn on_time_synced(&mut self, time: &str) {
        let _ = time;
    }
}

impl EventHandler for () {}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectStatus {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConnectStatus::Connected => defmt::write!(f, "Connected"),
            ConnectStatus::Pending => defmt::write!(f, "Pending"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectionState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConnectionState::Unconnected => defmt::write!(f, "Unconnected"),
            ConnectionState::Pending => defmt::write!(f, "Pending"),
            ConnectionState::Connected => defmt::write!(f, "Connected"),
        }
    }
}
