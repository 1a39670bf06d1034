//! Mutable state of one device's MQTT session.
//!
//! One [`Session`] exists per [`MqttClient`](super::MqttClient); it is reset
//! by `begin()` and otherwise only changed by client operations and by the
//! unsolicited-message decoder.

use super::ConnectionState;

/// Connection flags, subscription count and NTP status of one device.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Session {
    pub(crate) state: ConnectionState,
    pub(crate) reconnect: bool,
    pub(crate) notify_connected: bool,
    pub(crate) subscriptions: u32,
    pub(crate) ntp_enabled: bool,
    pub(crate) ntp_valid: bool,
    pub(crate) last_ntp_poll: u32,
}

impl Session {
    /// A fresh, unconnected session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns `true` when connected to the broker.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Number of topics subscribed through this session.
    pub fn subscriptions(&self) -> u32 {
        self.subscriptions
    }

    /// Returns `true` once NTP reported a time past the epoch year.
    pub fn ntp_valid(&self) -> bool {
        self.ntp_valid
    }

    /// Returns `true` while the device NTP client is enabled.
    pub fn ntp_enabled(&self) -> bool {
        self.ntp_enabled
    }

    pub(crate) fn mark_connected(&mut self) {
        self.state = ConnectionState::Connected;
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.state = if self.reconnect {
            ConnectionState::Pending
        } else {
            ConnectionState::Unconnected
        };
    }

    pub(crate) fn close(&mut self) {
        self.state = ConnectionState::Unconnected;
        self.reconnect = false;
        self.notify_connected = false;
        self.subscriptions = 0;
    }
}
