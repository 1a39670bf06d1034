//! Decoder for unsolicited messages pushed by the device.
//!
//! Every message starts with `+<TAG>:`. Most are ordinary lines, but a
//! subscription delivery has no terminator:
//!
//! ```text
//! +MQTTSUBRECV:<link>,"<topic>",<len>,<len raw bytes>
//! ```
//!
//! so it is walked field by field and the payload is read by count, which
//! keeps commas, quotes and line endings inside the payload intact.

use heapless::Vec;

use super::{EventHandler, MqttClient};
use crate::at::contains;
use crate::error::Error;
use crate::serial::{Clock, Serial};

const URC_INTRODUCER: u8 = b'+';
const TAG_SUBRECV: &[u8] = b"+MQTTSUBRECV:";
const TAG_CIPSNTPTIME: &[u8] = b"+CIPSNTPTIME:";
const TAG_CONNECTED: &[u8] = b"+MQTTCONNECTED:";
const TAG_DISCONNECTED: &[u8] = b"+MQTTDISCONNECTED:";
const EPOCH_YEAR: &[u8] = b"1970";
const NTP_POLL: &str = "AT+CIPSNTPTIME?\r\n";

const MAX_TAG_LEN: usize = 32;
const MAX_NUMBER_DIGITS: usize = 10;

/// An unsolicited message decoded by [`MqttClient::process`].
///
/// Borrowed data lives in the client and is valid until the next call.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Urc<'a> {
    /// A subscription delivery.
    Message {
        /// Link the message arrived on.
        link: u8,
        /// Topic without the surrounding quotes.
        topic: &'a str,
        /// Raw payload.
        payload: &'a [u8],
    },
    /// `+MQTTCONNECTED:` with the rest of the line.
    Connected(&'a str),
    /// `+MQTTDISCONNECTED:` with the rest of the line.
    Disconnected(&'a str),
    /// `+CIPSNTPTIME:` with the reported time.
    TimeSync {
        /// Time as reported, e.g. `Tue Oct 19 17:47:56 2021`.
        time: &'a str,
        /// `false` while the device still reports the epoch year.
        valid: bool,
    },
    /// Any other message, tag included.
    Unhandled(&'a [u8]),
}

impl<S: Serial, C: Clock, H: EventHandler> MqttClient<S, C, H> {
    /// Polls NTP if due and decodes at most one unsolicited message.
    ///
    /// Returns `Ok(None)` without blocking when no `+` introducer is
    /// pending; bytes in front of one are dropped. Call this on every
    /// iteration of the main loop.
    ///
    /// # Errors
    ///
    /// * [`Error::Timeout`] if a message stops mid-way
    /// * [`Error::BufferOverflow`] if a topic, payload or line exceeds its
    ///   buffer; the message is consumed and dropped
    /// * [`Error::Protocol`] if a subscription delivery is malformed
    pub fn process(&mut self) -> Result<Option<Urc<'_>>, Error> {
        self.poll_ntp()?;

        if !self.skip_to_introducer()? {
            return Ok(None);
        }

        let mut tag: Vec<u8, MAX_TAG_LEN> = Vec::new();
        // Introducer fits in an empty buffer.
        let _ = tag.push(URC_INTRODUCER);
        loop {
            let byte = self.next_byte()?;
            if byte == b'\n' {
                trace!("dropped bare line {=[u8]:a}", &tag[..]);
                return Ok(None);
            }
            if tag.push(byte).is_err() {
                self.payload.clear();
                self.read_line()?;
                return Ok(None);
            }
            if byte == b':' {
                break;
            }
        }

        match &tag[..] {
            TAG_SUBRECV => self.on_subscription(),
            TAG_CIPSNTPTIME => self.on_time(),
            TAG_CONNECTED => self.on_connected(),
            TAG_DISCONNECTED => self.on_disconnected(),
            _ => {
                self.payload.clear();
                // The tag is at most MAX_TAG_LEN bytes.
                let _ = self.payload.extend_from_slice(&tag);
                self.read_line()?;
                debug!("unhandled urc {=[u8]:a}", &self.payload[..]);
                Ok(Some(Urc::Unhandled(&self.payload)))
            }
        }
    }

    fn poll_ntp(&mut self) -> Result<(), Error> {
        if !self.session.ntp_enabled || self.session.ntp_valid {
            return Ok(());
        }
        let now = self.at.now_ms();
        let interval = self.at.config().ntp_poll_interval_ms;
        if now.wrapping_sub(self.session.last_ntp_poll) >= interval {
            self.session.last_ntp_poll = now;
            trace!("polling ntp time");
            self.at.send_str(NTP_POLL)?;
        }
        Ok(())
    }

    /// Drops available bytes up to the next `+`. Returns `true` if one was read.
    fn skip_to_introducer(&mut self) -> Result<bool, Error> {
        let transport = self.at.transport_mut();
        while transport.available() > 0 {
            match transport.read_byte(0)? {
                Some(URC_INTRODUCER) => return Ok(true),
                Some(_) => {}
                None => return Ok(false),
            }
        }
        Ok(false)
    }

    fn next_byte(&mut self) -> Result<u8, Error> {
        let timeout = self.at.config().urc_byte_timeout_ms;
        self.at
            .transport_mut()
            .read_byte(timeout)?
            .ok_or(Error::Timeout)
    }

    /// Reads the rest of the line into `payload`, CR and LF excluded.
    fn read_line(&mut self) -> Result<(), Error> {
        let start = self.payload.len();
        let mut overflow = false;
        loop {
            match self.next_byte()? {
                b'\n' => break,
                b'\r' => {}
                b => overflow |= self.payload.push(b).is_err(),
            }
        }
        if overflow {
            self.payload.truncate(start);
            return Err(Error::BufferOverflow);
        }
        Ok(())
    }

    fn line_text(&mut self) -> Result<(), Error> {
        self.payload.clear();
        self.read_line()?;
        core::str::from_utf8(&self.payload)
            .map(|_| ())
            .map_err(|_| Error::Protocol)
    }

    fn on_subscription(&mut self) -> Result<Option<Urc<'_>>, Error> {
        let link = self.read_number()?;
        let link = u8::try_from(link).map_err(|_| Error::Protocol)?;
        self.read_topic()?;
        let len = usize::try_from(self.read_number()?).map_err(|_| Error::Protocol)?;

        self.payload.clear();
        let mut overflow = false;
        for _ in 0..len {
            let byte = self.next_byte()?;
            overflow |= self.payload.push(byte).is_err();
        }
        if overflow {
            warn!("subscription payload of {} bytes dropped", len);
            self.payload.clear();
            return Err(Error::BufferOverflow);
        }

        let topic = core::str::from_utf8(&self.topic).map_err(|_| Error::Protocol)?;
        debug!("message on {=str}, {} bytes", topic, self.payload.len());
        if self.session.subscriptions > 0 {
            self.handler.on_message(topic, &self.payload);
        }
        Ok(Some(Urc::Message {
            link,
            topic,
            payload: &self.payload,
        }))
    }

    /// Reads a decimal field terminated by `,`. Values past `u32::MAX`
    /// are rejected.
    fn read_number(&mut self) -> Result<u32, Error> {
        let mut value: u32 = 0;
        let mut digits = 0;
        loop {
            let byte = self.next_byte()?;
            match byte {
                b',' if digits > 0 => return Ok(value),
                b'0'..=b'9' if digits < MAX_NUMBER_DIGITS => {
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(u32::from(byte - b'0')))
                        .ok_or(Error::Protocol)?;
                    digits += 1;
                }
                _ => return Err(Error::Protocol),
            }
        }
    }

    /// Reads a `"topic",` field into `topic`, quotes stripped.
    fn read_topic(&mut self) -> Result<(), Error> {
        self.topic.clear();
        if self.next_byte()? != b'"' {
            return Err(Error::Protocol);
        }
        let mut overflow = false;
        loop {
            let byte = self.next_byte()?;
            if byte == b'"' {
                break;
            }
            overflow |= self.topic.push(byte).is_err();
        }
        if self.next_byte()? != b',' {
            return Err(Error::Protocol);
        }
        if overflow {
            return Err(Error::BufferOverflow);
        }
        Ok(())
    }

    fn on_time(&mut self) -> Result<Option<Urc<'_>>, Error> {
        self.line_text()?;
        let valid = !contains(&self.payload, EPOCH_YEAR);
        let time = core::str::from_utf8(&self.payload).map_err(|_| Error::Protocol)?;

        if valid && !self.session.ntp_valid {
            info!("time synchronised: {=str}", time);
            self.session.ntp_valid = true;
            self.handler.on_time_synced(time);
        }
        Ok(Some(Urc::TimeSync { time, valid }))
    }

    fn on_connected(&mut self) -> Result<Option<Urc<'_>>, Error> {
        self.line_text()?;
        let info = core::str::from_utf8(&self.payload).map_err(|_| Error::Protocol)?;

        self.session.mark_connected();
        if self.session.notify_connected {
            self.handler.on_connected(info);
        }
        Ok(Some(Urc::Connected(info)))
    }

    fn on_disconnected(&mut self) -> Result<Option<Urc<'_>>, Error> {
        self.line_text()?;
        let info = core::str::from_utf8(&self.payload).map_err(|_| Error::Protocol)?;

        warn!("mqtt link lost: {=str}", info);
        self.session.mark_disconnected();
        self.handler.on_disconnected(info);
        Ok(Some(Urc::Disconnected(info)))
    }
}
