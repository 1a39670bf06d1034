use heapless::Vec;

use super::{
    ConnectStatus, ConnectionConfig, ConnectionState, EventHandler, MAX_ALPN, MAX_NTP_SERVERS,
    MAX_TOPIC_LEN, MQTT_BUFFER_SIZE, MqttError, NtpConfig, QoS, Session, UserConfig,
};
use crate::at::{AtClient, Params};
use crate::error::Error;
use crate::serial::{Clock, Serial};

const CMD_SYSLOG: &str = "+SYSLOG";
const CMD_USERCFG: &str = "+MQTTUSERCFG";
const CMD_CLIENTID: &str = "+MQTTCLIENTID";
const CMD_USERNAME: &str = "+MQTTUSERNAME";
const CMD_PASSWORD: &str = "+MQTTPASSWORD";
const CMD_CONNCFG: &str = "+MQTTCONNCFG";
const CMD_ALPN: &str = "+MQTTALPN";
const CMD_CONN: &str = "+MQTTCONN";
const CMD_PUB: &str = "+MQTTPUB";
const CMD_PUBRAW: &str = "+MQTTPUBRAW";
const CMD_SUB: &str = "+MQTTSUB";
const CMD_UNSUB: &str = "+MQTTUNSUB";
const CMD_CLEAN: &str = "+MQTTCLEAN";
const CMD_CIPSNTPCFG: &str = "+CIPSNTPCFG";
const CMD_CIPSNTPTIME: &str = "+CIPSNTPTIME";

const RESP_CONNECTED: &str = "+MQTTCONNECTED:";
const RESP_PUBLISHED: &str = "+MQTTPUB:";
const PUBLISH_FAILED: &[u8] = b"FAIL";

const SYSLOG_POLL_MS: u32 = 100;

/// MQTT session driven through an ESP-AT device.
///
/// The client owns the [`AtClient`], the [`Session`] state and an
/// [`EventHandler`] that receives unsolicited events from
/// [`MqttClient::process`].
#[derive(Debug)]
pub struct MqttClient<S, C, H = ()> {
    pub(crate) at: AtClient<S, C>,
    pub(crate) session: Session,
    pub(crate) handler: H,
    pub(crate) topic: Vec<u8, MAX_TOPIC_LEN>,
    pub(crate) payload: Vec<u8, MQTT_BUFFER_SIZE>,
}

impl<S: Serial, C: Clock, H: EventHandler> MqttClient<S, C, H> {
    /// Wraps an AT client. The session starts unconnected.
    pub fn new(at: AtClient<S, C>, handler: H) -> Self {
        Self {
            at,
            session: Session::new(),
            handler,
            topic: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// The underlying AT client.
    pub fn at(&mut self) -> &mut AtClient<S, C> {
        &mut self.at
    }

    /// The event handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The event handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Releases the AT client and the handler.
    pub fn into_parts(self) -> (AtClient<S, C>, H) {
        (self.at, self.handler)
    }

    /// Resets the session and makes sure the device reports error codes.
    ///
    /// Polls `AT+SYSLOG?` until the device answers, enables it with
    /// `AT+SYSLOG=1` if it is off and reads it back.
    ///
    /// # Errors
    ///
    /// * [`Error::Timeout`] if the device never answers the query
    /// * [`Error::Protocol`] if syslog stays disabled
    pub fn begin(&mut self) -> Result<(), Error> {
        self.session.reset();

        let timeout = self.at.config().command_timeout_ms;
        let start = self.at.now_ms();
        let enabled = loop {
            match self.at.query(CMD_SYSLOG, "?") {
                Ok(level) => break level == "1",
                Err(e) => {
                    if self.at.now_ms().wrapping_sub(start) >= timeout {
                        return Err(e);
                    }
                    self.at.delay_ms(SYSLOG_POLL_MS);
                }
            }
        };

        if !enabled {
            info!("enabling syslog");
            self.at.send_command(CMD_SYSLOG, "=1")?;
            if self.at.query(CMD_SYSLOG, "?")? != "1" {
                error!("syslog could not be enabled");
                return Err(Error::Protocol);
            }
        }
        Ok(())
    }

    /// Sets scheme, credentials, certificate indices and path in one command.
    pub fn user_config(&mut self, link: u8, config: &UserConfig<'_>) -> Result<(), Error> {
        let mut params = Params::assign();
        params
            .number(link)?
            .number(config.scheme as u8)?
            .quoted(config.client_id)?
            .quoted(config.username)?
            .quoted(config.password)?
            .number(config.cert_key_id)?
            .number(config.ca_id)?
            .quoted(config.path)?;
        self.at.send_command(CMD_USERCFG, params.as_str())
    }

    /// Sets the client ID, allowing IDs longer than `AT+MQTTUSERCFG` takes.
    pub fn set_client_id(&mut self, link: u8, client_id: &str) -> Result<(), Error> {
        self.set_string(CMD_CLIENTID, link, client_id)
    }

    /// Sets the user name.
    pub fn set_username(&mut self, link: u8, username: &str) -> Result<(), Error> {
        self.set_string(CMD_USERNAME, link, username)
    }

    /// Sets the password.
    pub fn set_password(&mut self, link: u8, password: &str) -> Result<(), Error> {
        self.set_string(CMD_PASSWORD, link, password)
    }

    /// Sets keepalive, session persistence and last will.
    ///
    /// The configuration is validated locally; a rejected value returns
    /// [`Error::Mqtt`] without anything being sent.
    pub fn connection_config(
        &mut self,
        link: u8,
        config: &ConnectionConfig<'_>,
    ) -> Result<(), Error> {
        config.validate()?;
        let mut params = Params::assign();
        params
            .number(link)?
            .number(config.keepalive)?
            .number(config.disable_clean_session)?
            .quoted(config.lwt_topic)?
            .quoted(config.lwt_message)?
            .number(config.lwt_qos)?
            .number(config.lwt_retain)?;
        self.at.send_command(CMD_CONNCFG, params.as_str())
    }

    /// Sets the ALPN protocol list, at most [`MAX_ALPN`] entries.
    pub fn set_alpn(&mut self, link: u8, protocols: &[&str]) -> Result<(), Error> {
        if protocols.len() > MAX_ALPN {
            return Err(Error::InvalidParameter);
        }
        let mut params = Params::assign();
        params.number(link)?.number(protocols.len() as u8)?;
        for protocol in protocols {
            params.quoted(protocol)?;
        }
        self.at.send_command(CMD_ALPN, params.as_str())
    }

    /// Connects to a broker.
    ///
    /// Waits at most `timeout_ms` for `+MQTTCONNECTED:`. A short timeout is
    /// a valid way to return early: if the device accepted the command but
    /// the confirmation has not arrived, [`ConnectStatus::Pending`] is
    /// returned and [`EventHandler::on_connected`] fires once
    /// [`MqttClient::process`] sees it.
    pub fn connect(
        &mut self,
        link: u8,
        host: &str,
        port: u16,
        reconnect: bool,
        timeout_ms: u32,
    ) -> Result<ConnectStatus, Error> {
        let mut params = Params::assign();
        params
            .number(link)?
            .quoted(host)?
            .number(port)?
            .number(u8::from(reconnect))?;

        self.session.reconnect = reconnect;
        match self
            .at
            .send_command_async(CMD_CONN, params.as_str(), RESP_CONNECTED, timeout_ms)
        {
            Ok(_info) => {
                info!("mqtt connected: {=str}", _info);
                self.session.mark_connected();
                Ok(ConnectStatus::Connected)
            }
            Err(Error::AsyncTimeout | Error::Timeout) => {
                info!("mqtt connect pending");
                self.session.state = ConnectionState::Pending;
                self.session.notify_connected = true;
                Ok(ConnectStatus::Pending)
            }
            Err(e) => {
                self.session.state = ConnectionState::Unconnected;
                Err(e)
            }
        }
    }

    /// Returns `true` when connected to the broker.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Publishes a text message with `AT+MQTTPUB`.
    pub fn publish(
        &mut self,
        link: u8,
        topic: &str,
        data: &str,
        qos: QoS,
        retain: bool,
    ) -> Result<(), Error> {
        self.require_connected()?;
        let mut params = Params::assign();
        params
            .number(link)?
            .quoted(topic)?
            .quoted(data)?
            .number(qos as u8)?
            .number(u8::from(retain))?;
        self.at.send_command(CMD_PUB, params.as_str())
    }

    /// Publishes arbitrary bytes with `AT+MQTTPUBRAW`.
    ///
    /// The payload is written after the device's `>` prompt and the result
    /// is read from the `+MQTTPUB:` line.
    pub fn publish_raw(
        &mut self,
        link: u8,
        topic: &str,
        data: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Error> {
        self.require_connected()?;
        let len = u32::try_from(data.len()).map_err(|_| Error::InvalidParameter)?;
        let mut params = Params::assign();
        params
            .number(link)?
            .quoted(topic)?
            .number(len)?
            .number(qos as u8)?
            .number(u8::from(retain))?;

        let timeout = self.at.config().command_timeout_ms;
        self.at
            .send_with_payload(CMD_PUBRAW, params.as_str(), data, timeout)?;

        let confirm = self.at.config().publish_confirm_timeout_ms;
        let line = self.at.wait_string(RESP_PUBLISHED, confirm)?;
        if crate::at::contains(line, PUBLISH_FAILED) {
            warn!("raw publish rejected");
            return Err(Error::Mqtt(MqttError::FailedToPublishRaw));
        }
        Ok(())
    }

    /// Subscribes to a topic filter.
    pub fn subscribe(&mut self, link: u8, topic: &str, qos: QoS) -> Result<(), Error> {
        self.require_connected()?;
        let mut params = Params::assign();
        params.number(link)?.quoted(topic)?.number(qos as u8)?;
        self.at.send_command(CMD_SUB, params.as_str())?;
        self.session.subscriptions += 1;
        Ok(())
    }

    /// Removes a subscription.
    ///
    /// Once the last subscription is gone, deliveries are no longer passed
    /// to [`EventHandler::on_message`].
    pub fn unsubscribe(&mut self, link: u8, topic: &str) -> Result<(), Error> {
        self.require_connected()?;
        let mut params = Params::assign();
        params.number(link)?.quoted(topic)?;
        self.at.send_command(CMD_UNSUB, params.as_str())?;
        self.session.subscriptions = self.session.subscriptions.saturating_sub(1);
        Ok(())
    }

    /// Disconnects from the broker and releases the link.
    pub fn close(&mut self, link: u8) -> Result<(), Error> {
        self.require_connected()?;
        let mut params = Params::assign();
        params.number(link)?;
        self.at.send_command(CMD_CLEAN, params.as_str())?;
        self.session.close();
        Ok(())
    }

    /// Enables the device NTP client.
    ///
    /// Until a valid time is reported, [`MqttClient::process`] polls
    /// `AT+CIPSNTPTIME?` and calls [`EventHandler::on_time_synced`] once
    /// the answer is past the epoch year.
    pub fn enable_ntp(&mut self, config: &NtpConfig<'_>) -> Result<(), Error> {
        if config.servers.len() > MAX_NTP_SERVERS {
            return Err(Error::InvalidParameter);
        }
        let mut params = Params::assign();
        params.number(1)?.number(config.timezone)?;
        for server in config.servers {
            params.quoted(server)?;
        }
        self.at.send_command(CMD_CIPSNTPCFG, params.as_str())?;

        self.session.ntp_enabled = true;
        self.session.ntp_valid = false;
        self.session.last_ntp_poll = self.at.now_ms();
        Ok(())
    }

    /// Disables the device NTP client and stops polling.
    pub fn disable_ntp(&mut self) -> Result<(), Error> {
        self.at.send_command(CMD_CIPSNTPCFG, "=0,0")?;
        self.session.ntp_enabled = false;
        Ok(())
    }

    /// Reads the device clock, e.g. `Tue Oct 19 17:47:56 2021`.
    pub fn ntp_time(&mut self) -> Result<&str, Error> {
        self.at.query(CMD_CIPSNTPTIME, "?")
    }

    fn set_string(&mut self, command: &str, link: u8, value: &str) -> Result<(), Error> {
        let mut params = Params::assign();
        params.number(link)?.quoted(value)?;
        self.at.send_command(command, params.as_str())
    }

    fn require_connected(&self) -> Result<(), Error> {
        if self.session.is_connected() {
            Ok(())
        } else {
            Err(Error::Disconnected)
        }
    }
}
