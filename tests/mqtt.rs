mod common;

use common::{Sim, SimClock, SimSerial};
use libespat::mqtt::{
    ConnectStatus, ConnectionConfig, ConnectionState, DEFAULT_LINK_ID, EventHandler, MqttClient,
    MqttError, NtpConfig, QoS, Scheme, Urc, UserConfig,
};
use libespat::{Error, StatusCode};
use rand::Rng;

const LINK: u8 = DEFAULT_LINK_ID;
const CONNECTED: &[u8] = b"+MQTTCONNECTED:0,1,\"broker\",\"1883\",\"\",1\r\n";

#[derive(Debug, Default)]
struct Recorder {
    messages: Vec<(String, Vec<u8>)>,
    connected: Vec<String>,
    disconnected: Vec<String>,
    synced: Vec<String>,
}

impl EventHandler for Recorder {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        self.messages.push((topic.to_string(), payload.to_vec()));
    }

    fn on_connected(&mut self, info: &str) {
        self.connected.push(info.to_string());
    }

    fn on_disconnected(&mut self, info: &str) {
        self.disconnected.push(info.to_string());
    }

    fn on_time_synced(&mut self, time: &str) {
        self.synced.push(time.to_string());
    }
}

type Client = MqttClient<SimSerial, SimClock, Recorder>;

fn client(sim: &Sim) -> Client {
    MqttClient::new(sim.client(), Recorder::default())
}

fn connected(sim: &Sim, reconnect: bool) -> Client {
    let mut reply = CONNECTED.to_vec();
    reply.extend_from_slice(b"\r\nOK\r\n");
    sim.expect("AT+MQTTCONN=", &reply);
    let mut mqtt = client(sim);
    assert_eq!(
        mqtt.connect(LINK, "broker", 1883, reconnect, 5000),
        Ok(ConnectStatus::Connected)
    );
    mqtt
}

fn subscribed(sim: &Sim) -> Client {
    let mut mqtt = connected(sim, false);
    sim.expect("AT+MQTTSUB=", b"\r\nOK\r\n");
    mqtt.subscribe(LINK, "topic/#", QoS::AtLeastOnce).unwrap();
    mqtt
}

#[test]
fn test_begin_enables_syslog() {
    let sim = Sim::new();
    sim.expect("AT+SYSLOG?", b"+SYSLOG:0\r\n\r\nOK\r\n");
    sim.expect("AT+SYSLOG=1", b"\r\nOK\r\n");
    sim.expect("AT+SYSLOG?", b"+SYSLOG:1\r\n\r\nOK\r\n");
    let mut mqtt = client(&sim);

    assert_eq!(mqtt.begin(), Ok(()));
    assert_eq!(sim.commands(), ["AT+SYSLOG?", "AT+SYSLOG=1", "AT+SYSLOG?"]);
}

#[test]
fn test_begin_polls_until_device_answers() {
    let sim = Sim::new();
    sim.expect("AT+SYSLOG?", b"\r\nERROR\r\n");
    sim.expect("AT+SYSLOG?", b"+SYSLOG:1\r\n\r\nOK\r\n");
    let mut mqtt = client(&sim);

    assert_eq!(mqtt.begin(), Ok(()));
    let times = sim.command_times();
    assert_eq!(times.len(), 2);
    assert!(times[1] - times[0] >= 100);
}

#[test]
fn test_begin_fails_when_syslog_stays_off() {
    let sim = Sim::new();
    sim.expect("AT+SYSLOG?", b"+SYSLOG:0\r\nOK\r\n");
    sim.expect("AT+SYSLOG=1", b"OK\r\n");
    sim.expect("AT+SYSLOG?", b"+SYSLOG:0\r\nOK\r\n");
    let mut mqtt = client(&sim);

    assert_eq!(mqtt.begin(), Err(Error::Protocol));
}

#[test]
fn test_connect_confirmed_in_call() {
    let sim = Sim::new();
    let mqtt = connected(&sim, true);

    assert_eq!(sim.commands(), ["AT+MQTTCONN=0,\"broker\",1883,1"]);
    assert!(mqtt.is_connected());
    assert!(mqtt.handler().connected.is_empty());
}

#[test]
fn test_connect_pending_then_confirmed() {
    let sim = Sim::new();
    sim.expect_replies("AT+MQTTCONN=", &[(0, &b"\r\nOK\r\n"[..]), (200, CONNECTED)]);
    let mut mqtt = client(&sim);

    assert_eq!(
        mqtt.connect(LINK, "broker", 1883, true, 10),
        Ok(ConnectStatus::Pending)
    );
    assert_eq!(mqtt.session().state(), ConnectionState::Pending);
    assert_eq!(
        mqtt.publish(LINK, "t", "x", QoS::AtMostOnce, false),
        Err(Error::Disconnected)
    );
    assert_eq!(mqtt.process(), Ok(None));

    sim.advance(200);
    assert!(matches!(mqtt.process(), Ok(Some(Urc::Connected(_)))));
    assert!(mqtt.is_connected());
    assert_eq!(
        mqtt.handler().connected,
        ["0,1,\"broker\",\"1883\",\"\",1"]
    );
}

#[test]
fn test_connect_rejected() {
    let sim = Sim::new();
    sim.expect("AT+MQTTCONN=", b"\r\nERR CODE:0x010b6014\r\nERROR\r\n");
    let mut mqtt = client(&sim);

    assert_eq!(
        mqtt.connect(LINK, "broker", 1883, false, 1000),
        Err(Error::Device(StatusCode(0x010b_6014)))
    );
    assert_eq!(mqtt.session().state(), ConnectionState::Unconnected);
}

#[test]
fn test_operations_need_connection() {
    let sim = Sim::new();
    let mut mqtt = client(&sim);

    assert_eq!(
        mqtt.publish(LINK, "t", "x", QoS::AtMostOnce, false),
        Err(Error::Disconnected)
    );
    assert_eq!(
        mqtt.publish_raw(LINK, "t", b"x", QoS::AtMostOnce, false),
        Err(Error::Disconnected)
    );
    assert_eq!(
        mqtt.subscribe(LINK, "t", QoS::AtMostOnce),
        Err(Error::Disconnected)
    );
    assert_eq!(mqtt.unsubscribe(LINK, "t"), Err(Error::Disconnected));
    assert_eq!(mqtt.close(LINK), Err(Error::Disconnected));
    assert!(sim.commands().is_empty());
}

#[test]
fn test_connection_config_is_validated() {
    let sim = Sim::new();
    let mut mqtt = client(&sim);

    let config = ConnectionConfig::new(7201, "dev/status", "offline");
    assert_eq!(
        mqtt.connection_config(LINK, &config),
        Err(Error::Mqtt(MqttError::KeepaliveValueIsWrong))
    );
    let topic = "t".repeat(129);
    let config = ConnectionConfig::new(120, &topic, "offline");
    assert_eq!(
        mqtt.connection_config(LINK, &config),
        Err(Error::Mqtt(MqttError::TopicIsOverlength))
    );
    assert!(sim.commands().is_empty());

    sim.expect("AT+MQTTCONNCFG=", b"\r\nOK\r\n");
    let config = ConnectionConfig::new(120, "dev/status", "offline");
    assert_eq!(mqtt.connection_config(LINK, &config), Ok(()));
    assert_eq!(
        sim.commands(),
        ["AT+MQTTCONNCFG=0,120,0,\"dev/status\",\"offline\",0,0"]
    );
}

#[test]
fn test_user_config_escapes_strings() {
    let sim = Sim::new();
    sim.expect("AT+MQTTUSERCFG=", b"\r\nOK\r\n");
    let mut mqtt = client(&sim);

    let config = UserConfig {
        scheme: Scheme::Tcp,
        client_id: "dev,1",
        username: "u\"x",
        password: "",
        cert_key_id: 0,
        ca_id: 0,
        path: "",
    };
    assert_eq!(mqtt.user_config(LINK, &config), Ok(()));
    assert_eq!(
        sim.commands(),
        ["AT+MQTTUSERCFG=0,1,\"dev\\,1\",\"u\\\"x\",\"\",0,0,\"\""]
    );
}

#[test]
fn test_credentials_and_alpn() {
    let sim = Sim::new();
    for prefix in ["AT+MQTTCLIENTID=", "AT+MQTTUSERNAME=", "AT+MQTTPASSWORD=", "AT+MQTTALPN="] {
        sim.expect(prefix, b"\r\nOK\r\n");
    }
    let mut mqtt = client(&sim);

    mqtt.set_client_id(LINK, "device-42").unwrap();
    mqtt.set_username(LINK, "user").unwrap();
    mqtt.set_password(LINK, "secret").unwrap();
    mqtt.set_alpn(LINK, &["mqtt", "x-amzn-mqtt-ca"]).unwrap();
    assert_eq!(
        mqtt.set_alpn(LINK, &["a", "b", "c", "d", "e", "f"]),
        Err(Error::InvalidParameter)
    );
    assert_eq!(
        sim.commands(),
        [
            "AT+MQTTCLIENTID=0,\"device-42\"",
            "AT+MQTTUSERNAME=0,\"user\"",
            "AT+MQTTPASSWORD=0,\"secret\"",
            "AT+MQTTALPN=0,2,\"mqtt\",\"x-amzn-mqtt-ca\"",
        ]
    );
}

#[test]
fn test_publish_text() {
    let sim = Sim::new();
    let mut mqtt = connected(&sim, false);
    sim.expect("AT+MQTTPUB=", b"\r\nOK\r\n");

    assert_eq!(
        mqtt.publish(LINK, "t/a", "on,off", QoS::AtLeastOnce, false),
        Ok(())
    );
    assert_eq!(
        sim.commands().last().unwrap(),
        "AT+MQTTPUB=0,\"t/a\",\"on\\,off\",1,0"
    );
}

#[test]
fn test_publish_raw() {
    let sim = Sim::new();
    let mut mqtt = connected(&sim, false);
    sim.expect_raw(
        "AT+MQTTPUBRAW=0,\"t/bin\",4,0,1",
        b"\r\nOK\r\n\r\n>",
        4,
        b"\r\n+MQTTPUB:OK\r\n",
    );
    sim.expect_raw(
        "AT+MQTTPUBRAW=0,\"t/bin\",4,0,1",
        b"\r\nOK\r\n\r\n>",
        4,
        b"\r\n+MQTTPUB:FAIL\r\n",
    );

    let data = [0u8, b'\r', b'\n', 0xFF];
    assert_eq!(
        mqtt.publish_raw(LINK, "t/bin", &data, QoS::AtMostOnce, true),
        Ok(())
    );
    assert_eq!(
        mqtt.publish_raw(LINK, "t/bin", &data, QoS::AtMostOnce, true),
        Err(Error::Mqtt(MqttError::FailedToPublishRaw))
    );
    assert_eq!(sim.raw_payloads(), [data.to_vec(), data.to_vec()]);
}

#[test]
fn test_subscription_delivery() {
    let sim = Sim::new();
    let mut mqtt = subscribed(&sim);
    sim.push_rx(b"+MQTTSUBRECV:0,\"topic/x\",5,hello+MQTTSUBRECV:0,\"topic/y\",9,a,b\r\n\"c\"x");

    assert_eq!(
        mqtt.process(),
        Ok(Some(Urc::Message {
            link: 0,
            topic: "topic/x",
            payload: b"hello",
        }))
    );
    assert!(sim.unread() > 0);
    assert_eq!(
        mqtt.process(),
        Ok(Some(Urc::Message {
            link: 0,
            topic: "topic/y",
            payload: b"a,b\r\n\"c\"x",
        }))
    );
    assert_eq!(sim.unread(), 0);

    let messages = &mqtt.handler().messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], ("topic/x".to_string(), b"hello".to_vec()));
    assert_eq!(messages[1].1, b"a,b\r\n\"c\"x");
}

#[test]
fn test_binary_delivery() {
    let sim = Sim::new();
    let mut mqtt = subscribed(&sim);

    let mut payload = vec![0u8; 300];
    rand::thread_rng().fill(&mut payload[..]);
    let mut urc = b"+MQTTSUBRECV:0,\"bin\",300,".to_vec();
    urc.extend_from_slice(&payload);
    sim.push_rx(&urc);

    assert!(matches!(mqtt.process(), Ok(Some(Urc::Message { .. }))));
    assert_eq!(mqtt.handler().messages[0].1, payload);
}

#[test]
fn test_delivery_without_subscription() {
    let sim = Sim::new();
    let mut mqtt = subscribed(&sim);
    sim.expect("AT+MQTTUNSUB=", b"\r\nOK\r\n");
    mqtt.unsubscribe(LINK, "topic/#").unwrap();
    assert_eq!(mqtt.session().subscriptions(), 0);

    sim.push_rx(b"+MQTTSUBRECV:0,\"topic/x\",2,hi");
    assert!(matches!(mqtt.process(), Ok(Some(Urc::Message { .. }))));
    assert!(mqtt.handler().messages.is_empty());
}

#[test]
fn test_oversized_delivery_is_dropped() {
    let sim = Sim::new();
    let mut mqtt = subscribed(&sim);
    let mut urc = b"+MQTTSUBRECV:0,\"big\",2000,".to_vec();
    urc.extend(std::iter::repeat_n(b'z', 2000));
    urc.extend_from_slice(b"+MQTTSUBRECV:0,\"small\",2,ok");
    sim.push_rx(&urc);

    assert_eq!(mqtt.process(), Err(Error::BufferOverflow));
    assert!(matches!(
        mqtt.process(),
        Ok(Some(Urc::Message { topic: "small", .. }))
    ));
    assert_eq!(mqtt.handler().messages.len(), 1);
}

#[test]
fn test_malformed_delivery() {
    let sim = Sim::new();
    let mut mqtt = subscribed(&sim);
    sim.push_rx(b"+MQTTSUBRECV:0,topic,2,hi");

    assert_eq!(mqtt.process(), Err(Error::Protocol));
}

#[test]
fn test_delivery_length_out_of_range() {
    let sim = Sim::new();
    let mut mqtt = subscribed(&sim);
    sim.push_rx(b"+MQTTSUBRECV:0,\"t\",9999999999,x");

    assert_eq!(mqtt.process(), Err(Error::Protocol));
    assert!(mqtt.handler().messages.is_empty());
}

#[test]
fn test_unhandled_urc() {
    let sim = Sim::new();
    let mut mqtt = client(&sim);
    sim.push_rx(b"\r\nWIFI GOT IP\r\n+IPD:1\r\n+++\r\n");

    assert_eq!(mqtt.process(), Ok(Some(Urc::Unhandled(b"+IPD:1"))));
    assert_eq!(mqtt.process(), Ok(None));
    assert_eq!(mqtt.process(), Ok(None));
    assert!(sim.commands().is_empty());
}

#[test]
fn test_disconnect_notice() {
    let sim = Sim::new();
    let mut mqtt = connected(&sim, true);
    sim.push_rx(b"+MQTTDISCONNECTED:0\r\n");

    assert_eq!(mqtt.process(), Ok(Some(Urc::Disconnected("0"))));
    assert_eq!(mqtt.session().state(), ConnectionState::Pending);
    assert_eq!(mqtt.handler().disconnected, ["0"]);

    let sim = Sim::new();
    let mut mqtt = connected(&sim, false);
    sim.push_rx(b"+MQTTDISCONNECTED:0\r\n");
    mqtt.process().unwrap();
    assert_eq!(mqtt.session().state(), ConnectionState::Unconnected);
}

#[test]
fn test_close_resets_session() {
    let sim = Sim::new();
    let mut mqtt = subscribed(&sim);
    sim.expect("AT+MQTTCLEAN=0", b"\r\nOK\r\n");

    assert_eq!(mqtt.close(LINK), Ok(()));
    assert_eq!(mqtt.session().state(), ConnectionState::Unconnected);
    assert_eq!(mqtt.session().subscriptions(), 0);
    assert_eq!(
        mqtt.subscribe(LINK, "t", QoS::AtMostOnce),
        Err(Error::Disconnected)
    );
}

#[test]
fn test_time_sync_reported_once() {
    let sim = Sim::new();
    sim.expect("AT+CIPSNTPCFG=1,8,\"pool.ntp.org\"", b"\r\nOK\r\n");
    let mut mqtt = client(&sim);
    let config = NtpConfig {
        timezone: 8,
        servers: &["pool.ntp.org"],
    };
    mqtt.enable_ntp(&config).unwrap();

    sim.push_rx(b"+CIPSNTPTIME:Thu Jan 01 00:00:00 1970\r\n");
    assert_eq!(
        mqtt.process(),
        Ok(Some(Urc::TimeSync {
            time: "Thu Jan 01 00:00:00 1970",
            valid: false,
        }))
    );
    assert!(mqtt.handler().synced.is_empty());

    sim.push_rx(b"+CIPSNTPTIME:Tue Oct 19 17:47:56 2021\r\n");
    sim.push_rx(b"+CIPSNTPTIME:Tue Oct 19 17:47:57 2021\r\n");
    mqtt.process().unwrap();
    mqtt.process().unwrap();
    assert_eq!(mqtt.handler().synced, ["Tue Oct 19 17:47:56 2021"]);
    assert!(mqtt.session().ntp_valid());
}

#[test]
fn test_ntp_polling() {
    let sim = Sim::new();
    sim.expect("AT+CIPSNTPCFG=", b"\r\nOK\r\n");
    let mut mqtt = client(&sim);
    mqtt.enable_ntp(&NtpConfig {
        timezone: 0,
        servers: &[],
    })
    .unwrap();

    let polls = |sim: &Sim| {
        sim.commands()
            .iter()
            .filter(|c| *c == "AT+CIPSNTPTIME?")
            .count()
    };

    sim.advance(999);
    mqtt.process().unwrap();
    assert_eq!(polls(&sim), 0);
    sim.advance(1);
    mqtt.process().unwrap();
    mqtt.process().unwrap();
    assert_eq!(polls(&sim), 1);
    sim.advance(1000);
    mqtt.process().unwrap();
    assert_eq!(polls(&sim), 2);

    sim.push_rx(b"+CIPSNTPTIME:Tue Oct 19 17:47:56 2021\r\n");
    mqtt.process().unwrap();
    sim.advance(5000);
    mqtt.process().unwrap();
    assert_eq!(polls(&sim), 2);
}

#[test]
fn test_ntp_disabled_stops_polling() {
    let sim = Sim::new();
    sim.expect("AT+CIPSNTPCFG=1", b"\r\nOK\r\n");
    sim.expect("AT+CIPSNTPCFG=0,0", b"\r\nOK\r\n");
    let mut mqtt = client(&sim);
    let config = NtpConfig {
        timezone: 1,
        servers: &[],
    };
    mqtt.enable_ntp(&config).unwrap();
    mqtt.disable_ntp().unwrap();

    sim.advance(5000);
    mqtt.process().unwrap();
    assert_eq!(sim.commands().len(), 2);
    assert!(!mqtt.session().ntp_enabled());

    let servers = ["a", "b", "c", "d"];
    let config = NtpConfig {
        timezone: 1,
        servers: &servers,
    };
    assert_eq!(mqtt.enable_ntp(&config), Err(Error::InvalidParameter));
}

#[test]
fn test_ntp_time_query() {
    let sim = Sim::new();
    sim.expect(
        "AT+CIPSNTPTIME?",
        b"AT+CIPSNTPTIME?\r\r\n+CIPSNTPTIME:Tue Oct 19 17:47:56 2021\r\nOK\r\n",
    );
    let mut mqtt = client(&sim);

    assert_eq!(mqtt.ntp_time(), Ok("Tue Oct 19 17:47:56 2021"));
}
