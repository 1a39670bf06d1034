//! Error table of the firmware's MQTT layer.
//!
//! The device reports these in the low 16 bits of an `ERR CODE:` value whose
//! class is [`StatusCode::CMD_PROCESSING`](crate::error::StatusCode::CMD_PROCESSING).
//! Local validation failures reuse the same values.

macro_rules! mqtt_errors {
    ($($(#[$doc:meta])* $name:ident = $code:literal,)*) => {
        /// An MQTT failure code as defined by the ESP-AT firmware.
        #[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
        #[repr(u16)]
        pub enum MqttError {
            $($(#[$doc])* $name = $code,)*
        }

        impl MqttError {
            /// Looks up a firmware code, `None` if it is not in the table.
            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(Self::$name),)*
                    _ => None,
                }
            }

            /// Name of the variant.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)*
                }
            }
        }
    };
}

mqtt_errors! {
    /// MQTT layer not configured yet.
    NoConfigured = 0x6001,
    /// MQTT layer not in a configured state.
    NotInConfiguredState = 0x6002,
    /// Clean requested while already clean.
    UninitiatedOrAlreadyClean = 0x6003,
    /// Connect requested while already connected.
    AlreadyConnected = 0x6004,
    /// Firmware allocation failure.
    MallocFailed = 0x6005,
    /// No such link.
    NullLink = 0x6006,
    /// A required parameter was missing.
    NullParameter = 0x6007,
    /// Wrong number of parameters.
    ParameterCountsIsWrong = 0x6008,
    /// TLS configuration error.
    TlsConfigError = 0x6009,
    /// Parameter preparation failed.
    ParamPrepareError = 0x600A,
    /// Client failed to start.
    ClientStartFailed = 0x600B,
    /// Publish to the broker failed.
    ClientPublishFailed = 0x600C,
    /// Subscribe at the broker failed.
    ClientSubscribeFailed = 0x600D,
    /// Unsubscribe at the broker failed.
    ClientUnsubscribeFailed = 0x600E,
    /// Disconnect from the broker failed.
    ClientDisconnectFailed = 0x600F,
    /// Link ID could not be read.
    LinkIdReadFailed = 0x6010,
    /// Link ID out of range.
    LinkIdValueIsWrong = 0x6011,
    /// Scheme could not be read.
    SchemeReadFailed = 0x6012,
    /// Scheme out of range.
    SchemeValueIsWrong = 0x6013,
    /// Client ID could not be read.
    ClientIdReadFailed = 0x6014,
    /// Client ID is empty.
    ClientIdIsNull = 0x6015,
    /// Client ID too long.
    ClientIdIsOverlength = 0x6016,
    /// User name could not be read.
    UsernameReadFailed = 0x6017,
    /// User name is empty.
    UsernameIsNull = 0x6018,
    /// User name too long.
    UsernameIsOverlength = 0x6019,
    /// Password could not be read.
    PasswordReadFailed = 0x601A,
    /// Password is empty.
    PasswordIsNull = 0x601B,
    /// Password too long.
    PasswordIsOverlength = 0x601C,
    /// Certificate key ID could not be read.
    CertKeyIdReadFailed = 0x601D,
    /// Certificate key ID out of range.
    CertKeyIdValueIsWrong = 0x601E,
    /// CA ID could not be read.
    CaIdReadFailed = 0x601F,
    /// CA ID out of range.
    CaIdValueIsWrong = 0x6020,
    /// CA length incorrect.
    CaLengthError = 0x6021,
    /// CA could not be read.
    CaReadFailed = 0x6022,
    /// Client certificate length incorrect.
    CertLengthError = 0x6023,
    /// Client certificate could not be read.
    CertReadFailed = 0x6024,
    /// Client key length incorrect.
    KeyLengthError = 0x6025,
    /// Client key could not be read.
    KeyReadFailed = 0x6026,
    /// Path could not be read.
    PathReadFailed = 0x6027,
    /// Path is empty.
    PathIsNull = 0x6028,
    /// Path too long.
    PathIsOverlength = 0x6029,
    /// Protocol version could not be read.
    VersionReadFailed = 0x602A,
    /// Keepalive could not be read.
    KeepaliveReadFailed = 0x602B,
    /// Keepalive is missing.
    KeepaliveIsNull = 0x602C,
    /// Keepalive out of range.
    KeepaliveValueIsWrong = 0x602D,
    /// Clean session flag could not be read.
    DisableCleanSessionReadFailed = 0x602E,
    /// Clean session flag is not 0 or 1.
    DisableCleanSessionValueIsWrong = 0x602F,
    /// LWT topic could not be read.
    LwtTopicReadFailed = 0x6030,
    /// LWT topic is empty.
    LwtTopicIsNull = 0x6031,
    /// LWT topic too long.
    LwtTopicIsOverlength = 0x6032,
    /// LWT message could not be read.
    LwtMsgReadFailed = 0x6033,
    /// LWT message is empty.
    LwtMsgIsNull = 0x6034,
    /// LWT message too long.
    LwtMsgIsOverlength = 0x6035,
    /// LWT QoS could not be read.
    LwtQosReadFailed = 0x6036,
    /// LWT QoS out of range.
    LwtQosValueIsWrong = 0x6037,
    /// LWT retain flag could not be read.
    LwtRetainReadFailed = 0x6038,
    /// LWT retain flag is not 0 or 1.
    LwtRetainValueIsWrong = 0x6039,
    /// Host could not be read.
    HostReadFailed = 0x603A,
    /// Host is empty.
    HostIsNull = 0x603B,
    /// Host too long.
    HostIsOverlength = 0x603C,
    /// Port could not be read.
    PortReadFailed = 0x603D,
    /// Port out of range.
    PortValueIsWrong = 0x603E,
    /// Reconnect flag could not be read.
    ReconnectReadFailed = 0x603F,
    /// Reconnect flag is not 0 or 1.
    ReconnectValueIsWrong = 0x6040,
    /// Topic could not be read.
    TopicReadFailed = 0x6041,
    /// Topic is empty.
    TopicIsNull = 0x6042,
    /// Topic too long.
    TopicIsOverlength = 0x6043,
    /// Message could not be read.
    DataReadFailed = 0x6044,
    /// Message is empty.
    DataIsNull = 0x6045,
    /// Message too long.
    DataIsOverlength = 0x6046,
    /// QoS could not be read.
    QosReadFailed = 0x6047,
    /// QoS out of range.
    QosValueIsWrong = 0x6048,
    /// Retain flag could not be read.
    RetainReadFailed = 0x6049,
    /// Retain flag is not 0 or 1.
    RetainValueIsWrong = 0x604A,
    /// Publish length could not be read.
    PublishLengthReadFailed = 0x604B,
    /// Publish length out of range.
    PublishLengthValueIsWrong = 0x604C,
    /// Receive length incorrect.
    RecvLengthIsWrong = 0x604D,
    /// Firmware semaphore creation failed.
    CreateSemaFailed = 0x604E,
    /// Firmware event group creation failed.
    CreateEventGroupFailed = 0x604F,
    /// URI could not be parsed.
    UriParseFailed = 0x6050,
    /// The MQTT link is disconnected.
    InDisconnectedState = 0x6051,
    /// Hostname verification failed.
    HostnameVerifyFailed = 0x6052,
    /// The broker rejected a raw publish.
    FailedToPublishRaw = 0x6053,
}

#[cfg(feature = "defmt")]
impl defmt::Format for MqttError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.name())
    }
}
