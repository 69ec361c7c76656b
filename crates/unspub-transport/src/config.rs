use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Default MQTT keep-alive interval.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Default time allowed for the initial CONNACK.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shortest keep-alive the client accepts.
pub const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// MQTT delivery guarantee for published messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum QosLevel {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl QosLevel {
    /// Numeric level as it appears on the wire.
    pub fn level(self) -> u8 {
        match self {
            QosLevel::AtMostOnce => 0,
            QosLevel::AtLeastOnce => 1,
            QosLevel::ExactlyOnce => 2,
        }
    }

    pub(crate) fn to_mqtt(self) -> rumqttc::QoS {
        match self {
            QosLevel::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QosLevel::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QosLevel::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

impl TryFrom<u8> for QosLevel {
    type Error = TransportError;

    fn try_from(level: u8) -> Result<Self> {
        match level {
            0 => Ok(QosLevel::AtMostOnce),
            1 => Ok(QosLevel::AtLeastOnce),
            2 => Ok(QosLevel::ExactlyOnce),
            other => Err(TransportError::InvalidQos(other)),
        }
    }
}

impl fmt::Display for QosLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// Username/password pair sent in the CONNECT packet.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Client certificate and key for mutual TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAuth {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// How the broker connection is secured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    #[default]
    Disabled,
    /// Verify the broker against `ca_cert`, optionally presenting a client identity.
    Verified {
        ca_cert: PathBuf,
        client_auth: Option<ClientAuth>,
    },
    /// Encrypt without verifying the broker certificate.
    Insecure,
}

impl TlsMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, TlsMode::Disabled)
    }
}

/// Everything needed to open a broker session.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub credentials: Option<Credentials>,
    pub tls: TlsMode,
    pub qos: QosLevel,
    pub connect_timeout: Duration,
    /// Bound of the request channel between client and event loop.
    pub request_capacity: usize,
    /// Consecutive event loop errors tolerated before the connection is declared lost.
    pub max_consecutive_errors: u32,
}

impl BrokerConfig {
    pub fn new(client_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            credentials: None,
            tls: TlsMode::Disabled,
            qos: QosLevel::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_capacity: 64,
            max_consecutive_errors: 10,
        }
    }

    /// `host:port`, as used in logs and errors.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(TransportError::InvalidConfig("broker host is empty".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(TransportError::InvalidConfig("client id is empty".to_string()));
        }
        if self.keep_alive < MIN_KEEP_ALIVE {
            return Err(TransportError::InvalidConfig(format!(
                "keep-alive {:?} is below the minimum of {:?}",
                self.keep_alive, MIN_KEEP_ALIVE
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(TransportError::InvalidConfig(
                "connect timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_consecutive_errors == 0 {
            return Err(TransportError::InvalidConfig(
                "max consecutive errors must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
