use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in broker transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// QoS outside 0..=2.
    #[error("invalid QoS level {0} (expected 0, 1 or 2)")]
    InvalidQos(u8),

    /// A broker setting is out of range.
    #[error("invalid broker configuration: {0}")]
    InvalidConfig(String),

    /// A certificate or key file could not be read.
    #[error("failed to read TLS material {path}: {source}")]
    Tls {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The broker could not be reached.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: rumqttc::ConnectionError,
    },

    /// The broker answered the connect with a failure code.
    #[error("broker {address} rejected the connection: {code:?}")]
    Rejected {
        address: String,
        code: rumqttc::ConnectReturnCode,
    },

    /// No CONNACK arrived in time.
    #[error("timed out connecting to {address} after {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    /// The client refused to queue a publish.
    #[error("publish to {topic} was not accepted: {source}")]
    Publish {
        topic: String,
        source: rumqttc::ClientError,
    },

    /// The connection dropped and could not be re-established.
    #[error("connection to broker lost: {0}")]
    ConnectionLost(String),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
