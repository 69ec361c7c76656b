//! MQTT broker transport for the UNS payload publisher.
//!
//! [`Transport`] is the seam the publish pipeline sends through.
//! [`MqttTransport`] implements it over a `rumqttc` client whose event loop
//! runs on its own tokio task; loss of the broker connection is surfaced
//! through [`Transport::closed`].

pub mod config;
pub mod error;
pub mod mqtt;
pub mod tls;
pub mod traits;

pub use config::{BrokerConfig, ClientAuth, Credentials, QosLevel, TlsMode};
pub use error::{Result, TransportError};
pub use mqtt::MqttTransport;
pub use traits::Transport;
