use std::time::Duration;

use bytes::Bytes;
use rumqttc::{
    AsyncClient, ConnAck, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet,
    QoS,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::BrokerConfig;
use crate::error::{Result, TransportError};
use crate::tls::tls_configuration;
use crate::traits::Transport;

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
const MAX_PACKET_SIZE: usize = 256 * 1024;

/// Publishing MQTT session backed by a `rumqttc` event loop task.
///
/// Call [`MqttTransport::shutdown`] before dropping so the DISCONNECT is sent
/// and the event loop drains.
pub struct MqttTransport {
    client: AsyncClient,
    qos: QoS,
    address: String,
    lost: watch::Receiver<Option<String>>,
    event_loop: Option<JoinHandle<()>>,
}

impl MqttTransport {
    /// Connect to the broker and wait for a successful CONNACK.
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        config.check()?;
        let address = config.address();
        let options = mqtt_options(config)?;

        info!(
            address = %address,
            client_id = %config.client_id,
            tls = config.tls.is_enabled(),
            "connecting to MQTT broker"
        );

        let (client, event_loop) = AsyncClient::new(options, config.request_capacity);
        let connected = tokio::time::timeout(
            config.connect_timeout,
            establish_connection(event_loop, &address),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            address: address.clone(),
            timeout: config.connect_timeout,
        })??;

        info!(address = %address, "connected to MQTT broker");

        let (lost_tx, lost_rx) = watch::channel(None);
        let max_errors = config.max_consecutive_errors;
        let handle = tokio::spawn(drive_event_loop(connected, lost_tx, max_errors));

        Ok(Self {
            client,
            qos: config.qos.to_mqtt(),
            address,
            lost: lost_rx,
            event_loop: Some(handle),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send DISCONNECT and wait for the event loop task to finish.
    pub async fn shutdown(mut self) {
        if let Err(err) = self.client.disconnect().await {
            warn!(error = %err, "failed to disconnect MQTT client");
        }
        if let Some(handle) = self.event_loop.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "MQTT event loop task failed");
            }
        }
        info!(address = %self.address, "disconnected from MQTT broker");
    }
}

impl Transport for MqttTransport {
    async fn send(&self, topic: &str, payload: Bytes) -> Result<()> {
        let size = payload.len();
        self.client
            .publish_bytes(topic, self.qos, false, payload)
            .await
            .map_err(|source| TransportError::Publish {
                topic: topic.to_string(),
                source,
            })?;
        trace!(topic, size, "publish queued");
        Ok(())
    }

    async fn closed(&self) -> TransportError {
        let mut lost = self.lost.clone();
        loop {
            let reason = lost.borrow_and_update().clone();
            if let Some(reason) = reason {
                return TransportError::ConnectionLost(reason);
            }
            if lost.changed().await.is_err() {
                return TransportError::Shutdown;
            }
        }
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if self.event_loop.is_some() {
            error!("MqttTransport dropped without calling shutdown()");
        }
    }
}

fn mqtt_options(config: &BrokerConfig) -> Result<MqttOptions> {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive);
    options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
    if let Some(credentials) = &config.credentials {
        options.set_credentials(&credentials.username, &credentials.password);
    }
    if let Some(tls) = tls_configuration(&config.tls)? {
        options.set_transport(rumqttc::Transport::tls_with_config(tls));
    }
    Ok(options)
}

async fn establish_connection(mut event_loop: EventLoop, address: &str) -> Result<EventLoop> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ConnAck { code, .. }))) => {
                if code == ConnectReturnCode::Success {
                    return Ok(event_loop);
                }
                debug!(?code, "MQTT connection rejected by broker");
                return Err(TransportError::Rejected {
                    address: address.to_string(),
                    code,
                });
            }
            Ok(notification) => {
                trace!(?notification, "bootstrap notification");
            }
            Err(source) => {
                return Err(TransportError::Connect {
                    address: address.to_string(),
                    source,
                });
            }
        }
    }
}

/// Poll until DISCONNECT goes out or too many consecutive errors occur.
///
/// `rumqttc` reconnects on the next poll after an error; only a run of
/// `max_errors` failures publishes a loss reason on `lost`.
async fn drive_event_loop(
    mut event_loop: EventLoop,
    lost: watch::Sender<Option<String>>,
    max_errors: u32,
) {
    let mut error_count: u32 = 0;
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ConnAck {
                code,
                session_present,
            }))) => {
                error_count = 0;
                info!(?code, session_present, "MQTT session re-established");
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                error_count = 0;
                trace!(pkid = ack.pkid, "publish acknowledged");
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("broker sent DISCONNECT");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("sent DISCONNECT");
                break;
            }
            Ok(notification) => {
                error_count = 0;
                trace!(?notification, "MQTT notification");
            }
            Err(err) => {
                error_count += 1;
                if error_count >= max_errors {
                    error!(
                        error = %err,
                        error_count,
                        max_errors,
                        "too many consecutive MQTT errors, giving up"
                    );
                    let _ = lost.send(Some(err.to_string()));
                    break;
                }
                let delay = retry_delay(error_count);
                warn!(error = %err, error_count, ?delay, "MQTT connection error, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
    debug!("MQTT event loop stopped");
}

fn retry_delay(error_count: u32) -> Duration {
    let exponent = error_count.saturating_sub(1).min(10);
    (INITIAL_RETRY_DELAY * 2_u32.pow(exponent)).min(MAX_RETRY_DELAY)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;
    use crate::config::{Credentials, TlsMode};

    #[test]
    fn retry_delay_backs_off_and_caps() {
        assert_eq!(retry_delay(1), Duration::from_millis(100));
        assert_eq!(retry_delay(2), Duration::from_millis(200));
        assert_eq!(retry_delay(5), Duration::from_millis(1600));
        assert_eq!(retry_delay(20), MAX_RETRY_DELAY);
    }

    #[test]
    fn options_carry_identity_with_credentials_and_tls() {
        let mut config = BrokerConfig::new("uns-payload-example", "broker.local", 8883);
        config.credentials = Some(Credentials {
            username: "operator".to_string(),
            password: "secret".to_string(),
        });
        config.tls = TlsMode::Insecure;

        let options = mqtt_options(&config).unwrap();
        assert_eq!(options.client_id(), "uns-payload-example");
        assert_eq!(
            options.broker_address(),
            ("broker.local".to_string(), 8883)
        );
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = BrokerConfig::new("unspub-test", "127.0.0.1", port);
        match MqttTransport::connect(&config).await {
            Err(TransportError::Connect { address, .. }) => {
                assert_eq!(address, format!("127.0.0.1:{port}"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connected to a closed port"),
        }
    }

    #[tokio::test]
    async fn silent_broker_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept the socket but never answer CONNECT.
        let accept = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let mut config = BrokerConfig::new("unspub-test", "127.0.0.1", port);
        config.connect_timeout = Duration::from_millis(200);
        match MqttTransport::connect(&config).await {
            Err(TransportError::Timeout { timeout, .. }) => {
                assert_eq!(timeout, Duration::from_millis(200))
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connected to a silent broker"),
        }
        accept.abort();
    }

    #[tokio::test]
    async fn invalid_config_fails_before_dialing() {
        let mut config = BrokerConfig::new("unspub-test", "127.0.0.1", 1);
        config.keep_alive = Duration::from_secs(1);
        assert!(matches!(
            MqttTransport::connect(&config).await,
            Err(TransportError::InvalidConfig(_))
        ));
    }
}
