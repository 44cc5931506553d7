use crate::ThrottledErrorLogger;
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ClientError, Event, EventLoop, Incoming, LastWill, MqttOptions, Outgoing,
    Publish, QoS,
};
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

#[derive(thiserror::Error, Debug)]
pub enum MqttError {
    #[error("Broker URL \"{0}\" is not a valid mqtt:// or tcp:// URL")]
    InvalidBroker(Url),

    #[error("MQTT client error: {0}")]
    Client(#[from] ClientError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type MqttResult<T> = Result<T, MqttError>;

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    broker: Url,

    client_id: String,

    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,

    #[serde(default = "default_base_topic")]
    base_topic: String,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_keep_alive")]
    keep_alive: Duration,
}

fn default_base_topic() -> String {
    "onvif2mqtt".to_string()
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(30)
}

impl MqttConfig {
    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    /// Topic on which the availability of the process itself is published.
    pub fn availability_topic(&self) -> String {
        format!("{}/lwt", self.base_topic)
    }

    fn options(&self) -> MqttResult<MqttOptions> {
        if !matches!(self.broker.scheme(), "mqtt" | "tcp") {
            return Err(MqttError::InvalidBroker(self.broker.clone()));
        }

        let host = self
            .broker
            .host_str()
            .ok_or_else(|| MqttError::InvalidBroker(self.broker.clone()))?;
        let port = self.broker.port().unwrap_or(1883);

        let mut options = MqttOptions::new(&self.client_id, host, port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        options.set_last_will(LastWill::new(
            self.availability_topic(),
            OFFLINE,
            QoS::AtLeastOnce,
            true,
        ));

        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.clone().unwrap_or_default());
        }

        Ok(options)
    }
}

/// Owns the rumqttc event loop.
///
/// The event loop only makes progress while [`MqttClient::poll`] is being called, so the owner
/// must keep polling it even while other tasks publish through [`MqttClient::client`].
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,

    availability_topic: String,
    subscriptions: Vec<String>,

    connected: watch::Sender<bool>,
    poll_error_logger: ThrottledErrorLogger<String>,
}

impl TryFrom<&MqttConfig> for MqttClient {
    type Error = MqttError;

    fn try_from(config: &MqttConfig) -> Result<Self, Self::Error> {
        let (client, event_loop) = AsyncClient::new(config.options()?, 128);
        let (connected, _) = watch::channel(false);

        Ok(Self {
            client,
            event_loop,
            availability_topic: config.availability_topic(),
            subscriptions: Vec::new(),
            connected,
            poll_error_logger: ThrottledErrorLogger::new(Duration::from_secs(30)),
        })
    }
}

impl MqttClient {
    /// Adds a topic filter that is subscribed to on every (re)connection to the broker.
    pub fn with_subscription(mut self, topic: impl Into<String>) -> Self {
        self.subscriptions.push(topic.into());
        self
    }

    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    pub async fn poll(&mut self) -> Option<Publish> {
        match self.event_loop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                info!("Connected to MQTT broker");
                self.poll_error_logger.reset();
                self.on_connect();
                let _ = self.connected.send_replace(true);
                None
            }
            Ok(Event::Incoming(Incoming::Publish(msg))) => {
                debug!("Received message on {}", msg.topic);
                Some(msg)
            }
            Ok(_) => None,
            Err(e) => {
                let _ = self.connected.send_replace(false);
                if let Some(e) = self.poll_error_logger.log(e.to_string()) {
                    warn!("MQTT client error: {e}");
                }
                // Avoid spinning while the broker is unreachable
                tokio::time::sleep(Duration::from_secs(1)).await;
                None
            }
        }
    }

    fn on_connect(&self) {
        for topic in &self.subscriptions {
            match self.client.try_subscribe(topic, QoS::AtLeastOnce) {
                Ok(()) => info!("Subscribed to {topic}"),
                Err(e) => warn!("Failed to subscribe to {topic}: {e}"),
            }
        }

        if let Err(e) =
            self.client
                .try_publish(&self.availability_topic, QoS::AtLeastOnce, true, ONLINE)
        {
            warn!("Failed to publish availability: {e}");
        }
    }

    /// Publishes offline availability and disconnects, flushing pending requests first.
    pub async fn disconnect(&mut self) {
        if let Err(e) =
            self.client
                .try_publish(&self.availability_topic, QoS::AtLeastOnce, true, OFFLINE)
        {
            warn!("Failed to publish availability: {e}");
        }

        if let Err(e) = self.client.try_disconnect() {
            warn!("Failed to request disconnection: {e}");
            return;
        }

        let flush = async {
            loop {
                match self.event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };

        if tokio::time::timeout(Duration::from_secs(2), flush)
            .await
            .is_err()
        {
            warn!("Timeout flushing MQTT client on disconnect");
        }

        let _ = self.connected.send_replace(false);
        info!("Disconnected from MQTT broker");
    }
}

#[async_trait]
pub trait AsyncClientExt {
    async fn publish_str(&self, topic: &str, payload: &str, retain: bool) -> MqttResult<()>;

    async fn publish_json<T: Serialize + Sync>(
        &self,
        topic: &str,
        payload: &T,
        retain: bool,
    ) -> MqttResult<()>;
}

#[async_trait]
impl AsyncClientExt for AsyncClient {
    async fn publish_str(&self, topic: &str, payload: &str, retain: bool) -> MqttResult<()> {
        self.publish(topic, QoS::AtLeastOnce, retain, payload.as_bytes().to_vec())
            .await?;
        Ok(())
    }

    async fn publish_json<T: Serialize + Sync>(
        &self,
        topic: &str,
        payload: &T,
        retain: bool,
    ) -> MqttResult<()> {
        let payload = serde_json::to_vec(payload)?;
        self.publish(topic, QoS::AtLeastOnce, retain, payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(broker: &str) -> MqttConfig {
        crate::parse_config_str(&format!(
            "broker = \"{broker}\"\nclient_id = \"test\"\nusername = \"user\"\npassword = \"pass\"\n"
        ))
        .unwrap()
    }

    #[test]
    fn defaults() {
        let config = config("mqtt://localhost:1883");
        assert_eq!(config.base_topic(), "onvif2mqtt");
        assert_eq!(config.availability_topic(), "onvif2mqtt/lwt");
        assert_eq!(config.keep_alive, Duration::from_secs(30));
    }

    #[test]
    fn options_from_url() {
        let options = config("mqtt://broker.local:1884").options().unwrap();
        assert_eq!(
            options.broker_address(),
            ("broker.local".to_string(), 1884)
        );
        assert_eq!(options.client_id(), "test");
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert!(options.last_will().is_some());
    }

    #[test]
    fn options_default_port() {
        let options = config("tcp://broker.local").options().unwrap();
        assert_eq!(
            options.broker_address(),
            ("broker.local".to_string(), 1883)
        );
    }

    #[test]
    fn options_bad_scheme() {
        assert!(matches!(
            config("http://broker.local").options(),
            Err(MqttError::InvalidBroker(_))
        ));
    }
}
