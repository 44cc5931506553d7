use crate::{discovery::DiscoveryConfig, topics::Topics};
use async_trait::async_trait;
use onvif2mqtt_common::mqtt::AsyncClientExt;
use onvif2mqtt_core::{Availability, CameraIdentity, StatusPublisher, StatusSnapshot};
use rumqttc::AsyncClient;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};
use tracing::{debug, info, warn};

/// Publishes camera status to the MQTT broker.
pub(crate) struct MqttStatusPublisher {
    client: AsyncClient,
    topics: Topics,
    discovery: Option<DiscoveryConfig>,

    /// Most recent snapshot per camera, used for discovery when a camera comes online.
    last_snapshots: Mutex<HashMap<CameraIdentity, StatusSnapshot>>,
}

impl MqttStatusPublisher {
    pub(crate) fn new(
        client: AsyncClient,
        topics: Topics,
        discovery: &DiscoveryConfig,
    ) -> Self {
        Self {
            client,
            topics,
            discovery: discovery.enabled.then(|| discovery.clone()),
            last_snapshots: Default::default(),
        }
    }

    async fn publish_str(&self, topic: &str, payload: &str) {
        if let Err(e) = self.client.publish_str(topic, payload, true).await {
            warn!("Failed to publish to {topic}: {e}");
        }
    }

    async fn publish_json<T: serde::Serialize + Sync>(&self, topic: &str, payload: &T) {
        if let Err(e) = self.client.publish_json(topic, payload, true).await {
            warn!("Failed to publish to {topic}: {e}");
        }
    }

    /// Announces the gateway device, if discovery is enabled.
    pub(crate) async fn publish_gateway_discovery(&self) {
        if let Some(discovery) = &self.discovery {
            info!("Publishing gateway discovery");
            let topic = discovery.config_topic(&discovery.device_id);
            self.publish_json(&topic, &discovery.gateway_device(&self.topics))
                .await;
        }
    }

    async fn publish_camera_discovery(&self, snapshot: &StatusSnapshot) {
        if let Some(discovery) = &self.discovery {
            debug!("Publishing discovery for {}", snapshot.identity);
            let topic = discovery.config_topic(snapshot.identity.as_str());
            self.publish_json(&topic, &discovery.camera_device(&self.topics, snapshot))
                .await;
        }
    }
}

#[async_trait]
impl StatusPublisher for MqttStatusPublisher {
    async fn publish_status(&self, identity: &CameraIdentity, snapshot: &StatusSnapshot) {
        self.publish_json(&self.topics.status(identity), snapshot)
            .await;

        if snapshot.is_connected {
            self.publish_str(
                &self.topics.ptz_capability(identity),
                if snapshot.has_ptz { "true" } else { "false" },
            )
            .await;

            if snapshot.has_ptz {
                self.publish_json(&self.topics.presets(identity), &snapshot.presets)
                    .await;
            }
        }

        let _ = self
            .last_snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.clone(), snapshot.clone());
    }

    async fn publish_availability(&self, identity: &CameraIdentity, availability: Availability) {
        info!("Camera {identity} is {}", availability.as_str());
        self.publish_str(&self.topics.availability(identity), availability.as_str())
            .await;

        if availability == Availability::Online {
            let snapshot = self
                .last_snapshots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(identity)
                .cloned();

            if let Some(snapshot) = snapshot {
                self.publish_camera_discovery(&snapshot).await;
            }
        }
    }

    async fn on_status_update(&self, snapshots: &[StatusSnapshot]) {
        let connected = snapshots.iter().filter(|s| s.is_connected).count();
        debug!("Status update: {connected} of {} cameras connected", snapshots.len());
    }

    async fn on_camera_removed(&self, identity: &CameraIdentity) {
        let _ = self
            .last_snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);

        // An empty retained payload deletes the retained message
        info!("Clearing retained topics of {identity}");
        for topic in [
            self.topics.status(identity),
            self.topics.ptz_capability(identity),
            self.topics.presets(identity),
            self.topics.availability(identity),
        ] {
            self.publish_str(&topic, "").await;
        }
        if let Some(discovery) = &self.discovery {
            self.publish_str(&discovery.config_topic(identity.as_str()), "")
                .await;
        }
    }
}
