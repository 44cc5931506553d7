//! Home Assistant MQTT device discovery payloads.

use crate::topics::Topics;
use onvif2mqtt_common::mqtt::{OFFLINE, ONLINE};
use onvif2mqtt_core::StatusSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DiscoveryConfig {
    #[serde(default)]
    pub(crate) enabled: bool,

    #[serde(default = "default_prefix")]
    pub(crate) prefix: String,

    #[serde(default = "default_device_id")]
    pub(crate) device_id: String,

    #[serde(default = "default_device_name")]
    pub(crate) device_name: String,
}

fn default_prefix() -> String {
    "homeassistant".to_string()
}

fn default_device_id() -> String {
    "onvif_gateway".to_string()
}

fn default_device_name() -> String {
    "ONVIF Gateway".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: default_prefix(),
            device_id: default_device_id(),
            device_name: default_device_name(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DeviceConfig {
    device: Device,
    origin: Origin,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    availability: Vec<Availability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    availability_mode: Option<&'static str>,
    components: BTreeMap<String, Component>,
}

#[derive(Debug, Serialize)]
struct Device {
    identifiers: Vec<String>,
    name: String,
    manufacturer: String,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sw_version: Option<String>,
    #[serde(rename = "sn", skip_serializing_if = "Option::is_none")]
    serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    via_device: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    connections: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
struct Origin {
    name: &'static str,
    sw_version: &'static str,
}

impl Default for Origin {
    fn default() -> Self {
        Self {
            name: "onvif2mqtt",
            sw_version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Availability {
    topic: String,
    payload_available: &'static str,
    payload_not_available: &'static str,
}

impl Availability {
    fn on(topic: String) -> Self {
        Self {
            topic,
            payload_available: ONLINE,
            payload_not_available: OFFLINE,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
enum Component {
    BinarySensor {
        unique_id: String,
        name: String,
        device_class: &'static str,
        state_topic: String,
        payload_on: &'static str,
        payload_off: &'static str,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        availability: Vec<Availability>,
    },
    Button {
        unique_id: String,
        name: String,
        command_topic: String,
        payload_press: String,
    },
}

impl Component {
    fn connectivity(
        unique_id: String,
        state_topic: String,
        availability: Vec<Availability>,
    ) -> Self {
        Self::BinarySensor {
            unique_id,
            name: "State".to_string(),
            device_class: "connectivity",
            state_topic,
            payload_on: ONLINE,
            payload_off: OFFLINE,
            availability,
        }
    }
}

impl DiscoveryConfig {
    pub(crate) fn config_topic(&self, object_id: &str) -> String {
        format!("{}/device/{object_id}/config", self.prefix)
    }

    /// Device for the gateway itself, with its connectivity.
    pub(crate) fn gateway_device(&self, topics: &Topics) -> DeviceConfig {
        let unique_id = format!("{}_state", self.device_id);

        DeviceConfig {
            device: Device {
                identifiers: vec![self.device_id.clone()],
                name: self.device_name.clone(),
                manufacturer: "onvif2mqtt".to_string(),
                model: "Gateway".to_string(),
                sw_version: Some(env!("CARGO_PKG_VERSION").to_string()),
                serial_number: None,
                via_device: None,
                connections: Vec::new(),
            },
            origin: Origin::default(),
            availability: Vec::new(),
            availability_mode: None,
            components: [(
                unique_id.clone(),
                Component::connectivity(unique_id, topics.gateway_availability(), Vec::new()),
            )]
            .into(),
        }
    }

    /// Device for one camera: its connectivity and a button per preset.
    pub(crate) fn camera_device(&self, topics: &Topics, snapshot: &StatusSnapshot) -> DeviceConfig {
        let id = snapshot.identity.as_str();
        let gateway_availability = Availability::on(topics.gateway_availability());

        let mut components = BTreeMap::new();

        let state_id = format!("{id}_state");
        let _ = components.insert(
            state_id.clone(),
            Component::connectivity(
                state_id,
                topics.availability(&snapshot.identity),
                vec![gateway_availability.clone()],
            ),
        );

        for (name, token) in &snapshot.presets {
            let unique_id = format!("{id}_preset_{token}");
            let _ = components.insert(
                unique_id.clone(),
                Component::Button {
                    unique_id,
                    name: format!("Preset {name}"),
                    command_topic: topics.goto_preset(&snapshot.identity),
                    payload_press: token.clone(),
                },
            );
        }

        let device = snapshot.device.as_ref();

        DeviceConfig {
            device: Device {
                identifiers: vec![id.to_string()],
                name: snapshot.name.clone(),
                manufacturer: device.map(|d| d.manufacturer.clone()).unwrap_or_default(),
                model: device.map(|d| d.model.clone()).unwrap_or_default(),
                sw_version: device.map(|d| d.firmware_version.clone()),
                serial_number: device.map(|d| d.serial_number.clone()),
                via_device: Some(self.device_id.clone()),
                connections: vec![("ip".to_string(), snapshot.host.clone())],
            },
            origin: Origin::default(),
            availability: vec![
                gateway_availability,
                Availability::on(topics.availability(&snapshot.identity)),
            ],
            availability_mode: Some("all"),
            components,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use onvif2mqtt_core::{CameraIdentity, ConnectionState, device::DeviceDescriptor};

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            identity: CameraIdentity::from_name("Front Door"),
            name: "Front Door".to_string(),
            host: "10.0.0.5".to_string(),
            port: 80,
            state: ConnectionState::Connected,
            is_connected: true,
            has_ptz: true,
            profile_count: 1,
            presets: [
                ("Gate".to_string(), "1".to_string()),
                ("Yard".to_string(), "2".to_string()),
            ]
            .into(),
            device: Some(DeviceDescriptor {
                manufacturer: "Acme".to_string(),
                model: "Dome".to_string(),
                serial_number: "123".to_string(),
                firmware_version: "2.1".to_string(),
                hardware_id: "x".to_string(),
            }),
        }
    }

    #[test]
    fn defaults() {
        let config: DiscoveryConfig = toml::from_str("").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.prefix, "homeassistant");
        assert_eq!(config.device_id, "onvif_gateway");
        assert_eq!(
            config.config_topic("front_door"),
            "homeassistant/device/front_door/config"
        );
    }

    #[test]
    fn gateway_device() {
        let config = DiscoveryConfig::default();
        let value =
            serde_json::to_value(config.gateway_device(&Topics::new("onvif2mqtt"))).unwrap();

        assert_eq!(value["device"]["identifiers"][0], "onvif_gateway");
        assert_eq!(value["device"]["name"], "ONVIF Gateway");
        assert_eq!(value["origin"]["name"], "onvif2mqtt");
        assert!(value.get("availability").is_none());

        let state = &value["components"]["onvif_gateway_state"];
        assert_eq!(state["platform"], "binary_sensor");
        assert_eq!(state["device_class"], "connectivity");
        assert_eq!(state["state_topic"], "onvif2mqtt/lwt");
        assert_eq!(state["payload_on"], "online");
    }

    #[test]
    fn camera_device() {
        let config = DiscoveryConfig::default();
        let value =
            serde_json::to_value(config.camera_device(&Topics::new("onvif2mqtt"), &snapshot()))
                .unwrap();

        assert_eq!(value["device"]["identifiers"][0], "front_door");
        assert_eq!(value["device"]["manufacturer"], "Acme");
        assert_eq!(value["device"]["sn"], "123");
        assert_eq!(value["device"]["via_device"], "onvif_gateway");
        assert_eq!(value["device"]["connections"][0][1], "10.0.0.5");
        assert_eq!(value["availability_mode"], "all");
        assert_eq!(value["availability"][1]["topic"], "onvif2mqtt/front_door/lwt");

        let components = value["components"].as_object().unwrap();
        assert_eq!(components.len(), 3);
        assert_eq!(
            components["front_door_state"]["state_topic"],
            "onvif2mqtt/front_door/lwt"
        );

        let yard = &components["front_door_preset_2"];
        assert_eq!(yard["platform"], "button");
        assert_eq!(yard["name"], "Preset Yard");
        assert_eq!(yard["command_topic"], "onvif2mqtt/front_door/goPreset");
        assert_eq!(yard["payload_press"], "2");
    }
}
