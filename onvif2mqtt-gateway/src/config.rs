use crate::discovery::DiscoveryConfig;
use onvif2mqtt_common::mqtt::MqttConfig;
use onvif2mqtt_core::{
    CameraConfig, CameraSettings, PtzSettings, device::simulated::SimulatedCameraConfig,
};
use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use std::time::Duration;
use tracing::warn;

#[serde_as]
#[derive(Debug, Deserialize)]
pub(crate) struct Config {
    pub(crate) mqtt: MqttConfig,

    #[serde(default)]
    pub(crate) discovery: DiscoveryConfig,

    #[serde(default)]
    connection: ConnectionConfig,

    #[serde(default)]
    ptz: PtzSettings,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_status_interval")]
    pub(crate) status_interval: Duration,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_health_check_interval")]
    pub(crate) health_check_interval: Duration,

    /// Kept untyped so that one malformed entry does not reject the whole file.
    #[serde(default)]
    cameras: Vec<toml::Value>,
}

fn default_status_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_health_check_interval() -> Duration {
    Duration::from_secs(60)
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct ConnectionConfig {
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_connect_timeout")]
    timeout: Duration,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout: default_connect_timeout(),
        }
    }
}

/// A camera as written in the configuration file.
///
/// Every field is optional so that one incomplete entry does not prevent the others from loading.
#[derive(Debug, Clone, Deserialize)]
struct CameraEntry {
    name: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,

    /// Answer from an in-process simulated device rather than the network.
    simulation: Option<SimulatedCameraConfig>,
}

/// A validated camera entry.
#[derive(Debug)]
pub(crate) struct ConfiguredCamera {
    pub(crate) camera: CameraConfig,
    pub(crate) simulation: Option<SimulatedCameraConfig>,
}

impl CameraEntry {
    fn validate(self, index: usize) -> Result<ConfiguredCamera, String> {
        let required = |field: Option<String>, what: &str| {
            field
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| format!("camera #{index} is missing \"{what}\""))
        };

        let camera = CameraConfig {
            name: required(self.name, "name")?,
            host: required(self.host, "host")?,
            port: self.port.unwrap_or(80),
            username: required(self.username, "username")?,
            password: self.password.unwrap_or_default(),
        };
        camera.validate().map_err(|e| e.to_string())?;

        Ok(ConfiguredCamera {
            camera,
            simulation: self.simulation,
        })
    }
}

impl Config {
    /// Rejects settings that would make the gateway misbehave at runtime.
    pub(crate) fn validate(&self) -> miette::Result<()> {
        miette::ensure!(
            !self.status_interval.is_zero(),
            "status_interval must be greater than zero"
        );
        miette::ensure!(
            !self.health_check_interval.is_zero(),
            "health_check_interval must be greater than zero"
        );
        miette::ensure!(
            !self.connection.timeout.is_zero(),
            "connection.timeout must be greater than zero"
        );
        Ok(())
    }

    pub(crate) fn camera_settings(&self) -> CameraSettings {
        CameraSettings {
            connect_timeout: self.connection.timeout,
            ptz: self.ptz,
        }
    }

    /// Valid camera entries. Invalid ones are logged and skipped.
    pub(crate) fn cameras(&self) -> Vec<ConfiguredCamera> {
        self.cameras
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                entry
                    .clone()
                    .try_into::<CameraEntry>()
                    .map_err(|e| format!("camera #{index} is malformed: {}", e.message()))
                    .and_then(|entry| entry.validate(index))
                    .inspect_err(|e| warn!("Skipping camera: {e}"))
                    .ok()
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use indoc::indoc;

    #[test]
    fn full() {
        let config: Config = onvif2mqtt_common::parse_config_str(indoc! {r#"
            status_interval = 15
            health_check_interval = 45

            [mqtt]
            broker = "mqtt://localhost:1883"
            client_id = "onvif2mqtt"
            base_topic = "cams"

            [discovery]
            enabled = true

            [connection]
            timeout = 5

            [ptz]
            move_step = 0.2
            default_speed = 0.8

            [[cameras]]
            name = "Front Door"
            host = "10.0.0.5"
            username = "admin"
            password = "secret"

            [[cameras]]
            name = "Garage"
            host = "10.0.0.6"
            port = 8080
            username = "admin"
            password = "secret"

            [cameras.simulation]
            ptz = false
        "#})
        .unwrap();

        assert_eq!(config.status_interval, Duration::from_secs(15));
        assert_eq!(config.health_check_interval, Duration::from_secs(45));
        assert_eq!(config.mqtt.base_topic(), "cams");
        assert!(config.discovery.enabled);
        assert_eq!(config.discovery.prefix, "homeassistant");

        let settings = config.camera_settings();
        assert_eq!(settings.connect_timeout, Duration::from_secs(5));
        assert_eq!(settings.ptz.move_step, 0.2);
        assert_eq!(settings.ptz.default_speed, 0.8);
        assert_eq!(settings.ptz.zoom_step, 0.15);

        let cameras = config.cameras();
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].camera.port, 80);
        assert!(cameras[0].simulation.is_none());
        assert_eq!(cameras[1].camera.port, 8080);
        assert!(!cameras[1].simulation.as_ref().unwrap().ptz);
    }

    #[test]
    fn defaults() {
        let config: Config = onvif2mqtt_common::parse_config_str(indoc! {r#"
            [mqtt]
            broker = "mqtt://localhost:1883"
            client_id = "onvif2mqtt"
        "#})
        .unwrap();

        assert_eq!(config.status_interval, Duration::from_secs(30));
        assert_eq!(config.health_check_interval, Duration::from_secs(60));
        assert!(!config.discovery.enabled);
        assert_eq!(config.camera_settings(), CameraSettings::default());
        assert!(config.cameras().is_empty());
    }

    #[test]
    fn invalid_cameras_are_skipped() {
        let config: Config = onvif2mqtt_common::parse_config_str(indoc! {r#"
            [mqtt]
            broker = "mqtt://localhost:1883"
            client_id = "onvif2mqtt"

            [[cameras]]
            name = "No Host"
            username = "admin"

            [[cameras]]
            name = "  "
            host = "10.0.0.7"
            username = "admin"

            [[cameras]]
            name = "Shed"
            host = "10.0.0.8"
            username = "admin"
        "#})
        .unwrap();

        let cameras = config.cameras();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].camera.name, "Shed");
        assert_eq!(cameras[0].camera.password, "");
    }

    #[test]
    fn mistyped_camera_is_skipped() {
        let config: Config = onvif2mqtt_common::parse_config_str(indoc! {r#"
            [mqtt]
            broker = "mqtt://localhost:1883"
            client_id = "onvif2mqtt"

            [[cameras]]
            name = "Porch"
            host = "10.0.0.9"
            port = "eighty"
            username = "admin"

            [[cameras]]
            name = "Attic"
            host = "10.0.0.10"
            port = 70000
            username = "admin"

            [[cameras]]
            name = "Shed"
            host = "10.0.0.8"
            username = "admin"
        "#})
        .unwrap();

        config.validate().unwrap();
        let cameras = config.cameras();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].camera.name, "Shed");
    }

    #[test]
    fn zero_intervals_are_rejected() {
        for setting in [
            "status_interval = 0",
            "health_check_interval = 0",
            "[connection]\ntimeout = 0",
        ] {
            let config: Config = onvif2mqtt_common::parse_config_str(&format!(
                "{setting}\n[mqtt]\nbroker = \"mqtt://localhost:1883\"\nclient_id = \"onvif2mqtt\"\n"
            ))
            .unwrap();
            assert!(config.validate().is_err(), "{setting} was accepted");
        }
    }
}
