use crate::{
    CameraIdentity,
    device::{DeviceDescriptor, PresetMap},
};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Online,
    Offline,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl From<bool> for Availability {
    fn from(connected: bool) -> Self {
        if connected {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// Point in time view of one camera.
///
/// Capability fields keep their last known values after a disconnection and are stale until
/// the camera connects again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub identity: CameraIdentity,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub state: ConnectionState,
    pub is_connected: bool,
    pub has_ptz: bool,
    pub profile_count: usize,
    pub presets: PresetMap,
    pub device: Option<DeviceDescriptor>,
}

impl StatusSnapshot {
    pub fn availability(&self) -> Availability {
        self.is_connected.into()
    }
}

/// Receives status changes raised by the camera registry.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish_status(&self, identity: &CameraIdentity, snapshot: &StatusSnapshot);

    async fn publish_availability(&self, identity: &CameraIdentity, availability: Availability);

    /// Called once per monitoring tick with the snapshots of every camera.
    async fn on_status_update(&self, _snapshots: &[StatusSnapshot]) {}

    /// Called after a camera has been removed and reported offline.
    async fn on_camera_removed(&self, _identity: &CameraIdentity) {}
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serialized_field_names() {
        let snapshot = StatusSnapshot {
            identity: CameraIdentity::from_name("Front Door"),
            name: "Front Door".to_string(),
            host: "10.0.0.5".to_string(),
            port: 80,
            state: ConnectionState::Connected,
            is_connected: true,
            has_ptz: true,
            profile_count: 2,
            presets: [("Gate".to_string(), "1".to_string())].into(),
            device: None,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["identity"], "front_door");
        assert_eq!(value["state"], "connected");
        assert_eq!(value["is_connected"], true);
        assert_eq!(value["presets"]["Gate"], "1");
        assert!(value["device"].is_null());
        assert_eq!(snapshot.availability(), Availability::Online);
    }
}
