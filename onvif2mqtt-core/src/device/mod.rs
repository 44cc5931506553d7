//! Boundary to the device-control library that speaks the camera's native protocol.
//!
//! The core only depends on the traits in this module. Wire protocol details (authentication,
//! envelopes, discovery) belong to implementations of [`DeviceConnector`] and [`DeviceSession`].

pub(crate) mod preset;
pub mod simulated;

use async_trait::async_trait;
use serde::Serialize;
use std::{collections::BTreeMap, fmt, sync::Arc};

/// Preset name to opaque preset token.
pub type PresetMap = BTreeMap<String, String>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Device unreachable: {0}")]
    Unreachable(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Device reported a fault: {0}")]
    Fault(String),

    #[error("Operation is not supported by this device")]
    Unsupported,
}

impl DeviceError {
    /// Whether the error indicates the device can no longer be reached over the current session.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout)
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Network address and credentials of a device.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_version: String,
    pub hardware_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub ptz: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaProfile {
    pub token: String,
    pub name: String,
}

/// Relative displacement for a PTZ move, in the device's normalized translation space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PtzVector {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Opens a control session with the device at `endpoint`.
    async fn open_session(&self, endpoint: &DeviceEndpoint)
    -> DeviceResult<Arc<dyn DeviceSession>>;
}

/// An open control session with one device.
///
/// The preset operations exist under two names because device-control libraries have exposed
/// them under either depending on version. Implementations only need to provide the ones they
/// support; the rest report [`DeviceError::Unsupported`].
#[async_trait]
pub trait DeviceSession: Send + Sync {
    async fn get_device_descriptor(&self) -> DeviceResult<DeviceDescriptor>;

    async fn get_capabilities(&self) -> DeviceResult<Capabilities>;

    async fn get_media_profiles(&self) -> DeviceResult<Vec<MediaProfile>>;

    async fn relative_move(&self, translation: PtzVector) -> DeviceResult<()>;

    async fn stop_motion(&self) -> DeviceResult<()>;

    async fn get_presets(&self) -> DeviceResult<PresetMap> {
        Err(DeviceError::Unsupported)
    }

    async fn ptz_get_presets(&self) -> DeviceResult<PresetMap> {
        Err(DeviceError::Unsupported)
    }

    async fn goto_preset(&self, _token: &str) -> DeviceResult<()> {
        Err(DeviceError::Unsupported)
    }

    async fn ptz_goto_preset(&self, _token: &str) -> DeviceResult<()> {
        Err(DeviceError::Unsupported)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn connection_lost_classification() {
        assert!(DeviceError::Unreachable("connection refused".into()).is_connection_lost());
        assert!(DeviceError::Timeout.is_connection_lost());
        assert!(!DeviceError::Fault("invalid token".into()).is_connection_lost());
        assert!(!DeviceError::Unsupported.is_connection_lost());
    }

    #[test]
    fn endpoint_debug_hides_password() {
        let endpoint = DeviceEndpoint {
            host: "10.0.0.5".into(),
            port: 80,
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let s = format!("{endpoint:?}");
        assert!(s.contains("10.0.0.5"));
        assert!(!s.contains("hunter2"));
    }
}
