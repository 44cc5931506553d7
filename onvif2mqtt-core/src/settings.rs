use crate::{
    CameraIdentity,
    device::{DeviceEndpoint, PtzVector},
    error::{CameraError, CameraResult, RegistryError, RegistryResult},
    intent::Motion,
};
use serde::Deserialize;
use std::{fmt, time::Duration};

/// Step magnitudes used to turn a logical motion into a relative move.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PtzSettings {
    /// Pan step at full speed.
    pub move_step: f64,

    /// Zoom step at full speed.
    pub zoom_step: f64,

    /// Tilt step relative to the pan step.
    pub tilt_factor: f64,

    /// Speed used when a command does not specify one.
    pub default_speed: f64,
}

impl Default for PtzSettings {
    fn default() -> Self {
        Self {
            move_step: 0.1,
            zoom_step: 0.15,
            tilt_factor: 1.5,
            default_speed: 0.5,
        }
    }
}

impl PtzSettings {
    /// Relative displacement for `motion` at `speed`, which must be in (0, 1].
    pub fn translation(&self, motion: Motion, speed: f64) -> CameraResult<PtzVector> {
        if !(speed > 0.0 && speed <= 1.0) {
            return Err(CameraError::InvalidSpeed(speed));
        }

        let pan = self.move_step * speed;
        let tilt = pan * self.tilt_factor;
        let zoom = self.zoom_step * speed;

        let (x, y, zoom) = match motion {
            Motion::Left => (-pan, 0.0, 0.0),
            Motion::Right => (pan, 0.0, 0.0),
            Motion::Up => (0.0, tilt, 0.0),
            Motion::Down => (0.0, -tilt, 0.0),
            Motion::ZoomIn => (0.0, 0.0, zoom),
            Motion::ZoomOut => (0.0, 0.0, -zoom),
        };

        Ok(PtzVector { x, y, zoom })
    }
}

/// Settings shared by every camera connection.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    /// Upper bound on opening a device session.
    pub connect_timeout: Duration,
    pub ptz: PtzSettings,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            ptz: PtzSettings::default(),
        }
    }
}

fn default_port() -> u16 {
    80
}

/// One configured camera.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct CameraConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for CameraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl CameraConfig {
    pub fn identity(&self) -> CameraIdentity {
        CameraIdentity::from_name(&self.name)
    }

    pub fn validate(&self) -> RegistryResult<()> {
        if self.identity().is_empty() {
            return Err(RegistryError::InvalidCamera("name is empty".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(RegistryError::InvalidCamera(format!(
                "camera \"{}\" has no host",
                self.name
            )));
        }
        if self.port == 0 {
            return Err(RegistryError::InvalidCamera(format!(
                "camera \"{}\" has port 0",
                self.name
            )));
        }
        Ok(())
    }

    pub(crate) fn endpoint(&self) -> DeviceEndpoint {
        DeviceEndpoint {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}
