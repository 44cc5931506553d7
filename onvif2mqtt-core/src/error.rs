use crate::{CameraIdentity, device::DeviceError};
use std::time::Duration;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("Camera is already connecting or connected")]
    Busy,

    #[error("Camera is not connected")]
    NotConnected,

    #[error("Camera does not support PTZ")]
    NoPtz,

    #[error("Camera has no media profile")]
    NoProfile,

    #[error("Speed {0} is outside (0, 1]")]
    InvalidSpeed(f64),

    #[error("Preset token is empty")]
    EmptyPresetToken,

    #[error("Timed out after {0:?} opening a session")]
    ConnectTimeout(Duration),

    #[error("Connection attempt was superseded by a disconnection")]
    Superseded,

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

impl CameraError {
    /// Whether the error shows the device can no longer be reached over the current session.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::Device(e) => e.is_connection_lost(),
            _ => false,
        }
    }
}

pub type CameraResult<T> = Result<T, CameraError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A camera with identity \"{0}\" already exists")]
    DuplicateIdentity(CameraIdentity),

    #[error("Invalid camera configuration: {0}")]
    InvalidCamera(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
