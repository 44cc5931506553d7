//! In-process device implementation.
//!
//! Behaves like a camera reachable over the network, but answers from configuration. Every call
//! a session receives is recorded so that callers can assert on the exact requests that were
//! issued.

use super::{
    Capabilities, DeviceConnector, DeviceDescriptor, DeviceEndpoint, DeviceError, DeviceResult,
    DeviceSession, MediaProfile, PresetMap, PtzVector,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tracing::debug;

/// Which of the preset method names a simulated device answers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedPresetApi {
    #[default]
    Standard,
    Ptz,
    Both,
    None,
}

impl SimulatedPresetApi {
    fn standard(self) -> bool {
        matches!(self, Self::Standard | Self::Both)
    }

    fn ptz(self) -> bool {
        matches!(self, Self::Ptz | Self::Both)
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatedCameraConfig {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_version: String,

    pub ptz: bool,
    pub profiles: usize,
    pub presets: PresetMap,
    pub preset_api: SimulatedPresetApi,

    /// Start out refusing connections.
    pub unreachable: bool,

    /// Delay before a session is opened.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "latency_ms")]
    pub latency: Duration,
}

impl Default for SimulatedCameraConfig {
    fn default() -> Self {
        Self {
            manufacturer: "Simulated".to_string(),
            model: "PTZ-1".to_string(),
            serial_number: "SIM-0001".to_string(),
            firmware_version: "1.0.0".to_string(),
            ptz: true,
            profiles: 1,
            presets: PresetMap::new(),
            preset_api: SimulatedPresetApi::default(),
            unreachable: false,
            latency: Duration::ZERO,
        }
    }
}

/// A request received by a simulated device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    OpenSession,
    GetDeviceDescriptor,
    GetCapabilities,
    GetMediaProfiles,
    RelativeMove(PtzVector),
    StopMotion,
    GetPresets,
    PtzGetPresets,
    GotoPreset(String),
    PtzGotoPreset(String),
}

/// Device operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOperation {
    OpenSession,
    GetDeviceDescriptor,
    GetCapabilities,
    GetMediaProfiles,
    RelativeMove,
    StopMotion,
    GetPresets,
    GotoPreset,
}

impl DeviceCall {
    fn operation(&self) -> DeviceOperation {
        match self {
            Self::OpenSession => DeviceOperation::OpenSession,
            Self::GetDeviceDescriptor => DeviceOperation::GetDeviceDescriptor,
            Self::GetCapabilities => DeviceOperation::GetCapabilities,
            Self::GetMediaProfiles => DeviceOperation::GetMediaProfiles,
            Self::RelativeMove(_) => DeviceOperation::RelativeMove,
            Self::StopMotion => DeviceOperation::StopMotion,
            Self::GetPresets | Self::PtzGetPresets => DeviceOperation::GetPresets,
            Self::GotoPreset(_) | Self::PtzGotoPreset(_) => DeviceOperation::GotoPreset,
        }
    }
}

pub struct SimulatedCamera {
    config: SimulatedCameraConfig,
    reachable: AtomicBool,
    faults: Mutex<HashSet<DeviceOperation>>,
    calls: Mutex<Vec<DeviceCall>>,
}

impl SimulatedCamera {
    pub fn new(config: SimulatedCameraConfig) -> Arc<Self> {
        let reachable = AtomicBool::new(!config.unreachable);
        Arc::new(Self {
            config,
            reachable,
            faults: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn session(self: &Arc<Self>) -> SimulatedSession {
        SimulatedSession {
            camera: self.clone(),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Makes every subsequent `operation` fail with a device fault.
    pub fn inject_fault(&self, operation: DeviceOperation) {
        let _ = self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation);
    }

    pub fn clear_faults(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Records `call` and decides whether it reaches the device.
    fn receive(&self, call: DeviceCall) -> DeviceResult<()> {
        let operation = call.operation();
        debug!("Simulated device received {call:?}");
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);

        if !self.reachable.load(Ordering::SeqCst) {
            return Err(DeviceError::Unreachable("connection refused".to_string()));
        }

        if self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&operation)
        {
            return Err(DeviceError::Fault(format!("injected fault in {operation:?}")));
        }

        Ok(())
    }

    fn require_ptz(&self) -> DeviceResult<()> {
        if self.config.ptz {
            Ok(())
        } else {
            Err(DeviceError::Fault("PTZ service not available".to_string()))
        }
    }

    fn goto(&self, token: &str) -> DeviceResult<()> {
        self.require_ptz()?;
        if self.config.presets.values().any(|t| t == token) {
            Ok(())
        } else {
            Err(DeviceError::Fault(format!("no preset with token \"{token}\"")))
        }
    }
}

pub struct SimulatedSession {
    camera: Arc<SimulatedCamera>,
}

impl SimulatedSession {
    pub fn camera(&self) -> &Arc<SimulatedCamera> {
        &self.camera
    }
}

#[async_trait]
impl DeviceSession for SimulatedSession {
    async fn get_device_descriptor(&self) -> DeviceResult<DeviceDescriptor> {
        self.camera.receive(DeviceCall::GetDeviceDescriptor)?;
        let config = &self.camera.config;
        Ok(DeviceDescriptor {
            manufacturer: config.manufacturer.clone(),
            model: config.model.clone(),
            serial_number: config.serial_number.clone(),
            firmware_version: config.firmware_version.clone(),
            hardware_id: format!("{}-{}", config.model, config.serial_number),
        })
    }

    async fn get_capabilities(&self) -> DeviceResult<Capabilities> {
        self.camera.receive(DeviceCall::GetCapabilities)?;
        Ok(Capabilities {
            ptz: self.camera.config.ptz,
        })
    }

    async fn get_media_profiles(&self) -> DeviceResult<Vec<MediaProfile>> {
        self.camera.receive(DeviceCall::GetMediaProfiles)?;
        Ok((0..self.camera.config.profiles)
            .map(|i| MediaProfile {
                token: format!("profile_{i}"),
                name: format!("Profile {i}"),
            })
            .collect())
    }

    async fn relative_move(&self, translation: PtzVector) -> DeviceResult<()> {
        self.camera.receive(DeviceCall::RelativeMove(translation))?;
        self.camera.require_ptz()
    }

    async fn stop_motion(&self) -> DeviceResult<()> {
        self.camera.receive(DeviceCall::StopMotion)
    }

    async fn get_presets(&self) -> DeviceResult<PresetMap> {
        self.camera.receive(DeviceCall::GetPresets)?;
        if !self.camera.config.preset_api.standard() {
            return Err(DeviceError::Unsupported);
        }
        Ok(self.camera.config.presets.clone())
    }

    async fn ptz_get_presets(&self) -> DeviceResult<PresetMap> {
        self.camera.receive(DeviceCall::PtzGetPresets)?;
        if !self.camera.config.preset_api.ptz() {
            return Err(DeviceError::Unsupported);
        }
        Ok(self.camera.config.presets.clone())
    }

    async fn goto_preset(&self, token: &str) -> DeviceResult<()> {
        self.camera
            .receive(DeviceCall::GotoPreset(token.to_string()))?;
        if !self.camera.config.preset_api.standard() {
            return Err(DeviceError::Unsupported);
        }
        self.camera.goto(token)
    }

    async fn ptz_goto_preset(&self, token: &str) -> DeviceResult<()> {
        self.camera
            .receive(DeviceCall::PtzGotoPreset(token.to_string()))?;
        if !self.camera.config.preset_api.ptz() {
            return Err(DeviceError::Unsupported);
        }
        self.camera.goto(token)
    }
}

/// Opens sessions with simulated cameras, keyed by host.
#[derive(Default)]
pub struct SimulatedConnector {
    cameras: Mutex<HashMap<String, Arc<SimulatedCamera>>>,
}

impl SimulatedConnector {
    pub fn add(&self, host: &str, config: SimulatedCameraConfig) -> Arc<SimulatedCamera> {
        let camera = SimulatedCamera::new(config);
        let _ = self
            .cameras
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.to_string(), camera.clone());
        camera
    }

    pub fn camera(&self, host: &str) -> Option<Arc<SimulatedCamera>> {
        self.cameras
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .cloned()
    }
}

#[async_trait]
impl DeviceConnector for SimulatedConnector {
    async fn open_session(
        &self,
        endpoint: &DeviceEndpoint,
    ) -> DeviceResult<Arc<dyn DeviceSession>> {
        let camera = self.camera(&endpoint.host).ok_or_else(|| {
            DeviceError::Unreachable(format!("no route to {}:{}", endpoint.host, endpoint.port))
        })?;

        if !camera.config.latency.is_zero() {
            tokio::time::sleep(camera.config.latency).await;
        }

        camera.receive(DeviceCall::OpenSession)?;
        Ok(Arc::new(camera.session()))
    }
}
