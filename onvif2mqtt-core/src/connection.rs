use crate::{
    CameraIdentity,
    device::{
        Capabilities, DeviceConnector, DeviceDescriptor, DeviceError, DeviceSession, MediaProfile,
        PresetMap, preset,
    },
    error::{CameraError, CameraResult},
    intent::Motion,
    o11y,
    settings::{CameraConfig, CameraSettings},
    status::{ConnectionState, StatusSnapshot},
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

struct Inner {
    state: ConnectionState,

    /// Incremented on every connection attempt, used to detect attempts that were overtaken by a
    /// disconnection while they were suspended.
    attempt: u64,

    session: Option<Arc<dyn DeviceSession>>,

    device: Option<DeviceDescriptor>,
    capabilities: Capabilities,
    profiles: Vec<MediaProfile>,
    presets: PresetMap,
}

/// Everything learned about a device while connecting.
struct Established {
    session: Arc<dyn DeviceSession>,
    device: Option<DeviceDescriptor>,
    capabilities: Capabilities,
    profiles: Vec<MediaProfile>,
    presets: PresetMap,
}

/// Control session and last known state of one camera.
///
/// Operations never fail outright: errors are logged and reported as `false`. The state lock is
/// only held between suspension points, so the `Connecting` guard in [`CameraConnection::connect`]
/// is what keeps concurrent callers from racing on the connection state.
pub struct CameraConnection {
    identity: CameraIdentity,
    config: CameraConfig,
    settings: CameraSettings,
    connector: Arc<dyn DeviceConnector>,
    inner: Mutex<Inner>,
}

impl CameraConnection {
    pub fn new(
        config: CameraConfig,
        settings: CameraSettings,
        connector: Arc<dyn DeviceConnector>,
    ) -> Self {
        Self {
            identity: config.identity(),
            config,
            settings,
            connector,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                attempt: 0,
                session: None,
                device: None,
                capabilities: Capabilities::default(),
                profiles: Vec::new(),
                presets: PresetMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn identity(&self) -> &CameraIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn has_ptz(&self) -> bool {
        self.lock().capabilities.ptz
    }

    /// Opens a session with the camera and discovers its capabilities.
    ///
    /// Returns `false` without side effects if the camera is already connecting or connected.
    #[tracing::instrument(skip(self), fields(camera = %self.identity))]
    pub async fn connect(&self) -> bool {
        let result = self.try_connect().await;

        match &result {
            Ok(()) => {
                info!("Connected to {}:{}", self.config.host, self.config.port);
                o11y::inc_connection_attempts_metric(o11y::ConnectionResult::Success);
            }
            Err(CameraError::Busy) => {
                debug!("Connection already in progress or established");
            }
            Err(CameraError::Superseded) => {
                info!("Connection attempt abandoned after disconnection");
                o11y::inc_connection_attempts_metric(o11y::ConnectionResult::Abandoned);
            }
            Err(e) => {
                warn!(
                    "Failed to connect to {}:{}: {e}",
                    self.config.host, self.config.port
                );
                o11y::inc_connection_attempts_metric(o11y::ConnectionResult::Failure);
            }
        }

        result.is_ok()
    }

    async fn try_connect(&self) -> CameraResult<()> {
        let attempt = {
            let mut inner = self.lock();
            if matches!(
                inner.state,
                ConnectionState::Connecting | ConnectionState::Connected
            ) {
                return Err(CameraError::Busy);
            }
            inner.state = ConnectionState::Connecting;
            inner.attempt += 1;
            inner.session = None;
            inner.attempt
        };

        let result = self.establish().await;

        let mut inner = self.lock();
        if inner.attempt != attempt || inner.state != ConnectionState::Connecting {
            return Err(CameraError::Superseded);
        }

        match result {
            Ok(established) => {
                inner.session = Some(established.session);
                inner.device = established.device;
                inner.capabilities = established.capabilities;
                inner.profiles = established.profiles;
                inner.presets = established.presets;
                inner.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                inner.state = ConnectionState::Disconnected;
                inner.session = None;
                Err(e)
            }
        }
    }

    async fn establish(&self) -> CameraResult<Established> {
        let endpoint = self.config.endpoint();
        let timeout = self.settings.connect_timeout;

        let session = tokio::time::timeout(timeout, self.connector.open_session(&endpoint))
            .await
            .map_err(|_| CameraError::ConnectTimeout(timeout))??;

        // Past this point nothing is fatal, a missing feature is just left empty
        let device = session
            .get_device_descriptor()
            .await
            .inspect_err(|e| warn!("Failed to get device information: {e}"))
            .ok();

        let capabilities = session
            .get_capabilities()
            .await
            .inspect_err(|e| warn!("Failed to get capabilities: {e}"))
            .unwrap_or_default();

        let profiles = session
            .get_media_profiles()
            .await
            .inspect_err(|e| warn!("Failed to get media profiles: {e}"))
            .unwrap_or_default();

        let presets = if capabilities.ptz {
            match preset::list_presets(session.as_ref()).await {
                Ok(presets) => presets,
                Err(DeviceError::Unsupported) => {
                    info!("Camera does not expose presets");
                    PresetMap::new()
                }
                Err(e) => {
                    warn!("Failed to get presets: {e}");
                    PresetMap::new()
                }
            }
        } else {
            PresetMap::new()
        };

        debug!(
            "Discovered ptz={}, {} profile(s), {} preset(s)",
            capabilities.ptz,
            profiles.len(),
            presets.len()
        );

        Ok(Established {
            session,
            device,
            capabilities,
            profiles,
            presets,
        })
    }

    /// Marks the camera disconnected. Safe to call in any state.
    ///
    /// Discovered capabilities are kept for display. An attempt that is connecting at the time
    /// of the call is abandoned once it resumes.
    pub fn disconnect(&self) {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Disconnected {
            info!(camera = %self.identity, "Disconnected from camera");
        }
        inner.state = ConnectionState::Disconnected;
        inner.session = None;
    }

    /// Drops the session if it is still the current one.
    fn mark_lost(&self, session: &Arc<dyn DeviceSession>) {
        let mut inner = self.lock();
        let current = inner
            .session
            .as_ref()
            .is_some_and(|s| Arc::ptr_eq(s, session));

        if current {
            warn!(camera = %self.identity, "Camera connection lost");
            inner.state = ConnectionState::Disconnected;
            inner.session = None;
        }
    }

    fn connected_session(&self) -> CameraResult<(Arc<dyn DeviceSession>, Capabilities, usize)> {
        let inner = self.lock();
        match (&inner.state, &inner.session) {
            (ConnectionState::Connected, Some(session)) => Ok((
                session.clone(),
                inner.capabilities,
                inner.profiles.len(),
            )),
            _ => Err(CameraError::NotConnected),
        }
    }

    /// Converts a device error, dropping the session if the device became unreachable.
    fn device_error(&self, session: &Arc<dyn DeviceSession>, e: DeviceError) -> CameraError {
        if e.is_connection_lost() {
            self.mark_lost(session);
        }
        CameraError::Device(e)
    }

    fn command_outcome(&self, verb: &'static str, result: CameraResult<()>) -> bool {
        match &result {
            Ok(()) => debug!(camera = %self.identity, "PTZ {verb} succeeded"),
            Err(e @ CameraError::Device(_)) => {
                warn!(camera = %self.identity, "PTZ {verb} failed: {e}")
            }
            Err(e) => warn!(camera = %self.identity, "PTZ {verb} rejected: {e}"),
        }

        o11y::inc_ptz_commands_metric(verb, result.is_ok());
        result.is_ok()
    }

    /// Issues one relative move for `motion` at `speed` (in (0, 1]).
    #[tracing::instrument(skip(self), fields(camera = %self.identity))]
    pub async fn move_camera(&self, motion: Motion, speed: f64) -> bool {
        let verb = match motion {
            Motion::ZoomIn | Motion::ZoomOut => "zoom",
            _ => "move",
        };
        let result = self.try_move(motion, speed).await;
        self.command_outcome(verb, result)
    }

    async fn try_move(&self, motion: Motion, speed: f64) -> CameraResult<()> {
        let (session, capabilities, profile_count) = self.connected_session()?;
        if !capabilities.ptz {
            return Err(CameraError::NoPtz);
        }
        if profile_count == 0 {
            return Err(CameraError::NoProfile);
        }

        let translation = self.settings.ptz.translation(motion, speed)?;
        session
            .relative_move(translation)
            .await
            .map_err(|e| self.device_error(&session, e))
    }

    #[tracing::instrument(skip(self), fields(camera = %self.identity))]
    pub async fn stop(&self) -> bool {
        let result = self.try_stop().await;
        self.command_outcome("stop", result)
    }

    async fn try_stop(&self) -> CameraResult<()> {
        let (session, _, _) = self.connected_session()?;
        session
            .stop_motion()
            .await
            .map_err(|e| self.device_error(&session, e))
    }

    /// Moves to the preset with `token`.
    ///
    /// The token is not checked against the known presets, the device decides whether it exists.
    #[tracing::instrument(skip(self), fields(camera = %self.identity))]
    pub async fn goto_preset(&self, token: &str) -> bool {
        let result = self.try_goto_preset(token).await;
        self.command_outcome("goto_preset", result)
    }

    async fn try_goto_preset(&self, token: &str) -> CameraResult<()> {
        let (session, capabilities, _) = self.connected_session()?;
        if !capabilities.ptz {
            return Err(CameraError::NoPtz);
        }
        if token.is_empty() {
            return Err(CameraError::EmptyPresetToken);
        }

        preset::goto_preset(session.as_ref(), token)
            .await
            .map_err(|e| self.device_error(&session, e))
    }

    /// Checks that the device still answers over the current session.
    ///
    /// Any failure marks the camera disconnected. Success never changes the state, only
    /// [`CameraConnection::connect`] can make a camera connected.
    #[tracing::instrument(skip(self), fields(camera = %self.identity))]
    pub async fn health_check(&self) -> bool {
        let session = {
            let mut inner = self.lock();
            if inner.state == ConnectionState::Connecting {
                debug!("Skipping health check while connecting");
                return false;
            }
            match inner.session.clone() {
                Some(session) => session,
                None => {
                    inner.state = ConnectionState::Disconnected;
                    return false;
                }
            }
        };

        let healthy = match session.get_capabilities().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Health check failed: {e}");
                self.mark_lost(&session);
                false
            }
        };

        o11y::inc_health_checks_metric(healthy);
        healthy
    }

    /// Current best known status, never fails.
    pub fn status(&self) -> StatusSnapshot {
        let inner = self.lock();
        let is_connected = inner.state == ConnectionState::Connected;

        StatusSnapshot {
            identity: self.identity.clone(),
            name: self.config.name.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
            state: inner.state,
            is_connected,
            has_ptz: inner.capabilities.ptz,
            profile_count: inner.profiles.len(),
            presets: inner.presets.clone(),
            device: inner.device.clone(),
        }
    }
}
