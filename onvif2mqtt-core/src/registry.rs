use crate::{
    CameraIdentity,
    connection::CameraConnection,
    device::DeviceConnector,
    error::{RegistryError, RegistryResult},
    o11y,
    settings::{CameraConfig, CameraSettings},
    status::{Availability, ConnectionState, StatusPublisher, StatusSnapshot},
};
use futures::future::join_all;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Monitor {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns every configured camera and drives their connection lifecycle.
pub struct CameraRegistry {
    connector: Arc<dyn DeviceConnector>,
    settings: CameraSettings,
    publisher: Arc<dyn StatusPublisher>,

    cameras: RwLock<HashMap<CameraIdentity, Arc<CameraConnection>>>,

    /// Availability last sent to the publisher, per camera.
    last_availability: Mutex<HashMap<CameraIdentity, Availability>>,

    monitor: Mutex<Option<Monitor>>,
}

impl CameraRegistry {
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        settings: CameraSettings,
        publisher: Arc<dyn StatusPublisher>,
    ) -> Self {
        Self {
            connector,
            settings,
            publisher,
            cameras: Default::default(),
            last_availability: Default::default(),
            monitor: Default::default(),
        }
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Registers a camera without connecting to it.
    ///
    /// Fails if the configuration is invalid or another camera already has the same identity.
    pub fn add_camera(&self, config: CameraConfig) -> RegistryResult<Arc<CameraConnection>> {
        config.validate()?;
        let identity = config.identity();

        let mut cameras = self
            .cameras
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if cameras.contains_key(&identity) {
            return Err(RegistryError::DuplicateIdentity(identity));
        }

        let camera = Arc::new(CameraConnection::new(
            config,
            self.settings.clone(),
            self.connector.clone(),
        ));
        let _ = cameras.insert(identity.clone(), camera.clone());
        info!("Added camera \"{}\" as {identity}", camera.name());

        Ok(camera)
    }

    /// Disconnects and forgets a camera. Returns `false` if there is no such camera.
    #[tracing::instrument(skip(self))]
    pub async fn remove_camera(&self, identity: &CameraIdentity) -> bool {
        let removed = self
            .cameras
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);

        let Some(camera) = removed else {
            warn!("No camera to remove");
            return false;
        };

        camera.disconnect();

        let last = self
            .last_availability
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);
        if last == Some(Availability::Online) {
            self.publisher
                .publish_availability(identity, Availability::Offline)
                .await;
        }
        self.publisher.on_camera_removed(identity).await;

        o11y::set_connected_cameras_metric(self.connected_count());
        info!("Removed camera");
        true
    }

    pub fn get(&self, identity: &CameraIdentity) -> Option<Arc<CameraConnection>> {
        self.cameras
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    /// Looks up a camera by display name or identity.
    pub fn find(&self, name: &str) -> Option<Arc<CameraConnection>> {
        self.get(&CameraIdentity::from_name(name))
    }

    /// All cameras, ordered by identity.
    pub fn cameras(&self) -> Vec<Arc<CameraConnection>> {
        let mut cameras: Vec<_> = self
            .cameras
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        cameras.sort_by(|a, b| a.identity().cmp(b.identity()));
        cameras
    }

    pub fn statuses(&self) -> Vec<StatusSnapshot> {
        self.cameras().iter().map(|c| c.status()).collect()
    }

    pub fn status(&self, identity: &CameraIdentity) -> Option<StatusSnapshot> {
        self.get(identity).map(|c| c.status())
    }

    pub fn connected_count(&self) -> usize {
        self.cameras().iter().filter(|c| c.is_connected()).count()
    }

    /// Records `availability` as the last one sent, returning whether it changed.
    fn availability_changed(&self, identity: &CameraIdentity, availability: Availability) -> bool {
        let previous = self
            .last_availability
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.clone(), availability);
        previous != Some(availability)
    }

    async fn publish_snapshot(&self, snapshot: &StatusSnapshot) {
        self.publisher
            .publish_status(&snapshot.identity, snapshot)
            .await;

        let availability = snapshot.availability();
        if self.availability_changed(&snapshot.identity, availability) {
            self.publisher
                .publish_availability(&snapshot.identity, availability)
                .await;
        }
    }

    /// Whether `camera` is the connection currently registered under its identity.
    fn is_registered(&self, camera: &CameraConnection) -> bool {
        self.get(camera.identity())
            .is_some_and(|registered| std::ptr::eq(Arc::as_ptr(&registered), camera))
    }

    /// Publishes the current status of `camera`, and its availability if that flipped.
    ///
    /// Cameras that have been removed in the meantime are not reported.
    pub async fn report(&self, camera: &CameraConnection) {
        if !self.is_registered(camera) {
            debug!(camera = %camera.identity(), "Not reporting removed camera");
            return;
        }

        self.publish_snapshot(&camera.status()).await;
        o11y::set_connected_cameras_metric(self.connected_count());
    }

    #[tracing::instrument(skip(self))]
    pub async fn connect_camera(&self, identity: &CameraIdentity) -> bool {
        let Some(camera) = self.get(identity) else {
            warn!("No such camera");
            return false;
        };

        let connected = camera.connect().await;
        self.report(&camera).await;
        connected
    }

    /// Connects every camera concurrently. One camera failing does not affect the others.
    pub async fn connect_all(&self) -> Vec<(CameraIdentity, bool)> {
        let cameras = self.cameras();

        let results = join_all(cameras.iter().map(|camera| async move {
            let connected = camera.connect().await;
            self.report(camera).await;
            (camera.identity().clone(), connected)
        }))
        .await;

        let connected = results.iter().filter(|(_, ok)| *ok).count();
        info!("Connected to {connected} of {} cameras", results.len());
        for (identity, _) in results.iter().filter(|(_, ok)| !*ok) {
            warn!("Camera {identity} failed to connect");
        }

        results
    }

    /// Tries to connect `camera` up to `max_attempts` times.
    ///
    /// An already connected camera counts as success. A camera that is currently connecting is
    /// left to the attempt in flight and counts as failure.
    #[tracing::instrument(skip(self, camera), fields(camera = %camera.identity()))]
    pub async fn attempt_reconnection(&self, camera: &CameraConnection, max_attempts: u32) -> bool {
        let mut connected = false;

        for attempt in 1..=max_attempts {
            match camera.state() {
                ConnectionState::Connected => return true,
                ConnectionState::Connecting => {
                    debug!("Reconnection already in progress");
                    return false;
                }
                ConnectionState::Disconnected => {}
            }

            info!("Reconnection attempt {attempt}/{max_attempts}");
            connected = camera.connect().await;
            if connected {
                break;
            }
        }

        self.report(camera).await;
        connected
    }

    /// Runs one monitoring round.
    ///
    /// Publishes a snapshot of every camera, then schedules a reconnection for each disconnected
    /// one. The reconnections are not awaited; their handles are returned.
    pub async fn tick(self: &Arc<Self>) -> Vec<JoinHandle<bool>> {
        let cameras = self.cameras();
        let snapshots: Vec<_> = cameras.iter().map(|c| c.status()).collect();

        self.publisher.on_status_update(&snapshots).await;

        for (camera, snapshot) in cameras.iter().zip(&snapshots) {
            if self.is_registered(camera) {
                self.publish_snapshot(snapshot).await;
            }
        }
        o11y::set_connected_cameras_metric(
            snapshots.iter().filter(|s| s.is_connected).count(),
        );

        cameras
            .into_iter()
            .filter(|c| c.state() == ConnectionState::Disconnected)
            .map(|camera| {
                let registry = self.clone();
                tokio::spawn(async move { registry.attempt_reconnection(&camera, 1).await })
            })
            .collect()
    }

    /// Starts calling [`CameraRegistry::tick`] every `interval`, first one interval from now.
    pub fn start_status_monitoring(self: &Arc<Self>, interval: Duration) {
        if interval.is_zero() {
            warn!("Refusing to monitor status with a zero interval");
            return;
        }

        let mut monitor = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if monitor.is_some() {
            warn!("Status monitoring is already running");
            return;
        }

        let shutdown = CancellationToken::new();
        let registry = Arc::downgrade(self);

        let handle = tokio::spawn({
            let shutdown = shutdown.clone();

            async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let Some(registry) = registry.upgrade() else {
                                break;
                            };
                            tokio::select! {
                                _ = registry.tick() => {}
                                _ = shutdown.cancelled() => {
                                    break;
                                }
                            }
                        }
                        _ = shutdown.cancelled() => {
                            break;
                        }
                    }
                }

                debug!("Status monitoring stopped");
            }
        });

        info!("Monitoring camera status every {interval:?}");
        *monitor = Some(Monitor { shutdown, handle });
    }

    pub async fn stop_status_monitoring(&self) {
        let monitor = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(monitor) = monitor {
            monitor.shutdown.cancel();
            if let Err(e) = monitor.handle.await {
                warn!("Status monitoring task failed: {e}");
            }
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub async fn disconnect_all_cameras(&self) {
        for camera in self.cameras() {
            camera.disconnect();
            self.report(&camera).await;
        }
    }

    /// Health checks every camera, reporting the ones whose state changed as a result.
    pub async fn health_check_all(&self) -> Vec<(CameraIdentity, bool)> {
        let cameras = self.cameras();

        join_all(cameras.iter().map(|camera| async move {
            let before = camera.state();
            let healthy = camera.health_check().await;
            if camera.state() != before {
                self.report(camera).await;
            }
            (camera.identity().clone(), healthy)
        }))
        .await
    }
}
