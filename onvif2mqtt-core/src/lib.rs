//! Camera connection lifecycle and command dispatch.

mod connection;
pub mod device;
pub mod error;
mod identity;
pub mod intent;
pub mod o11y;
mod registry;
mod router;
pub mod settings;
pub mod status;

pub use self::{
    connection::CameraConnection,
    error::{CameraError, CameraResult, RegistryError, RegistryResult},
    identity::CameraIdentity,
    intent::{CommandIntent, Motion, PtzCommand},
    registry::CameraRegistry,
    router::CommandRouter,
    settings::{CameraConfig, CameraSettings, PtzSettings},
    status::{Availability, ConnectionState, StatusPublisher, StatusSnapshot},
};

#[cfg(test)]
#[ctor::ctor]
fn init() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .init();
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::{
        CameraConfig, CameraIdentity,
        status::{Availability, StatusPublisher, StatusSnapshot},
    };
    use async_trait::async_trait;
    use std::{collections::HashMap, sync::Mutex};

    pub(crate) fn camera_config(name: &str, host: &str) -> CameraConfig {
        CameraConfig {
            name: name.to_string(),
            host: host.to_string(),
            port: 80,
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Published {
        Status(CameraIdentity),
        Availability(CameraIdentity, Availability),
        Removed(CameraIdentity),
    }

    #[derive(Default)]
    struct Recorded {
        published: Vec<Published>,
        statuses: Vec<StatusSnapshot>,
        updates: Vec<Vec<StatusSnapshot>>,
    }

    #[derive(Default)]
    pub(crate) struct RecordingPublisher {
        recorded: Mutex<Recorded>,
    }

    impl RecordingPublisher {
        pub(crate) fn published(&self) -> Vec<Published> {
            self.recorded.lock().unwrap().published.clone()
        }

        pub(crate) fn statuses(&self) -> Vec<StatusSnapshot> {
            self.recorded.lock().unwrap().statuses.clone()
        }

        pub(crate) fn updates(&self) -> Vec<Vec<StatusSnapshot>> {
            self.recorded.lock().unwrap().updates.clone()
        }

        /// Availability changes per camera, in publication order.
        pub(crate) fn availability(&self) -> HashMap<CameraIdentity, Vec<Availability>> {
            let mut availability: HashMap<_, Vec<_>> = HashMap::new();
            for published in self.published() {
                if let Published::Availability(identity, a) = published {
                    availability.entry(identity).or_default().push(a);
                }
            }
            availability
        }

        pub(crate) fn clear(&self) {
            *self.recorded.lock().unwrap() = Recorded::default();
        }
    }

    #[async_trait]
    impl StatusPublisher for RecordingPublisher {
        async fn publish_status(&self, identity: &CameraIdentity, snapshot: &StatusSnapshot) {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.published.push(Published::Status(identity.clone()));
            recorded.statuses.push(snapshot.clone());
        }

        async fn publish_availability(
            &self,
            identity: &CameraIdentity,
            availability: Availability,
        ) {
            self.recorded
                .lock()
                .unwrap()
                .published
                .push(Published::Availability(identity.clone(), availability));
        }

        async fn on_status_update(&self, snapshots: &[StatusSnapshot]) {
            self.recorded.lock().unwrap().updates.push(snapshots.to_vec());
        }

        async fn on_camera_removed(&self, identity: &CameraIdentity) {
            self.recorded
                .lock()
                .unwrap()
                .published
                .push(Published::Removed(identity.clone()));
        }
    }
}
