use crate::PodmanDriver;
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG: &[u8] = b"allow_anonymous true\nlistener 1883\n";

/// Mosquitto broker in a container, on a random local port.
pub struct MosquittoDriver {
    podman: PodmanDriver,
    port: u16,
    _config: NamedTempFile,
}

impl Default for MosquittoDriver {
    fn default() -> Self {
        Self::with_port(rand::random::<u16>() % 1000 + 18000)
    }
}

impl MosquittoDriver {
    pub fn with_port(port: u16) -> Self {
        let mut config = NamedTempFile::new().expect("temporary file should be created");
        config
            .write_all(CONFIG)
            .expect("broker config should be written");

        let podman = PodmanDriver::new(
            "docker.io/library/eclipse-mosquitto",
            &[&format!("{port}:1883")],
            &[&format!(
                "{}:/mosquitto/config/mosquitto.conf:ro",
                config.path().display()
            )],
            &[],
        );

        Self {
            podman,
            port,
            _config: config,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Broker URL as accepted in the gateway configuration.
    pub fn address(&self) -> String {
        format!("mqtt://localhost:{}", self.port)
    }

    pub fn stop(&self) {
        self.podman.stop();
    }
}
