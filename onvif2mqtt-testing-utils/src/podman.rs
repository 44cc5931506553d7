use std::process::Command;
use tracing::{debug, info, warn};

/// A container started with podman, removed again on drop.
pub struct PodmanDriver {
    container_id: String,
}

impl PodmanDriver {
    /// Starts `image` detached.
    ///
    /// `ports` and `volumes` are passed through as `-p` and `-v` specs.
    pub fn new(image: &str, ports: &[&str], volumes: &[&str], args: &[&str]) -> Self {
        let mut command = Command::new("podman");
        let _ = command.args(["run", "--detach", "--rm"]);

        for port in ports {
            let _ = command.args(["-p", port]);
        }
        for volume in volumes {
            let _ = command.args(["-v", volume]);
        }

        let _ = command.arg(image).args(args);

        let output = command.output().expect("podman should be runnable");
        debug!("Container start: {output:?}");
        assert!(
            output.status.success(),
            "failed to start {image}: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let container_id = String::from_utf8(output.stdout)
            .expect("container ID should be UTF-8")
            .trim()
            .to_string();
        info!("Started {image} as {container_id}");

        Self { container_id }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Stops the container without removing the driver, e.g. to simulate a broker outage.
    pub fn stop(&self) {
        match Command::new("podman")
            .args(["stop", &self.container_id])
            .output()
        {
            Ok(output) => debug!("Container stop: {output:?}"),
            Err(e) => warn!("Failed to stop container {}: {e}", self.container_id),
        }
    }
}

impl Drop for PodmanDriver {
    fn drop(&mut self) {
        self.stop();
        let _ = Command::new("podman")
            .args(["rm", "--force", &self.container_id])
            .output();
    }
}
