use crate::{
    CameraIdentity,
    intent::{CommandIntent, Motion, PtzCommand},
    o11y,
    registry::CameraRegistry,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Delivers command intents to cameras.
///
/// Commands are fire and forget: a command that cannot be delivered is logged and dropped. The
/// only retry is a single reconnection of a disconnected target before dispatching.
#[derive(Clone)]
pub struct CommandRouter {
    registry: Arc<CameraRegistry>,
}

impl CommandRouter {
    pub fn new(registry: Arc<CameraRegistry>) -> Self {
        Self { registry }
    }

    #[tracing::instrument(skip(self, intent), fields(camera = %intent.target, verb = intent.command.verb()))]
    pub async fn dispatch(&self, intent: CommandIntent) -> bool {
        let verb = intent.command.verb();

        let Some(camera) = self.registry.get(&intent.target) else {
            warn!("Dropping command for unknown camera");
            o11y::inc_dispatched_commands_metric(verb, "unknown_camera");
            return false;
        };

        if !camera.is_connected() {
            info!("Camera is not connected, reconnecting before dispatch");
            if !self.registry.attempt_reconnection(&camera, 1).await {
                warn!("Dropping command, camera could not be reconnected");
                o11y::inc_dispatched_commands_metric(verb, "disconnected");
                return false;
            }
        }

        if !camera.has_ptz() {
            warn!("Dropping command, camera does not support PTZ");
            o11y::inc_dispatched_commands_metric(verb, "no_ptz");
            return false;
        }

        let before = camera.state();

        let ok = match &intent.command {
            PtzCommand::Move { .. } | PtzCommand::Zoom { .. } => match intent.command.motion() {
                Some((motion, speed)) => camera.move_camera(motion, speed).await,
                None => false,
            },
            PtzCommand::Stop => camera.stop().await,
            PtzCommand::GotoPreset { token } => camera.goto_preset(token).await,
        };

        if camera.state() != before {
            self.registry.report(&camera).await;
        }

        info!("Command {}", if ok { "succeeded" } else { "failed" });
        o11y::inc_dispatched_commands_metric(verb, if ok { "success" } else { "failure" });
        ok
    }

    /// Moves the camera named `name`, at the configured default speed unless one is given.
    pub async fn move_camera(&self, name: &str, motion: Motion, speed: Option<f64>) -> bool {
        let speed = speed.unwrap_or(self.registry.settings().ptz.default_speed);
        self.dispatch(CommandIntent::new(
            CameraIdentity::from_name(name),
            PtzCommand::from_motion(motion, speed),
        ))
        .await
    }

    pub async fn stop(&self, name: &str) -> bool {
        self.dispatch(CommandIntent::new(
            CameraIdentity::from_name(name),
            PtzCommand::Stop,
        ))
        .await
    }

    pub async fn goto_preset(&self, name: &str, token: &str) -> bool {
        self.dispatch(CommandIntent::new(
            CameraIdentity::from_name(name),
            PtzCommand::GotoPreset {
                token: token.to_string(),
            },
        ))
        .await
    }
}
