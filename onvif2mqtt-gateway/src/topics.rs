use onvif2mqtt_core::{CameraIdentity, CommandIntent, Motion, PtzCommand};

const COMMAND: &str = "cmd";
const GOTO_PRESET: &str = "goPreset";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub(crate) enum CommandParseError {
    #[error("Topic \"{0}\" is not a camera command topic")]
    UnknownTopic(String),

    #[error("Unknown command \"{0}\"")]
    UnknownCommand(String),

    #[error("Preset token is empty")]
    EmptyPresetToken,

    #[error("Payload is not valid UTF-8")]
    InvalidPayload,
}

/// Topic layout below the base topic.
#[derive(Debug, Clone)]
pub(crate) struct Topics {
    base: String,
}

impl Topics {
    pub(crate) fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn gateway_availability(&self) -> String {
        format!("{}/lwt", self.base)
    }

    fn camera(&self, identity: &CameraIdentity, leaf: &str) -> String {
        format!("{}/{identity}/{leaf}", self.base)
    }

    pub(crate) fn availability(&self, identity: &CameraIdentity) -> String {
        self.camera(identity, "lwt")
    }

    pub(crate) fn status(&self, identity: &CameraIdentity) -> String {
        self.camera(identity, "status")
    }

    pub(crate) fn ptz_capability(&self, identity: &CameraIdentity) -> String {
        self.camera(identity, "capabilities/ptz")
    }

    pub(crate) fn presets(&self, identity: &CameraIdentity) -> String {
        self.camera(identity, "presets")
    }

    pub(crate) fn goto_preset(&self, identity: &CameraIdentity) -> String {
        self.camera(identity, GOTO_PRESET)
    }

    /// Topic filters for inbound commands.
    pub(crate) fn subscriptions(&self) -> [String; 2] {
        [
            format!("{}/+/{COMMAND}", self.base),
            format!("{}/+/{GOTO_PRESET}", self.base),
        ]
    }

    /// Turns an inbound message into a command intent.
    ///
    /// `default_speed` is used for move and zoom commands, which carry no speed of their own.
    pub(crate) fn parse_command(
        &self,
        topic: &str,
        payload: &[u8],
        default_speed: f64,
    ) -> Result<CommandIntent, CommandParseError> {
        let unknown_topic = || CommandParseError::UnknownTopic(topic.to_string());

        let rest = topic
            .strip_prefix(&self.base)
            .and_then(|t| t.strip_prefix('/'))
            .ok_or_else(unknown_topic)?;
        let (camera, leaf) = rest.split_once('/').ok_or_else(unknown_topic)?;
        if camera.is_empty() {
            return Err(unknown_topic());
        }
        let target = CameraIdentity::from_name(camera);

        let payload = std::str::from_utf8(payload)
            .map_err(|_| CommandParseError::InvalidPayload)?
            .trim();

        let command = match leaf {
            COMMAND => parse_ptz_command(payload, default_speed)?,
            GOTO_PRESET => {
                if payload.is_empty() {
                    return Err(CommandParseError::EmptyPresetToken);
                }
                PtzCommand::GotoPreset {
                    token: payload.to_string(),
                }
            }
            _ => return Err(unknown_topic()),
        };

        Ok(CommandIntent::new(target, command))
    }
}

fn parse_ptz_command(payload: &str, speed: f64) -> Result<PtzCommand, CommandParseError> {
    let motion = match payload {
        "stop" => return Ok(PtzCommand::Stop),
        "move-left" => Motion::Left,
        "move-right" => Motion::Right,
        "move-up" => Motion::Up,
        "move-down" => Motion::Down,
        "zoom-in" => Motion::ZoomIn,
        "zoom-out" => Motion::ZoomOut,
        _ => return Err(CommandParseError::UnknownCommand(payload.to_string())),
    };

    Ok(PtzCommand::from_motion(motion, speed))
}
