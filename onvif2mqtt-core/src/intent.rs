use crate::CameraIdentity;
use serde::Deserialize;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// A single logical PTZ motion, as accepted by a camera connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motion {
    Up,
    Down,
    Left,
    Right,
    ZoomIn,
    ZoomOut,
}

impl From<Direction> for Motion {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => Self::Up,
            Direction::Down => Self::Down,
            Direction::Left => Self::Left,
            Direction::Right => Self::Right,
        }
    }
}

impl From<ZoomDirection> for Motion {
    fn from(direction: ZoomDirection) -> Self {
        match direction {
            ZoomDirection::In => Self::ZoomIn,
            ZoomDirection::Out => Self::ZoomOut,
        }
    }
}

impl Motion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::ZoomIn => "zoom_in",
            Self::ZoomOut => "zoom_out",
        }
    }
}

impl fmt::Display for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown motion \"{0}\"")]
pub struct UnknownMotion(pub String);

impl FromStr for Motion {
    type Err = UnknownMotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "zoom_in" => Ok(Self::ZoomIn),
            "zoom_out" => Ok(Self::ZoomOut),
            _ => Err(UnknownMotion(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PtzCommand {
    Move { direction: Direction, speed: f64 },
    Zoom { direction: ZoomDirection, speed: f64 },
    Stop,
    GotoPreset { token: String },
}

impl PtzCommand {
    pub fn from_motion(motion: Motion, speed: f64) -> Self {
        match motion {
            Motion::Up => Self::Move {
                direction: Direction::Up,
                speed,
            },
            Motion::Down => Self::Move {
                direction: Direction::Down,
                speed,
            },
            Motion::Left => Self::Move {
                direction: Direction::Left,
                speed,
            },
            Motion::Right => Self::Move {
                direction: Direction::Right,
                speed,
            },
            Motion::ZoomIn => Self::Zoom {
                direction: ZoomDirection::In,
                speed,
            },
            Motion::ZoomOut => Self::Zoom {
                direction: ZoomDirection::Out,
                speed,
            },
        }
    }

    /// The motion and speed of a move or zoom command.
    pub fn motion(&self) -> Option<(Motion, f64)> {
        match *self {
            Self::Move { direction, speed } => Some((direction.into(), speed)),
            Self::Zoom { direction, speed } => Some((direction.into(), speed)),
            Self::Stop | Self::GotoPreset { .. } => None,
        }
    }

    /// Name of the command, used as a metric label.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Zoom { .. } => "zoom",
            Self::Stop => "stop",
            Self::GotoPreset { .. } => "goto_preset",
        }
    }
}

/// A command addressed to one camera, consumed once by the command router.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandIntent {
    pub target: CameraIdentity,
    pub command: PtzCommand,
}

impl CommandIntent {
    pub fn new(target: CameraIdentity, command: PtzCommand) -> Self {
        Self { target, command }
    }
}
