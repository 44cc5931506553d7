use serde::Serialize;
use std::fmt;

/// Normalized key addressing a camera in the registry and in messaging topics.
///
/// Derived from the display name by lower-casing it and collapsing every run of whitespace into
/// a single `_`. Normalizing an already normalized identity yields the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CameraIdentity(String);

impl CameraIdentity {
    pub fn from_name(name: &str) -> Self {
        let normalized = name
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("_");

        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CameraIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CameraIdentity {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl AsRef<str> for CameraIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
