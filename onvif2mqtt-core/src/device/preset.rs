use super::{DeviceError, DeviceResult, DeviceSession, PresetMap};
use tracing::debug;

/// The method names under which a device session may expose preset operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetApi {
    /// `getPresets` / `gotoPreset`
    Standard,
    /// `ptzGetPresets` / `ptzGotoPreset`
    Ptz,
}

/// Order in which preset APIs are probed.
const PROBE_ORDER: [PresetApi; 2] = [PresetApi::Standard, PresetApi::Ptz];

enum Probe<T> {
    Done(T),
    NotSupported,
    Failed(DeviceError),
}

impl<T> From<DeviceResult<T>> for Probe<T> {
    fn from(result: DeviceResult<T>) -> Self {
        match result {
            Ok(v) => Self::Done(v),
            Err(DeviceError::Unsupported) => Self::NotSupported,
            Err(e) => Self::Failed(e),
        }
    }
}

impl PresetApi {
    async fn list(self, session: &dyn DeviceSession) -> Probe<PresetMap> {
        match self {
            Self::Standard => session.get_presets().await,
            Self::Ptz => session.ptz_get_presets().await,
        }
        .into()
    }

    async fn goto(self, session: &dyn DeviceSession, token: &str) -> Probe<()> {
        match self {
            Self::Standard => session.goto_preset(token).await,
            Self::Ptz => session.ptz_goto_preset(token).await,
        }
        .into()
    }
}

/// Returns the first successful probe, otherwise the last operational failure, otherwise
/// [`DeviceError::Unsupported`] when no API is available at all.
fn settle<T>(outcomes: Vec<(PresetApi, Probe<T>)>) -> DeviceResult<T> {
    let mut failure = None;

    for (api, outcome) in outcomes {
        match outcome {
            Probe::Done(v) => return Ok(v),
            Probe::NotSupported => debug!("Preset API {api:?} is not supported"),
            Probe::Failed(e) => {
                debug!("Preset API {api:?} failed: {e}");
                failure = Some(e);
            }
        }
    }

    Err(failure.unwrap_or(DeviceError::Unsupported))
}

pub(crate) async fn list_presets(session: &dyn DeviceSession) -> DeviceResult<PresetMap> {
    let mut outcomes = Vec::new();
    for api in PROBE_ORDER {
        let outcome = api.list(session).await;
        let done = matches!(outcome, Probe::Done(_));
        outcomes.push((api, outcome));
        if done {
            break;
        }
    }
    settle(outcomes)
}

pub(crate) async fn goto_preset(session: &dyn DeviceSession, token: &str) -> DeviceResult<()> {
    let mut outcomes = Vec::new();
    for api in PROBE_ORDER {
        let outcome = api.goto(session, token).await;
        let done = matches!(outcome, Probe::Done(_));
        outcomes.push((api, outcome));
        if done {
            break;
        }
    }
    settle(outcomes)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::simulated::{DeviceCall, SimulatedCameraConfig, SimulatedPresetApi};

    fn session(api: SimulatedPresetApi) -> crate::device::simulated::SimulatedSession {
        let config = SimulatedCameraConfig {
            preset_api: api,
            presets: [("Gate".to_string(), "1".to_string())].into(),
            ..Default::default()
        };
        crate::device::simulated::SimulatedCamera::new(config).session()
    }

    #[tokio::test]
    async fn list_standard() {
        let session = session(SimulatedPresetApi::Standard);
        let presets = list_presets(&session).await.unwrap();
        assert_eq!(presets.get("Gate").unwrap(), "1");
        assert_eq!(session.camera().calls(), vec![DeviceCall::GetPresets]);
    }

    #[tokio::test]
    async fn list_falls_back_to_ptz() {
        let session = session(SimulatedPresetApi::Ptz);
        let presets = list_presets(&session).await.unwrap();
        assert_eq!(presets.len(), 1);
        assert_eq!(
            session.camera().calls(),
            vec![DeviceCall::GetPresets, DeviceCall::PtzGetPresets]
        );
    }

    #[tokio::test]
    async fn list_none_supported() {
        let session = session(SimulatedPresetApi::None);
        assert_eq!(
            list_presets(&session).await,
            Err(DeviceError::Unsupported)
        );
    }

    #[tokio::test]
    async fn goto_falls_back_to_ptz() {
        let session = session(SimulatedPresetApi::Ptz);
        assert!(goto_preset(&session, "1").await.is_ok());
        assert_eq!(
            session.camera().calls(),
            vec![
                DeviceCall::GotoPreset("1".into()),
                DeviceCall::PtzGotoPreset("1".into())
            ]
        );
    }

    #[tokio::test]
    async fn goto_failure_surfaces_when_both_fail() {
        let session = session(SimulatedPresetApi::Both);
        assert!(matches!(
            goto_preset(&session, "missing").await,
            Err(DeviceError::Fault(_))
        ));
        assert_eq!(session.camera().calls().len(), 2);
    }

    #[test]
    fn settle_prefers_failure_over_unsupported() {
        let outcomes: Vec<(PresetApi, Probe<()>)> = vec![
            (PresetApi::Standard, Probe::Failed(DeviceError::Timeout)),
            (PresetApi::Ptz, Probe::NotSupported),
        ];
        assert_eq!(settle(outcomes), Err(DeviceError::Timeout));
    }
}
