use crate::o11y;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use onvif2mqtt_core::{
    CameraConfig, CameraIdentity, CameraRegistry, CommandRouter, Motion, StatusSnapshot,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<CameraRegistry>,
    pub(crate) router: CommandRouter,
    pub(crate) mqtt_connected: watch::Receiver<bool>,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/cameras", get(list_cameras).post(add_camera))
        .route("/api/cameras/{name}", get(get_camera).delete(remove_camera))
        .route("/api/cameras/{name}/connect", post(connect_camera))
        .route("/api/cameras/{name}/ptz/move", post(ptz_move))
        .route("/api/cameras/{name}/ptz/stop", post(ptz_stop))
        .route("/api/cameras/{name}/presets", get(list_presets))
        .route("/api/cameras/{name}/presets/{preset}", post(goto_preset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct Outcome {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Outcome {
    fn of(success: bool) -> Json<Self> {
        Json(Self {
            success,
            error: None,
        })
    }

    fn failed(status: StatusCode, error: impl ToString) -> Response {
        (
            status,
            Json(Self {
                success: false,
                error: Some(error.to_string()),
            }),
        )
            .into_response()
    }
}

fn not_found(name: &str) -> Response {
    Outcome::failed(StatusCode::NOT_FOUND, format!("No camera named \"{name}\""))
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    mqtt: bool,
    cameras: usize,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    o11y::inc_http_requests_metric("health");

    Json(Health {
        status: "OK",
        timestamp: chrono::Utc::now(),
        mqtt: *state.mqtt_connected.borrow(),
        cameras: state.registry.connected_count(),
    })
}

async fn list_cameras(
    State(state): State<AppState>,
) -> Json<BTreeMap<CameraIdentity, StatusSnapshot>> {
    o11y::inc_http_requests_metric("list_cameras");

    Json(
        state
            .registry
            .statuses()
            .into_iter()
            .map(|s| (s.identity.clone(), s))
            .collect(),
    )
}

async fn get_camera(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    o11y::inc_http_requests_metric("get_camera");

    match state.registry.find(&name) {
        Some(camera) => Json(camera.status()).into_response(),
        None => not_found(&name),
    }
}

#[derive(Debug, Serialize)]
struct Added {
    success: bool,
    camera: StatusSnapshot,
}

#[tracing::instrument(skip_all)]
/// Registers a camera at runtime. It has no simulated device behind it, so it stays offline.
async fn add_camera(State(state): State<AppState>, Json(config): Json<CameraConfig>) -> Response {
    o11y::inc_http_requests_metric("add_camera");
    debug!("Adding camera: {config:?}");

    let camera = match state.registry.add_camera(config) {
        Ok(camera) => camera,
        Err(e) => {
            warn!("Failed to add camera: {e}");
            return Outcome::failed(StatusCode::BAD_REQUEST, e);
        }
    };

    let _ = camera.connect().await;
    state.registry.report(&camera).await;

    Json(Added {
        success: true,
        camera: camera.status(),
    })
    .into_response()
}

async fn remove_camera(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    o11y::inc_http_requests_metric("remove_camera");

    if state
        .registry
        .remove_camera(&CameraIdentity::from_name(&name))
        .await
    {
        Outcome::of(true).into_response()
    } else {
        not_found(&name)
    }
}

async fn connect_camera(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    o11y::inc_http_requests_metric("connect_camera");

    let identity = CameraIdentity::from_name(&name);
    if state.registry.get(&identity).is_none() {
        return not_found(&name);
    }

    Outcome::of(state.registry.connect_camera(&identity).await).into_response()
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    direction: Motion,
    speed: Option<f64>,
}

async fn ptz_move(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Json<Outcome> {
    o11y::inc_http_requests_metric("ptz_move");

    Outcome::of(
        state
            .router
            .move_camera(&name, request.direction, request.speed)
            .await,
    )
}

async fn ptz_stop(State(state): State<AppState>, Path(name): Path<String>) -> Json<Outcome> {
    o11y::inc_http_requests_metric("ptz_stop");

    Outcome::of(state.router.stop(&name).await)
}

#[derive(Debug, Serialize)]
struct Preset {
    name: String,
    token: String,
}

async fn list_presets(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    o11y::inc_http_requests_metric("list_presets");

    let Some(camera) = state.registry.find(&name) else {
        return not_found(&name);
    };

    let presets: Vec<_> = camera
        .status()
        .presets
        .into_iter()
        .map(|(name, token)| Preset { name, token })
        .collect();

    Json(presets).into_response()
}

async fn goto_preset(
    State(state): State<AppState>,
    Path((name, preset)): Path<(String, String)>,
) -> Json<Outcome> {
    o11y::inc_http_requests_metric("goto_preset");

    Outcome::of(state.router.goto_preset(&name, &preset).await)
}
