#[ctor::ctor]
fn init() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .init();
}

mod broker_restart;
mod end_to_end;

use onvif2mqtt_testing_utils::{CargoBinaryRunner, MosquittoDriver};
use std::{io::Write, time::Duration};
use tempfile::NamedTempFile;

const HTTP_ADDRESS: &str = "127.0.0.1:8000";
const OBSERVABILITY_ADDRESS: &str = "127.0.0.1:9090";

/// Two simulated cameras and one camera with no device behind it.
///
/// A duplicate of the first camera is rejected and must not replace its simulated device.
fn gateway_config(mosquitto: &MosquittoDriver) -> NamedTempFile {
    let contents = format!(
        indoc::indoc!(
            r#"
            status_interval = 1
            health_check_interval = 2

            [mqtt]
            broker = "{}"
            client_id = "onvif2mqtt-test"

            [connection]
            timeout = 2

            [[cameras]]
            name = "Front Door"
            host = "10.0.0.5"
            username = "admin"
            password = "secret"

            [cameras.simulation]
            [cameras.simulation.presets]
            Gate = "1"
            Yard = "2"

            [[cameras]]
            name = "front door"
            host = "10.0.0.5"
            username = "admin"

            [cameras.simulation]
            ptz = false
            unreachable = true

            [[cameras]]
            name = "Garage"
            host = "10.0.0.6"
            username = "admin"

            [cameras.simulation]
            ptz = false

            [[cameras]]
            name = "Shed"
            host = "10.0.0.7"
            username = "admin"
            "#
        ),
        mosquitto.address(),
    );

    let file = NamedTempFile::new().unwrap();
    file.as_file().write_all(contents.as_bytes()).unwrap();
    file
}

async fn start_gateway(config: &NamedTempFile) -> CargoBinaryRunner {
    let gateway = CargoBinaryRunner::new(
        "onvif2mqtt-gateway".to_string(),
        vec![
            "--config".to_string(),
            config.path().display().to_string(),
            "--http-server-address".to_string(),
            HTTP_ADDRESS.to_string(),
            "--observability-address".to_string(),
            OBSERVABILITY_ADDRESS.to_string(),
        ],
        vec![("RUST_LOG".to_string(), "debug".to_string())],
    );

    assert!(
        onvif2mqtt_testing_utils::wait_for_url(
            &format!("http://{OBSERVABILITY_ADDRESS}"),
            Duration::from_secs(600)
        )
        .await,
        "gateway should be running"
    );

    gateway
}
