mod api;
mod config;
mod discovery;
mod o11y;
mod publisher;
mod topics;

use crate::{
    api::AppState,
    config::{Config, ConfiguredCamera},
    publisher::MqttStatusPublisher,
    topics::Topics,
};
use clap::Parser;
use miette::{Context, IntoDiagnostic};
use onvif2mqtt_common::mqtt::MqttClient;
use onvif2mqtt_core::{CameraRegistry, CommandRouter, device::simulated::SimulatedConnector};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::{net::TcpListener, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Bridge IP camera control to MQTT.
#[derive(Clone, Parser)]
#[command(
    author,
    version = onvif2mqtt_common::version!(),
)]
pub(crate) struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "CONFIG_FILE", value_name = "FILE")]
    config: PathBuf,

    /// Address to listen on for HTTP API endpoints
    #[clap(long, env = "HTTP_SERVER_ADDRESS", default_value = "127.0.0.1:8000")]
    http_server_address: SocketAddr,

    /// Address to listen on for observability/metrics endpoints
    #[clap(long, env = "OBSERVABILITY_ADDRESS", default_value = "127.0.0.1:9090")]
    observability_address: SocketAddr,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt::init();

    // Parse CLI and load configuration file
    let cli = Cli::parse();
    let config: Config = onvif2mqtt_common::load_config_file(&cli.config)?;
    config.validate()?;

    o11y::init(cli.observability_address)?;

    // Set up MQTT client
    let topics = Topics::new(config.mqtt.base_topic());
    let mut mqtt_client = topics.subscriptions().into_iter().fold(
        MqttClient::try_from(&config.mqtt)
            .into_diagnostic()
            .wrap_err("Failed to create MQTT client")?,
        MqttClient::with_subscription,
    );

    let publisher = Arc::new(MqttStatusPublisher::new(
        mqtt_client.client(),
        topics.clone(),
        &config.discovery,
    ));

    // Register cameras
    let connector = Arc::new(SimulatedConnector::default());
    let registry = Arc::new(CameraRegistry::new(
        connector.clone(),
        config.camera_settings(),
        publisher.clone(),
    ));

    for ConfiguredCamera { camera, simulation } in config.cameras() {
        let camera = match registry.add_camera(camera) {
            Ok(camera) => camera,
            Err(e) => {
                warn!("Skipping camera: {e}");
                continue;
            }
        };

        match simulation {
            Some(simulation) => {
                let _ = connector.add(camera.host(), simulation);
            }
            None => warn!(
                "Camera \"{}\" has no device backend and will be reported offline",
                camera.name()
            ),
        }
    }

    let router = CommandRouter::new(registry.clone());
    let default_speed = registry.settings().ptz.default_speed;

    let shutdown = CancellationToken::new();

    // Configure HTTP server
    let app = api::router(AppState {
        registry: registry.clone(),
        router: router.clone(),
        mqtt_connected: mqtt_client.connected(),
    });

    let listener = TcpListener::bind(&cli.http_server_address)
        .await
        .into_diagnostic()
        .wrap_err(format!(
            "Failed to bind API server to {}",
            cli.http_server_address
        ))?;

    info!("Starting HTTP server on {}", cli.http_server_address);
    let server_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
            {
                error!("HTTP server failed: {e}");
            }
        })
    };

    // Connect cameras and start monitoring, while the MQTT event loop is polled below
    let startup_handle = {
        let registry = registry.clone();
        let publisher = publisher.clone();
        let status_interval = config.status_interval;
        tokio::spawn(async move {
            publisher.publish_gateway_discovery().await;
            let _ = registry.connect_all().await;
            registry.start_status_monitoring(status_interval);
        })
    };

    let mut health_check_interval = tokio::time::interval_at(
        Instant::now() + config.health_check_interval,
        config.health_check_interval,
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Exiting.");
                break;
            }
            msg = mqtt_client.poll() => {
                if let Some(msg) = msg {
                    handle_mqtt_message(msg, &topics, &router, default_speed);
                }
            }
            _ = health_check_interval.tick() => {
                debug!("Running health checks");
                let registry = registry.clone();
                let _ = tokio::spawn(async move {
                    let _ = registry.health_check_all().await;
                });
            }
        }
    }

    // Stop monitoring and report every camera offline, polling MQTT so publishes can drain
    startup_handle.abort();
    {
        let teardown = async {
            registry.stop_status_monitoring().await;
            registry.disconnect_all_cameras().await;
        };
        tokio::pin!(teardown);
        loop {
            tokio::select! {
                _ = &mut teardown => break,
                _ = mqtt_client.poll() => {}
            }
        }
    }

    // Disconnect MQTT client
    mqtt_client.disconnect().await;

    // Stop HTTP server
    info!("Stopping HTTP server");
    shutdown.cancel();
    if let Err(e) = server_handle.await {
        warn!("HTTP server task failed: {e}");
    }

    Ok(())
}

#[tracing::instrument(skip_all, fields(topic = %msg.topic))]
fn handle_mqtt_message(
    msg: rumqttc::Publish,
    topics: &Topics,
    router: &CommandRouter,
    default_speed: f64,
) {
    let intent = match topics.parse_command(&msg.topic, &msg.payload, default_speed) {
        Ok(intent) => intent,
        Err(e) => {
            warn!("Ignoring message: {e}");
            o11y::inc_mqtt_commands_metric(false);
            return;
        }
    };

    debug!("Command: {intent:?}");
    o11y::inc_mqtt_commands_metric(true);

    // Dispatch off the event loop, a reconnection can take as long as the connect timeout
    let router = router.clone();
    let _ = tokio::spawn(async move {
        let _ = router.dispatch(intent).await;
    });
}
