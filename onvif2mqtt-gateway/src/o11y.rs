use metrics_exporter_prometheus::PrometheusBuilder;
use miette::{Context, IntoDiagnostic};
use onvif2mqtt_core::o11y::{
    CONNECTED_CAMERAS, CONNECTION_ATTEMPTS, DISPATCHED_COMMANDS, HEALTH_CHECKS, PTZ_COMMANDS,
};
use std::net::SocketAddr;

pub(crate) const METRIC_HTTP_REQUESTS: &str = "onvif2mqtt_http_requests";
pub(crate) const METRIC_MQTT_COMMANDS: &str = "onvif2mqtt_mqtt_commands";

pub(super) fn init(address: SocketAddr) -> miette::Result<()> {
    let builder = PrometheusBuilder::new();
    builder
        .with_http_listener(address)
        .install()
        .into_diagnostic()
        .wrap_err("Failed to start prometheus metrics exporter")?;

    metrics::describe_counter!(
        CONNECTION_ATTEMPTS,
        metrics::Unit::Count,
        "Camera connection attempts by result"
    );

    metrics::describe_counter!(
        PTZ_COMMANDS,
        metrics::Unit::Count,
        "PTZ requests issued to cameras by verb and result"
    );

    metrics::describe_counter!(
        HEALTH_CHECKS,
        metrics::Unit::Count,
        "Camera health checks by result"
    );

    metrics::describe_counter!(
        DISPATCHED_COMMANDS,
        metrics::Unit::Count,
        "Command intents handled by the router by verb and outcome"
    );

    metrics::describe_gauge!(
        CONNECTED_CAMERAS,
        metrics::Unit::Count,
        "Number of connected cameras"
    );

    metrics::describe_counter!(
        METRIC_HTTP_REQUESTS,
        metrics::Unit::Count,
        "HTTP API requests by endpoint"
    );

    metrics::describe_counter!(
        METRIC_MQTT_COMMANDS,
        metrics::Unit::Count,
        "Command messages received over MQTT by validity"
    );

    Ok(())
}

pub(crate) fn inc_http_requests_metric(endpoint: &'static str) {
    metrics::counter!(METRIC_HTTP_REQUESTS, "endpoint" => endpoint).increment(1);
}

pub(crate) fn inc_mqtt_commands_metric(valid: bool) {
    let valid = if valid { "valid" } else { "invalid" };
    metrics::counter!(METRIC_MQTT_COMMANDS, "result" => valid).increment(1);
}
