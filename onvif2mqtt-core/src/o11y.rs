//! Metrics recorded by the core. Exporting them is up to the binary.

pub const CONNECTION_ATTEMPTS: &str = "onvif2mqtt_connection_attempts";
pub const PTZ_COMMANDS: &str = "onvif2mqtt_ptz_commands";
pub const HEALTH_CHECKS: &str = "onvif2mqtt_health_checks";
pub const CONNECTED_CAMERAS: &str = "onvif2mqtt_connected_cameras";
pub const DISPATCHED_COMMANDS: &str = "onvif2mqtt_dispatched_commands";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ConnectionResult {
    Success,
    Failure,
    Abandoned,
}

pub(crate) fn inc_connection_attempts_metric(result: ConnectionResult) {
    let result = match result {
        ConnectionResult::Success => "success",
        ConnectionResult::Failure => "failure",
        ConnectionResult::Abandoned => "abandoned",
    };

    metrics::counter!(CONNECTION_ATTEMPTS, "result" => result).increment(1);
}

fn result_label(ok: bool) -> &'static str {
    if ok { "success" } else { "failure" }
}

pub(crate) fn inc_ptz_commands_metric(verb: &'static str, ok: bool) {
    metrics::counter!(PTZ_COMMANDS, "verb" => verb, "result" => result_label(ok)).increment(1);
}

pub(crate) fn inc_health_checks_metric(ok: bool) {
    metrics::counter!(HEALTH_CHECKS, "result" => result_label(ok)).increment(1);
}

pub(crate) fn inc_dispatched_commands_metric(verb: &'static str, outcome: &'static str) {
    metrics::counter!(DISPATCHED_COMMANDS, "verb" => verb, "outcome" => outcome).increment(1);
}

pub(crate) fn set_connected_cameras_metric(count: usize) {
    metrics::gauge!(CONNECTED_CAMERAS).set(count as f64);
}
