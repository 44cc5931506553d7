mod cargo;
mod mosquitto;
mod mqtt_client;
mod network;
mod podman;

pub use self::{
    cargo::CargoBinaryRunner, mosquitto::MosquittoDriver, mqtt_client::TestMqttClient,
    network::wait_for_url, podman::PodmanDriver,
};

#[cfg(test)]
#[ctor::ctor]
fn init() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .init();
}
