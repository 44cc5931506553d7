use super::{gateway_config, start_gateway};
use onvif2mqtt_common::mqtt::ONLINE;
use onvif2mqtt_testing_utils::{MosquittoDriver, TestMqttClient};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::test]
#[ignore]
async fn broker_restart() {
    let mosquitto = MosquittoDriver::default();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let config = gateway_config(&mosquitto);
    let mut gateway = start_gateway(&config).await;

    // Let the gateway connect, then take the broker away
    tokio::time::sleep(Duration::from_secs(2)).await;
    let port = mosquitto.port();
    drop(mosquitto);

    // Start it again on the same port, without any retained state
    tokio::time::sleep(Duration::from_secs(5)).await;
    let mosquitto = MosquittoDriver::with_port(port);
    tokio::time::sleep(Duration::from_secs(2)).await;

    let mut mqtt = TestMqttClient::new(mosquitto.port()).await;
    mqtt.subscribe("onvif2mqtt/#").await;

    // Gateway availability is restored on reconnection, camera status by the next poll tick
    assert!(mqtt.wait_for_payload("onvif2mqtt/lwt", ONLINE, TIMEOUT).await);
    assert!(
        mqtt.wait_for_payload("onvif2mqtt/front_door/capabilities/ptz", "true", TIMEOUT)
            .await
    );

    // Command subscriptions are restored too
    mqtt.publish("onvif2mqtt/front_door/goPreset", "2").await;
    assert!(
        gateway
            .wait_for_output("Command succeeded", TIMEOUT)
            .await
    );

    gateway.stop();
    gateway.wait().await;
    mqtt.stop().await;
}
