use super::{HTTP_ADDRESS, gateway_config, start_gateway};
use onvif2mqtt_common::mqtt::{OFFLINE, ONLINE};
use onvif2mqtt_testing_utils::{MosquittoDriver, TestMqttClient};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
#[ignore]
async fn end_to_end() {
    let mosquitto = MosquittoDriver::default();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let mut mqtt = TestMqttClient::new(mosquitto.port()).await;
    mqtt.subscribe("onvif2mqtt/#").await;

    let config = gateway_config(&mosquitto);
    let mut gateway = start_gateway(&config).await;

    // Availability of the gateway and every camera
    assert!(mqtt.wait_for_payload("onvif2mqtt/lwt", ONLINE, TIMEOUT).await);
    assert!(
        mqtt.wait_for_payload("onvif2mqtt/front_door/lwt", ONLINE, TIMEOUT)
            .await
    );
    assert!(
        mqtt.wait_for_payload("onvif2mqtt/garage/lwt", ONLINE, TIMEOUT)
            .await
    );
    assert!(
        mqtt.wait_for_payload("onvif2mqtt/shed/lwt", OFFLINE, TIMEOUT)
            .await
    );

    // Capabilities and presets of connected cameras
    assert!(
        mqtt.wait_for_payload("onvif2mqtt/front_door/capabilities/ptz", "true", TIMEOUT)
            .await
    );
    assert!(
        mqtt.wait_for_payload("onvif2mqtt/garage/capabilities/ptz", "false", TIMEOUT)
            .await
    );
    assert!(
        mqtt.wait_for_payload(
            "onvif2mqtt/front_door/presets",
            r#"{"Gate":"1","Yard":"2"}"#,
            TIMEOUT
        )
        .await
    );
    assert!(mqtt.latest("onvif2mqtt/garage/presets").is_none());

    let status: serde_json::Value =
        serde_json::from_str(&mqtt.latest("onvif2mqtt/front_door/status").unwrap()).unwrap();
    assert_eq!(status["name"], "Front Door");
    assert_eq!(status["state"], "connected");
    assert_eq!(status["has_ptz"], true);
    assert_eq!(status["device"]["manufacturer"], "Simulated");

    // Commands over MQTT
    mqtt.publish("onvif2mqtt/front_door/cmd", "move-left").await;
    assert!(
        gateway
            .wait_for_output("Command succeeded", TIMEOUT)
            .await
    );
    mqtt.publish("onvif2mqtt/garage/cmd", "stop").await;
    assert!(
        gateway
            .wait_for_output("camera does not support PTZ", TIMEOUT)
            .await
    );
    mqtt.publish("onvif2mqtt/front_door/cmd", "spin").await;
    assert!(
        gateway
            .wait_for_output("Unknown command \"spin\"", TIMEOUT)
            .await
    );

    // Commands and queries over HTTP
    let http = reqwest::Client::new();
    let api = |path: &str| format!("http://{HTTP_ADDRESS}{path}");

    let health: serde_json::Value = http
        .get(api("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "OK");
    assert_eq!(health["mqtt"], true);
    assert_eq!(health["cameras"], 2);

    let cameras: serde_json::Value = http
        .get(api("/api/cameras"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cameras.as_object().unwrap().len(), 3);
    assert_eq!(cameras["shed"]["state"], "disconnected");

    let moved: serde_json::Value = http
        .post(api("/api/cameras/Front%20Door/ptz/move"))
        .header("Content-Type", "application/json")
        .body(r#"{"direction": "zoom_in", "speed": 0.5}"#)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(moved["success"], true);

    let presets: serde_json::Value = http
        .get(api("/api/cameras/front_door/presets"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        presets,
        serde_json::json!([
            {"name": "Gate", "token": "1"},
            {"name": "Yard", "token": "2"},
        ])
    );

    let response = http
        .get(api("/api/cameras/nowhere"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    // Shutdown reports everything offline
    gateway.stop();
    gateway.wait().await;

    assert!(
        mqtt.wait_for_payload("onvif2mqtt/front_door/lwt", OFFLINE, TIMEOUT)
            .await
    );
    assert!(
        mqtt.wait_for_payload("onvif2mqtt/garage/lwt", OFFLINE, TIMEOUT)
            .await
    );
    assert!(mqtt.wait_for_payload("onvif2mqtt/lwt", OFFLINE, TIMEOUT).await);

    mqtt.stop().await;
}
