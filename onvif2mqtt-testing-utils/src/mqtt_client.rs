use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, Publish, QoS};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, warn};

type LatestMessages = Arc<Mutex<HashMap<String, Publish>>>;

/// MQTT client for observing and driving the gateway from tests.
///
/// Keeps the most recent message seen on every topic, so retained state can be asserted on
/// regardless of when it arrived.
pub struct TestMqttClient {
    handle: Option<JoinHandle<()>>,
    exit_tx: broadcast::Sender<()>,

    client: AsyncClient,
    latest: LatestMessages,
    message_rx: broadcast::Receiver<Publish>,
}

impl TestMqttClient {
    pub async fn new(port: u16) -> Self {
        let client_id = format!("test-{}", rand::random::<u32>());
        let mut options = MqttOptions::new(client_id, "localhost", port);
        options.set_keep_alive(Duration::from_secs(5));

        let (client, mut event_loop) = AsyncClient::new(options, 32);

        let latest = LatestMessages::default();

        let (exit_tx, mut exit_rx) = broadcast::channel(1);
        let (message_tx, message_rx) = broadcast::channel(256);
        let (connected_tx, mut connected_rx) = watch::channel(false);

        let handle = {
            let latest = latest.clone();

            Some(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        event = event_loop.poll() => {
                            match event {
                                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                                    let _ = connected_tx.send(true);
                                }
                                Ok(Event::Incoming(Incoming::Publish(msg))) => {
                                    debug!("Received message on {}: {:?}", msg.topic, msg.payload);
                                    let _ = latest
                                        .lock()
                                        .unwrap()
                                        .insert(msg.topic.clone(), msg.clone());
                                    let _ = message_tx.send(msg);
                                }
                                Err(e) => {
                                    warn!("MQTT client error: {e}");
                                    tokio::time::sleep(Duration::from_millis(200)).await;
                                }
                                _ => {}
                            }
                        }
                        _ = exit_rx.recv() => {
                            break;
                        }
                    }
                }
            }))
        };

        connected_rx
            .wait_for(|connected| *connected)
            .await
            .expect("test client should connect");

        Self {
            handle,
            exit_tx,
            client,
            latest,
            message_rx,
        }
    }

    pub async fn stop(&mut self) {
        let _ = self.exit_tx.send(());

        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn client(&self) -> &AsyncClient {
        &self.client
    }

    pub async fn subscribe(&self, topic: &str) {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .expect("subscription should be queued");
    }

    pub async fn publish(&self, topic: &str, payload: &str) {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .await
            .expect("message should be queued");
    }

    /// Payload of the most recent message on `topic`.
    pub fn latest(&self, topic: &str) -> Option<String> {
        self.latest
            .lock()
            .unwrap()
            .get(topic)
            .map(|msg| String::from_utf8_lossy(&msg.payload).to_string())
    }

    /// Waits until the most recent message on `topic` has `payload`.
    pub async fn wait_for_payload(
        &mut self,
        topic: &str,
        payload: &str,
        timeout: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if self.latest(topic).as_deref() == Some(payload) {
                return true;
            }

            match tokio::time::timeout_at(deadline, self.message_rx.recv()).await {
                Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => {}
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => {
                    warn!(
                        "Timeout waiting for \"{payload}\" on {topic}, latest is {:?}",
                        self.latest(topic)
                    );
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::MosquittoDriver;

    #[tokio::test]
    #[ignore]
    async fn latest_and_wait() {
        let mosquitto = MosquittoDriver::default();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let mut client = TestMqttClient::new(mosquitto.port()).await;
        client.subscribe("test/#").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(client.latest("test/a").is_none());

        client.publish("test/a", "one").await;
        client.publish("test/a", "two").await;
        assert!(
            client
                .wait_for_payload("test/a", "two", Duration::from_secs(5))
                .await
        );
        assert_eq!(client.latest("test/a").unwrap(), "two");

        assert!(
            !client
                .wait_for_payload("test/b", "never", Duration::from_millis(500))
                .await
        );

        client.stop().await;
    }
}
