use tokio::time::{Duration, Instant};
use tracing::{info, warn};

/// Polls `url` until it answers any HTTP request, or `timeout` passes.
pub async fn wait_for_url(url: &str, timeout: Duration) -> bool {
    let client = reqwest::Client::new();
    let start = Instant::now();

    while start.elapsed() < timeout {
        if client.get(url).send().await.is_ok() {
            info!("{url} is available after {:?}", start.elapsed());
            return true;
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    warn!("Timeout waiting for {url}");
    false
}
