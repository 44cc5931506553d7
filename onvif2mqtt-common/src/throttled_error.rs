use tokio::time::{Duration, Instant};
use tracing::warn;

struct ThrottledError<E> {
    error: E,
    first_seen: Instant,
    times_seen: usize,
}

/// Suppresses repeats of the same error within a time window.
///
/// Used for errors that come out of tight retry loops (e.g. the MQTT event loop while the broker
/// is unreachable), where logging every occurrence would flood the log.
pub struct ThrottledErrorLogger<E> {
    timeout: Duration,
    last_error: Option<ThrottledError<E>>,
}

impl<E: PartialEq + std::fmt::Display> ThrottledErrorLogger<E> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_error: None,
        }
    }

    /// Records an occurrence of `error`, returning it when it should be logged by the caller.
    pub fn log(&mut self, error: E) -> Option<&E> {
        let now = Instant::now();

        let suppress = match self.last_error.as_mut() {
            Some(last) if last.error == error => {
                if last.first_seen.elapsed() < self.timeout {
                    last.times_seen += 1;
                    true
                } else {
                    warn!(
                        "Last error ({}) was seen {} times",
                        last.error, last.times_seen
                    );
                    false
                }
            }
            Some(last) => {
                if last.times_seen > 1 {
                    warn!(
                        "Last error ({}) was seen {} times",
                        last.error, last.times_seen
                    );
                }
                false
            }
            None => false,
        };

        if suppress {
            return None;
        }

        let last = self.last_error.insert(ThrottledError {
            error,
            first_seen: now,
            times_seen: 1,
        });
        Some(&last.error)
    }

    /// Forgets the last error, e.g. once the failing operation has recovered.
    pub fn reset(&mut self) {
        self.last_error = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn new() {
        let te = ThrottledErrorLogger::<String>::new(Duration::from_millis(100));
        assert!(te.last_error.is_none());
    }

    #[tokio::test]
    async fn log_once() {
        let mut te = ThrottledErrorLogger::<String>::new(Duration::from_millis(100));
        assert_eq!(te.log("test".to_string()).unwrap(), "test");
    }

    #[tokio::test]
    async fn log_duplicates_fast() {
        let mut te = ThrottledErrorLogger::<String>::new(Duration::from_millis(100));
        assert_eq!(te.log("test".to_string()).unwrap(), "test");
        assert!(te.log("test".to_string()).is_none());
        assert!(te.log("test".to_string()).is_none());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(te.log("test".to_string()).is_none());
    }

    #[tokio::test]
    async fn log_duplicates_slow() {
        let mut te = ThrottledErrorLogger::<String>::new(Duration::from_millis(100));
        assert_eq!(te.log("test".to_string()).unwrap(), "test");
        assert!(te.log("test".to_string()).is_none());
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(te.log("test".to_string()).unwrap(), "test");
        assert!(te.log("test".to_string()).is_none());
    }

    #[tokio::test]
    async fn log_unique_fast() {
        let mut te = ThrottledErrorLogger::<String>::new(Duration::from_millis(100));
        assert_eq!(te.log("test a".to_string()).unwrap(), "test a");
        assert_eq!(te.log("test b".to_string()).unwrap(), "test b");
        assert_eq!(te.log("test a".to_string()).unwrap(), "test a");
    }

    #[tokio::test]
    async fn reset_allows_immediate_relog() {
        let mut te = ThrottledErrorLogger::<String>::new(Duration::from_secs(10));
        assert_eq!(te.log("test".to_string()).unwrap(), "test");
        assert!(te.log("test".to_string()).is_none());
        te.reset();
        assert_eq!(te.log("test".to_string()).unwrap(), "test");
    }
}
