//! Connectivity check and retry helper
//!
//! Neither is used by the gateway's request path; callers opt in.

use reqwest::Client;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::API_PREFIX;

/// Timeout of the health check
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Health endpoint under `api_url`
pub fn health_url(api_url: &str) -> String {
    format!("{}{}/health", api_url.trim_end_matches('/'), API_PREFIX)
}

/// Whether the backend at `api_url` answers its health check with 2xx
/// within five seconds
pub async fn check_connectivity(client: &Client, api_url: &str) -> bool {
    let url = health_url(api_url);
    match client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
        Ok(response) => {
            debug!(%url, status = response.status().as_u16(), "health check");
            response.status().is_success()
        }
        Err(e) => {
            warn!(%url, error = %e, "connectivity check failed");
            false
        }
    }
}

/// Whether `api_url` points at this machine
pub fn is_local_address(api_url: &str) -> bool {
    Url::parse(api_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .map(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]" | ""))
        .unwrap_or(false)
}

/// Retry schedule for [`retry_with_backoff`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Pause after the first failure; doubles after each further failure
    pub base_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl Backoff {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Pause after failed attempt number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run `operation` until it succeeds or the attempts run out; the last error
/// is returned.
pub async fn retry_with_backoff<T, E, F, Fut>(backoff: Backoff, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let attempts = backoff.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < attempts => {
                let delay = backoff.delay(attempt);
                warn!(attempt = attempt + 1, error = %e, delay_ms = delay.as_millis() as u64, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(attempt = attempt + 1, error = %e, "attempt failed, giving up");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_backoff_doubles() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_local_address() {
        assert!(is_local_address("http://localhost:8000"));
        assert!(is_local_address("http://127.0.0.1"));
        assert!(!is_local_address("https://crm.example.com"));
        assert!(!is_local_address("not a url"));
    }

    #[tokio::test]
    async fn test_retry_stops_on_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, String> = retry_with_backoff(
            Backoff::new(3, Duration::from_millis(1)),
            || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 {
                    Err(format!("failure {}", n))
                } else {
                    Ok(n)
                }
            },
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_returns_last_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = retry_with_backoff(
            Backoff::new(3, Duration::from_millis(1)),
            || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("failure {}", n))
            },
        )
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_check_connectivity() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let client = Client::new();
        assert!(check_connectivity(&client, &mock_server.uri()).await);
        assert!(!check_connectivity(&client, "http://127.0.0.1:1").await);
    }
}
