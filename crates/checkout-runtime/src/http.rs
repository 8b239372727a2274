//! Shared HTTP plumbing
//!
//! Client construction, response decoding and the retry wrapper used by
//! the idempotent GET clients. Order submission never retries.

use std::time::Duration;

use checkout_core::{CheckoutError, Result};
use serde::de::DeserializeOwned;

pub(crate) const RETRY_ATTEMPTS: u32 = 2;
pub(crate) const RETRY_DELAY: Duration = Duration::from_millis(750);

/// Base URL and timeout for one backend API
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Read the base URL from an environment variable
    pub fn from_env(url_var: &str) -> Self {
        let base_url = std::env::var(url_var).unwrap_or_else(|_| "http://localhost:8080".into());
        let timeout_secs = std::env::var("API_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(30);

        Self {
            base_url,
            timeout_secs,
        }
    }

    pub(crate) fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| CheckoutError::Config(e.to_string()))
    }
}

/// Decode a JSON response, turning HTTP failures into errors
pub(crate) async fn read_json<T: DeserializeOwned>(
    request: &str,
    resp: reqwest::Response,
) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(CheckoutError::Network(format!(
            "{} returned {}: {}",
            request,
            status,
            snippet(&body)
        )));
    }
    resp.json::<T>()
        .await
        .map_err(|e| CheckoutError::Network(format!("{} returned invalid JSON: {}", request, e)))
}

/// Run a request, retrying retryable failures with a fixed delay
pub(crate) async fn with_retry<T, F, Fut>(
    request: &str,
    attempts: u32,
    delay: Duration,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::warn!(request, attempt, error = %e, "Request failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= 200 {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(200).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_stops_on_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", 3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(CheckoutError::Network("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry("test", 3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CheckoutError::Validation("bad input".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhaust() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry("test", 2, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CheckoutError::Network("down".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
