//! Hosted Fields Bridge
//!
//! [`CardCaptureGateway`] implementation backed by the vendor's
//! Collect.js runtime through its session service: script installs and
//! token requests go out as HTTP calls, vendor callbacks come back over
//! a long-polled event feed that is relayed into the controller's
//! channel.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use checkout_payments::error::{PaymentError, Result};
use checkout_payments::{
    CardCaptureGateway, FieldSetup, GatewayEvent, ScriptHandle, TokenizationKey,
};
use tokio::sync::{mpsc, oneshot};

const EVENT_CHANNEL_CAPACITY: usize = 32;
const POLL_FAILURE_LIMIT: u32 = 3;
const POLL_FAILURE_DELAY: Duration = Duration::from_millis(500);

/// Vendor bridge configuration
#[derive(Clone, Debug)]
pub struct CollectConfig {
    /// Vendor script the session loads
    pub script_url: String,

    /// Base URL of the vendor session service
    pub session_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            script_url: "https://secure.nmi.com/token/Collect.js".into(),
            session_url: "http://localhost:8091/collect".into(),
            timeout_secs: 15,
        }
    }
}

impl CollectConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            script_url: std::env::var("COLLECT_SCRIPT_URL").unwrap_or(defaults.script_url),
            session_url: std::env::var("COLLECT_SESSION_URL").unwrap_or(defaults.session_url),
            timeout_secs: std::env::var("COLLECT_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Card-capture gateway talking to the vendor session service
pub struct HostedFieldsGateway {
    client: reqwest::Client,
    config: CollectConfig,
    pending: Mutex<HashMap<ScriptHandle, oneshot::Receiver<Result<()>>>>,
    installed: Mutex<HashSet<ScriptHandle>>,
    next_handle: AtomicU64,
}

impl HostedFieldsGateway {
    pub fn new(config: CollectConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Config(e.to_string()))?;

        Ok(Self {
            client,
            config,
            pending: Mutex::new(HashMap::new()),
            installed: Mutex::new(HashSet::new()),
            next_handle: AtomicU64::new(0),
        })
    }

    /// Create from `COLLECT_SCRIPT_URL` / `COLLECT_SESSION_URL`
    pub fn from_env() -> Result<Self> {
        Self::new(CollectConfig::from_env())
    }

    fn session_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.session_url, path)
    }
}

#[async_trait]
impl CardCaptureGateway for HostedFieldsGateway {
    fn inject_script(&self, key: &TokenizationKey) -> ScriptHandle {
        let handle = ScriptHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        let (tx, rx) = oneshot::channel();

        let client = self.client.clone();
        let url = self.session_endpoint("/script");
        let body = serde_json::json!({
            "handle": handle.id(),
            "scriptUrl": self.config.script_url,
            "tokenizationKey": key.as_str(),
        });

        tokio::spawn(async move {
            let result = async {
                let resp = client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| PaymentError::ScriptLoad(e.to_string()))?;
                if !resp.status().is_success() {
                    return Err(PaymentError::ScriptLoad(format!(
                        "Script install returned {}",
                        resp.status()
                    )));
                }
                Ok(())
            }
            .await;
            let _ = tx.send(result);
        });

        self.pending.lock().unwrap().insert(handle, rx);
        handle
    }

    async fn script_loaded(&self, handle: ScriptHandle) -> Result<()> {
        let rx = self.pending.lock().unwrap().remove(&handle);
        let Some(rx) = rx else {
            if self.installed.lock().unwrap().contains(&handle) {
                return Ok(());
            }
            return Err(PaymentError::Config(format!(
                "Unknown script handle {}",
                handle.id()
            )));
        };

        rx.await
            .map_err(|_| PaymentError::ScriptLoad("Script install task dropped".to_string()))??;
        self.installed.lock().unwrap().insert(handle);
        Ok(())
    }

    fn script_present(&self) -> bool {
        !self.installed.lock().unwrap().is_empty()
    }

    fn remove_script(&self, handle: ScriptHandle) {
        // Dropping a pending receiver abandons its install task.
        self.pending.lock().unwrap().remove(&handle);
        self.installed.lock().unwrap().remove(&handle);

        let client = self.client.clone();
        let url = self.session_endpoint(&format!("/script/{}", handle.id()));
        tokio::spawn(async move {
            if let Err(e) = client.delete(&url).send().await {
                tracing::debug!(error = %e, "Script removal call failed");
            }
        });
    }

    async fn configure(&self, setup: &FieldSetup) -> Result<mpsc::Receiver<GatewayEvent>> {
        let url = self.session_endpoint("/fields");
        let resp = self
            .client
            .post(&url)
            .json(setup)
            .send()
            .await
            .map_err(|e| PaymentError::Config(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PaymentError::Config(format!(
                "Field configuration returned {}",
                resp.status()
            )));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let client = self.client.clone();
        let events_url = self.session_endpoint("/events");

        // Relay vendor callbacks until the controller drops the stream.
        tokio::spawn(async move {
            let mut failures = 0;
            loop {
                let batch: Vec<GatewayEvent> = match client.get(&events_url).send().await {
                    Ok(resp) if resp.status().is_success() => match resp.json().await {
                        Ok(events) => {
                            failures = 0;
                            events
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Bad event payload from vendor bridge");
                            return;
                        }
                    },
                    Ok(resp) => {
                        tracing::warn!(status = %resp.status(), "Vendor event poll rejected");
                        return;
                    }
                    Err(e) => {
                        failures += 1;
                        if failures >= POLL_FAILURE_LIMIT {
                            tracing::warn!(error = %e, "Vendor event feed unreachable, giving up");
                            return;
                        }
                        tokio::time::sleep(POLL_FAILURE_DELAY).await;
                        continue;
                    }
                };

                for event in batch {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn request_payment_token(&self) -> Result<()> {
        let url = self.session_endpoint("/tokenize");
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PaymentError::Gateway(format!(
                "Token request returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "collect"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CollectConfig::default();
        assert!(config.script_url.ends_with("Collect.js"));
        assert_eq!(config.timeout_secs, 15);
    }

    #[tokio::test]
    async fn test_unknown_handle_is_rejected() {
        let gateway = HostedFieldsGateway::new(CollectConfig::default()).unwrap();
        let err = gateway
            .script_loaded(ScriptHandle::new(99))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Config(_)));
        assert!(!gateway.script_present());
    }
}
