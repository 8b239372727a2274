//! Mock Gateway
//!
//! In-process stand-in for the card-capture vendor, used in tests and
//! for local development without vendor credentials. Scripted failures
//! and responses make every controller path reachable.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{PaymentError, Result};
use crate::gateway::{
    CardCaptureGateway, CardToken, FieldSetup, GatewayEvent, PaymentField, ScriptHandle,
    TokenizationKey,
};

#[derive(Default)]
struct MockState {
    active_scripts: Vec<ScriptHandle>,
    load_failures: u32,
    configure_fails: bool,
    request_fails: bool,
    hold_responses: bool,
    events: Option<mpsc::Sender<GatewayEvent>>,
    responses: VecDeque<GatewayEvent>,
}

/// Scriptable fake vendor
pub struct MockGateway {
    state: Mutex<MockState>,
    next_handle: AtomicU64,
    injected: AtomicU64,
    removed: AtomicU64,
    requests: AtomicU64,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            next_handle: AtomicU64::new(0),
            injected: AtomicU64::new(0),
            removed: AtomicU64::new(0),
            requests: AtomicU64::new(0),
        }
    }

    // ===== Test hooks =====

    /// Fail the next `count` script loads
    pub fn fail_first_loads(&self, count: u32) {
        self.state.lock().unwrap().load_failures = count;
    }

    /// Make field configuration fail
    pub fn fail_configure(&self, fail: bool) {
        self.state.lock().unwrap().configure_fails = fail;
    }

    /// Make token requests fail at the transport level
    pub fn fail_requests(&self, fail: bool) {
        self.state.lock().unwrap().request_fails = fail;
    }

    /// Accept token requests but never answer them
    pub fn hold_responses(&self, hold: bool) {
        self.state.lock().unwrap().hold_responses = hold;
    }

    /// Emit a validity report for one field
    pub fn send_validity(&self, field: PaymentField, valid: bool, message: Option<String>) {
        let sender = self.state.lock().unwrap().events.clone();
        if let Some(tx) = sender {
            let _ = tx.try_send(GatewayEvent::FieldValidity {
                field,
                valid,
                message,
            });
        }
    }

    /// Report every hosted field as valid
    pub fn mark_fields_valid(&self) {
        for field in PaymentField::ALL {
            self.send_validity(field, true, None);
        }
    }

    /// Queue a successful response for the next token request
    pub fn respond_with_token(&self, value: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .push_back(GatewayEvent::PaymentResponse {
                token: Some(Self::token(value.into())),
                error: None,
            });
    }

    /// Queue a decline for the next token request
    pub fn respond_with_decline(&self, message: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .push_back(GatewayEvent::PaymentResponse {
                token: None,
                error: Some(message.into()),
            });
    }

    // ===== Counters =====

    pub fn injected_count(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }

    pub fn removed_count(&self) -> u64 {
        self.removed.load(Ordering::SeqCst)
    }

    pub fn active_script_count(&self) -> usize {
        self.state.lock().unwrap().active_scripts.len()
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    fn token(value: String) -> CardToken {
        CardToken {
            value,
            card_brand: Some("visa".to_string()),
            last_four: Some("4242".to_string()),
            issued_at: Utc::now(),
        }
    }

    fn default_response() -> GatewayEvent {
        GatewayEvent::PaymentResponse {
            token: Some(Self::token(format!("tok_mock_{}", Uuid::new_v4().simple()))),
            error: None,
        }
    }
}

#[async_trait]
impl CardCaptureGateway for MockGateway {
    fn inject_script(&self, _key: &TokenizationKey) -> ScriptHandle {
        let handle = ScriptHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.injected.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().active_scripts.push(handle);
        handle
    }

    async fn script_loaded(&self, handle: ScriptHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.active_scripts.contains(&handle) {
            return Err(PaymentError::Config(format!(
                "Unknown script handle {}",
                handle.id()
            )));
        }
        if state.load_failures > 0 {
            state.load_failures -= 1;
            return Err(PaymentError::ScriptLoad(
                "Simulated network failure".to_string(),
            ));
        }
        Ok(())
    }

    fn script_present(&self) -> bool {
        !self.state.lock().unwrap().active_scripts.is_empty()
    }

    fn remove_script(&self, handle: ScriptHandle) {
        let mut state = self.state.lock().unwrap();
        let before = state.active_scripts.len();
        state.active_scripts.retain(|h| *h != handle);
        if state.active_scripts.len() < before {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn configure(&self, _setup: &FieldSetup) -> Result<mpsc::Receiver<GatewayEvent>> {
        let (tx, rx) = mpsc::channel(16);
        let mut state = self.state.lock().unwrap();
        if state.configure_fails {
            return Err(PaymentError::Config(
                "Simulated configure failure".to_string(),
            ));
        }
        tx.try_send(GatewayEvent::FieldsAvailable)
            .map_err(|_| PaymentError::Gateway("Event stream closed".to_string()))?;
        state.events = Some(tx);
        Ok(rx)
    }

    async fn request_payment_token(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let (sender, response) = {
            let mut state = self.state.lock().unwrap();
            if state.request_fails {
                return Err(PaymentError::Gateway(
                    "Simulated gateway outage".to_string(),
                ));
            }
            if state.hold_responses {
                return Ok(());
            }
            let response = state
                .responses
                .pop_front()
                .unwrap_or_else(Self::default_response);
            (state.events.clone(), response)
        };

        let Some(sender) = sender else {
            return Err(PaymentError::NotReady("Fields not configured".to_string()));
        };
        sender
            .send(response)
            .await
            .map_err(|_| PaymentError::Gateway("Event stream closed".to_string()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_lifecycle_counters() {
        let gateway = MockGateway::new();
        assert!(!gateway.script_present());

        let key = TokenizationKey::new("pk_test");
        let h1 = gateway.inject_script(&key);
        let h2 = gateway.inject_script(&key);
        assert_ne!(h1, h2);
        assert_eq!(gateway.active_script_count(), 2);

        gateway.remove_script(h1);
        assert_eq!(gateway.removed_count(), 1);
        assert!(gateway.script_present());
    }

    #[tokio::test]
    async fn test_scripted_load_failures_run_out() {
        let gateway = MockGateway::new();
        gateway.fail_first_loads(1);
        let key = TokenizationKey::new("pk_test");

        let h = gateway.inject_script(&key);
        assert!(gateway.script_loaded(h).await.is_err());
        assert!(gateway.script_loaded(h).await.is_ok());
    }

    #[tokio::test]
    async fn test_configure_queues_fields_available() {
        let gateway = MockGateway::new();
        let mut rx = gateway.configure(&FieldSetup::default()).await.unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            GatewayEvent::FieldsAvailable
        ));
    }

    #[tokio::test]
    async fn test_queued_decline_then_default_token() {
        let gateway = MockGateway::new();
        let mut rx = gateway.configure(&FieldSetup::default()).await.unwrap();
        rx.try_recv().unwrap();
        gateway.respond_with_decline("Do not honor");

        gateway.request_payment_token().await.unwrap();
        let GatewayEvent::PaymentResponse { token, error } = rx.try_recv().unwrap() else {
            panic!("expected a payment response");
        };
        assert!(token.is_none());
        assert_eq!(error.as_deref(), Some("Do not honor"));

        gateway.request_payment_token().await.unwrap();
        let GatewayEvent::PaymentResponse { token, .. } = rx.try_recv().unwrap() else {
            panic!("expected a payment response");
        };
        assert!(token.unwrap().value.starts_with("tok_mock_"));
    }
}
