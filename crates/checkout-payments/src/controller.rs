//! Payment Tokenization Controller
//!
//! Drives the card-capture vendor from script install through field
//! configuration to token issue:
//!
//! ```text
//! Uninitialized -> ScriptLoading -> ScriptLoaded -> FieldsConfigured
//!     -> FieldsReady <-> Requesting -> TokenIssued
//! ```
//!
//! Any step can land in `Failed`, which a fresh `initialize` call can
//! leave again. A decline is not a failure: the customer keeps their
//! fields and can retry, so `Requesting` falls back to `FieldsReady`.
//! Tokens are single-use, so a later submit re-enters `Requesting`
//! from `TokenIssued`.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time;

use crate::error::{PaymentError, Result};
use crate::fields::PaymentFieldValidation;
use crate::gateway::{
    CardCaptureGateway, CardToken, FieldSetup, GatewayEvent, ScriptHandle, TokenizationKey,
};

/// Controller lifecycle states
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TokenizationState {
    /// Nothing loaded yet
    Uninitialized,

    /// Vendor script install in progress
    ScriptLoading,

    /// Script loaded, fields not yet configured
    ScriptLoaded,

    /// Fields handed to the vendor, waiting for them to mount
    FieldsConfigured,

    /// Fields mounted and interactive; token requests allowed
    FieldsReady,

    /// Token request in flight
    Requesting,

    /// A single-use token was issued
    TokenIssued,

    /// Unrecoverable until re-initialized
    Failed { reason: String },
}

impl TokenizationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenizationState::Uninitialized => "uninitialized",
            TokenizationState::ScriptLoading => "script_loading",
            TokenizationState::ScriptLoaded => "script_loaded",
            TokenizationState::FieldsConfigured => "fields_configured",
            TokenizationState::FieldsReady => "fields_ready",
            TokenizationState::Requesting => "requesting",
            TokenizationState::TokenIssued => "token_issued",
            TokenizationState::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for TokenizationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tokenization tuning knobs
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Script load attempts before giving up
    pub script_attempts: u32,

    /// Fixed delay between script load attempts
    pub script_retry_delay: Duration,

    /// Per-attempt script load timeout
    pub script_timeout: Duration,

    /// Ceiling on the wait for a token response
    pub request_timeout: Duration,

    /// Hosted field configuration passed to the vendor
    pub field_setup: FieldSetup,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            script_attempts: 3,
            script_retry_delay: Duration::from_millis(2500),
            script_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
            field_setup: FieldSetup::default(),
        }
    }
}

/// The tokenization state machine
///
/// Owns the vendor event stream. Exclusive access (`&mut self`) is the
/// concurrency guard: one controller can never run two operations at
/// once, and duplicate initialization is rejected by the state check.
pub struct TokenizationController {
    gateway: Arc<dyn CardCaptureGateway>,
    key: TokenizationKey,
    config: ControllerConfig,
    state: TokenizationState,
    fields: PaymentFieldValidation,
    script: Option<ScriptHandle>,
    events: Option<mpsc::Receiver<GatewayEvent>>,
    token: Option<CardToken>,
    payment_error: Option<String>,
}

impl TokenizationController {
    /// Create a controller with default tuning
    pub fn new(gateway: Arc<dyn CardCaptureGateway>, key: TokenizationKey) -> Self {
        Self::with_config(gateway, key, ControllerConfig::default())
    }

    /// Create with explicit tuning
    pub fn with_config(
        gateway: Arc<dyn CardCaptureGateway>,
        key: TokenizationKey,
        config: ControllerConfig,
    ) -> Self {
        Self {
            gateway,
            key,
            config,
            state: TokenizationState::Uninitialized,
            fields: PaymentFieldValidation::new(),
            script: None,
            events: None,
            token: None,
            payment_error: None,
        }
    }

    pub fn state(&self) -> &TokenizationState {
        &self.state
    }

    pub fn fields(&self) -> &PaymentFieldValidation {
        &self.fields
    }

    /// The issued token, if any
    pub fn token(&self) -> Option<&CardToken> {
        self.token.as_ref()
    }

    /// Message from the last declined attempt
    pub fn payment_error(&self) -> Option<&str> {
        self.payment_error.as_deref()
    }

    /// Whether a token request is currently allowed
    pub fn is_ready(&self) -> bool {
        matches!(
            self.state,
            TokenizationState::FieldsReady | TokenizationState::TokenIssued
        )
    }

    /// Load the vendor script and configure the hosted fields
    ///
    /// Valid from `Uninitialized` and `Failed` only; anything else means
    /// initialization already ran. A retry after failure reuses a script
    /// that made it through loading. Dropping the returned future lands
    /// the controller in `Failed`, with any half-installed script removed,
    /// so a later call can start over.
    pub async fn initialize(&mut self) -> Result<()> {
        match self.state {
            TokenizationState::Uninitialized | TokenizationState::Failed { .. } => {}
            _ => {
                return Err(PaymentError::NotReady(format!(
                    "Already initialized: {}",
                    self.state.as_str()
                )));
            }
        }

        let result = {
            let mut attempt = InitAttempt {
                controller: self,
                finished: false,
            };
            let result = attempt.run().await;
            attempt.finished = true;
            result
        };
        if let Err(e) = &result {
            self.fail(e.to_string());
        }
        result
    }

    /// Install the vendor script, retrying with cleanup between attempts
    async fn load_script(&mut self) -> Result<()> {
        if self.script.is_some() && self.gateway.script_present() {
            // Failure happened after loading; no need to reload.
            self.state = TokenizationState::ScriptLoaded;
            return Ok(());
        }

        self.state = TokenizationState::ScriptLoading;
        let attempts = self.config.script_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                time::sleep(self.config.script_retry_delay).await;
            }

            // Held in `self.script` while loading so an interrupted
            // attempt can still be cleaned up.
            let handle = self.gateway.inject_script(&self.key);
            self.script = Some(handle);
            match time::timeout(self.config.script_timeout, self.gateway.script_loaded(handle))
                .await
            {
                Ok(Ok(())) => {
                    self.state = TokenizationState::ScriptLoaded;
                    tracing::debug!(gateway = self.gateway.name(), attempt, "Vendor script loaded");
                    return Ok(());
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        gateway = self.gateway.name(),
                        attempt,
                        error = %e,
                        "Script load failed"
                    );
                    self.remove_pending_script();
                    last_error = e.to_string();
                }
                Err(_) => {
                    tracing::warn!(
                        gateway = self.gateway.name(),
                        attempt,
                        "Script load timed out"
                    );
                    self.remove_pending_script();
                    last_error = format!("Timed out after {:?}", self.config.script_timeout);
                }
            }
        }

        Err(PaymentError::ScriptLoad(format!(
            "Gave up after {} attempts: {}",
            attempts, last_error
        )))
    }

    fn remove_pending_script(&mut self) {
        if let Some(handle) = self.script.take() {
            self.gateway.remove_script(handle);
        }
    }

    async fn configure_fields(&mut self) -> Result<()> {
        let receiver = self.gateway.configure(&self.config.field_setup).await?;
        self.events = Some(receiver);
        self.fields.reset();
        self.state = TokenizationState::FieldsConfigured;
        tracing::debug!(gateway = self.gateway.name(), "Hosted fields configured");
        Ok(())
    }

    /// Apply any queued vendor events
    ///
    /// Moves `FieldsConfigured` to `FieldsReady` once the fields report
    /// in, and keeps validity current while the customer types.
    pub fn pump_events(&mut self) {
        let Some(mut events) = self.events.take() else {
            return;
        };
        while let Ok(event) = events.try_recv() {
            self.handle_event(event);
        }
        self.events = Some(events);
    }

    fn handle_event(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::FieldsAvailable => {
                if self.state == TokenizationState::FieldsConfigured {
                    self.state = TokenizationState::FieldsReady;
                    tracing::debug!(gateway = self.gateway.name(), "Payment fields ready");
                }
            }
            GatewayEvent::FieldValidity {
                field,
                valid,
                message,
            } => {
                self.fields.record(field, valid, message);
            }
            GatewayEvent::PaymentResponse { .. } => {
                // Only generate_token waits for responses; one arriving
                // here belongs to an abandoned request.
                tracing::warn!(
                    gateway = self.gateway.name(),
                    "Unsolicited payment response dropped"
                );
            }
        }
    }

    /// Request a single-use token for the entered card
    ///
    /// Turns error display on, then refuses to touch the network while
    /// any field is invalid (`Ok(None)`). A vendor decline also yields
    /// `Ok(None)` with the message in [`payment_error`], leaving the
    /// fields ready for another attempt. `Err` is reserved for transport
    /// and state problems, including a vendor that never answers within
    /// [`ControllerConfig::request_timeout`].
    ///
    /// Tokens are single-use, so calling again from `TokenIssued`
    /// discards the stale token and requests a fresh one. Dropping the
    /// returned future mid-wait hands the event stream back and returns
    /// the machine to `FieldsReady` for a retry.
    ///
    /// [`payment_error`]: Self::payment_error
    pub async fn generate_token(&mut self) -> Result<Option<CardToken>> {
        self.pump_events();

        if self.state == TokenizationState::Requesting {
            return Err(PaymentError::RequestInFlight);
        }
        if !self.is_ready() {
            return Err(PaymentError::NotReady(format!(
                "Cannot request a token from state {}",
                self.state.as_str()
            )));
        }

        self.fields.show_errors();
        self.payment_error = None;

        if !self.fields.all_valid() {
            tracing::debug!(
                invalid = ?self.fields.invalid_fields(),
                "Token request stopped by field validation"
            );
            return Ok(None);
        }

        self.state = TokenizationState::Requesting;
        self.token = None;

        let events = self.events.take();
        let outcome = ResponseWait {
            controller: self,
            events,
        }
        .run()
        .await;

        match outcome {
            Ok((Some(token), _)) => {
                self.state = TokenizationState::TokenIssued;
                self.token = Some(token.clone());
                tracing::info!(gateway = self.gateway.name(), "Payment token issued");
                Ok(Some(token))
            }
            Ok((None, error)) => {
                let reason = error.unwrap_or_else(|| "Payment was declined".to_string());
                tracing::warn!(
                    gateway = self.gateway.name(),
                    reason = %reason,
                    "Token request declined"
                );
                self.payment_error = Some(reason);
                self.state = TokenizationState::FieldsReady;
                Ok(None)
            }
            Err(e) => {
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    fn fail(&mut self, reason: String) {
        tracing::error!(
            gateway = self.gateway.name(),
            reason = %reason,
            "Tokenization failed"
        );
        self.state = TokenizationState::Failed { reason };
        self.token = None;
    }

    /// Remove the vendor script and drop all tokenization state
    pub fn teardown(&mut self) {
        if let Some(handle) = self.script.take() {
            self.gateway.remove_script(handle);
        }
        self.events = None;
        self.token = None;
        self.payment_error = None;
        self.fields.reset();
        self.state = TokenizationState::Uninitialized;
        tracing::debug!(gateway = self.gateway.name(), "Tokenization torn down");
    }
}

/// One initialization pass, unwound if the future is dropped mid-step
///
/// A dropped pass removes any script it was still installing and parks
/// the controller in `Failed`, which `initialize` accepts again.
struct InitAttempt<'a> {
    controller: &'a mut TokenizationController,
    finished: bool,
}

impl InitAttempt<'_> {
    async fn run(&mut self) -> Result<()> {
        self.controller.load_script().await?;
        self.controller.configure_fields().await?;
        Ok(())
    }
}

impl Drop for InitAttempt<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.controller.remove_pending_script();
        self.controller.state = TokenizationState::Failed {
            reason: "Initialization was interrupted".to_string(),
        };
    }
}

/// The wait for a `PaymentResponse`, owning the receiver for its duration
///
/// Drop always returns the receiver to the controller; if the wait never
/// resolved (the caller went away mid-request), `Requesting` unwinds to
/// `FieldsReady` so the session is not stuck behind a phantom request.
struct ResponseWait<'a> {
    controller: &'a mut TokenizationController,
    events: Option<mpsc::Receiver<GatewayEvent>>,
}

impl ResponseWait<'_> {
    async fn run(&mut self) -> Result<(Option<CardToken>, Option<String>)> {
        self.controller.gateway.request_payment_token().await?;

        let deadline = time::Instant::now() + self.controller.config.request_timeout;
        let Some(events) = self.events.as_mut() else {
            return Err(PaymentError::Config("Event stream missing".to_string()));
        };

        loop {
            match time::timeout_at(deadline, events.recv()).await {
                Ok(Some(GatewayEvent::PaymentResponse { token, error })) => {
                    return Ok((token, error));
                }
                Ok(Some(other)) => self.controller.handle_event(other),
                Ok(None) => {
                    return Err(PaymentError::Gateway(
                        "Gateway closed the event stream".to_string(),
                    ));
                }
                Err(_) => {
                    return Err(PaymentError::ResponseTimeout(
                        self.controller.config.request_timeout,
                    ));
                }
            }
        }
    }
}

impl Drop for ResponseWait<'_> {
    fn drop(&mut self) {
        self.controller.events = self.events.take();
        if self.controller.state == TokenizationState::Requesting {
            self.controller.state = TokenizationState::FieldsReady;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::PaymentField;
    use crate::mock::MockGateway;

    fn fast_config() -> ControllerConfig {
        ControllerConfig {
            script_attempts: 3,
            script_retry_delay: Duration::from_millis(1),
            script_timeout: Duration::from_millis(200),
            request_timeout: Duration::from_millis(250),
            field_setup: FieldSetup::default(),
        }
    }

    fn controller(gateway: Arc<MockGateway>) -> TokenizationController {
        TokenizationController::with_config(
            gateway,
            TokenizationKey::new("pk_test_123456"),
            fast_config(),
        )
    }

    async fn ready_controller(gateway: Arc<MockGateway>) -> TokenizationController {
        let mut ctrl = controller(gateway);
        ctrl.initialize().await.unwrap();
        ctrl.pump_events();
        assert_eq!(*ctrl.state(), TokenizationState::FieldsReady);
        ctrl
    }

    #[tokio::test]
    async fn test_initialize_walks_to_fields_ready() {
        let gateway = Arc::new(MockGateway::new());
        let mut ctrl = controller(gateway.clone());
        assert_eq!(*ctrl.state(), TokenizationState::Uninitialized);

        ctrl.initialize().await.unwrap();
        assert_eq!(*ctrl.state(), TokenizationState::FieldsConfigured);

        ctrl.pump_events();
        assert_eq!(*ctrl.state(), TokenizationState::FieldsReady);
        assert_eq!(gateway.injected_count(), 1);
    }

    #[tokio::test]
    async fn test_script_retry_cleans_up_between_attempts() {
        let gateway = Arc::new(MockGateway::new());
        gateway.fail_first_loads(2);

        let mut ctrl = controller(gateway.clone());
        ctrl.initialize().await.unwrap();
        ctrl.pump_events();

        assert_eq!(*ctrl.state(), TokenizationState::FieldsReady);
        assert_eq!(gateway.injected_count(), 3);
        // The two failed scripts were removed; one stays installed.
        assert_eq!(gateway.active_script_count(), 1);
    }

    #[tokio::test]
    async fn test_script_failure_exhausts_attempts() {
        let gateway = Arc::new(MockGateway::new());
        gateway.fail_first_loads(10);

        let mut ctrl = controller(gateway.clone());
        let err = ctrl.initialize().await.unwrap_err();
        assert!(matches!(err, PaymentError::ScriptLoad(_)));
        assert_eq!(ctrl.state().as_str(), "failed");
        assert_eq!(gateway.injected_count(), 3);
        assert_eq!(gateway.active_script_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_initialize_rejected() {
        let gateway = Arc::new(MockGateway::new());
        let mut ctrl = controller(gateway);
        ctrl.initialize().await.unwrap();

        let err = ctrl.initialize().await.unwrap_err();
        assert!(matches!(err, PaymentError::NotReady(_)));
    }

    #[tokio::test]
    async fn test_concurrent_initialize_injects_one_script() {
        let gateway = Arc::new(MockGateway::new());
        let ctrl = Arc::new(tokio::sync::Mutex::new(controller(gateway.clone())));

        let first = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.lock().await.initialize().await }
        });
        let second = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.lock().await.initialize().await }
        });
        let (first, second) = (first.await.unwrap(), second.await.unwrap());

        // Whichever task won the lock initialized; the other was refused.
        assert!(first.is_ok() != second.is_ok());
        assert_eq!(gateway.injected_count(), 1);
        assert_eq!(gateway.active_script_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_initialize_can_start_over() {
        let gateway = Arc::new(MockGateway::new());
        gateway.fail_first_loads(1);

        let mut config = fast_config();
        config.script_retry_delay = Duration::from_secs(30);
        let ctrl = Arc::new(tokio::sync::Mutex::new(TokenizationController::with_config(
            gateway.clone(),
            TokenizationKey::new("pk_test_123456"),
            config,
        )));

        let task = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.lock().await.initialize().await }
        });
        // Wait for the first attempt's cleanup; the task then parks in
        // the retry delay, where we cancel it.
        while gateway.removed_count() == 0 {
            time::sleep(Duration::from_millis(1)).await;
        }
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        let mut ctrl = ctrl.lock().await;
        assert_eq!(ctrl.state().as_str(), "failed");
        assert_eq!(gateway.active_script_count(), 0);

        ctrl.initialize().await.unwrap();
        ctrl.pump_events();
        assert_eq!(*ctrl.state(), TokenizationState::FieldsReady);
        assert_eq!(gateway.active_script_count(), 1);
    }

    #[tokio::test]
    async fn test_generate_before_initialize_rejected() {
        let gateway = Arc::new(MockGateway::new());
        let mut ctrl = controller(gateway);

        let err = ctrl.generate_token().await.unwrap_err();
        assert!(matches!(err, PaymentError::NotReady(_)));
    }

    #[tokio::test]
    async fn test_invalid_fields_stop_request_locally() {
        let gateway = Arc::new(MockGateway::new());
        let mut ctrl = ready_controller(gateway.clone()).await;

        // Nothing typed yet: fields are invalid, no network call happens.
        let token = ctrl.generate_token().await.unwrap();
        assert!(token.is_none());
        assert!(ctrl.fields().errors_shown());
        assert_eq!(gateway.request_count(), 0);
        assert_eq!(*ctrl.state(), TokenizationState::FieldsReady);
    }

    #[tokio::test]
    async fn test_only_failing_field_shows_a_message() {
        let gateway = Arc::new(MockGateway::new());
        let mut ctrl = ready_controller(gateway.clone()).await;
        gateway.send_validity(PaymentField::CardNumber, true, None);
        gateway.send_validity(PaymentField::Expiry, true, None);
        gateway.send_validity(
            PaymentField::Cvv,
            false,
            Some("Security code is too short".into()),
        );

        let token = ctrl.generate_token().await.unwrap();
        assert!(token.is_none());
        assert_eq!(gateway.request_count(), 0);
        assert_eq!(
            ctrl.fields().visible_error(PaymentField::Cvv),
            Some("Security code is too short")
        );
        assert_eq!(ctrl.fields().visible_error(PaymentField::CardNumber), None);
        assert_eq!(ctrl.fields().visible_error(PaymentField::Expiry), None);
    }

    #[tokio::test]
    async fn test_token_issued_for_valid_fields() {
        let gateway = Arc::new(MockGateway::new());
        let mut ctrl = ready_controller(gateway.clone()).await;
        gateway.mark_fields_valid();

        let token = ctrl.generate_token().await.unwrap();
        assert!(token.is_some());
        assert_eq!(*ctrl.state(), TokenizationState::TokenIssued);
        assert_eq!(ctrl.token().unwrap().value, token.unwrap().value);
        assert_eq!(gateway.request_count(), 1);
    }

    #[tokio::test]
    async fn test_new_request_after_issue_replaces_token() {
        let gateway = Arc::new(MockGateway::new());
        let mut ctrl = ready_controller(gateway.clone()).await;
        gateway.mark_fields_valid();
        gateway.respond_with_token("tok_first");
        gateway.respond_with_token("tok_second");

        let first = ctrl.generate_token().await.unwrap().unwrap();
        assert_eq!(first.value, "tok_first");

        // Tokens are single-use: a second submit requests a fresh one.
        let second = ctrl.generate_token().await.unwrap().unwrap();
        assert_eq!(second.value, "tok_second");
        assert_eq!(ctrl.token().unwrap().value, "tok_second");
        assert_eq!(gateway.request_count(), 2);

        // A decline on a later attempt leaves no stale token behind.
        gateway.respond_with_decline("Do not honor");
        let third = ctrl.generate_token().await.unwrap();
        assert!(third.is_none());
        assert!(ctrl.token().is_none());
        assert_eq!(*ctrl.state(), TokenizationState::FieldsReady);
    }

    #[tokio::test]
    async fn test_dropped_token_wait_frees_the_controller() {
        let gateway = Arc::new(MockGateway::new());
        let mut config = fast_config();
        config.request_timeout = Duration::from_secs(30);
        let mut ctrl = TokenizationController::with_config(
            gateway.clone(),
            TokenizationKey::new("pk_test_123456"),
            config,
        );
        ctrl.initialize().await.unwrap();
        ctrl.pump_events();
        gateway.mark_fields_valid();
        gateway.hold_responses(true);

        let ctrl = Arc::new(tokio::sync::Mutex::new(ctrl));
        let task = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.lock().await.generate_token().await }
        });
        while gateway.request_count() == 0 {
            time::sleep(Duration::from_millis(1)).await;
        }
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        // The dropped wait handed the event stream back and released
        // the request slot.
        let mut ctrl = ctrl.lock().await;
        assert_eq!(*ctrl.state(), TokenizationState::FieldsReady);

        gateway.hold_responses(false);
        let token = ctrl.generate_token().await.unwrap();
        assert!(token.is_some());
        assert_eq!(*ctrl.state(), TokenizationState::TokenIssued);
        assert_eq!(gateway.request_count(), 2);
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        let gateway = Arc::new(MockGateway::new());
        let mut ctrl = ready_controller(gateway.clone()).await;
        gateway.mark_fields_valid();
        gateway.hold_responses(true);

        let err = ctrl.generate_token().await.unwrap_err();
        assert!(matches!(err, PaymentError::ResponseTimeout(_)));
        assert_eq!(ctrl.state().as_str(), "failed");

        // Failed accepts a fresh initialize; the loaded script is kept.
        gateway.hold_responses(false);
        ctrl.initialize().await.unwrap();
        ctrl.pump_events();
        assert!(ctrl.is_ready());
        assert_eq!(gateway.injected_count(), 1);
    }

    #[tokio::test]
    async fn test_decline_returns_to_ready_for_retry() {
        let gateway = Arc::new(MockGateway::new());
        let mut ctrl = ready_controller(gateway.clone()).await;
        gateway.mark_fields_valid();
        gateway.respond_with_decline("Insufficient funds");

        let token = ctrl.generate_token().await.unwrap();
        assert!(token.is_none());
        assert_eq!(*ctrl.state(), TokenizationState::FieldsReady);
        assert_eq!(ctrl.payment_error(), Some("Insufficient funds"));

        // Next attempt succeeds without reinitializing.
        let token = ctrl.generate_token().await.unwrap();
        assert!(token.is_some());
        assert_eq!(*ctrl.state(), TokenizationState::TokenIssued);
        assert_eq!(ctrl.payment_error(), None);
    }

    #[tokio::test]
    async fn test_transport_failure_is_terminal_until_reinit() {
        let gateway = Arc::new(MockGateway::new());
        let mut ctrl = ready_controller(gateway.clone()).await;
        gateway.mark_fields_valid();
        gateway.fail_requests(true);

        let err = ctrl.generate_token().await.unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(_)));
        assert_eq!(ctrl.state().as_str(), "failed");

        // Failed state accepts a fresh initialize and keeps the script.
        gateway.fail_requests(false);
        ctrl.initialize().await.unwrap();
        ctrl.pump_events();
        assert!(ctrl.is_ready());
        assert_eq!(gateway.injected_count(), 1);
    }

    #[tokio::test]
    async fn test_teardown_removes_script() {
        let gateway = Arc::new(MockGateway::new());
        let mut ctrl = ready_controller(gateway.clone()).await;

        ctrl.teardown();
        assert_eq!(*ctrl.state(), TokenizationState::Uninitialized);
        assert_eq!(gateway.active_script_count(), 0);
    }
}
