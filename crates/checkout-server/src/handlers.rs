//! HTTP Handlers for the Checkout API

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use checkout_core::{
    CheckoutError, CheckoutField, CheckoutFlow, Coupon, CustomerContext, EligibilityStatus,
    OrderQuote, ProductEligibility, ProductId, QuestionDefinition, QuestionnaireResponse,
    QuestionnaireUpdate, SelectedProduct, SessionId, SessionStore,
};
use checkout_payments::{
    PaymentError, PaymentField, TokenizationController, TokenizationState,
};
use checkout_runtime::{MerchantProfile, OrderConfirmation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Guest checkout (no account)
    #[serde(default)]
    pub guest: bool,

    /// Account id for signed-in customers
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralEligibilityRequest {
    pub eligible: bool,

    #[serde(default)]
    pub responses: Vec<QuestionnaireResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsesRequest {
    pub responses: Vec<QuestionnaireResponse>,

    /// Merge into existing answers instead of replacing them
    #[serde(default)]
    pub append: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub total_questions: u32,
    pub total_answered: u32,
}

#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct FieldRequest {
    pub field: CheckoutField,

    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct TermsRequest {
    pub accepted: bool,
}

#[derive(Debug, Deserialize)]
pub struct QuestionsQuery {
    /// Comma-separated product ids
    #[serde(default)]
    pub products: String,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Client-facing view of a checkout session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub guest: bool,
    pub status: EligibilityStatus,
    pub progress: f32,
    pub selections: Vec<SelectedProduct>,
    pub coupon: Option<Coupon>,
    pub terms_accepted: bool,
    pub quote: OrderQuote,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResponse {
    pub status: EligibilityStatus,
    pub progress: f32,
    pub eligible: Vec<SelectedProduct>,
    pub ineligible: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResponse {
    pub field: CheckoutField,
    pub value: String,
    pub dirty: bool,
    pub error: Option<String>,
}

/// Tokenization controller status for one session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatus {
    pub state: String,
    pub reason: Option<String>,
    pub fields_valid: bool,
    pub invalid_fields: Vec<String>,
    pub payment_error: Option<String>,
    pub token_issued: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

// ============================================================================
// Error Mapping
// ============================================================================

fn checkout_error(err: CheckoutError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &err {
        CheckoutError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_FAILED"),
        CheckoutError::CouponInvalid(_) => (StatusCode::BAD_REQUEST, "COUPON_INVALID"),
        CheckoutError::SubmissionBlocked(_) => (StatusCode::CONFLICT, "SUBMISSION_BLOCKED"),
        CheckoutError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
        CheckoutError::Session(_) => (StatusCode::BAD_REQUEST, "SESSION_ERROR"),
        CheckoutError::Network(_) | CheckoutError::Submission(_) => {
            (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR")
        }
        CheckoutError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };
    tracing::debug!(error = %err, code, "Request failed");
    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code: code.to_string(),
        }),
    )
}

fn payment_error(err: PaymentError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &err {
        PaymentError::NotReady(_) => (StatusCode::CONFLICT, "PAYMENT_NOT_READY"),
        PaymentError::RequestInFlight => (StatusCode::CONFLICT, "PAYMENT_IN_FLIGHT"),
        PaymentError::ScriptLoad(_) | PaymentError::Gateway(_) => {
            (StatusCode::BAD_GATEWAY, "VENDOR_ERROR")
        }
        PaymentError::ResponseTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "VENDOR_TIMEOUT"),
        PaymentError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED"),
        PaymentError::Declined(_) => (StatusCode::PAYMENT_REQUIRED, "CARD_DECLINED"),
        PaymentError::FieldsInvalid => (StatusCode::UNPROCESSABLE_ENTITY, "FIELDS_INVALID"),
    };
    tracing::debug!(error = %err, code, "Payment request failed");
    (
        status,
        Json(ErrorResponse {
            error: err.user_message().to_string(),
            code: code.to_string(),
        }),
    )
}

fn not_configured(what: &str, code: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: format!("{} is not configured", what),
            code: code.to_string(),
        }),
    )
}

// ============================================================================
// Helpers
// ============================================================================

fn load_flow(
    state: &AppState,
    id: &str,
) -> Result<CheckoutFlow, (StatusCode, Json<ErrorResponse>)> {
    let session_id = SessionId::from_string(id.to_string());
    CheckoutFlow::restore(state.sessions.as_ref(), &session_id).map_err(checkout_error)
}

fn save_flow(
    state: &AppState,
    flow: &CheckoutFlow,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    flow.persist(state.sessions.as_ref()).map_err(checkout_error)
}

fn snapshot(state: &AppState, flow: &CheckoutFlow) -> SessionSnapshot {
    let session = flow.session();
    SessionSnapshot {
        id: flow.id().to_string(),
        guest: session.customer.guest,
        status: flow.eligibility_status(),
        progress: flow.progress(),
        selections: session.selections.clone(),
        coupon: session.coupon.clone(),
        terms_accepted: session.terms_accepted,
        quote: flow.quote(state.settings.consultation_fee),
    }
}

fn eligibility_view(flow: &CheckoutFlow) -> EligibilityResponse {
    EligibilityResponse {
        status: flow.eligibility_status(),
        progress: flow.progress(),
        eligible: flow.eligible_products().into_iter().cloned().collect(),
        ineligible: serde_json::to_value(flow.ineligible_products()).unwrap_or_default(),
    }
}

fn payment_status(controller: &TokenizationController) -> PaymentStatus {
    let reason = match controller.state() {
        TokenizationState::Failed { reason } => Some(reason.clone()),
        _ => None,
    };
    PaymentStatus {
        state: controller.state().as_str().to_string(),
        reason,
        fields_valid: controller.fields().all_valid(),
        invalid_fields: controller
            .fields()
            .invalid_fields()
            .iter()
            .map(|f| f.as_str().to_string())
            .collect(),
        payment_error: controller.payment_error().map(str::to_string),
        token_issued: controller.token().is_some(),
    }
}

/// Status reported before any controller exists for the session
fn payment_status_uninitialized() -> PaymentStatus {
    PaymentStatus {
        state: TokenizationState::Uninitialized.as_str().to_string(),
        reason: None,
        fields_valid: false,
        invalid_fields: PaymentField::ALL
            .iter()
            .map(|f| f.as_str().to_string())
            .collect(),
        payment_error: None,
        token_issued: false,
    }
}

// ============================================================================
// Health & Merchant Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "checkout-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/merchant
pub async fn get_merchant(
    State(state): State<AppState>,
) -> Result<Json<MerchantProfile>, (StatusCode, Json<ErrorResponse>)> {
    let Some(merchant) = state.merchant.as_ref() else {
        return Err(not_configured("Merchant backend", "MERCHANT_DISABLED"));
    };
    let profile = merchant.profile().await.map_err(checkout_error)?;
    Ok(Json(profile))
}

/// GET /api/questions?products=a,b
pub async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<QuestionsQuery>,
) -> Result<Json<Vec<QuestionDefinition>>, (StatusCode, Json<ErrorResponse>)> {
    let Some(intake) = state.intake.as_ref() else {
        return Err(not_configured("Intake backend", "INTAKE_DISABLED"));
    };
    let product_ids: Vec<ProductId> = query
        .products
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ProductId::new)
        .collect();
    let questions = intake.questions(&product_ids).await.map_err(checkout_error)?;
    Ok(Json(questions))
}

// ============================================================================
// Session Handlers
// ============================================================================

/// POST /api/checkout/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    let customer = match request.customer_id {
        Some(customer_id) if !request.guest => CustomerContext::signed_in(customer_id),
        _ => CustomerContext::guest(),
    };
    let flow = CheckoutFlow::new(customer);
    save_flow(&state, &flow)?;
    tracing::info!(session_id = %flow.id(), "Checkout session created");
    Ok(Json(snapshot(&state, &flow)))
}

/// GET /api/checkout/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    let flow = load_flow(&state, &id)?;
    Ok(Json(snapshot(&state, &flow)))
}

/// DELETE /api/checkout/sessions/{id}
pub async fn abandon_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let flow = load_flow(&state, &id)?;
    state.discard_controller(flow.id()).await;
    flow.abandon(state.sessions.as_ref()).map_err(checkout_error)?;
    Ok(Json(StatusResponse {
        status: "abandoned".to_string(),
    }))
}

// ============================================================================
// Questionnaire Handlers
// ============================================================================

/// PUT /api/checkout/sessions/{id}/questionnaire
pub async fn update_questionnaire(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<QuestionnaireUpdate>,
) -> Result<Json<EligibilityResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    flow.apply_questionnaire(update);
    save_flow(&state, &flow)?;
    Ok(Json(eligibility_view(&flow)))
}

/// POST /api/checkout/sessions/{id}/questionnaire/general
pub async fn record_general_eligibility(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<GeneralEligibilityRequest>,
) -> Result<Json<EligibilityResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    flow.record_general_eligibility(request.eligible, request.responses);
    save_flow(&state, &flow)?;
    Ok(Json(eligibility_view(&flow)))
}

/// POST /api/checkout/sessions/{id}/questionnaire/responses
pub async fn record_responses(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ResponsesRequest>,
) -> Result<Json<EligibilityResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    if request.append {
        flow.append_product_responses(request.responses);
    } else {
        flow.record_product_responses(request.responses);
    }
    save_flow(&state, &flow)?;
    Ok(Json(eligibility_view(&flow)))
}

/// POST /api/checkout/sessions/{id}/questionnaire/verdict
pub async fn record_verdict(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(verdict): Json<ProductEligibility>,
) -> Result<Json<EligibilityResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    flow.record_product_eligibility(verdict);
    save_flow(&state, &flow)?;
    Ok(Json(eligibility_view(&flow)))
}

/// POST /api/checkout/sessions/{id}/questionnaire/complete
pub async fn complete_questionnaire(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<EligibilityResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    flow.complete_questionnaire(request.total_questions, request.total_answered);
    save_flow(&state, &flow)?;
    Ok(Json(eligibility_view(&flow)))
}

/// POST /api/checkout/sessions/{id}/questionnaire/reset
pub async fn reset_questionnaire(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EligibilityResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    flow.reset_questionnaire();
    save_flow(&state, &flow)?;
    Ok(Json(eligibility_view(&flow)))
}

/// GET /api/checkout/sessions/{id}/eligibility
pub async fn get_eligibility(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EligibilityResponse>, (StatusCode, Json<ErrorResponse>)> {
    let flow = load_flow(&state, &id)?;
    Ok(Json(eligibility_view(&flow)))
}

// ============================================================================
// Order Composition Handlers
// ============================================================================

/// POST /api/checkout/sessions/{id}/products
pub async fn select_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(selection): Json<SelectedProduct>,
) -> Result<Json<SessionSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    flow.select_product(selection);
    save_flow(&state, &flow)?;
    Ok(Json(snapshot(&state, &flow)))
}

/// DELETE /api/checkout/sessions/{id}/products/{product_id}
pub async fn remove_product(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(String, String)>,
) -> Result<Json<SessionSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    if !flow.remove_product(&ProductId::new(product_id)) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Product is not part of the order".to_string(),
                code: "PRODUCT_NOT_FOUND".to_string(),
            }),
        ));
    }
    save_flow(&state, &flow)?;
    Ok(Json(snapshot(&state, &flow)))
}

/// POST /api/checkout/sessions/{id}/coupon
pub async fn apply_coupon(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CouponRequest>,
) -> Result<Json<SessionSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    let Some(orders) = state.orders.as_ref() else {
        return Err(not_configured("Orders backend", "ORDERS_DISABLED"));
    };
    let product_ids = flow.session().selection_ids();
    let coupon = orders
        .validate_coupon(&request.code, &product_ids)
        .await
        .map_err(checkout_error)?;
    flow.apply_coupon(coupon).map_err(checkout_error)?;
    save_flow(&state, &flow)?;
    Ok(Json(snapshot(&state, &flow)))
}

/// DELETE /api/checkout/sessions/{id}/coupon
pub async fn remove_coupon(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    flow.remove_coupon();
    save_flow(&state, &flow)?;
    Ok(Json(snapshot(&state, &flow)))
}

/// GET /api/checkout/sessions/{id}/quote
pub async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderQuote>, (StatusCode, Json<ErrorResponse>)> {
    let flow = load_flow(&state, &id)?;
    Ok(Json(flow.quote(state.settings.consultation_fee)))
}

// ============================================================================
// Form Handlers
// ============================================================================

/// POST /api/checkout/sessions/{id}/fields
pub async fn update_field(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FieldRequest>,
) -> Result<Json<FieldResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    flow.update_field(request.field, request.value);
    let form = &flow.session().form;
    let response = FieldResponse {
        field: request.field,
        value: form.value(request.field).to_string(),
        dirty: form.is_dirty(request.field),
        error: form.error(request.field).map(str::to_string),
    };
    save_flow(&state, &flow)?;
    Ok(Json(response))
}

/// POST /api/checkout/sessions/{id}/terms
pub async fn accept_terms(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TermsRequest>,
) -> Result<Json<SessionSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    flow.accept_terms(request.accepted);
    save_flow(&state, &flow)?;
    Ok(Json(snapshot(&state, &flow)))
}

// ============================================================================
// Payment Handlers
// ============================================================================

/// POST /api/checkout/sessions/{id}/payment/initialize
pub async fn initialize_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentStatus>, (StatusCode, Json<ErrorResponse>)> {
    let flow = load_flow(&state, &id)?;
    let controller = state.controller(flow.id()).await;
    let mut controller = controller.lock().await;
    match controller.initialize().await {
        Ok(()) => {}
        // Already initialized; report where the controller stands
        Err(PaymentError::NotReady(_)) => controller.pump_events(),
        Err(e) => return Err(payment_error(e)),
    }
    Ok(Json(payment_status(&controller)))
}

/// GET /api/checkout/sessions/{id}/payment
pub async fn get_payment_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentStatus>, (StatusCode, Json<ErrorResponse>)> {
    let flow = load_flow(&state, &id)?;
    match state.existing_controller(flow.id()).await {
        Some(controller) => {
            let mut controller = controller.lock().await;
            controller.pump_events();
            Ok(Json(payment_status(&controller)))
        }
        None => Ok(Json(payment_status_uninitialized())),
    }
}

/// POST /api/checkout/sessions/{id}/payment/tokenize
pub async fn tokenize_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentStatus>, (StatusCode, Json<ErrorResponse>)> {
    let flow = load_flow(&state, &id)?;
    let Some(controller) = state.existing_controller(flow.id()).await else {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "Payment fields are not initialized".to_string(),
                code: "PAYMENT_NOT_INITIALIZED".to_string(),
            }),
        ));
    };
    let mut controller = controller.lock().await;
    controller
        .generate_token()
        .await
        .map_err(payment_error)?;
    Ok(Json(payment_status(&controller)))
}

// ============================================================================
// Submission Handler
// ============================================================================

/// POST /api/checkout/sessions/{id}/submit
pub async fn submit_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderConfirmation>, (StatusCode, Json<ErrorResponse>)> {
    let mut flow = load_flow(&state, &id)?;
    let Some(orders) = state.orders.as_ref() else {
        return Err(not_configured("Orders backend", "ORDERS_DISABLED"));
    };

    let token = match state.existing_controller(flow.id()).await {
        Some(controller) => controller.lock().await.token().map(|t| t.value.clone()),
        None => None,
    };

    let submission = match flow.submission(token.as_deref(), state.settings.consultation_fee) {
        Ok(submission) => submission,
        Err(e) => {
            // Keep the dirty marks so the storefront can render field errors
            save_flow(&state, &flow)?;
            return Err(checkout_error(e));
        }
    };

    let confirmation = orders.submit(&submission).await.map_err(checkout_error)?;

    state.discard_controller(flow.id()).await;
    state.sessions.delete(flow.id()).map_err(checkout_error)?;
    tracing::info!(
        order_id = %confirmation.order_id,
        status = %confirmation.status,
        "Order submitted"
    );
    Ok(Json(confirmation))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use checkout_core::MemorySessionStore;
    use checkout_payments::{CardCaptureGateway, MockGateway, TokenizationKey};
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::state::Settings;

    fn test_state(gateway: Arc<dyn CardCaptureGateway>) -> AppState {
        AppState {
            sessions: Arc::new(MemorySessionStore::new()),
            gateway,
            tokenization_key: TokenizationKey::new("pk_test_123456"),
            controllers: Arc::new(Mutex::new(HashMap::new())),
            orders: None,
            merchant: None,
            intake: None,
            settings: Settings {
                consultation_fee: Decimal::new(2500, 2),
            },
        }
    }

    fn new_session(state: &AppState) -> String {
        let flow = CheckoutFlow::new(CustomerContext::guest());
        flow.persist(state.sessions.as_ref()).unwrap();
        flow.id().to_string()
    }

    #[tokio::test]
    async fn test_vendor_wait_does_not_block_other_sessions() {
        let gateway = Arc::new(MockGateway::new());
        let state = test_state(gateway.clone());
        let paying = new_session(&state);
        let browsing = new_session(&state);

        initialize_payment(State(state.clone()), Path(paying.clone()))
            .await
            .unwrap();
        gateway.mark_fields_valid();
        gateway.hold_responses(true);

        let task = tokio::spawn({
            let state = state.clone();
            async move { tokenize_card(State(state), Path(paying)).await }
        });
        while gateway.request_count() == 0 {
            sleep(Duration::from_millis(1)).await;
        }

        // One session parked at the vendor; the rest keep moving.
        let status = timeout(
            Duration::from_secs(1),
            get_payment_status(State(state.clone()), Path(browsing.clone())),
        )
        .await
        .expect("status stalled behind another session")
        .unwrap();
        assert_eq!(status.0.state, "uninitialized");

        timeout(
            Duration::from_secs(1),
            abandon_session(State(state.clone()), Path(browsing)),
        )
        .await
        .expect("abandon stalled behind another session")
        .unwrap();

        task.abort();
        let _ = task.await;
    }
}
