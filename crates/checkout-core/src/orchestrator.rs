//! Checkout Orchestrator
//!
//! Drives a checkout session end to end: questionnaire updates, product
//! selection, coupon and form state, and the final submission gate.
//!
//! Eligibility, pricing and validation results are always recomputed from
//! session state; nothing derived is cached, so a questionnaire change is
//! reflected in the very next read.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::eligibility::{self, EligibilityStatus, IneligibleProduct};
use crate::error::{CheckoutError, Result};
use crate::form::{CheckoutField, CheckoutPayload};
use crate::pricing::{self, Coupon, OrderQuote};
use crate::product::{ProductId, SelectedProduct, SelectionKind};
use crate::questionnaire::{ProductEligibility, QuestionnaireResponse, QuestionnaireUpdate};
use crate::session::{CheckoutSession, CustomerContext, SessionId, SessionStore};

/// One product line of a submitted order
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub kind: SelectionKind,
    pub dosage_strength: String,
    pub duration_months: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl OrderLine {
    fn from_selection(selection: &SelectedProduct) -> Self {
        Self {
            product_id: selection.product.id.clone(),
            product_name: selection.product.name.clone(),
            kind: selection.kind,
            dosage_strength: selection.option.dosage_strength.clone(),
            duration_months: selection.option.duration_months,
            unit_price: selection.option.price,
            line_total: selection.line_total(),
        }
    }
}

/// The composed order, ready for the orders backend
///
/// Only produced by [`CheckoutFlow::submission`] once every gate has
/// passed; there is no way to obtain one from a partially valid session.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    pub session_id: SessionId,
    pub customer: CustomerContext,
    pub lines: Vec<OrderLine>,
    pub totals: OrderQuote,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub payment_token: String,
    pub details: CheckoutPayload,
    pub submitted_at: DateTime<Utc>,
}

/// Orchestrates one checkout session
pub struct CheckoutFlow {
    session: CheckoutSession,
}

impl CheckoutFlow {
    /// Start a fresh checkout for a customer
    pub fn new(customer: CustomerContext) -> Self {
        Self {
            session: CheckoutSession::new(customer),
        }
    }

    /// Resume from an existing session
    pub fn from_session(session: CheckoutSession) -> Self {
        Self { session }
    }

    pub fn id(&self) -> &SessionId {
        &self.session.id
    }

    pub fn session(&self) -> &CheckoutSession {
        &self.session
    }

    pub fn into_session(self) -> CheckoutSession {
        self.session
    }

    // ===== Questionnaire =====

    /// Merge a partial questionnaire update
    pub fn apply_questionnaire(&mut self, update: QuestionnaireUpdate) {
        self.session.questionnaire.apply(update);
        self.session.touch();
    }

    /// Record the general health screening verdict and its answers
    pub fn record_general_eligibility(
        &mut self,
        eligible: bool,
        responses: Vec<QuestionnaireResponse>,
    ) {
        self.session
            .questionnaire
            .set_general_eligibility(eligible, responses);
        self.session.touch();
        tracing::info!(
            session = %self.session.id,
            eligible,
            "General eligibility recorded"
        );
    }

    /// Replace all product-specific responses
    pub fn record_product_responses(&mut self, responses: Vec<QuestionnaireResponse>) {
        self.session.questionnaire.set_product_responses(responses);
        self.session.touch();
    }

    /// Merge additional product-specific responses
    pub fn append_product_responses(&mut self, responses: Vec<QuestionnaireResponse>) {
        self.session.questionnaire.add_product_responses(responses);
        self.session.touch();
    }

    /// Record a per-product eligibility verdict
    pub fn record_product_eligibility(&mut self, verdict: ProductEligibility) {
        tracing::info!(
            session = %self.session.id,
            product = %verdict.product_id,
            eligible = verdict.is_eligible,
            "Product eligibility recorded"
        );
        self.session.questionnaire.set_product_eligibility(verdict);
        self.session.touch();
    }

    /// Mark the questionnaire finished
    pub fn complete_questionnaire(&mut self, total_questions: u32, total_answered: u32) {
        self.session
            .questionnaire
            .complete(Utc::now(), total_questions, total_answered);
        self.session.touch();
        tracing::info!(
            session = %self.session.id,
            total_questions,
            total_answered,
            "Questionnaire completed"
        );
    }

    /// Wipe the questionnaire record, forcing a retake
    pub fn reset_questionnaire(&mut self) {
        self.session.questionnaire.clear();
        self.session.touch();
        tracing::info!(session = %self.session.id, "Questionnaire reset");
    }

    // ===== Products & pricing =====

    /// Add a product to the order, replacing any prior entry for it
    ///
    /// Changing the selection invalidates any applied coupon.
    pub fn select_product(&mut self, selection: SelectedProduct) {
        let product_id = selection.product_id().clone();
        self.session
            .selections
            .retain(|s| s.product_id() != &product_id);
        self.session.selections.push(selection);
        self.session.coupon = None;
        self.session.touch();
        tracing::info!(session = %self.session.id, product = %product_id, "Product selected");
    }

    /// Remove a product from the order
    pub fn remove_product(&mut self, product_id: &ProductId) -> bool {
        let before = self.session.selections.len();
        self.session
            .selections
            .retain(|s| s.product_id() != product_id);
        let removed = self.session.selections.len() < before;
        if removed {
            self.session.coupon = None;
            self.session.touch();
            tracing::info!(session = %self.session.id, product = %product_id, "Product removed");
        }
        removed
    }

    /// Attach a validated coupon to the order
    pub fn apply_coupon(&mut self, coupon: Coupon) -> Result<()> {
        if self.session.selections.is_empty() {
            return Err(CheckoutError::CouponInvalid(
                "No products selected".to_string(),
            ));
        }
        tracing::info!(session = %self.session.id, code = %coupon.code, "Coupon applied");
        self.session.coupon = Some(coupon);
        self.session.touch();
        Ok(())
    }

    /// Drop the applied coupon
    pub fn remove_coupon(&mut self) {
        if self.session.coupon.take().is_some() {
            self.session.touch();
        }
    }

    // ===== Form & terms =====

    /// Update one form field
    pub fn update_field(&mut self, field: CheckoutField, value: impl Into<String>) {
        self.session.form.set_field(field, value);
        self.session.touch();
    }

    /// Record the terms of service decision
    pub fn accept_terms(&mut self, accepted: bool) {
        self.session.terms_accepted = accepted;
        self.session.touch();
    }

    // ===== Derived reads =====

    /// Current eligibility status
    pub fn eligibility_status(&self) -> EligibilityStatus {
        eligibility::status(&self.session.questionnaire)
    }

    /// Questionnaire completion percentage
    pub fn progress(&self) -> f32 {
        eligibility::progress(&self.session.questionnaire)
    }

    /// Selected products cleared for purchase
    pub fn eligible_products(&self) -> Vec<&SelectedProduct> {
        eligibility::eligible_products(&self.session.questionnaire, &self.session.selections)
    }

    /// Selected products blocked from purchase, with their verdicts
    pub fn ineligible_products(&self) -> Vec<IneligibleProduct<'_>> {
        eligibility::ineligible_products(&self.session.questionnaire, &self.session.selections)
    }

    /// Price the order as it stands
    ///
    /// Only eligible products are charged; blocked selections contribute
    /// nothing to the totals.
    pub fn quote(&self, consultation_fee: Decimal) -> OrderQuote {
        pricing::quote(
            &self.eligible_products(),
            consultation_fee,
            self.session.coupon.as_ref(),
        )
    }

    // ===== Submission =====

    /// Compose the final order, enforcing every submission gate
    ///
    /// Gates run in order: terms accepted, eligibility cleared, form
    /// valid, payment token present. The first failure blocks submission
    /// and nothing is composed.
    pub fn submission(
        &mut self,
        payment_token: Option<&str>,
        consultation_fee: Decimal,
    ) -> Result<OrderSubmission> {
        if !self.session.terms_accepted {
            return Err(self.blocked("Terms of service not accepted"));
        }

        let status = self.eligibility_status();
        if status != EligibilityStatus::Eligible {
            return Err(self.blocked(&format!("Eligibility not cleared: {}", status.as_str())));
        }

        let eligible = self.eligible_products();
        if eligible.is_empty() {
            return Err(self.blocked("No eligible products in the order"));
        }

        let lines: Vec<OrderLine> = eligible.iter().map(|s| OrderLine::from_selection(s)).collect();
        let totals = pricing::quote(&eligible, consultation_fee, self.session.coupon.as_ref());

        let details = match self.session.form.payload() {
            Ok(payload) => payload,
            Err(errors) => {
                return Err(self.blocked(&format!("Form invalid: {}", errors.summary())));
            }
        };

        let token = match payment_token {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(self.blocked("Payment details incomplete")),
        };

        let submission = OrderSubmission {
            session_id: self.session.id.clone(),
            customer: self.session.customer.clone(),
            lines,
            totals,
            coupon_code: self.session.coupon.as_ref().map(|c| c.code.clone()),
            payment_token: token,
            details,
            submitted_at: Utc::now(),
        };

        tracing::info!(
            session = %self.session.id,
            lines = submission.lines.len(),
            total = %submission.totals.total,
            "Order composed for submission"
        );
        Ok(submission)
    }

    fn blocked(&self, reason: &str) -> CheckoutError {
        tracing::warn!(session = %self.session.id, reason, "Submission blocked");
        CheckoutError::SubmissionBlocked(reason.to_string())
    }

    // ===== Persistence =====

    /// Save the session to a store
    pub fn persist(&self, store: &dyn SessionStore) -> Result<()> {
        store.save(&self.session)
    }

    /// Resume a checkout from a store
    pub fn restore(store: &dyn SessionStore, id: &SessionId) -> Result<Self> {
        let session = store
            .load(id)?
            .ok_or_else(|| CheckoutError::SessionNotFound(id.to_string()))?;
        Ok(Self::from_session(session))
    }

    /// Abandon the checkout, removing it from the store
    pub fn abandon(self, store: &dyn SessionStore) -> Result<()> {
        tracing::info!(session = %self.session.id, "Checkout abandoned");
        store.delete(&self.session.id)
    }
}
