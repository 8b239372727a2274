//! Questionnaire Eligibility Store
//!
//! Holds the intake questionnaire outcome for a checkout session: the
//! customer's answers, the general eligibility verdict and the per-product
//! verdicts. Setters only update the aggregate; every view over this data
//! is derived on demand by the eligibility engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::product::ProductId;

/// Intake question kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    Boolean,
    Date,
    Checkbox,
    Select,
    Number,
}

/// A single recorded answer
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireResponse {
    /// Question identifier from the intake content API
    pub question_id: String,

    /// Question text as shown to the customer
    pub question_text: String,

    /// Question kind
    pub question_type: QuestionType,

    /// The answer as entered (string, bool, number, list...)
    pub answer: serde_json::Value,

    /// Product this question screens for (None = general question)
    #[serde(default)]
    pub product_id: Option<ProductId>,

    /// Whether the answer matched the expected screening outcome
    #[serde(default)]
    pub is_correct: Option<bool>,
}

impl QuestionnaireResponse {
    pub fn new(
        question_id: impl Into<String>,
        question_text: impl Into<String>,
        question_type: QuestionType,
        answer: serde_json::Value,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            question_text: question_text.into(),
            question_type,
            answer,
            product_id: None,
            is_correct: None,
        }
    }

    pub fn for_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }
}

/// A question definition from the intake content API
///
/// Consumed read-only when rendering and when scoring answers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDefinition {
    /// Question identifier
    pub id: String,

    /// Question text
    pub text: String,

    /// Question kind
    pub question_type: QuestionType,

    /// Product this question belongs to (None = general)
    #[serde(default)]
    pub product_id: Option<ProductId>,

    /// Whether an answer is required to proceed
    #[serde(default)]
    pub required: bool,
}

/// Per-product eligibility verdict
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductEligibility {
    /// Product identifier
    pub product_id: ProductId,

    /// Product name at verdict time
    pub product_name: String,

    /// Whether the customer may purchase this product
    pub is_eligible: bool,

    /// Reason shown to the customer when ineligible
    #[serde(default)]
    pub ineligibility_reason: Option<String>,
}

impl ProductEligibility {
    pub fn eligible(product_id: ProductId, product_name: impl Into<String>) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            is_eligible: true,
            ineligibility_reason: None,
        }
    }

    pub fn ineligible(
        product_id: ProductId,
        product_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            is_eligible: false,
            ineligibility_reason: Some(reason.into()),
        }
    }
}

/// Partial update for [`QuestionnaireData::apply`]
///
/// Fields left as `None` keep their current value.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireUpdate {
    pub general_eligibility: Option<Option<bool>>,
    pub general_responses: Option<Vec<QuestionnaireResponse>>,
    pub product_responses: Option<Vec<QuestionnaireResponse>>,
    pub product_eligibilities: Option<Vec<ProductEligibility>>,
    pub eligible_product_ids: Option<Vec<ProductId>>,
    pub ineligible_product_ids: Option<Vec<ProductId>>,
    pub is_completed: Option<bool>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub total_questions: Option<u32>,
    pub total_questions_answered: Option<u32>,
}

/// The questionnaire outcome aggregate for one checkout session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireData {
    /// Tri-state general verdict: None = undetermined
    pub general_eligibility: Option<bool>,

    /// Answers to general screening questions
    pub general_responses: Vec<QuestionnaireResponse>,

    /// Answers to product-specific screening questions
    pub product_responses: Vec<QuestionnaireResponse>,

    /// Per-product verdicts, one entry per product
    pub product_eligibilities: Vec<ProductEligibility>,

    /// Products the customer may purchase
    pub eligible_product_ids: Vec<ProductId>,

    /// Products the customer may not purchase
    pub ineligible_product_ids: Vec<ProductId>,

    /// Whether the questionnaire was finished
    pub is_completed: bool,

    /// When the questionnaire was finished
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of questions presented
    pub total_questions: u32,

    /// Number of questions answered
    pub total_questions_answered: u32,
}

impl QuestionnaireData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a partial update into the aggregate
    pub fn apply(&mut self, update: QuestionnaireUpdate) {
        if let Some(general) = update.general_eligibility {
            self.general_eligibility = general;
        }
        if let Some(responses) = update.general_responses {
            self.general_responses = responses;
        }
        if let Some(responses) = update.product_responses {
            self.product_responses = responses;
        }
        if let Some(verdicts) = update.product_eligibilities {
            self.product_eligibilities = verdicts;
        }
        if let Some(ids) = update.eligible_product_ids {
            self.eligible_product_ids = ids;
        }
        if let Some(ids) = update.ineligible_product_ids {
            self.ineligible_product_ids = ids;
        }
        if let Some(completed) = update.is_completed {
            self.is_completed = completed;
        }
        if let Some(at) = update.completed_at {
            self.completed_at = at;
        }
        if let Some(total) = update.total_questions {
            self.total_questions = total;
        }
        if let Some(answered) = update.total_questions_answered {
            self.total_questions_answered = answered;
        }
    }

    /// Record the general screening verdict and its supporting answers
    pub fn set_general_eligibility(
        &mut self,
        is_eligible: bool,
        responses: Vec<QuestionnaireResponse>,
    ) {
        self.general_eligibility = Some(is_eligible);
        self.general_responses = responses;
    }

    /// Replace all product-specific answers
    pub fn set_product_responses(&mut self, responses: Vec<QuestionnaireResponse>) {
        self.product_responses = responses;
    }

    /// Append product-specific answers, replacing earlier answers to the
    /// same question in place
    pub fn add_product_responses(&mut self, responses: Vec<QuestionnaireResponse>) {
        for response in responses {
            if let Some(existing) = self
                .product_responses
                .iter_mut()
                .find(|r| r.question_id == response.question_id)
            {
                *existing = response;
            } else {
                self.product_responses.push(response);
            }
        }
    }

    /// Record or replace the verdict for one product
    ///
    /// Keeps `eligible_product_ids` and `ineligible_product_ids` disjoint:
    /// the product id lands on exactly one list afterwards.
    pub fn set_product_eligibility(&mut self, entry: ProductEligibility) {
        let id = entry.product_id.clone();

        self.eligible_product_ids.retain(|p| *p != id);
        self.ineligible_product_ids.retain(|p| *p != id);
        if entry.is_eligible {
            self.eligible_product_ids.push(id);
        } else {
            self.ineligible_product_ids.push(id);
        }

        if let Some(existing) = self
            .product_eligibilities
            .iter_mut()
            .find(|v| v.product_id == entry.product_id)
        {
            *existing = entry;
        } else {
            self.product_eligibilities.push(entry);
        }
    }

    /// Mark the questionnaire finished
    pub fn complete(
        &mut self,
        completed_at: DateTime<Utc>,
        total_questions: u32,
        total_answered: u32,
    ) {
        self.is_completed = true;
        self.completed_at = Some(completed_at);
        self.total_questions = total_questions;
        self.total_questions_answered = total_answered;
    }

    /// Reset the aggregate to its empty state
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Look up the recorded verdict for a product, if any
    pub fn eligibility_for(&self, product_id: &ProductId) -> Option<&ProductEligibility> {
        self.product_eligibilities
            .iter()
            .find(|v| &v.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_response(id: &str, answer: serde_json::Value) -> QuestionnaireResponse {
        QuestionnaireResponse::new(id, "Sample question?", QuestionType::Boolean, answer)
    }

    #[test]
    fn test_apply_merges_only_present_fields() {
        let mut data = QuestionnaireData::new();
        data.set_general_eligibility(true, vec![sample_response("q1", json!(true))]);

        data.apply(QuestionnaireUpdate {
            total_questions: Some(12),
            ..Default::default()
        });

        assert_eq!(data.total_questions, 12);
        assert_eq!(data.general_eligibility, Some(true));
        assert_eq!(data.general_responses.len(), 1);
    }

    #[test]
    fn test_add_product_responses_deduplicates_by_question() {
        let mut data = QuestionnaireData::new();
        data.set_product_responses(vec![
            sample_response("q1", json!(false)),
            sample_response("q2", json!(true)),
        ]);

        data.add_product_responses(vec![
            sample_response("q1", json!(true)),
            sample_response("q3", json!(false)),
        ]);

        assert_eq!(data.product_responses.len(), 3);
        let q1 = data
            .product_responses
            .iter()
            .find(|r| r.question_id == "q1")
            .unwrap();
        assert_eq!(q1.answer, json!(true));
    }

    #[test]
    fn test_product_eligibility_lists_stay_disjoint() {
        let mut data = QuestionnaireData::new();
        let id = ProductId::new("prod_sema");

        data.set_product_eligibility(ProductEligibility::eligible(id.clone(), "Semaglutide"));
        assert_eq!(data.eligible_product_ids, vec![id.clone()]);
        assert!(data.ineligible_product_ids.is_empty());

        data.set_product_eligibility(ProductEligibility::ineligible(
            id.clone(),
            "Semaglutide",
            "BMI below threshold",
        ));
        assert!(data.eligible_product_ids.is_empty());
        assert_eq!(data.ineligible_product_ids, vec![id.clone()]);
        assert_eq!(data.product_eligibilities.len(), 1);
        assert!(!data.eligibility_for(&id).unwrap().is_eligible);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut data = QuestionnaireData::new();
        data.set_general_eligibility(false, vec![sample_response("q1", json!(false))]);
        data.complete(Utc::now(), 10, 10);

        data.clear();

        assert_eq!(data.general_eligibility, None);
        assert!(!data.is_completed);
        assert!(data.completed_at.is_none());
        assert_eq!(data.total_questions, 0);
    }
}
