//! Eligibility Engine
//!
//! Pure derivations over the questionnaire aggregate and the session's
//! product selections. Nothing here mutates state; every view is
//! recomputed from the current snapshot so it can never go stale.
//!
//! The engine fails closed: a product without a recorded verdict is
//! treated as ineligible, and a false general verdict overrides any
//! per-product verdict that claims otherwise.

use serde::{Deserialize, Serialize};

use crate::product::SelectedProduct;
use crate::questionnaire::{ProductEligibility, QuestionnaireData};

/// Overall eligibility standing for the checkout
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    /// Questionnaire not finished yet
    Pending,

    /// General screening failed; no product can be purchased
    GeneralIneligible,

    /// Screening finished but no product passed
    NoEligibleProducts,

    /// At least one product may be purchased
    Eligible,
}

impl EligibilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EligibilityStatus::Pending => "pending",
            EligibilityStatus::GeneralIneligible => "general_ineligible",
            EligibilityStatus::NoEligibleProducts => "no_eligible_products",
            EligibilityStatus::Eligible => "eligible",
        }
    }
}

/// A selection the customer may not purchase, with the verdict when one
/// was recorded (None = no verdict, excluded by the fail-closed default)
#[derive(Clone, Debug, Serialize)]
pub struct IneligibleProduct<'a> {
    pub selection: &'a SelectedProduct,
    pub verdict: Option<&'a ProductEligibility>,
}

/// Selections the customer may purchase
///
/// A false general verdict empties the view regardless of per-product
/// entries; otherwise a selection is included iff its product id is on
/// the eligible list.
pub fn eligible_products<'a>(
    data: &QuestionnaireData,
    selections: &'a [SelectedProduct],
) -> Vec<&'a SelectedProduct> {
    if data.general_eligibility == Some(false) {
        return Vec::new();
    }

    selections
        .iter()
        .filter(|s| data.eligible_product_ids.contains(s.product_id()))
        .collect()
}

/// The complement of [`eligible_products`] over the same selections
pub fn ineligible_products<'a>(
    data: &'a QuestionnaireData,
    selections: &'a [SelectedProduct],
) -> Vec<IneligibleProduct<'a>> {
    let generally_ineligible = data.general_eligibility == Some(false);

    selections
        .iter()
        .filter(|s| generally_ineligible || !data.eligible_product_ids.contains(s.product_id()))
        .map(|selection| IneligibleProduct {
            selection,
            verdict: data.eligibility_for(selection.product_id()),
        })
        .collect()
}

/// Derive the overall status from the aggregate
///
/// Checked in order: an unfinished questionnaire is still pending, a
/// finished one reports the general verdict before the per-product view.
pub fn status(data: &QuestionnaireData) -> EligibilityStatus {
    if !data.is_completed {
        return EligibilityStatus::Pending;
    }
    if data.general_eligibility == Some(false) {
        return EligibilityStatus::GeneralIneligible;
    }
    if data.eligible_product_ids.is_empty() {
        return EligibilityStatus::NoEligibleProducts;
    }
    EligibilityStatus::Eligible
}

/// Questionnaire progress as a percentage, clamped to [0, 100]
pub fn progress(data: &QuestionnaireData) -> f32 {
    if data.total_questions == 0 {
        return 0.0;
    }
    let percent =
        (data.total_questions_answered as f32 / data.total_questions as f32) * 100.0;
    percent.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{Product, ProductId, PurchaseOption, SelectionKind};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn selection(id: &str, name: &str) -> SelectedProduct {
        SelectedProduct::new(
            SelectionKind::Main,
            Product::new(id, name),
            PurchaseOption::new("0.5mg", 1, dec!(299)),
        )
    }

    #[test]
    fn test_fail_closed_without_verdict() {
        let mut data = QuestionnaireData::new();
        data.set_general_eligibility(true, Vec::new());
        data.complete(Utc::now(), 5, 5);

        let selections = vec![selection("prod_sema", "Semaglutide")];
        assert!(eligible_products(&data, &selections).is_empty());

        let ineligible = ineligible_products(&data, &selections);
        assert_eq!(ineligible.len(), 1);
        assert!(ineligible[0].verdict.is_none());
    }

    #[test]
    fn test_general_ineligibility_dominates_product_verdicts() {
        // Inconsistent data: a product verdict says eligible while the
        // general verdict says no. The general verdict must win.
        let mut data = QuestionnaireData::new();
        data.set_product_eligibility(ProductEligibility::eligible(
            ProductId::new("prod_sema"),
            "Semaglutide",
        ));
        data.set_general_eligibility(false, Vec::new());
        data.complete(Utc::now(), 5, 5);

        let selections = vec![selection("prod_sema", "Semaglutide")];
        assert!(eligible_products(&data, &selections).is_empty());
        assert_eq!(ineligible_products(&data, &selections).len(), 1);
        assert_eq!(status(&data), EligibilityStatus::GeneralIneligible);
    }

    #[test]
    fn test_eligible_view_filters_by_recorded_ids() {
        let mut data = QuestionnaireData::new();
        data.set_general_eligibility(true, Vec::new());
        data.set_product_eligibility(ProductEligibility::eligible(
            ProductId::new("prod_sema"),
            "Semaglutide",
        ));
        data.set_product_eligibility(ProductEligibility::ineligible(
            ProductId::new("prod_tirz"),
            "Tirzepatide",
            "Contraindicated medication",
        ));
        data.complete(Utc::now(), 8, 8);

        let selections = vec![
            selection("prod_sema", "Semaglutide"),
            selection("prod_tirz", "Tirzepatide"),
        ];

        let eligible = eligible_products(&data, &selections);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].product_id().as_str(), "prod_sema");

        let ineligible = ineligible_products(&data, &selections);
        assert_eq!(ineligible.len(), 1);
        let verdict = ineligible[0].verdict.unwrap();
        assert_eq!(
            verdict.ineligibility_reason.as_deref(),
            Some("Contraindicated medication")
        );
        assert_eq!(status(&data), EligibilityStatus::Eligible);
    }

    #[test]
    fn test_status_pending_until_completed() {
        let mut data = QuestionnaireData::new();
        assert_eq!(status(&data), EligibilityStatus::Pending);

        data.set_general_eligibility(true, Vec::new());
        assert_eq!(status(&data), EligibilityStatus::Pending);

        data.complete(Utc::now(), 4, 4);
        assert_eq!(status(&data), EligibilityStatus::NoEligibleProducts);

        data.set_product_eligibility(ProductEligibility::eligible(
            ProductId::new("prod_sema"),
            "Semaglutide",
        ));
        assert_eq!(status(&data), EligibilityStatus::Eligible);
    }

    #[test]
    fn test_progress_clamps_and_handles_zero_total() {
        let mut data = QuestionnaireData::new();
        assert_eq!(progress(&data), 0.0);

        data.total_questions = 10;
        data.total_questions_answered = 4;
        assert!((progress(&data) - 40.0).abs() < f32::EPSILON);

        // Over-answered data stays capped at 100.
        data.total_questions_answered = 15;
        assert_eq!(progress(&data), 100.0);
    }
}
