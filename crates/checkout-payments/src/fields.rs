//! Payment Field Validation
//!
//! Tracks the per-field validity the vendor reports as the customer
//! types. Fields start invalid and stay invalid until the vendor says
//! otherwise, so an untouched form can never pass. Error messages are
//! recorded as they arrive but only become visible after the first
//! payment attempt.

use std::collections::HashMap;

use serde::Serialize;

use crate::gateway::PaymentField;

/// Validity of one hosted field
#[derive(Clone, Debug, Default, Serialize)]
pub struct FieldCheck {
    /// Last validity the vendor reported
    pub valid: bool,

    /// Last message the vendor reported
    pub message: Option<String>,
}

/// Validation state across all hosted fields
#[derive(Clone, Debug, Serialize)]
pub struct PaymentFieldValidation {
    checks: HashMap<PaymentField, FieldCheck>,
    show_errors: bool,
}

impl Default for PaymentFieldValidation {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentFieldValidation {
    pub fn new() -> Self {
        let checks = PaymentField::ALL
            .into_iter()
            .map(|field| (field, FieldCheck::default()))
            .collect();
        Self {
            checks,
            show_errors: false,
        }
    }

    /// Record a validity report from the vendor
    pub fn record(&mut self, field: PaymentField, valid: bool, message: Option<String>) {
        self.checks.insert(field, FieldCheck { valid, message });
    }

    /// Whether every field currently passes
    pub fn all_valid(&self) -> bool {
        PaymentField::ALL
            .into_iter()
            .all(|field| self.checks.get(&field).is_some_and(|c| c.valid))
    }

    /// Fields that currently fail
    pub fn invalid_fields(&self) -> Vec<PaymentField> {
        PaymentField::ALL
            .into_iter()
            .filter(|field| !self.checks.get(field).is_some_and(|c| c.valid))
            .collect()
    }

    /// Turn error display on (first payment attempt)
    pub fn show_errors(&mut self) {
        self.show_errors = true;
    }

    pub fn errors_shown(&self) -> bool {
        self.show_errors
    }

    /// Message to surface for a field, honoring the display gate
    pub fn visible_error(&self, field: PaymentField) -> Option<&str> {
        if !self.show_errors {
            return None;
        }
        let check = self.checks.get(&field)?;
        if check.valid {
            return None;
        }
        Some(check.message.as_deref().unwrap_or_else(|| field.label()))
    }

    /// Back to the initial state (fields invalid, errors hidden)
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_start_invalid() {
        let validation = PaymentFieldValidation::new();
        assert!(!validation.all_valid());
        assert_eq!(validation.invalid_fields().len(), 3);
    }

    #[test]
    fn test_all_valid_requires_every_field() {
        let mut validation = PaymentFieldValidation::new();
        validation.record(PaymentField::CardNumber, true, None);
        validation.record(PaymentField::Expiry, true, None);
        assert!(!validation.all_valid());

        validation.record(PaymentField::Cvv, true, None);
        assert!(validation.all_valid());
    }

    #[test]
    fn test_errors_hidden_until_attempt() {
        let mut validation = PaymentFieldValidation::new();
        validation.record(
            PaymentField::CardNumber,
            false,
            Some("Card number incomplete".into()),
        );
        assert_eq!(validation.visible_error(PaymentField::CardNumber), None);

        validation.show_errors();
        assert_eq!(
            validation.visible_error(PaymentField::CardNumber),
            Some("Card number incomplete")
        );
    }

    #[test]
    fn test_valid_field_shows_no_error() {
        let mut validation = PaymentFieldValidation::new();
        validation.show_errors();
        validation.record(PaymentField::Cvv, true, Some("stale".into()));
        assert_eq!(validation.visible_error(PaymentField::Cvv), None);
    }

    #[test]
    fn test_reset_hides_errors_again() {
        let mut validation = PaymentFieldValidation::new();
        validation.record(PaymentField::Cvv, true, None);
        validation.show_errors();

        validation.reset();
        assert!(!validation.errors_shown());
        assert!(!validation.all_valid());
    }
}
