//! Payment Error Types

use std::time::Duration;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Vendor script failed to load
    #[error("Script load failed: {0}")]
    ScriptLoad(String),

    /// Tokenization misconfigured
    #[error("Configuration error: {0}")]
    Config(String),

    /// Gateway transport or protocol error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Vendor accepted a token request but never answered
    #[error("No token response within {0:?}")]
    ResponseTimeout(Duration),

    /// Card declined by the processor
    #[error("Card declined: {0}")]
    Declined(String),

    /// Hosted payment fields are not valid
    #[error("Payment fields invalid")]
    FieldsInvalid,

    /// Controller is not in a state that allows this operation
    #[error("Not ready: {0}")]
    NotReady(String),

    /// A token request is already running
    #[error("Token request already in flight")]
    RequestInFlight,
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::ScriptLoad(_)
                | PaymentError::Gateway(_)
                | PaymentError::ResponseTimeout(_)
        )
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::ScriptLoad(_) => {
                "The payment form could not be loaded. Please refresh and try again."
            }
            PaymentError::Gateway(_) => "Payment processing failed. Please try again.",
            PaymentError::ResponseTimeout(_) => {
                "The payment service is not responding. Please try again."
            }
            PaymentError::Declined(_) => "Your card was declined. Please check your details.",
            PaymentError::FieldsInvalid => "Please check your card details.",
            PaymentError::RequestInFlight => "A payment is already being processed.",
            _ => "An error occurred processing your payment.",
        }
    }
}
