//! Error Types

use thiserror::Error;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout error types
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// One or more form fields failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Coupon rejected by the merchant backend
    #[error("Coupon invalid: {0}")]
    CouponInvalid(String),

    /// Order submission rejected by the merchant backend
    #[error("Submission error: {0}")]
    Submission(String),

    /// Submission attempted while a gate is still closed
    #[error("Submission blocked: {0}")]
    SubmissionBlocked(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// Session not found in the store
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Network error talking to the merchant backend
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl CheckoutError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::Network(_) | CheckoutError::Submission(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Validation(msg) => format!("Please correct the highlighted fields: {}", msg),
            CheckoutError::CouponInvalid(_) => "That coupon code is not valid for your order.".into(),
            CheckoutError::Submission(_) => "We couldn't place your order. Please try again.".into(),
            CheckoutError::SubmissionBlocked(msg) => msg.clone(),
            CheckoutError::SessionNotFound(_) => "Your checkout session has expired. Please start again.".into(),
            CheckoutError::Network(_) => "We're having trouble reaching the store. Please try again.".into(),
            CheckoutError::Config(_) => "Checkout is temporarily unavailable.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for CheckoutError {
    fn from(err: anyhow::Error) -> Self {
        CheckoutError::Other(err.to_string())
    }
}
