//! # checkout-payments
//!
//! Card tokenization for the storefront checkout. The card-capture
//! vendor hosts the actual card inputs; this crate drives the vendor
//! lifecycle and holds the resulting single-use token.
//!
//! ## Flow
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                 TokenizationController                     │
//! │  inject script ─▶ configure fields ─▶ fields ready        │
//! │        │                 │                  │              │
//! │   retry w/ cleanup   event stream      generate_token      │
//! │                                             │              │
//! │                              decline ◀──────┴──▶ token     │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `CardCaptureGateway` trait enables swapping the real vendor
//! bridge for [`mock::MockGateway`] without changing controller logic.

pub mod gateway;
pub mod fields;
pub mod controller;
pub mod mock;
pub mod error;

pub use controller::{ControllerConfig, TokenizationController, TokenizationState};
pub use error::{PaymentError, Result};
pub use fields::PaymentFieldValidation;
pub use gateway::{
    CardCaptureGateway, CardToken, FieldSetup, GatewayEvent, PaymentField, ScriptHandle,
    TokenizationKey,
};
pub use mock::MockGateway;
