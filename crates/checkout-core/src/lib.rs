//! # checkout-core
//!
//! Core checkout domain for the storefront: questionnaire eligibility,
//! order pricing, form validation and final order assembly.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       CheckoutFlow                           │
//! │  ┌──────────────┐  ┌────────────┐  ┌──────────────────────┐  │
//! │  │ Questionnaire│  │  Pricing   │  │    CheckoutForm      │  │
//! │  │ + Eligibility│──│ (Decimal)  │──│  (dirty tracking)    │  │
//! │  └──────────────┘  └────────────┘  └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Eligibility is fail-closed: a product with no recorded verdict is not
//! purchasable, and an order can only be composed once every submission
//! gate has passed.

pub mod product;
pub mod questionnaire;
pub mod eligibility;
pub mod pricing;
pub mod form;
pub mod orchestrator;
pub mod session;
pub mod error;

pub use error::{CheckoutError, Result};
pub use eligibility::EligibilityStatus;
pub use form::{CheckoutField, CheckoutForm, CheckoutPayload};
pub use orchestrator::{CheckoutFlow, OrderSubmission};
pub use pricing::{Coupon, Discount, OrderQuote};
pub use product::{Product, ProductId, SelectedProduct, SelectionKind};
pub use questionnaire::{
    ProductEligibility, QuestionDefinition, QuestionnaireData, QuestionnaireResponse,
    QuestionnaireUpdate,
};
pub use session::{CheckoutSession, CustomerContext, MemorySessionStore, SessionId, SessionStore};
