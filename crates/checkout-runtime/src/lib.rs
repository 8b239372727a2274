//! # checkout-runtime
//!
//! Backend integrations for the storefront checkout.
//!
//! ## Clients
//!
//! - **Merchant**: profile and tokenization key
//! - **Orders**: coupon validation and order submission
//! - **Intake**: questionnaire definitions
//! - **Collect**: card vendor bridge implementing `CardCaptureGateway`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_runtime::merchant::MerchantApi;
//! use checkout_runtime::collect::HostedFieldsGateway;
//!
//! let merchant = MerchantApi::from_env()?;
//! let key = merchant.tokenization_key().await?;
//! let gateway = Arc::new(HostedFieldsGateway::from_env()?);
//! let controller = TokenizationController::new(gateway, key);
//! ```

pub mod collect;
pub mod intake;
pub mod merchant;
pub mod orders;

mod http;

pub use collect::{CollectConfig, HostedFieldsGateway};
pub use http::ApiConfig;
pub use intake::IntakeApi;
pub use merchant::{MerchantApi, MerchantProfile};
pub use orders::{OrderConfirmation, OrdersApi};

// Re-export core types for convenience
pub use checkout_core::{CheckoutError, CheckoutFlow, Result, SessionId};
