//! Card Capture Gateway
//!
//! Vendor abstraction over the hosted-fields tokenization service. The
//! vendor owns the card inputs end to end; this side only installs its
//! script, points it at mount targets and consumes its event stream.
//! Raw card data never crosses this boundary.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

/// Public tokenization key identifying the merchant to the vendor
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizationKey(String);

impl TokenizationKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keys are public but still only belong in logs truncated.
impl std::fmt::Debug for TokenizationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.0.chars().take(4).collect();
        write!(f, "TokenizationKey({}...)", prefix)
    }
}

/// A single-use card token issued by the vendor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardToken {
    /// Opaque token value, consumed by the orders backend
    pub value: String,

    /// Card brand, when the vendor reports it
    pub card_brand: Option<String>,

    /// Last four digits, when the vendor reports it
    pub last_four: Option<String>,

    /// When the token was issued
    pub issued_at: DateTime<Utc>,
}

/// The three hosted card fields
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentField {
    #[serde(rename = "ccnumber")]
    CardNumber,
    #[serde(rename = "ccexp")]
    Expiry,
    #[serde(rename = "cvv")]
    Cvv,
}

impl PaymentField {
    pub const ALL: [PaymentField; 3] = [
        PaymentField::CardNumber,
        PaymentField::Expiry,
        PaymentField::Cvv,
    ];

    /// Vendor wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentField::CardNumber => "ccnumber",
            PaymentField::Expiry => "ccexp",
            PaymentField::Cvv => "cvv",
        }
    }

    /// Label used in customer-facing messages
    pub fn label(&self) -> &'static str {
        match self {
            PaymentField::CardNumber => "Card number",
            PaymentField::Expiry => "Expiration date",
            PaymentField::Cvv => "Security code",
        }
    }
}

impl std::fmt::Display for PaymentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mount target for one hosted field
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTarget {
    /// CSS selector of the mount element
    pub selector: String,

    /// Placeholder text shown inside the field
    pub placeholder: Option<String>,
}

impl FieldTarget {
    pub fn new(selector: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            placeholder: Some(placeholder.into()),
        }
    }
}

/// Hosted field configuration passed to the vendor
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSetup {
    pub targets: HashMap<PaymentField, FieldTarget>,

    /// CSS applied inside the hosted iframes
    pub field_css: Option<String>,
}

impl Default for FieldSetup {
    fn default() -> Self {
        let mut targets = HashMap::new();
        targets.insert(
            PaymentField::CardNumber,
            FieldTarget::new("#ccnumber", "0000 0000 0000 0000"),
        );
        targets.insert(PaymentField::Expiry, FieldTarget::new("#ccexp", "MM / YY"));
        targets.insert(PaymentField::Cvv, FieldTarget::new("#cvv", "CVV"));
        Self {
            targets,
            field_css: None,
        }
    }
}

/// Events emitted by the vendor after field configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// All hosted fields are mounted and interactive
    FieldsAvailable,

    /// A field's validity changed as the customer typed
    FieldValidity {
        field: PaymentField,
        valid: bool,
        message: Option<String>,
    },

    /// Outcome of a token request; a missing token means a decline
    PaymentResponse {
        token: Option<CardToken>,
        error: Option<String>,
    },
}

/// Handle to an installed vendor script
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScriptHandle(u64);

impl ScriptHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// The card-capture vendor surface
///
/// Implementations bridge to the real vendor runtime or, in tests, to
/// [`crate::mock::MockGateway`].
#[async_trait]
pub trait CardCaptureGateway: Send + Sync {
    /// Install the vendor script. Returns immediately; loading finishes
    /// in the background.
    fn inject_script(&self, key: &TokenizationKey) -> ScriptHandle;

    /// Wait for an injected script to finish loading
    async fn script_loaded(&self, handle: ScriptHandle) -> Result<()>;

    /// Whether a vendor script is currently installed
    fn script_present(&self) -> bool;

    /// Remove an installed script and everything it registered
    fn remove_script(&self, handle: ScriptHandle);

    /// Configure the hosted fields, returning the vendor event stream
    async fn configure(&self, setup: &FieldSetup) -> Result<mpsc::Receiver<GatewayEvent>>;

    /// Ask the vendor to tokenize the entered card
    ///
    /// The outcome arrives later as a [`GatewayEvent::PaymentResponse`].
    async fn request_payment_token(&self) -> Result<()>;

    /// Gateway name for logs
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenization_key_debug_is_truncated() {
        let key = TokenizationKey::new("pk_live_supersecret");
        let debug = format!("{:?}", key);
        assert!(debug.contains("pk_l"));
        assert!(!debug.contains("supersecret"));
    }

    #[test]
    fn test_payment_field_wire_names() {
        assert_eq!(PaymentField::CardNumber.as_str(), "ccnumber");
        assert_eq!(
            serde_json::to_string(&PaymentField::Expiry).unwrap(),
            "\"ccexp\""
        );
    }

    #[test]
    fn test_gateway_event_wire_format() {
        let event = GatewayEvent::FieldValidity {
            field: PaymentField::Cvv,
            valid: false,
            message: Some("Too short".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "field_validity");
        assert_eq!(json["field"], "cvv");
    }

    #[test]
    fn test_default_field_setup_covers_all_fields() {
        let setup = FieldSetup::default();
        for field in PaymentField::ALL {
            assert!(setup.targets.contains_key(&field));
        }
    }
}
