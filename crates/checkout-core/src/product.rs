//! Product Selections
//!
//! Catalog excerpts and purchase options as they appear in a checkout
//! session. Uses `rust_decimal` for all monetary values - never use f64
//! for money!

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Unique product identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The slice of the catalog a checkout session needs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier
    pub id: ProductId,

    /// Display name
    pub name: String,

    /// Short description shown in the order summary
    pub description: Option<String>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ProductId::new(id),
            name: name.into(),
            description: None,
        }
    }
}

/// A concrete dosage/duration/price combination the customer picked
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOption {
    /// Dosage strength label (e.g. "0.5mg")
    pub dosage_strength: String,

    /// Supply duration in months
    pub duration_months: u32,

    /// Price per month of supply
    pub price: Decimal,
}

impl PurchaseOption {
    pub fn new(dosage_strength: impl Into<String>, duration_months: u32, price: Decimal) -> Self {
        Self {
            dosage_strength: dosage_strength.into(),
            duration_months,
            price,
        }
    }
}

/// Whether a selection is the primary product or an add-on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    Main,
    Related,
}

/// A product the customer placed in the checkout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectedProduct {
    /// Main product or related add-on
    pub kind: SelectionKind,

    /// The product being purchased
    pub product: Product,

    /// The chosen dosage/duration/price option
    pub option: PurchaseOption,
}

impl SelectedProduct {
    pub fn new(kind: SelectionKind, product: Product, option: PurchaseOption) -> Self {
        Self {
            kind,
            product,
            option,
        }
    }

    /// Price multiplied by the months of supply
    pub fn line_total(&self) -> Decimal {
        self.option.price * Decimal::from(self.option.duration_months)
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product.id
    }
}
