//! Merchant Profile API
//!
//! Fetches the storefront's merchant profile, which carries the public
//! tokenization key the card vendor is initialized with.

use checkout_core::Result;
use checkout_payments::TokenizationKey;
use serde::{Deserialize, Serialize};

use crate::http::{read_json, with_retry, ApiConfig, RETRY_ATTEMPTS, RETRY_DELAY};

/// Merchant profile returned by the backend
///
/// Only the fields the checkout consumes; the backend sends more.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantProfile {
    /// Public key for the card-capture vendor
    pub nmi_merchant_api_key: String,

    /// Storefront branding blob, passed through to the frontend untouched
    #[serde(default)]
    pub customize_branding: Option<serde_json::Value>,
}

/// Client for the merchant API
pub struct MerchantApi {
    client: reqwest::Client,
    config: ApiConfig,
}

impl MerchantApi {
    pub fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self {
            client: config.client()?,
            config,
        })
    }

    /// Create from `MERCHANT_API_URL`
    pub fn from_env() -> Result<Self> {
        Self::new(ApiConfig::from_env("MERCHANT_API_URL"))
    }

    /// Fetch the merchant profile
    pub async fn profile(&self) -> Result<MerchantProfile> {
        with_retry("merchant profile", RETRY_ATTEMPTS, RETRY_DELAY, || {
            let client = self.client.clone();
            let url = format!("{}/merchant/profile", self.config.base_url);
            async move {
                let resp = client.get(&url).send().await.map_err(|e| {
                    checkout_core::CheckoutError::Network(e.to_string())
                })?;
                read_json("merchant profile", resp).await
            }
        })
        .await
    }

    /// Fetch just the tokenization key
    pub async fn tokenization_key(&self) -> Result<TokenizationKey> {
        let profile = self.profile().await?;
        Ok(TokenizationKey::new(profile.nmi_merchant_api_key))
    }
}
