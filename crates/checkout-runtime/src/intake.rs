//! Intake API
//!
//! Fetches the questionnaire definitions the eligibility flow presents:
//! the general health screening plus per-product question sets.

use checkout_core::questionnaire::QuestionDefinition;
use checkout_core::{CheckoutError, ProductId, Result};

use crate::http::{read_json, with_retry, ApiConfig, RETRY_ATTEMPTS, RETRY_DELAY};

/// Client for the intake API
pub struct IntakeApi {
    client: reqwest::Client,
    config: ApiConfig,
}

impl IntakeApi {
    pub fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self {
            client: config.client()?,
            config,
        })
    }

    /// Create from `INTAKE_API_URL`
    pub fn from_env() -> Result<Self> {
        Self::new(ApiConfig::from_env("INTAKE_API_URL"))
    }

    /// Fetch the questions for a set of products
    ///
    /// General screening questions come back with no product ID attached.
    pub async fn questions(&self, product_ids: &[ProductId]) -> Result<Vec<QuestionDefinition>> {
        let products = product_ids
            .iter()
            .map(ProductId::as_str)
            .collect::<Vec<_>>()
            .join(",");

        with_retry("intake questions", RETRY_ATTEMPTS, RETRY_DELAY, || {
            let client = self.client.clone();
            let url = format!("{}/intake/questions", self.config.base_url);
            let products = products.clone();
            async move {
                let resp = client
                    .get(&url)
                    .query(&[("products", products.as_str())])
                    .send()
                    .await
                    .map_err(|e| CheckoutError::Network(e.to_string()))?;
                read_json("intake questions", resp).await
            }
        })
        .await
    }
}
