//! Orders API
//!
//! Coupon validation and order submission against the orders backend.
//! Guests are routed through the signup-and-order endpoint; signed-in
//! customers submit to the plain orders endpoint. Submissions are never
//! retried here.

use chrono::{DateTime, Utc};
use checkout_core::orchestrator::OrderSubmission;
use checkout_core::pricing::Discount;
use checkout_core::{CheckoutError, Coupon, ProductId, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::http::{read_json, ApiConfig};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateCouponRequest<'a> {
    coupon_code: &'a str,
    product_ids: &'a [ProductId],
}

/// Coupon terms as the backend returns them
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CouponOffer {
    code: String,
    discount: Discount,
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

/// Acknowledgement of a submitted order
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub order_id: String,

    /// Backend order status ("received", "processing", ...)
    pub status: String,

    /// Amount the backend will charge
    pub total: Decimal,

    pub created_at: DateTime<Utc>,
}

/// Client for the orders API
pub struct OrdersApi {
    client: reqwest::Client,
    config: ApiConfig,
}

impl OrdersApi {
    pub fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self {
            client: config.client()?,
            config,
        })
    }

    /// Create from `ORDERS_API_URL`
    pub fn from_env() -> Result<Self> {
        Self::new(ApiConfig::from_env("ORDERS_API_URL"))
    }

    /// Check a coupon code against the current selection
    ///
    /// A rejected code comes back as [`CheckoutError::CouponInvalid`]
    /// with the backend's reason.
    pub async fn validate_coupon(&self, code: &str, product_ids: &[ProductId]) -> Result<Coupon> {
        let url = format!("{}/checkout/validate-coupon", self.config.base_url);
        let body = ValidateCouponRequest {
            coupon_code: code,
            product_ids,
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CheckoutError::Network(e.to_string()))?;

        if resp.status().is_client_error() {
            let reason = resp
                .json::<ApiError>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| "Coupon was rejected".to_string());
            return Err(CheckoutError::CouponInvalid(reason));
        }

        let offer: CouponOffer = read_json("coupon validation", resp).await?;
        Ok(Coupon::new(offer.code, offer.discount))
    }

    /// Submit a composed order
    pub async fn submit(&self, submission: &OrderSubmission) -> Result<OrderConfirmation> {
        // Guests sign up and order in one call.
        let path = if submission.customer.guest {
            "/checkout"
        } else {
            "/orders"
        };
        let url = format!("{}{}", self.config.base_url, path);

        tracing::info!(
            session = %submission.session_id,
            endpoint = path,
            total = %submission.totals.total,
            "Submitting order"
        );

        let resp = self
            .client
            .post(&url)
            .json(submission)
            .send()
            .await
            .map_err(|e| CheckoutError::Submission(e.to_string()))?;

        if resp.status().is_client_error() {
            let reason = resp
                .json::<ApiError>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| "Order was rejected".to_string());
            return Err(CheckoutError::Submission(reason));
        }

        let confirmation: OrderConfirmation = read_json("order submission", resp).await?;
        tracing::info!(
            order = %confirmation.order_id,
            status = %confirmation.status,
            "Order accepted"
        );
        Ok(confirmation)
    }
}
