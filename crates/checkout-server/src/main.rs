//! Checkout Server
//!
//! HTTP API for the storefront checkout: sessions, intake questionnaire,
//! eligibility, pricing, checkout form, card tokenization, and order
//! submission.

mod handlers;
mod state;

use std::collections::HashMap;
use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use checkout_core::MemorySessionStore;
use checkout_payments::{CardCaptureGateway, MockGateway, TokenizationKey};
use checkout_runtime::{HostedFieldsGateway, IntakeApi, MerchantApi, OrdersApi};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use state::{AppState, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Card-capture vendor bridge, mock when no session service is configured
    let gateway: Arc<dyn CardCaptureGateway> = match std::env::var("COLLECT_SESSION_URL") {
        Ok(url) => {
            tracing::info!("✓ Card vendor bridge configured: {}", url);
            Arc::new(HostedFieldsGateway::from_env()?)
        }
        Err(_) => {
            tracing::warn!("⚠ COLLECT_SESSION_URL not set, card capture is simulated");
            Arc::new(MockGateway::new())
        }
    };

    // Merchant backend, used for the storefront profile and tokenization key
    let merchant = match std::env::var("MERCHANT_API_URL") {
        Ok(url) => {
            tracing::info!("✓ Merchant backend: {}", url);
            Some(Arc::new(MerchantApi::from_env()?))
        }
        Err(_) => {
            tracing::warn!("⚠ MERCHANT_API_URL not set, merchant profile disabled");
            None
        }
    };

    // Orders backend, required for coupon validation and order submission
    let orders = match std::env::var("ORDERS_API_URL") {
        Ok(url) => {
            tracing::info!("✓ Orders backend: {}", url);
            Some(Arc::new(OrdersApi::from_env()?))
        }
        Err(_) => {
            tracing::warn!("⚠ ORDERS_API_URL not set, order submission disabled");
            None
        }
    };

    // Intake backend, serves the questionnaire definitions
    let intake = match std::env::var("INTAKE_API_URL") {
        Ok(url) => {
            tracing::info!("✓ Intake backend: {}", url);
            Some(Arc::new(IntakeApi::from_env()?))
        }
        Err(_) => {
            tracing::warn!("⚠ INTAKE_API_URL not set, question catalog disabled");
            None
        }
    };

    let tokenization_key = resolve_tokenization_key(merchant.as_deref()).await;

    let consultation_fee = std::env::var("CONSULTATION_FEE")
        .ok()
        .and_then(|fee| fee.parse::<Decimal>().ok())
        .unwrap_or_else(|| Decimal::new(2500, 2));
    tracing::info!("✓ Consultation fee: {}", consultation_fee);

    let app_state = AppState {
        sessions: Arc::new(MemorySessionStore::new()),
        gateway,
        tokenization_key,
        controllers: Arc::new(Mutex::new(HashMap::new())),
        orders,
        merchant,
        intake,
        settings: Settings { consultation_fee },
    };

    // Configure CORS for the storefront frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        // Health & catalog
        .route("/health", get(handlers::health_check))
        .route("/api/merchant", get(handlers::get_merchant))
        .route("/api/questions", get(handlers::list_questions))
        // Sessions
        .route("/api/checkout/sessions", post(handlers::create_session))
        .route(
            "/api/checkout/sessions/{id}",
            get(handlers::get_session).delete(handlers::abandon_session),
        )
        // Questionnaire & eligibility
        .route(
            "/api/checkout/sessions/{id}/questionnaire",
            put(handlers::update_questionnaire),
        )
        .route(
            "/api/checkout/sessions/{id}/questionnaire/general",
            post(handlers::record_general_eligibility),
        )
        .route(
            "/api/checkout/sessions/{id}/questionnaire/responses",
            post(handlers::record_responses),
        )
        .route(
            "/api/checkout/sessions/{id}/questionnaire/verdict",
            post(handlers::record_verdict),
        )
        .route(
            "/api/checkout/sessions/{id}/questionnaire/complete",
            post(handlers::complete_questionnaire),
        )
        .route(
            "/api/checkout/sessions/{id}/questionnaire/reset",
            post(handlers::reset_questionnaire),
        )
        .route(
            "/api/checkout/sessions/{id}/eligibility",
            get(handlers::get_eligibility),
        )
        // Order composition
        .route(
            "/api/checkout/sessions/{id}/products",
            post(handlers::select_product),
        )
        .route(
            "/api/checkout/sessions/{id}/products/{product_id}",
            delete(handlers::remove_product),
        )
        .route(
            "/api/checkout/sessions/{id}/coupon",
            post(handlers::apply_coupon).delete(handlers::remove_coupon),
        )
        .route(
            "/api/checkout/sessions/{id}/quote",
            get(handlers::get_quote),
        )
        // Checkout form & terms
        .route(
            "/api/checkout/sessions/{id}/fields",
            post(handlers::update_field),
        )
        .route(
            "/api/checkout/sessions/{id}/terms",
            post(handlers::accept_terms),
        )
        // Payment tokenization
        .route(
            "/api/checkout/sessions/{id}/payment/initialize",
            post(handlers::initialize_payment),
        )
        .route(
            "/api/checkout/sessions/{id}/payment",
            get(handlers::get_payment_status),
        )
        .route(
            "/api/checkout/sessions/{id}/payment/tokenize",
            post(handlers::tokenize_card),
        )
        // Submission
        .route(
            "/api/checkout/sessions/{id}/submit",
            post(handlers::submit_order),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    tracing::info!("═══════════════════════════════════════════════════════════");
    tracing::info!("  Checkout Server");
    tracing::info!("  Listening on: {}", bind_addr);
    tracing::info!("  Endpoints:");
    tracing::info!("    GET    /health");
    tracing::info!("    GET    /api/merchant");
    tracing::info!("    GET    /api/questions");
    tracing::info!("    POST   /api/checkout/sessions");
    tracing::info!("    GET    /api/checkout/sessions/{{id}}");
    tracing::info!("    DELETE /api/checkout/sessions/{{id}}");
    tracing::info!("    PUT    /api/checkout/sessions/{{id}}/questionnaire");
    tracing::info!("    POST   /api/checkout/sessions/{{id}}/questionnaire/general");
    tracing::info!("    POST   /api/checkout/sessions/{{id}}/questionnaire/responses");
    tracing::info!("    POST   /api/checkout/sessions/{{id}}/questionnaire/verdict");
    tracing::info!("    POST   /api/checkout/sessions/{{id}}/questionnaire/complete");
    tracing::info!("    POST   /api/checkout/sessions/{{id}}/questionnaire/reset");
    tracing::info!("    GET    /api/checkout/sessions/{{id}}/eligibility");
    tracing::info!("    POST   /api/checkout/sessions/{{id}}/products");
    tracing::info!("    DELETE /api/checkout/sessions/{{id}}/products/{{product_id}}");
    tracing::info!("    POST   /api/checkout/sessions/{{id}}/coupon");
    tracing::info!("    DELETE /api/checkout/sessions/{{id}}/coupon");
    tracing::info!("    GET    /api/checkout/sessions/{{id}}/quote");
    tracing::info!("    POST   /api/checkout/sessions/{{id}}/fields");
    tracing::info!("    POST   /api/checkout/sessions/{{id}}/terms");
    tracing::info!("    POST   /api/checkout/sessions/{{id}}/payment/initialize");
    tracing::info!("    GET    /api/checkout/sessions/{{id}}/payment");
    tracing::info!("    POST   /api/checkout/sessions/{{id}}/payment/tokenize");
    tracing::info!("    POST   /api/checkout/sessions/{{id}}/submit");
    tracing::info!("═══════════════════════════════════════════════════════════");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Prefer the key from the merchant profile, fall back to the environment.
async fn resolve_tokenization_key(merchant: Option<&MerchantApi>) -> TokenizationKey {
    if let Some(api) = merchant {
        match api.tokenization_key().await {
            Ok(key) => {
                tracing::info!("✓ Tokenization key fetched from merchant profile");
                return key;
            }
            Err(e) => {
                tracing::warn!("⚠ Could not fetch tokenization key: {}", e);
            }
        }
    }
    let key = std::env::var("PAYMENT_TOKENIZATION_KEY")
        .unwrap_or_else(|_| "pk_test_mock".to_string());
    TokenizationKey::new(key)
}
