//! Application State

use std::collections::HashMap;
use std::sync::Arc;

use checkout_core::{MemorySessionStore, SessionId};
use checkout_payments::{CardCaptureGateway, TokenizationController, TokenizationKey};
use checkout_runtime::{IntakeApi, MerchantApi, OrdersApi};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

/// Server settings
#[derive(Clone, Debug)]
pub struct Settings {
    /// Consultation fee added to every order
    pub consultation_fee: Decimal,
}

/// One session's tokenization controller behind its own lock
pub type SharedController = Arc<Mutex<TokenizationController>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout session persistence
    pub sessions: Arc<MemorySessionStore>,

    /// Card-capture vendor (real bridge or mock)
    pub gateway: Arc<dyn CardCaptureGateway>,

    /// Tokenization key the vendor is initialized with
    pub tokenization_key: TokenizationKey,

    /// One tokenization controller per session, created on demand.
    /// The map lock is never held across a vendor call; only the
    /// per-session lock is.
    pub controllers: Arc<Mutex<HashMap<SessionId, SharedController>>>,

    /// Orders backend (None if not configured)
    pub orders: Option<Arc<OrdersApi>>,

    /// Merchant backend (None if not configured)
    pub merchant: Option<Arc<MerchantApi>>,

    /// Intake backend (None if not configured)
    pub intake: Option<Arc<IntakeApi>>,

    pub settings: Settings,
}

impl AppState {
    /// Fetch the session's controller, creating it on first use
    pub async fn controller(&self, id: &SessionId) -> SharedController {
        self.controllers
            .lock()
            .await
            .entry(id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(TokenizationController::new(
                    self.gateway.clone(),
                    self.tokenization_key.clone(),
                )))
            })
            .clone()
    }

    /// Look up the session's controller without creating one
    pub async fn existing_controller(&self, id: &SessionId) -> Option<SharedController> {
        self.controllers.lock().await.get(id).cloned()
    }

    /// Drop the session's controller, tearing down its vendor state
    pub async fn discard_controller(&self, id: &SessionId) {
        let controller = self.controllers.lock().await.remove(id);
        if let Some(controller) = controller {
            controller.lock().await.teardown();
        }
    }
}
