//! Session Management
//!
//! Manages checkout sessions: who is buying, their questionnaire record,
//! product selections, coupon and form state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::form::CheckoutForm;
use crate::pricing::Coupon;
use crate::product::{ProductId, SelectedProduct};
use crate::questionnaire::QuestionnaireData;

/// Unique checkout session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is checking out
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContext {
    /// Guest checkout (no account yet)
    pub guest: bool,

    /// Account ID for signed-in customers
    pub customer_id: Option<String>,
}

impl CustomerContext {
    pub fn guest() -> Self {
        Self {
            guest: true,
            customer_id: None,
        }
    }

    pub fn signed_in(customer_id: impl Into<String>) -> Self {
        Self {
            guest: false,
            customer_id: Some(customer_id.into()),
        }
    }
}

/// A complete checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Unique identifier
    pub id: SessionId,

    /// Customer context
    pub customer: CustomerContext,

    /// Eligibility questionnaire record
    pub questionnaire: QuestionnaireData,

    /// Selected products (main and related)
    pub selections: Vec<SelectedProduct>,

    /// Applied coupon, if any
    pub coupon: Option<Coupon>,

    /// Customer details form
    pub form: CheckoutForm,

    /// Terms of service accepted
    pub terms_accepted: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// Create a new session for a customer
    pub fn new(customer: CustomerContext) -> Self {
        let now = Utc::now();
        let form = CheckoutForm::new(customer.guest);
        Self {
            id: SessionId::new(),
            customer,
            questionnaire: QuestionnaireData::default(),
            selections: Vec::new(),
            coupon: None,
            form,
            terms_accepted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create with specific ID
    pub fn with_id(id: SessionId, customer: CustomerContext) -> Self {
        let mut session = Self::new(customer);
        session.id = id;
        session
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether a product is currently selected
    pub fn has_selection(&self, product_id: &ProductId) -> bool {
        self.selections.iter().any(|s| s.product_id() == product_id)
    }

    /// IDs of all selected products
    pub fn selection_ids(&self) -> Vec<ProductId> {
        self.selections
            .iter()
            .map(|s| s.product_id().clone())
            .collect()
    }

    /// Duration since creation
    pub fn duration(&self) -> chrono::Duration {
        self.updated_at - self.created_at
    }
}

/// Session store trait for persistence
pub trait SessionStore: Send + Sync {
    /// Save a session
    fn save(&self, session: &CheckoutSession) -> crate::Result<()>;

    /// Load a session by ID
    fn load(&self, id: &SessionId) -> crate::Result<Option<CheckoutSession>>;

    /// Delete a session
    fn delete(&self, id: &SessionId) -> crate::Result<()>;

    /// List sessions for a customer
    fn list(&self, customer_id: Option<&str>, limit: usize) -> crate::Result<Vec<CheckoutSession>>;
}

/// In-memory session store (for development/testing)
pub struct MemorySessionStore {
    sessions: std::sync::RwLock<std::collections::HashMap<SessionId, CheckoutSession>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &CheckoutSession) -> crate::Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> crate::Result<Option<CheckoutSession>> {
        let sessions = self.sessions.read().unwrap();
        Ok(sessions.get(id).cloned())
    }

    fn delete(&self, id: &SessionId) -> crate::Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        sessions.remove(id);
        Ok(())
    }

    fn list(&self, customer_id: Option<&str>, limit: usize) -> crate::Result<Vec<CheckoutSession>> {
        let sessions = self.sessions.read().unwrap();
        let mut result: Vec<_> = sessions
            .values()
            .filter(|s| {
                customer_id.map_or(true, |cid| s.customer.customer_id.as_deref() == Some(cid))
            })
            .cloned()
            .collect();

        // Sort by updated_at descending
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result.truncate(limit);

        Ok(result)
    }
}
