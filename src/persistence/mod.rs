// ============================================================================
// Persistence Collaborators
// ============================================================================
//
// The order's status only changes through `update_if_status`, a conditional
// write predicated on the status the caller read. Two admins acting on the
// same order, or a lazy expiry racing a payment confirmation, cannot both
// succeed: the loser sees `false` and re-reads.
//
// ============================================================================

mod memory;
mod postgres;

pub use memory::{InMemoryOrderRepository, InMemoryTokenStore};
pub use postgres::{PostgresCatalog, PostgresStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{Order, OrderStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Duplicate order: {0}")]
    Duplicate(Uuid),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Overwrite the stored order only if its status is still `expected`.
    /// Returns whether the write happened.
    async fn update_if_status(&self, order: &Order, expected: OrderStatus) -> Result<bool, StoreError>;

    /// PENDING orders created before `created_before`, oldest first
    async fn find_overdue_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError>;
}

/// Carrier API credentials as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CarrierToken {
    /// Whether the token expires within `margin` of `now`. Tokens without an
    /// expiry never need refreshing.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at.map(|at| at - margin <= now).unwrap_or(false)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Single-row store for the carrier token. `save` is an upsert keyed by a
/// fixed id, so concurrent refreshes overwrite rather than duplicate.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<CarrierToken>, StoreError>;

    async fn save(&self, token: &CarrierToken) -> Result<(), StoreError>;
}
