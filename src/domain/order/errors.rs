use uuid::Uuid;

use crate::persistence::StoreError;

use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Payment window expired; the order was cancelled")]
    PaymentWindowExpired,

    #[error("Order is {0} and can no longer change")]
    Closed(OrderStatus),

    #[error("Order changed concurrently: expected {expected}, found {actual}")]
    StaleState { expected: OrderStatus, actual: OrderStatus },

    #[error("Order items cannot be empty")]
    EmptyItems,

    #[error("Invalid item quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Order storage failed: {0}")]
    Storage(#[from] StoreError),
}

impl OrderError {
    /// HTTP status class the web layer should answer with
    pub fn http_status(&self) -> u16 {
        match self {
            OrderError::NotFound(_) => 404,
            OrderError::StaleState { .. } => 409,
            OrderError::PaymentWindowExpired => 410,
            OrderError::InvalidTransition { .. }
            | OrderError::Closed(_)
            | OrderError::EmptyItems
            | OrderError::InvalidQuantity(_) => 400,
            OrderError::Storage(_) => 500,
        }
    }

    /// Label used by the rejection counter
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::NotFound(_) => "not_found",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::PaymentWindowExpired => "payment_window_expired",
            OrderError::Closed(_) => "closed",
            OrderError::StaleState { .. } => "stale_state",
            OrderError::EmptyItems | OrderError::InvalidQuantity(_) => "invalid_items",
            OrderError::Storage(_) => "storage",
        }
    }
}
