use uuid::Uuid;

use super::value_objects::{OrderItem, PaymentMethod, ShippingAddress};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// Input for creating a checkout order or a quote
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub discount_cents: i64,
}

#[derive(Debug, Clone)]
pub enum OrderCommand {
    /// Payment simulation succeeded
    ConfirmPayment { payment_method: PaymentMethod },
    /// Admin moved the order into picking
    StartPicking,
    /// Admin handed the parcel to the carrier
    Ship {
        tracking_code: Option<String>,
        tracking_url: Option<String>,
    },
    /// Carrier webhook or admin reports delivery
    MarkDelivered,
    /// Customer confirms receipt of an already delivered order
    ConfirmReceipt,
    /// Authoritative external cancellation
    Cancel { reason: Option<String> },
    /// Authoritative external refund
    Refund { reason: Option<String> },
}

impl OrderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::ConfirmPayment { .. } => "confirm_payment",
            OrderCommand::StartPicking => "start_picking",
            OrderCommand::Ship { .. } => "ship",
            OrderCommand::MarkDelivered => "mark_delivered",
            OrderCommand::ConfirmReceipt => "confirm_receipt",
            OrderCommand::Cancel { .. } => "cancel",
            OrderCommand::Refund { .. } => "refund",
        }
    }
}
