use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::value_objects::{CancellationReason, OrderStatus, PaymentMethod};

// ============================================================================
// Order Events - facts produced by an accepted command
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    PaymentConfirmed(PaymentConfirmed),
    PickingStarted(PickingStarted),
    Shipped(OrderShipped),
    Delivered(OrderDelivered),
    ReceiptConfirmed(OrderDelivered),
    Cancelled(OrderCancelled),
    Refunded(OrderRefunded),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PaymentConfirmed {
    pub paid_at: DateTime<Utc>,
    pub payment_method: PaymentMethod,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PickingStarted {
    pub started_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderShipped {
    pub shipped_at: DateTime<Utc>,
    pub tracking_code: Option<String>,
    pub tracking_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderDelivered {
    pub delivered_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderCancelled {
    pub cancelled_at: DateTime<Utc>,
    pub reason: CancellationReason,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderRefunded {
    pub refunded_at: DateTime<Utc>,
    pub reason: Option<String>,
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::PaymentConfirmed(_) => "OrderPaymentConfirmed",
            OrderEvent::PickingStarted(_) => "OrderPickingStarted",
            OrderEvent::Shipped(_) => "OrderShipped",
            OrderEvent::Delivered(_) => "OrderDelivered",
            OrderEvent::ReceiptConfirmed(_) => "OrderReceiptConfirmed",
            OrderEvent::Cancelled(_) => "OrderCancelled",
            OrderEvent::Refunded(_) => "OrderRefunded",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::PaymentConfirmed(e) => e.paid_at,
            OrderEvent::PickingStarted(e) => e.started_at,
            OrderEvent::Shipped(e) => e.shipped_at,
            OrderEvent::Delivered(e) | OrderEvent::ReceiptConfirmed(e) => e.delivered_at,
            OrderEvent::Cancelled(e) => e.cancelled_at,
            OrderEvent::Refunded(e) => e.refunded_at,
        }
    }

    /// Status the order holds after this event
    pub fn resulting_status(&self) -> OrderStatus {
        match self {
            OrderEvent::PaymentConfirmed(_) => OrderStatus::Confirmed,
            OrderEvent::PickingStarted(_) => OrderStatus::Processing,
            OrderEvent::Shipped(_) => OrderStatus::Shipped,
            OrderEvent::Delivered(_) | OrderEvent::ReceiptConfirmed(_) => OrderStatus::Delivered,
            OrderEvent::Cancelled(_) => OrderStatus::Cancelled,
            OrderEvent::Refunded(_) => OrderStatus::Refunded,
        }
    }

    /// Extra fields sent along with the status-change notification
    pub fn notification_extra(&self) -> Value {
        match self {
            OrderEvent::PaymentConfirmed(e) => json!({
                "paidAt": e.paid_at,
                "paymentMethod": e.payment_method.as_str(),
            }),
            OrderEvent::PickingStarted(e) => json!({ "startedAt": e.started_at }),
            OrderEvent::Shipped(e) => json!({
                "shippedAt": e.shipped_at,
                "trackingCode": e.tracking_code,
                "trackingUrl": e.tracking_url,
            }),
            OrderEvent::Delivered(e) => json!({ "deliveredAt": e.delivered_at }),
            OrderEvent::ReceiptConfirmed(e) => json!({
                "deliveredAt": e.delivered_at,
                "confirmedByCustomer": true,
            }),
            OrderEvent::Cancelled(e) => json!({
                "cancelledAt": e.cancelled_at,
                "reason": e.reason,
            }),
            OrderEvent::Refunded(e) => json!({
                "refundedAt": e.refunded_at,
                "reason": e.reason,
            }),
        }
    }
}
