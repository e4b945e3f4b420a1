use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commands::{NewOrder, OrderCommand};
use super::errors::OrderError;
use super::events::*;
use super::value_objects::{CancellationReason, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};

// ============================================================================
// Order - status state machine
// ============================================================================
//
//   (new) -> QUOTE
//   (new) -> PENDING -> CONFIRMED -> PROCESSING -> SHIPPED -> DELIVERED
//                                 \_______________/
//   PENDING -> CANCELLED                       (payment window elapsed)
//   DELIVERED -> DELIVERED                     (customer confirms receipt)
//   any non-terminal -> CANCELLED | REFUNDED   (external, authoritative)
//
// `handle_command` only decides; `apply_event` only mutates. Callers run
// `expire_if_due` before handling a command so an elapsed payment window is
// observed first.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub order_number: String,

    pub status: OrderStatus,
    pub customer_id: Option<Uuid>,
    pub items: Vec<OrderItem>,

    // Amounts in cents
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,

    pub payment_method: Option<PaymentMethod>,
    pub shipping_address: ShippingAddress,
    pub tracking_code: Option<String>,
    pub tracking_url: Option<String>,
    pub cancellation: Option<CancellationReason>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn order_number(prefix: &str, id: Uuid, now: DateTime<Utc>) -> String {
    let suffix: String = id.simple().to_string().chars().take(8).collect();
    format!("{}-{}-{}", prefix, now.format("%Y%m%d"), suffix.to_uppercase())
}

/// The two statuses an order can be born in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAs {
    Quote,
    Pending,
}

impl OpenAs {
    pub fn status(self) -> OrderStatus {
        match self {
            OpenAs::Quote => OrderStatus::Quote,
            OpenAs::Pending => OrderStatus::Pending,
        }
    }

    fn number_prefix(self) -> &'static str {
        match self {
            OpenAs::Quote => "QT",
            OpenAs::Pending => "ORD",
        }
    }
}

impl Order {
    pub fn open(new: NewOrder, kind: OpenAs, now: DateTime<Utc>) -> Result<Self, OrderError> {
        Self::validate_items(&new.items)?;

        let id = Uuid::new_v4();
        let subtotal_cents: i64 = new.items.iter().map(OrderItem::line_total_cents).sum();
        let shipping_cents = new.shipping_address.shipping_option.price_cents();
        let discount_cents = new.discount_cents.max(0);

        Ok(Self {
            id,
            order_number: order_number(kind.number_prefix(), id, now),
            status: kind.status(),
            customer_id: new.customer_id,
            items: new.items,
            subtotal_cents,
            shipping_cents,
            discount_cents,
            total_cents: (subtotal_cents + shipping_cents - discount_cents).max(0),
            payment_method: None,
            shipping_address: new.shipping_address,
            tracking_code: None,
            tracking_url: None,
            cancellation: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
        })
    }

    fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        for item in items {
            if item.quantity <= 0 {
                return Err(OrderError::InvalidQuantity(item.quantity));
            }
        }

        Ok(())
    }

    pub fn payment_deadline(&self, window: Duration) -> DateTime<Utc> {
        self.created_at + window
    }

    /// True while PENDING once more than `window` has passed since creation
    pub fn is_payment_overdue(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.status == OrderStatus::Pending && now > self.payment_deadline(window)
    }

    /// The cancellation an elapsed payment window calls for, if any
    pub fn expire_if_due(&self, now: DateTime<Utc>, window: Duration) -> Option<OrderEvent> {
        self.is_payment_overdue(now, window).then(|| {
            OrderEvent::Cancelled(OrderCancelled {
                cancelled_at: now,
                reason: CancellationReason::PaymentExpired,
            })
        })
    }

    fn require(&self, allowed: &[OrderStatus], to: OrderStatus) -> Result<(), OrderError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition { from: self.status, to })
        }
    }

    /// Validate a command against the current status and emit its events.
    pub fn handle_command(&self, command: &OrderCommand, now: DateTime<Utc>) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status.is_terminal() {
            let expired = self.cancellation == Some(CancellationReason::PaymentExpired);
            return match command {
                OrderCommand::ConfirmPayment { .. } if expired => Err(OrderError::PaymentWindowExpired),
                _ => Err(OrderError::Closed(self.status)),
            };
        }

        let event = match command {
            OrderCommand::ConfirmPayment { payment_method } => {
                self.require(&[OrderStatus::Pending], OrderStatus::Confirmed)?;
                OrderEvent::PaymentConfirmed(PaymentConfirmed {
                    paid_at: now,
                    payment_method: payment_method.clone(),
                })
            }

            OrderCommand::StartPicking => {
                self.require(&[OrderStatus::Confirmed], OrderStatus::Processing)?;
                OrderEvent::PickingStarted(PickingStarted { started_at: now })
            }

            OrderCommand::Ship { tracking_code, tracking_url } => {
                self.require(
                    &[OrderStatus::Confirmed, OrderStatus::Processing],
                    OrderStatus::Shipped,
                )?;
                OrderEvent::Shipped(OrderShipped {
                    shipped_at: now,
                    tracking_code: blank_to_none(tracking_code),
                    tracking_url: blank_to_none(tracking_url),
                })
            }

            OrderCommand::MarkDelivered => {
                self.require(&[OrderStatus::Shipped], OrderStatus::Delivered)?;
                OrderEvent::Delivered(OrderDelivered { delivered_at: now })
            }

            OrderCommand::ConfirmReceipt => {
                self.require(&[OrderStatus::Delivered], OrderStatus::Delivered)?;
                OrderEvent::ReceiptConfirmed(OrderDelivered { delivered_at: now })
            }

            OrderCommand::Cancel { reason } => OrderEvent::Cancelled(OrderCancelled {
                cancelled_at: now,
                reason: CancellationReason::External(blank_to_none(reason)),
            }),

            OrderCommand::Refund { reason } => OrderEvent::Refunded(OrderRefunded {
                refunded_at: now,
                reason: blank_to_none(reason),
            }),
        };

        Ok(vec![event])
    }

    pub fn apply_event(&mut self, event: &OrderEvent) {
        self.status = event.resulting_status();
        self.updated_at = event.occurred_at();

        match event {
            OrderEvent::PaymentConfirmed(e) => {
                self.paid_at = Some(e.paid_at);
                self.payment_method = Some(e.payment_method.clone());
            }
            OrderEvent::PickingStarted(_) => {}
            OrderEvent::Shipped(e) => {
                self.shipped_at = Some(e.shipped_at);
                if e.tracking_code.is_some() {
                    self.tracking_code = e.tracking_code.clone();
                }
                if e.tracking_url.is_some() {
                    self.tracking_url = e.tracking_url.clone();
                }
            }
            OrderEvent::Delivered(e) | OrderEvent::ReceiptConfirmed(e) => {
                self.delivered_at = Some(e.delivered_at);
            }
            OrderEvent::Cancelled(e) => {
                self.cancelled_at = Some(e.cancelled_at);
                self.cancellation = Some(e.reason.clone());
            }
            OrderEvent::Refunded(_) => {}
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
