use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::NotificationConfig;
use crate::domain::order::{Order, OrderStatus};
use crate::utils::{retry_on_transient, IsTransient, RetryPolicy};

// ============================================================================
// Status-Change Notifications
// ============================================================================
//
// Fired after every persisted status transition. A failed notification is
// the notifier's problem: the caller logs it and the transition stands.
//
// ============================================================================

pub const STATUS_CHANGED_EVENT: &str = "order.status_changed";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Webhook transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Webhook responded with HTTP {0}")]
    Status(u16),
}

impl IsTransient for NotifyError {
    fn is_transient(&self) -> bool {
        match self {
            NotifyError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            NotifyError::Status(code) => *code == 429 || *code >= 500,
        }
    }
}

#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn notify_status_change(&self, order: &Order, status: OrderStatus, extra: Value) -> Result<(), NotifyError>;
}

/// JSON body posted to the webhook
pub fn status_payload(order: &Order, status: OrderStatus, extra: Value) -> Value {
    json!({
        "event": STATUS_CHANGED_EVENT,
        "order_id": order.id,
        "order_number": order.order_number,
        "status": status,
        "extra": extra,
        "occurred_at": Utc::now(),
    })
}

pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, config: &NotificationConfig) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            url: url.into(),
            retry: config.retry.clone(),
        })
    }

    async fn post(&self, payload: &Value) -> Result<(), NotifyError> {
        let response = self.http.post(&self.url).json(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl StatusNotifier for WebhookNotifier {
    async fn notify_status_change(&self, order: &Order, status: OrderStatus, extra: Value) -> Result<(), NotifyError> {
        let payload = status_payload(order, status, extra);

        let outcome = retry_on_transient(&self.retry, "status_webhook", |_attempt| self.post(&payload)).await;
        let attempts = outcome.attempts();
        outcome.into_result()?;

        tracing::debug!(
            order_id = %order.id,
            status = %status,
            attempts,
            "Status webhook delivered"
        );
        Ok(())
    }
}

/// Logs transitions; used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl StatusNotifier for LogNotifier {
    async fn notify_status_change(&self, order: &Order, status: OrderStatus, extra: Value) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            status = %status,
            extra = %extra,
            "Order status changed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_new_order;
    use crate::domain::order::OpenAs;

    fn order() -> Order {
        Order::open(sample_new_order(), OpenAs::Pending, Utc::now()).unwrap()
    }

    #[test]
    fn test_payload_shape() {
        let order = order();
        let payload = status_payload(&order, OrderStatus::Confirmed, json!({ "paymentMethod": "pix" }));

        assert_eq!(payload["event"], STATUS_CHANGED_EVENT);
        assert_eq!(payload["status"], "CONFIRMED");
        assert_eq!(payload["order_number"], order.order_number.as_str());
        assert_eq!(payload["extra"]["paymentMethod"], "pix");
    }

    #[test]
    fn test_status_transience() {
        assert!(NotifyError::Status(503).is_transient());
        assert!(NotifyError::Status(429).is_transient());
        assert!(!NotifyError::Status(400).is_transient());
        assert!(!NotifyError::Status(404).is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_fails_after_retries() {
        let config = NotificationConfig {
            webhook_url: None,
            timeout_secs: 1,
            retry: RetryPolicy {
                max_attempts: 2,
                initial_delay_ms: 1,
                max_delay_ms: 1,
                multiplier: 1.0,
            },
        };
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hooks", &config).unwrap();

        let result = notifier
            .notify_status_change(&order(), OrderStatus::Confirmed, json!({}))
            .await;
        assert!(matches!(result, Err(NotifyError::Transport(_))));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let result = LogNotifier
            .notify_status_change(&order(), OrderStatus::Shipped, json!({ "trackingCode": "BR1" }))
            .await;
        assert!(result.is_ok());
    }
}
