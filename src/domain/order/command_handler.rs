use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::ProductCatalog;
use crate::metrics::Metrics;
use crate::notifications::StatusNotifier;
use crate::persistence::OrderRepository;
use crate::utils::Clock;

use super::aggregate::{OpenAs, Order};
use super::commands::{NewOrder, OrderCommand};
use super::errors::OrderError;
use super::events::OrderEvent;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: load -> lazy expiry -> Order::handle_command -> events ->
// conditional write -> side effects (stock, notification)
//
// Every write is `update_if_status(order, status_we_read)`. When two actions
// race on the same order exactly one write lands; the other caller gets
// `StaleState` with the status that beat it. A payment confirmation racing
// the lazy expiry resolves the same way.
//
// ============================================================================

pub struct OrderCommandHandler {
    repository: Arc<dyn OrderRepository>,
    catalog: Arc<dyn ProductCatalog>,
    notifier: Arc<dyn StatusNotifier>,
    clock: Arc<dyn Clock>,
    payment_window: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl OrderCommandHandler {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        catalog: Arc<dyn ProductCatalog>,
        notifier: Arc<dyn StatusNotifier>,
        clock: Arc<dyn Clock>,
        payment_window: Duration,
    ) -> Self {
        Self {
            repository,
            catalog,
            notifier,
            clock,
            payment_window,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn payment_window(&self) -> Duration {
        self.payment_window
    }

    /// Checkout order awaiting payment. Stock is untouched until payment.
    pub async fn create_order(&self, new: NewOrder) -> Result<Order, OrderError> {
        self.open(new, OpenAs::Pending).await
    }

    /// Non-committal price estimate
    pub async fn create_quote(&self, new: NewOrder) -> Result<Order, OrderError> {
        self.open(new, OpenAs::Quote).await
    }

    async fn open(&self, new: NewOrder, kind: OpenAs) -> Result<Order, OrderError> {
        let order = Order::open(new, kind, self.clock.now()).inspect_err(|e| self.reject(e))?;
        self.repository.insert(&order).await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            status = %order.status,
            total_cents = order.total_cents,
            "Order created"
        );

        Ok(order)
    }

    /// Read an order, cancelling it first if its payment window has elapsed.
    pub async fn get(&self, id: Uuid) -> Result<Order, OrderError> {
        let order = self.load(id).await?;
        let (order, _) = self.expire_if_due(order, "lazy").await?;
        Ok(order)
    }

    /// Apply a command to the persisted order.
    pub async fn execute(&self, id: Uuid, command: OrderCommand) -> Result<Order, OrderError> {
        let order = self.load(id).await?;
        let (order, _) = self.expire_if_due(order, "lazy").await?;

        let events = order
            .handle_command(&command, self.clock.now())
            .inspect_err(|e| {
                tracing::info!(
                    order_id = %id,
                    command = command.name(),
                    status = %order.status,
                    error = %e,
                    "Order command rejected"
                );
                self.reject(e);
            })?;

        let updated = self.persist(&order, &events).await.inspect_err(|e| self.reject(e))?;

        tracing::info!(
            order_id = %id,
            command = command.name(),
            from = %order.status,
            to = %updated.status,
            "Order transitioned"
        );

        self.after_commit(&updated, &events).await;
        Ok(updated)
    }

    /// Cancel up to `limit` PENDING orders whose payment window has elapsed.
    /// Returns how many this call cancelled.
    pub async fn expire_overdue(&self, limit: i64) -> Result<usize, OrderError> {
        let cutoff = self.clock.now() - self.payment_window;
        let overdue = self.repository.find_overdue_pending(cutoff, limit).await?;

        let mut expired = 0;
        for order in overdue {
            let id = order.id;
            match self.expire_if_due(order, "sweep").await {
                Ok((_, true)) => expired += 1,
                Ok((_, false)) => {}
                Err(e) => tracing::warn!(order_id = %id, error = %e, "Expiry sweep skipped order"),
            }
        }

        Ok(expired)
    }

    async fn load(&self, id: Uuid) -> Result<Order, OrderError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(OrderError::NotFound(id))
            .inspect_err(|e| self.reject(e))
    }

    /// The order as it stands after applying an elapsed payment window, and
    /// whether this call cancelled it. If another writer got there first, the
    /// order as that writer left it.
    async fn expire_if_due(&self, order: Order, trigger: &str) -> Result<(Order, bool), OrderError> {
        let Some(event) = order.expire_if_due(self.clock.now(), self.payment_window) else {
            return Ok((order, false));
        };

        match self.persist(&order, std::slice::from_ref(&event)).await {
            Ok(cancelled) => {
                tracing::info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    created_at = %order.created_at,
                    trigger,
                    "Payment window elapsed, order cancelled"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_expiry(trigger);
                }
                self.after_commit(&cancelled, std::slice::from_ref(&event)).await;
                Ok((cancelled, true))
            }
            Err(OrderError::StaleState { actual, .. }) => {
                tracing::debug!(order_id = %order.id, status = %actual, "Expiry lost race, re-reading");
                Ok((self.load(order.id).await?, false))
            }
            Err(e) => Err(e),
        }
    }

    async fn persist(&self, order: &Order, events: &[OrderEvent]) -> Result<Order, OrderError> {
        let expected = order.status;
        let mut updated = order.clone();
        for event in events {
            updated.apply_event(event);
        }

        if !self.repository.update_if_status(&updated, expected).await? {
            let actual = self
                .repository
                .find_by_id(order.id)
                .await?
                .map(|current| current.status)
                .ok_or(OrderError::NotFound(order.id))?;

            tracing::warn!(
                order_id = %order.id,
                expected = %expected,
                actual = %actual,
                "Order changed concurrently"
            );
            return Err(OrderError::StaleState { expected, actual });
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_transition(expected, updated.status);
        }
        Ok(updated)
    }

    async fn after_commit(&self, order: &Order, events: &[OrderEvent]) {
        for event in events {
            if let OrderEvent::PaymentConfirmed(_) = event {
                if let Err(e) = self.catalog.deduct_stock(&order.items).await {
                    tracing::error!(order_id = %order.id, error = %e, "Stock deduction failed");
                }
            }

            let result = self
                .notifier
                .notify_status_change(order, event.resulting_status(), event.notification_extra())
                .await;

            if let Err(e) = &result {
                tracing::warn!(
                    order_id = %order.id,
                    event = event.event_type(),
                    error = %e,
                    "Status notification failed"
                );
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_notification(result.is_ok());
            }
        }
    }

    fn reject(&self, error: &OrderError) {
        if let Some(metrics) = &self.metrics {
            metrics.record_rejection(error.reason());
        }
    }
}
