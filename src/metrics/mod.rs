// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

use crate::domain::order::OrderStatus;
use crate::utils::CircuitState;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers:
// - Carrier calls (outcome, latency, fallbacks, breaker state, token refreshes)
// - Order status transitions, rejections and expiries
// - Status-change notifications
//
// Scraped via /metrics on the metrics server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Carrier
    pub carrier_requests: IntCounterVec,
    pub carrier_request_duration: HistogramVec,
    pub shipping_fallbacks: IntCounterVec,
    pub carrier_circuit_state: IntGauge,
    pub carrier_token_refreshes: IntCounterVec,

    // Orders
    pub order_transitions: IntCounterVec,
    pub order_transition_rejections: IntCounterVec,
    pub orders_expired: IntCounterVec,

    // Notifications
    pub notifications: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let carrier_requests = IntCounterVec::new(
            Opts::new("carrier_requests_total", "Carrier API calls by operation and outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(carrier_requests.clone()))?;

        let carrier_request_duration = HistogramVec::new(
            HistogramOpts::new("carrier_request_duration_seconds", "Carrier API call duration")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0]),
            &["operation"],
        )?;
        registry.register(Box::new(carrier_request_duration.clone()))?;

        let shipping_fallbacks = IntCounterVec::new(
            Opts::new("shipping_fallbacks_total", "Carrier results replaced by a safe default"),
            &["operation"],
        )?;
        registry.register(Box::new(shipping_fallbacks.clone()))?;

        let carrier_circuit_state = IntGauge::new(
            "carrier_circuit_state",
            "Carrier circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(carrier_circuit_state.clone()))?;

        let carrier_token_refreshes = IntCounterVec::new(
            Opts::new("carrier_token_refreshes_total", "Carrier access token refresh attempts"),
            &["outcome"],
        )?;
        registry.register(Box::new(carrier_token_refreshes.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Persisted order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let order_transition_rejections = IntCounterVec::new(
            Opts::new("order_transition_rejections_total", "Rejected order commands"),
            &["reason"],
        )?;
        registry.register(Box::new(order_transition_rejections.clone()))?;

        let orders_expired = IntCounterVec::new(
            Opts::new("orders_expired_total", "PENDING orders cancelled by the payment window"),
            &["trigger"],
        )?;
        registry.register(Box::new(orders_expired.clone()))?;

        let notifications = IntCounterVec::new(
            Opts::new("notifications_total", "Status-change notifications by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(notifications.clone()))?;

        Ok(Self {
            registry,
            carrier_requests,
            carrier_request_duration,
            shipping_fallbacks,
            carrier_circuit_state,
            carrier_token_refreshes,
            order_transitions,
            order_transition_rejections,
            orders_expired,
            notifications,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_carrier_request(&self, operation: &str, outcome: &str, duration_secs: f64) {
        self.carrier_requests.with_label_values(&[operation, outcome]).inc();
        self.carrier_request_duration
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn record_fallback(&self, operation: &str) {
        self.shipping_fallbacks.with_label_values(&[operation]).inc();
    }

    pub fn update_circuit_state(&self, state: CircuitState) {
        self.carrier_circuit_state.set(state.as_gauge());
    }

    pub fn record_token_refresh(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.carrier_token_refreshes.with_label_values(&[outcome]).inc();
    }

    pub fn record_transition(&self, from: OrderStatus, to: OrderStatus) {
        self.order_transitions
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
    }

    pub fn record_rejection(&self, reason: &str) {
        self.order_transition_rejections.with_label_values(&[reason]).inc();
    }

    /// `trigger` is "lazy" or "sweep"
    pub fn record_expiry(&self, trigger: &str) {
        self.orders_expired.with_label_values(&[trigger]).inc();
    }

    pub fn record_notification(&self, success: bool) {
        let outcome = if success { "delivered" } else { "failed" };
        self.notifications.with_label_values(&[outcome]).inc();
    }
}
