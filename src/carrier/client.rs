use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::config::CarrierConfig;
use crate::domain::shipping::{digits_only, Parcel, PickupPoint, ShippingOption, TrackingInfo};
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerError, CircuitState};

use super::pickup::normalize_pickup_points;
use super::quote::{normalize_rates, RateRequest};
use super::token::TokenManager;
use super::tracking::{clean_codes, normalize_tracking, TrackingRequest};

// ============================================================================
// Carrier HTTP Client
// ============================================================================
//
// Every call goes through the same path:
//   bearer token -> circuit breaker -> HTTP with bounded timeout -> JSON
//
// The `CarrierGateway` methods never fail: errors are logged and replaced
// by a safe default so checkout and order pages keep working.
//
// ============================================================================

const CALCULATE_PATH: &str = "/api/v2/me/shipment/calculate";
const AGENCIES_PATH: &str = "/api/v2/me/shipment/agencies";
const TRACKING_PATH: &str = "/api/v2/me/shipment/tracking";

#[derive(Debug, thiserror::Error)]
pub enum CarrierError {
    #[error("Carrier integration not connected (no usable access token)")]
    NotConnected,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Carrier responded with HTTP {0}")]
    Status(u16),

    #[error("Malformed carrier response: {0}")]
    Malformed(String),

    #[error("Invalid postal code: {0:?}")]
    InvalidPostalCode(String),

    #[error("Carrier circuit breaker is open")]
    CircuitOpen,
}

impl CarrierError {
    /// Whether the failure says something about the carrier's health.
    /// Client errors other than 429 come from the request itself.
    pub fn is_carrier_fault(&self) -> bool {
        match self {
            CarrierError::Transport(_) | CarrierError::Malformed(_) => true,
            CarrierError::Status(code) => *code == 429 || *code >= 500,
            CarrierError::NotConnected | CarrierError::InvalidPostalCode(_) | CarrierError::CircuitOpen => false,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            CarrierError::NotConnected => "not_connected",
            CarrierError::Transport(e) if e.is_timeout() => "timeout",
            CarrierError::Transport(_) => "transport",
            CarrierError::Status(_) => "status",
            CarrierError::Malformed(_) => "malformed",
            CarrierError::InvalidPostalCode(_) => "invalid_postal_code",
            CarrierError::CircuitOpen => "circuit_open",
        }
    }
}

/// The carrier as seen by the shipping service. Implementations degrade
/// instead of failing.
#[async_trait]
pub trait CarrierGateway: Send + Sync {
    /// `None` when the carrier could not be consulted
    async fn quote(&self, parcel: &Parcel, destination_zip: &str, origin_zip: &str) -> Option<Vec<ShippingOption>>;

    async fn pickup_points(&self, zip: &str) -> Vec<PickupPoint>;

    async fn track(&self, codes: &[String]) -> Vec<TrackingInfo>;
}

/// HTTP client shared by carrier calls and token refreshes
pub fn http_client(config: &CarrierConfig) -> Result<reqwest::Client, CarrierError> {
    Ok(reqwest::Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.clone())
        .build()?)
}

pub struct CarrierClient {
    http: reqwest::Client,
    base_url: String,
    services: Vec<String>,
    tokens: Arc<TokenManager>,
    breaker: CircuitBreaker,
    metrics: Option<Arc<Metrics>>,
}

impl CarrierClient {
    pub fn new(http: reqwest::Client, config: &CarrierConfig, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            services: config.service_ids(),
            tokens,
            breaker: CircuitBreaker::new("carrier", config.circuit_breaker.clone()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.breaker.state().await
    }

    /// Rate quotes for one parcel. Postal codes may carry punctuation.
    pub async fn calculate(
        &self,
        parcel: &Parcel,
        destination_zip: &str,
        origin_zip: &str,
    ) -> Result<Vec<ShippingOption>, CarrierError> {
        let destination = digits_only(destination_zip);
        if destination.is_empty() {
            return Err(CarrierError::InvalidPostalCode(destination_zip.to_string()));
        }
        let origin = digits_only(origin_zip);
        if origin.is_empty() {
            return Err(CarrierError::InvalidPostalCode(origin_zip.to_string()));
        }

        let body = RateRequest::new(parcel, origin, destination, &self.services);
        let request = self.http.post(self.url(CALCULATE_PATH)).json(&body);
        let response = self.execute("quote", request).await?;

        Ok(normalize_rates(&response))
    }

    pub async fn agencies(&self, zip: &str) -> Result<Vec<PickupPoint>, CarrierError> {
        let zip_digits = digits_only(zip);
        if zip_digits.is_empty() {
            return Err(CarrierError::InvalidPostalCode(zip.to_string()));
        }

        let url = format!("{}?postal_code={}", self.url(AGENCIES_PATH), zip_digits);
        let response = self.execute("pickup_points", self.http.get(url)).await?;

        Ok(normalize_pickup_points(&response))
    }

    /// One batched request for all codes; no request at all when nothing
    /// usable remains after cleaning.
    pub async fn tracking<S: AsRef<str>>(&self, codes: &[S]) -> Result<Vec<TrackingInfo>, CarrierError> {
        let codes = clean_codes(codes);
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let request = self.http.post(self.url(TRACKING_PATH)).json(&TrackingRequest { codes });
        let response = self.execute("track", request).await?;

        Ok(normalize_tracking(&response))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, operation: &'static str, request: reqwest::RequestBuilder) -> Result<Value, CarrierError> {
        // Resolve the token first: without one no request leaves the process.
        let token = self.tokens.bearer().await.inspect_err(|e| {
            self.record(operation, e.outcome(), 0.0);
        })?;

        // The outer error is a carrier fault and counts against the breaker.
        // The inner one is a request the carrier rejected while healthy.
        let started = Instant::now();
        let result = self
            .breaker
            .call(async {
                let response = request
                    .bearer_auth(token)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let error = CarrierError::Status(status.as_u16());
                    return if error.is_carrier_fault() { Err(error) } else { Ok(Err(error)) };
                }

                let text = response.text().await?;
                let body: Value =
                    serde_json::from_str(&text).map_err(|e| CarrierError::Malformed(e.to_string()))?;
                Ok::<Result<Value, CarrierError>, CarrierError>(Ok(body))
            })
            .await
            .map_err(|e| match e {
                CircuitBreakerError::CircuitOpen => CarrierError::CircuitOpen,
                CircuitBreakerError::OperationFailed(e) => e,
            })
            .and_then(|rejected| rejected);

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(_) => self.record(operation, "success", elapsed),
            Err(e) => self.record(operation, e.outcome(), elapsed),
        }
        if let Some(metrics) = &self.metrics {
            metrics.update_circuit_state(self.breaker.state().await);
        }

        result
    }

    fn record(&self, operation: &str, outcome: &str, elapsed: f64) {
        if let Some(metrics) = &self.metrics {
            metrics.record_carrier_request(operation, outcome, elapsed);
        }
    }

    fn degrade(&self, operation: &str, error: &CarrierError) {
        match error {
            CarrierError::NotConnected => {
                tracing::debug!(operation, "Carrier not connected, using fallback")
            }
            _ => tracing::warn!(operation, error = %error, "Carrier call failed, using fallback"),
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_fallback(operation);
        }
    }
}

#[async_trait]
impl CarrierGateway for CarrierClient {
    async fn quote(&self, parcel: &Parcel, destination_zip: &str, origin_zip: &str) -> Option<Vec<ShippingOption>> {
        match self.calculate(parcel, destination_zip, origin_zip).await {
            Ok(options) => {
                tracing::debug!(count = options.len(), "Carrier quote received");
                Some(options)
            }
            Err(e) => {
                self.degrade("quote", &e);
                None
            }
        }
    }

    async fn pickup_points(&self, zip: &str) -> Vec<PickupPoint> {
        self.agencies(zip).await.unwrap_or_else(|e| {
            self.degrade("pickup_points", &e);
            Vec::new()
        })
    }

    async fn track(&self, codes: &[String]) -> Vec<TrackingInfo> {
        self.tracking(codes).await.unwrap_or_else(|e| {
            self.degrade("track", &e);
            Vec::new()
        })
    }
}
