use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::CarrierConfig;
use crate::metrics::Metrics;
use crate::persistence::{CarrierToken, StoreError, TokenStore};
use crate::utils::Clock;

use super::CarrierError;

// ============================================================================
// Carrier Access Token
// ============================================================================
//
// The token is the only mutable state shared by carrier calls. Reads are
// lock-free; a refresh takes `refresh_lock`, re-reads the store, and only
// calls the OAuth endpoint if the token still needs it. The store keeps a
// single row, so the last refresh wins.
//
// ============================================================================

const TOKEN_PATH: &str = "/oauth/token";

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    /// Seconds
    expires_in: Option<i64>,
}

pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    http: reqwest::Client,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    margin: Duration,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<Metrics>>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        http: reqwest::Client,
        config: &CarrierConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            http,
            token_url: format!("{}{}", config.base_url.trim_end_matches('/'), TOKEN_PATH),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            margin: config.refresh_margin(),
            clock,
            metrics: None,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Store the configured token if none is persisted yet.
    /// Returns whether anything was written.
    pub async fn seed(&self, config: &CarrierConfig) -> Result<bool, StoreError> {
        let Some(access_token) = config.access_token.clone().filter(|t| !t.trim().is_empty()) else {
            return Ok(false);
        };

        if self.store.load().await?.is_some() {
            return Ok(false);
        }

        self.store
            .save(&CarrierToken {
                access_token,
                refresh_token: config.refresh_token.clone(),
                expires_at: None,
            })
            .await?;

        tracing::info!("Seeded carrier token from configuration");
        Ok(true)
    }

    /// A usable access token, refreshed first if it is close to expiry.
    pub async fn bearer(&self) -> Result<String, CarrierError> {
        let token = self.load().await?;
        if !token.expires_within(self.clock.now(), self.margin) {
            return Ok(token.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        let token = self.load().await?;
        let now = self.clock.now();
        if !token.expires_within(now, self.margin) {
            return Ok(token.access_token);
        }

        match self.refresh(&token).await {
            Ok(fresh) => {
                self.record_refresh(true);
                if let Err(e) = self.store.save(&fresh).await {
                    tracing::warn!(error = %e, "Refreshed carrier token could not be persisted");
                }
                tracing::info!(expires_at = ?fresh.expires_at, "Carrier token refreshed");
                Ok(fresh.access_token)
            }
            Err(e) if !token.is_expired(now) => {
                self.record_refresh(false);
                tracing::warn!(error = %e, "Carrier token refresh failed, using current token");
                Ok(token.access_token)
            }
            Err(e) => {
                self.record_refresh(false);
                tracing::warn!(error = %e, "Carrier token expired and refresh failed");
                Err(CarrierError::NotConnected)
            }
        }
    }

    async fn load(&self) -> Result<CarrierToken, CarrierError> {
        match self.store.load().await {
            Ok(Some(token)) if !token.access_token.is_empty() => Ok(token),
            Ok(_) => Err(CarrierError::NotConnected),
            Err(e) => {
                tracing::warn!(error = %e, "Carrier token could not be loaded");
                Err(CarrierError::NotConnected)
            }
        }
    }

    async fn refresh(&self, current: &CarrierToken) -> Result<CarrierToken, CarrierError> {
        let Some(refresh_token) = current.refresh_token.as_deref() else {
            return Err(CarrierError::NotConnected);
        };

        let request = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
            client_id: self.client_id.as_deref(),
            client_secret: self.client_secret.as_deref(),
        };

        let response = self.http.post(&self.token_url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CarrierError::Status(status.as_u16()));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Malformed(e.to_string()))?;

        Ok(CarrierToken {
            access_token: body.access_token,
            // Some providers rotate the refresh token, some do not.
            refresh_token: body.refresh_token.or_else(|| current.refresh_token.clone()),
            expires_at: body.expires_in.map(|secs| self.clock.now() + Duration::seconds(secs)),
        })
    }

    fn record_refresh(&self, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_token_refresh(success);
        }
    }
}
