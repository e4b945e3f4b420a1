use serde::Deserialize;
use std::time::Duration;

use crate::domain::shipping::ShippingOption;
use crate::carrier::PICKUP_OPTION_ID;
use crate::utils::{CircuitBreakerConfig, RetryPolicy};

// ============================================================================
// Application Configuration
// ============================================================================
//
// Sources, later ones win:
// 1. built-in defaults
// 2. ./storefront.yaml (optional)
// 3. file named by STOREFRONT_CONFIG (required when set)
// 4. STOREFRONT__SECTION__KEY environment variables (read as strings)
//
// ============================================================================

pub const CONFIG_ENV_VAR: &str = "STOREFRONT_CONFIG";
pub const CONFIG_ENV_PREFIX: &str = "STOREFRONT";
const DEFAULT_CONFIG_FILE: &str = "storefront";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub carrier: CarrierConfig,
    pub pickup: PickupConfig,
    pub orders: OrderConfig,
    pub database: DatabaseConfig,
    pub notifications: NotificationConfig,
    pub metrics: MetricsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ::config::ConfigError> {
        use ::config::{Config, File, FileFormat};

        let mut builder = Config::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&path, FileFormat::Yaml).required(true));
        }

        builder.add_source(environment()).build()?.try_deserialize()
    }
}

/// Variables stay strings; numeric and boolean fields are converted on
/// deserialization, so postal codes keep their leading zeros.
fn environment() -> ::config::Environment {
    ::config::Environment::with_prefix(CONFIG_ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CarrierConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// The carrier requires an identifying User-Agent with a contact address
    pub user_agent: String,
    /// Comma separated whitelist of carrier service ids
    pub services: String,
    pub origin_zip: String,
    pub timeout_secs: u64,
    /// Refresh the token when it expires within this many seconds
    pub refresh_margin_secs: i64,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.melhorenvio.com.br".to_string(),
            access_token: None,
            refresh_token: None,
            client_id: None,
            client_secret: None,
            user_agent: "storefront-fulfillment (ops@example.com)".to_string(),
            services: "1,2,3,4,17".to_string(),
            origin_zip: String::new(),
            timeout_secs: 15,
            refresh_margin_secs: 300,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl CarrierConfig {
    pub fn service_ids(&self) -> Vec<String> {
        self.services
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn refresh_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_margin_secs.max(0))
    }
}

/// The always-available in-store collection option
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PickupConfig {
    pub label: String,
    pub carrier: String,
    pub notes: Option<String>,
    pub eta_days: Option<u32>,
}

impl Default for PickupConfig {
    fn default() -> Self {
        Self {
            label: "Store pickup".to_string(),
            carrier: "Storefront".to_string(),
            notes: None,
            eta_days: None,
        }
    }
}

impl PickupConfig {
    pub fn option(&self) -> ShippingOption {
        ShippingOption {
            id: PICKUP_OPTION_ID.to_string(),
            service: self.label.clone(),
            carrier: self.carrier.clone(),
            price: 0.0,
            eta_days: self.eta_days,
            pickup: Some(true),
            notes: self.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    pub payment_window_minutes: i64,
    /// Background expiry sweep; lazy expiry only when unset
    pub sweep_interval_secs: Option<u64>,
    pub sweep_batch_size: i64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            payment_window_minutes: 15,
            sweep_interval_secs: None,
            sweep_batch_size: 100,
        }
    }
}

impl OrderConfig {
    pub fn payment_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.payment_window_minutes.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// In-memory stores when unset
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Log-only notifications when unset
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 10,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}
