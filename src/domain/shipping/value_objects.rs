use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Shipping Value Objects
// ============================================================================

/// Box dimensions in centimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub height: f64,
    pub width: f64,
    pub length: f64,
}

impl Dimensions {
    /// Used for any item whose product record carries no dimensions
    pub const DEFAULT: Dimensions = Dimensions {
        height: 12.0,
        width: 18.0,
        length: 24.0,
    };
}

/// A cart line as seen by the shipping quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingItem {
    pub product_id: Uuid,
    pub quantity: u32,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl ShippingItem {
    pub fn new(product_id: Uuid, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            weight_kg: None,
            dimensions: None,
            price: None,
        }
    }

    pub fn with_weight_kg(mut self, weight_kg: f64) -> Self {
        self.weight_kg = Some(weight_kg);
        self
    }

    pub fn with_dimensions(mut self, height: f64, width: f64, length: f64) -> Self {
        self.dimensions = Some(Dimensions { height, width, length });
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }
}

/// The single rectangular box sent to the carrier for a rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub total_weight_grams: u32,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    /// Insured value
    pub total_price: f64,
}

impl Parcel {
    pub fn weight_kg(&self) -> f64 {
        f64::from(self.total_weight_grams) / 1000.0
    }
}

/// A selectable shipping method shown at checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingOption {
    pub id: String,
    pub service: String,
    pub carrier: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ShippingOption {
    pub fn is_pickup(&self) -> bool {
        self.pickup.unwrap_or(false)
    }

    /// Price in integer cents, as persisted on the order
    pub fn price_cents(&self) -> i64 {
        (self.price * 100.0).round() as i64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupPoint {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub events: Vec<TrackingEvent>,
}

/// Strip everything but ASCII digits from a postal code
pub fn digits_only(zip: &str) -> String {
    zip.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Round a money amount to cents
pub fn round_price(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
