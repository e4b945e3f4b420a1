use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::domain::shipping::{round_price, Parcel, ShippingOption};

use super::fields::{as_text, first_count, first_number, first_text, lookup, records};

// ============================================================================
// Rate Quotes
// ============================================================================

pub const PICKUP_OPTION_ID: &str = "pickup";

#[derive(Debug, Serialize)]
pub struct PostalCode {
    pub postal_code: String,
}

#[derive(Debug, Serialize)]
pub struct RateProduct {
    pub width: f64,
    pub height: f64,
    pub length: f64,
    /// Kilograms
    pub weight: f64,
    pub insurance_value: f64,
    pub quantity: u32,
}

/// Body of the carrier's rate-calculation call
#[derive(Debug, Serialize)]
pub struct RateRequest {
    pub from: PostalCode,
    pub to: PostalCode,
    pub products: Vec<RateProduct>,
    pub services: String,
}

impl RateRequest {
    /// The aggregated parcel goes out as one product of quantity one.
    /// Postal codes must already be digits only.
    pub fn new(parcel: &Parcel, origin_zip: String, destination_zip: String, services: &[String]) -> Self {
        Self {
            from: PostalCode { postal_code: origin_zip },
            to: PostalCode { postal_code: destination_zip },
            products: vec![RateProduct {
                width: parcel.width,
                height: parcel.height,
                length: parcel.length,
                weight: parcel.weight_kg(),
                insurance_value: parcel.total_price,
                quantity: 1,
            }],
            services: services.join(","),
        }
    }
}

/// The message a rate row carries when the carrier cannot serve the route.
/// `false`, blanks and empty containers mean no error.
fn service_error(row: &Value) -> Option<String> {
    match lookup(row, "error")? {
        Value::Bool(flag) => flag.then(|| "unavailable".to_string()),
        Value::Object(map) if map.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        value @ (Value::Object(_) | Value::Array(_)) => Some(value.to_string()),
        value => as_text(value),
    }
}

fn normalize_rate(row: &Value) -> Option<ShippingOption> {
    if let Some(error) = service_error(row) {
        tracing::debug!(error = %error, "Skipping unavailable carrier service");
        return None;
    }

    let id = first_text(row, &["service_id", "id", "name"])?;
    let price = first_number(row, &["price", "cost", "custom_price"])?;
    if price < 0.0 {
        tracing::debug!(service_id = %id, price = price, "Rejecting negative carrier price");
        return None;
    }

    let service = first_text(row, &["name", "service", "service_name"]).unwrap_or_else(|| id.clone());
    let carrier = first_text(row, &["company.name", "company", "carrier"]).unwrap_or_default();

    Some(ShippingOption {
        id,
        service,
        carrier,
        price: round_price(price),
        eta_days: first_count(
            row,
            &["delivery_time.days", "custom_delivery_time", "delivery_time"],
        ),
        pickup: Some(false),
        notes: first_text(row, &["observations", "notes"]),
    })
}

/// Map a rate-calculation response into shipping options.
pub fn normalize_rates(body: &Value) -> Vec<ShippingOption> {
    records(body).into_iter().filter_map(normalize_rate).collect()
}

/// Checkout's option list: carrier options deduplicated by id, followed by
/// exactly one pickup option.
pub fn compose_options(carrier_options: Vec<ShippingOption>, pickup: ShippingOption) -> Vec<ShippingOption> {
    let mut seen = HashSet::new();
    seen.insert(pickup.id.clone());

    let mut options: Vec<ShippingOption> = carrier_options
        .into_iter()
        .filter(|option| !option.is_pickup())
        .filter(|option| seen.insert(option.id.clone()))
        .collect();

    options.push(pickup);
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pickup() -> ShippingOption {
        ShippingOption {
            id: PICKUP_OPTION_ID.into(),
            service: "Store pickup".into(),
            carrier: "Storefront".into(),
            price: 0.0,
            eta_days: None,
            pickup: Some(true),
            notes: None,
        }
    }

    #[test]
    fn test_normalize_heterogeneous_rates() {
        let body = json!([
            {
                "id": 1,
                "name": "PAC",
                "price": "23.456",
                "company": { "id": 1, "name": "Correios" },
                "delivery_time": 7
            },
            {
                "service_id": "2",
                "name": "SEDEX",
                "cost": 41.9,
                "company": { "name": "Correios" },
                "delivery_time": { "days": 2 },
                "observations": "Door delivery"
            },
            {
                "id": 17,
                "name": "Mini Envios",
                "error": "Service unavailable for route"
            }
        ]);

        let options = normalize_rates(&body);

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].id, "1");
        assert_eq!(options[0].price, 23.46);
        assert_eq!(options[0].eta_days, Some(7));
        assert_eq!(options[0].carrier, "Correios");
        assert_eq!(options[1].id, "2");
        assert_eq!(options[1].service, "SEDEX");
        assert_eq!(options[1].eta_days, Some(2));
        assert_eq!(options[1].notes.as_deref(), Some("Door delivery"));
    }

    #[test]
    fn test_falsy_error_field_keeps_rate() {
        let body = json!([
            { "id": 1, "name": "PAC", "price": 20, "error": false },
            { "id": 2, "name": "SEDEX", "price": 35, "error": "" },
            { "id": 3, "name": "Jadlog", "price": 18, "error": null },
            { "id": 4, "name": "Azul", "price": 50, "error": true },
            { "id": 5, "name": "Loggi", "price": 22, "error": { "message": "Route not served" } }
        ]);

        let ids: Vec<String> = normalize_rates(&body).into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_custom_delivery_time_is_used_when_days_missing() {
        let body = json!([{ "id": 3, "name": "Jadlog", "price": 18, "custom_delivery_time": 5 }]);
        let options = normalize_rates(&body);
        assert_eq!(options[0].eta_days, Some(5));
    }

    #[test]
    fn test_negative_and_missing_prices_are_dropped() {
        let body = json!([
            { "id": 1, "name": "PAC", "price": -1 },
            { "id": 2, "name": "SEDEX" },
            { "id": 3, "name": "Express", "price": "n/a" }
        ]);
        assert!(normalize_rates(&body).is_empty());
    }

    #[test]
    fn test_non_list_body_yields_nothing() {
        assert!(normalize_rates(&json!("error")).is_empty());
        assert!(normalize_rates(&json!(null)).is_empty());
    }

    #[test]
    fn test_compose_always_has_single_free_pickup() {
        let options = compose_options(Vec::new(), pickup());
        assert_eq!(options.len(), 1);
        assert!(options[0].is_pickup());
        assert_eq!(options[0].price, 0.0);
    }

    #[test]
    fn test_compose_deduplicates_by_id() {
        let body = json!([
            { "id": 1, "name": "PAC", "price": 20 },
            { "id": 1, "name": "PAC again", "price": 25 },
            { "id": "pickup", "name": "Carrier pickup", "price": 3 }
        ]);

        let options = compose_options(normalize_rates(&body), pickup());

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].service, "PAC");
        assert_eq!(options.iter().filter(|o| o.is_pickup()).count(), 1);
        assert_eq!(options.iter().filter(|o| o.id == "pickup").count(), 1);
    }

    #[test]
    fn test_rate_request_shape() {
        let parcel = Parcel {
            total_weight_grams: 4500,
            length: 84.0,
            width: 20.0,
            height: 12.0,
            total_price: 150.0,
        };
        let services = vec!["1".to_string(), "2".to_string()];

        let request = RateRequest::new(&parcel, "01310100".into(), "22041001".into(), &services);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["from"]["postal_code"], "01310100");
        assert_eq!(json["to"]["postal_code"], "22041001");
        assert_eq!(json["services"], "1,2");
        assert_eq!(json["products"][0]["weight"], 4.5);
        assert_eq!(json["products"][0]["insurance_value"], 150.0);
        assert_eq!(json["products"][0]["quantity"], 1);
    }
}
