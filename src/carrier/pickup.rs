use serde_json::Value;

use crate::domain::shipping::PickupPoint;

use super::fields::{first_text, lookup, records};

// ============================================================================
// Pickup Point Directory
// ============================================================================

/// Street line from an address object, or from street fields on the record itself
fn compose_street(source: &Value) -> Option<String> {
    let street = first_text(source, &["address", "street", "logradouro"])?;
    let number = first_text(source, &["number", "numero"]);
    let district = first_text(source, &["district", "neighborhood", "bairro"]);

    let mut line = street;
    if let Some(number) = number {
        line.push_str(", ");
        line.push_str(&number);
    }
    if let Some(district) = district {
        line.push_str(" - ");
        line.push_str(&district);
    }
    Some(line)
}

fn address_line(record: &Value) -> String {
    match lookup(record, "address") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(nested @ Value::Object(_)) => compose_street(nested).unwrap_or_default(),
        _ => first_text(record, &["street", "logradouro"])
            .and_then(|_| compose_street(record))
            .unwrap_or_default(),
    }
}

fn normalize_point(record: &Value) -> Option<PickupPoint> {
    let id = first_text(record, &["id", "code", "agency_id"])?;
    let company = first_text(record, &["company.name", "company_name", "company"]);
    let name = first_text(record, &["name", "label", "company_name"])
        .or_else(|| company.clone())
        .unwrap_or_else(|| id.clone());

    Some(PickupPoint {
        address: address_line(record),
        city: first_text(record, &["address.city.city", "address.city", "city"]),
        state: first_text(
            record,
            &["address.city.state.state_abbr", "address.city.state", "address.state", "state", "uf"],
        ),
        zip: first_text(record, &["address.postal_code", "postal_code", "zip", "address.zip"]),
        company,
        id,
        name,
    })
}

/// Map the carrier's pickup-point listing; records without an id are dropped.
pub fn normalize_pickup_points(body: &Value) -> Vec<PickupPoint> {
    records(body).into_iter().filter_map(normalize_point).collect()
}
