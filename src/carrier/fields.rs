use serde_json::Value;

// ============================================================================
// Tolerant Field Lookup
// ============================================================================
//
// Carrier payloads name the same attribute several ways. Each normalized
// attribute is read through an ordered list of candidate paths; the first
// path holding a usable value wins. Paths are dot separated
// ("delivery_time.days").
//
// ============================================================================

/// Follow a dot separated path into nested objects
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, key| current.get(key))
        .filter(|v| !v.is_null())
}

/// Scalar rendered as text; numbers and booleans are stringified, blank strings skipped.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Number or numeric string ("23.50", "23,50")
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

pub fn first_text(value: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .find_map(|path| lookup(value, path).and_then(as_text))
}

pub fn first_number(value: &Value, paths: &[&str]) -> Option<f64> {
    paths
        .iter()
        .find_map(|path| lookup(value, path).and_then(as_number))
}

/// Non-negative whole number, e.g. delivery days
pub fn first_count(value: &Value, paths: &[&str]) -> Option<u32> {
    first_number(value, paths)
        .filter(|n| *n >= 0.0)
        .map(|n| n.round().min(f64::from(u32::MAX)) as u32)
}

/// Records out of a list response. Accepts a bare array, an object wrapping
/// the list under `data`, or an object keyed by record id.
pub fn records(body: &Value) -> Vec<&Value> {
    match body {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => map.values().filter(|v| v.is_object()).collect(),
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_order_is_respected() {
        let row = json!({ "label": "Agency", "name": "Main agency" });
        assert_eq!(first_text(&row, &["name", "label"]).as_deref(), Some("Main agency"));
        assert_eq!(first_text(&row, &["title", "label"]).as_deref(), Some("Agency"));
    }

    #[test]
    fn test_nested_paths_and_nulls() {
        let row = json!({ "delivery_time": { "days": null }, "custom_delivery_time": 6 });
        assert_eq!(first_count(&row, &["delivery_time.days", "custom_delivery_time"]), Some(6));
    }

    #[test]
    fn test_numeric_strings() {
        assert_eq!(as_number(&json!("23.50")), Some(23.5));
        assert_eq!(as_number(&json!("23,50")), Some(23.5));
        assert_eq!(as_number(&json!("free")), None);
        assert_eq!(as_text(&json!(17)).as_deref(), Some("17"));
        assert_eq!(as_text(&json!("   ")), None);
    }

    #[test]
    fn test_records_shapes() {
        assert_eq!(records(&json!([{ "a": 1 }, { "a": 2 }])).len(), 2);
        assert_eq!(records(&json!({ "data": [{ "a": 1 }] })).len(), 1);
        assert_eq!(records(&json!({ "ord-1": { "a": 1 }, "ord-2": { "a": 2 } })).len(), 2);
        assert!(records(&json!("nope")).is_empty());
    }
}
