use serde::Serialize;
use serde_json::Value;

use crate::domain::shipping::{TrackingEvent, TrackingInfo};

use super::fields::{first_text, lookup, records};

// ============================================================================
// Shipment Tracking
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TrackingRequest {
    pub codes: Vec<String>,
}

/// Trimmed, non-empty, first occurrence of each code
pub fn clean_codes<I, S>(codes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut cleaned: Vec<String> = Vec::new();
    for code in codes {
        let code = code.as_ref().trim();
        if !code.is_empty() && !cleaned.iter().any(|c| c == code) {
            cleaned.push(code.to_string());
        }
    }
    cleaned
}

fn normalize_event(raw: &Value) -> Option<TrackingEvent> {
    let status = first_text(raw, &["status", "state", "event", "title"])?;
    Some(TrackingEvent {
        status,
        description: first_text(raw, &["description", "message", "detail", "details"]),
        date: first_text(raw, &["date", "created_at", "datetime", "updated_at"]),
        origin: first_text(raw, &["origin", "location", "from", "unit"]),
        destination: first_text(raw, &["destination", "to"]),
    })
}

fn normalize_info(record: &Value) -> Option<TrackingInfo> {
    let code = first_text(record, &["code", "tracking", "tracking_code"])?;

    let events = match lookup(record, "events") {
        Some(Value::Array(items)) => items.iter().filter_map(normalize_event).collect(),
        _ => Vec::new(),
    };

    Some(TrackingInfo {
        code,
        last_status: first_text(record, &["last_status.status", "status", "state", "last_status"]),
        updated_at: first_text(record, &["last_status.date", "updated_at"]),
        events,
    })
}

/// Map a tracking response; records that carry no tracking code are dropped.
pub fn normalize_tracking(body: &Value) -> Vec<TrackingInfo> {
    records(body).into_iter().filter_map(normalize_info).collect()
}
