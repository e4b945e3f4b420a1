use crate::catalog::ProductShippingProfile;

use super::value_objects::{round_price, Dimensions, Parcel, ShippingItem};

// ============================================================================
// Package Aggregation
// ============================================================================
//
// Carriers price a single rectangular box. Items are modelled as laid end to
// end: weight and length add up across every unit, width and height are the
// largest seen on any item. Not a packing solver; it only feeds the quote.
//
// ============================================================================

pub const DEFAULT_WEIGHT_KG: f64 = 1.0;
pub const MIN_WEIGHT_GRAMS: u32 = 1;
pub const MIN_LENGTH_CM: f64 = 10.0;
pub const MIN_WIDTH_CM: f64 = 10.0;
pub const MIN_HEIGHT_CM: f64 = 5.0;

fn usable(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

fn item_weight_kg(item: &ShippingItem) -> f64 {
    item.weight_kg.and_then(usable).unwrap_or(DEFAULT_WEIGHT_KG)
}

/// Item dimensions with every missing or unusable side replaced by its default
fn item_dimensions(item: &ShippingItem) -> Dimensions {
    let defaults = Dimensions::DEFAULT;
    match item.dimensions {
        Some(d) => Dimensions {
            height: usable(d.height).unwrap_or(defaults.height),
            width: usable(d.width).unwrap_or(defaults.width),
            length: usable(d.length).unwrap_or(defaults.length),
        },
        None => defaults,
    }
}

/// Collapse cart lines into the parcel a carrier is asked to price.
pub fn aggregate(items: &[ShippingItem]) -> Parcel {
    let mut weight_kg = 0.0;
    let mut length = 0.0_f64;
    let mut width = 0.0_f64;
    let mut height = 0.0_f64;
    let mut total_price = 0.0;

    for item in items {
        let quantity = f64::from(item.quantity.max(1));
        let dims = item_dimensions(item);

        weight_kg += item_weight_kg(item) * quantity;
        length += dims.length * quantity;
        width = width.max(dims.width);
        height = height.max(dims.height);
        total_price += item.price.filter(|p| p.is_finite() && *p > 0.0).unwrap_or(0.0) * quantity;
    }

    let grams = (weight_kg * 1000.0).round();
    let total_weight_grams = if grams >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        (grams as u32).max(MIN_WEIGHT_GRAMS)
    };

    Parcel {
        total_weight_grams,
        length: length.max(MIN_LENGTH_CM),
        width: width.max(MIN_WIDTH_CM),
        height: height.max(MIN_HEIGHT_CM),
        total_price: round_price(total_price),
    }
}

/// Fill the fields a caller left out from the product record.
pub fn enrich_item(mut item: ShippingItem, profile: Option<&ProductShippingProfile>) -> ShippingItem {
    let Some(profile) = profile else {
        return item;
    };

    if item.weight_kg.and_then(usable).is_none() {
        item.weight_kg = profile.weight_kg;
    }
    if item.dimensions.is_none() {
        item.dimensions = profile.dimensions;
    }
    if item.price.is_none() {
        item.price = profile.price;
    }
    item
}
