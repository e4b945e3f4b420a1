// ============================================================================
// Shipping Domain
// ============================================================================
//
// - Value objects (ShippingItem, Parcel, ShippingOption, PickupPoint, TrackingInfo)
// - Package aggregation (items -> one parcel)
// - ShippingService (quotes, pickup points, tracking for checkout and order pages)
//
// ============================================================================

pub mod package;
pub mod service;
pub mod value_objects;

pub use package::{aggregate, enrich_item};
pub use service::{ShippingQuote, ShippingService};
pub use value_objects::*;
