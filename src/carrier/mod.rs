// ============================================================================
// Carrier Integration
// ============================================================================
//
// The carrier answers with loosely shaped JSON. Each normalizer reads the
// fields it needs through ordered synonym lists (see `fields`) instead of a
// fixed schema, and drops records it cannot identify.
//
// ============================================================================

pub mod client;
pub mod fields;
pub mod pickup;
pub mod quote;
pub mod token;
pub mod tracking;

#[cfg(test)]
pub(crate) mod stub_server;

pub use client::{http_client, CarrierClient, CarrierError, CarrierGateway};
pub use pickup::normalize_pickup_points;
pub use quote::{compose_options, normalize_rates, RateRequest, PICKUP_OPTION_ID};
pub use token::TokenManager;
pub use tracking::{clean_codes, normalize_tracking};
