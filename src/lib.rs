// ============================================================================
// Storefront Fulfillment
// ============================================================================
//
// Shipping and order-status core for a storefront:
// - shipping quotes with an always-present store pickup option
// - carrier pickup points and shipment tracking, degrading to empty results
// - the order status state machine with a lazily enforced payment window
//
// HTTP routing is left to the embedding application.
//
// ============================================================================

pub mod carrier;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod notifications;
pub mod persistence;
pub mod utils;

pub use crate::config::AppConfig;
pub use domain::order::{Order, OrderCommand, OrderCommandHandler, OrderError, OrderStatus};
pub use domain::shipping::{ShippingOption, ShippingQuote, ShippingService};
