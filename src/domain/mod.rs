// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// - shipping: parcels, carrier options, pickup points, tracking
// - order: the order record and its status state machine
//
// Neither module knows about HTTP or SQL; collaborators come in as traits.
//
// ============================================================================

pub mod order;
pub mod shipping;
