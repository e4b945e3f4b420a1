// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (OrderItem, OrderStatus, ShippingAddress, ...)
// - Commands (ConfirmPayment, StartPicking, Ship, ...)
// - Events (one per accepted transition)
// - Errors (OrderError)
// - Aggregate (Order and its status state machine)
// - Command handler (persistence, expiry, side effects)
// - Expiry sweeper
//
// ============================================================================

pub mod aggregate;
pub mod command_handler;
pub mod commands;
pub mod errors;
pub mod events;
pub mod expiry;
pub mod value_objects;

// Re-export for convenience
pub use aggregate::*;
pub use command_handler::*;
pub use commands::*;
pub use errors::*;
pub use events::*;
pub use expiry::*;
pub use value_objects::*;
