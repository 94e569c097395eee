//! Error handling
//!
//! Defines error types and their HTTP mapping for the gateway.

pub mod handlers;
pub mod types;

pub use handlers::ErrorResponse;
pub use types::*;
