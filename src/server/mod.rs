//! Server core functionality
//!
//! This module contains the main server implementation, the router and the
//! state shared with request handlers.

pub mod core;
pub mod state;

pub use self::core::{Server, build_router};
pub use state::AppState;
