//! HTTP protocol layer
//!
//! Request shapes, response envelopes and the handlers that tie them to
//! storage and archive operations.

pub mod handlers;
pub mod requests;
pub mod responses;

pub use responses::{CompressResponse, ContentResponse, DecompressResponse, ListResponse, MessageResponse};
