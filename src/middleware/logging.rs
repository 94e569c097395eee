//! Logging middleware
//!
//! Provides request logging functionality.

use axum::{extract::Request, middleware::Next, response::Response};
use log::{info, warn};
use std::time::Instant;

/// Log every request with its status and latency
pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let elapsed = started.elapsed().as_millis();
    if status.is_server_error() {
        warn!("{} {} -> {} ({} ms)", method, uri, status.as_u16(), elapsed);
    } else {
        info!("{} {} -> {} ({} ms)", method, uri, status.as_u16(), elapsed);
    }
    response
}
