//! RAX File Gateway - Entry Point
//!
//! Remote file operations over HTTP, confined to a configured root directory.

use log::{error, info};

use rax_file_gateway::{GatewayConfig, Server};

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    info!("Launching file gateway...");

    let config = match GatewayConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.start().await {
        error!("Server terminated with error: {}", e);
        std::process::exit(1);
    }
}
