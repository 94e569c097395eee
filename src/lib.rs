pub mod archive;
pub mod config;
pub mod error;
pub mod middleware;
pub mod protocol;
pub mod server;
pub mod storage;

pub use config::GatewayConfig;
pub use server::Server;
