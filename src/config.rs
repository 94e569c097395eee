//! Configuration management for the RAX file gateway
//!
//! Everything here is read once at startup and is read-only afterwards.
//! Values come from built-in defaults, then `config.toml`, then
//! `RAX_GATEWAY_*` environment variables.

use config::{Config, ConfigError, Environment, File};
use log::info;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::storage::validation::normalize;

/// Searched in order; the first one present is used
const CONFIG_PATHS: [&str; 2] = [
    "rax-file-gateway/config", // Docker production: /app/rax-file-gateway/config.toml
    "config",                  // Local development: ./config.toml
];

/// Gateway configuration (restart required for every value)
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// IP address to bind the HTTP listener
    pub bind_address: String,

    /// Port for the HTTP listener
    pub port: u16,

    /// Directory subtree every operation is confined to
    /// Environment: RAX_GATEWAY_ALLOWED_ROOT
    pub allowed_root: String,

    /// Create the allowed root at startup if it is missing
    pub create_root: bool,

    /// Largest request body accepted (write contents, archive requests)
    pub max_body_bytes: usize,

    /// gzip level used for new archives (0-9)
    pub compression_level: u32,
}

impl GatewayConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?;

        if let Some(path) = CONFIG_PATHS
            .iter()
            .find(|path| Path::new(&format!("{path}.toml")).is_file())
        {
            info!("Loading configuration from {path}.toml");
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix("RAX_GATEWAY").try_parsing(true))
            .build()?;

        let config: GatewayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("bind_address", "0.0.0.0")?
            .set_default("port", 8080)?
            .set_default("allowed_root", "./server_root")?
            .set_default("create_root", true)?
            .set_default("max_body_bytes", 16 * 1024 * 1024)?
            .set_default("compression_level", 6)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Message("port cannot be 0".into()));
        }

        if self.allowed_root.trim().is_empty() {
            return Err(ConfigError::Message("allowed_root cannot be empty".into()));
        }

        if self.max_body_bytes == 0 {
            return Err(ConfigError::Message(
                "max_body_bytes must be greater than 0".into(),
            ));
        }

        if self.compression_level > 9 {
            return Err(ConfigError::Message(
                "compression_level must be between 0 and 9".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and port as socket address
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Makes sure the allowed root exists and returns it as an absolute,
    /// lexically normalized path
    pub fn prepare_root(&self) -> Result<PathBuf, ConfigError> {
        let root = PathBuf::from(&self.allowed_root);

        if self.create_root {
            std::fs::create_dir_all(&root).map_err(|e| {
                ConfigError::Message(format!("cannot create allowed_root {}: {e}", root.display()))
            })?;
        }

        if !root.is_dir() {
            return Err(ConfigError::Message(format!(
                "allowed_root {} is not a directory",
                root.display()
            )));
        }

        let absolute = std::path::absolute(&root).map_err(|e| {
            ConfigError::Message(format!("cannot resolve allowed_root {}: {e}", root.display()))
        })?;
        Ok(normalize(&absolute))
    }
}
