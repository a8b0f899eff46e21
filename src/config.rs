//! Application Configuration
//!
//! This module provides configuration management for the application,
//! supporting YAML configuration files with sensible defaults and
//! environment overrides for the backend choices.

use crate::auth::config::AuthConfig;
use crate::error::CatalogError;
use crate::metadata::config::MetadataConfig;
use crate::storage::config::StorageConfig;
use log::{info, warn};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "CATALOG_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            workers: 4,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to the log4rs configuration file
    pub config_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "server_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load the file named by `CATALOG_CONFIG` (or `config.yaml`), then apply
    /// environment overrides. A missing file means defaults.
    pub fn load() -> Result<Self, CatalogError> {
        let config_path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&config_path)?;
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            warn!("Config file {} not found, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)?;
        let config = Self::from_yaml(&content)?;
        info!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, CatalogError> {
        serde_yaml::from_str(content).map_err(|e| CatalogError::Internal(format!("invalid configuration: {}", e)))
    }

    /// Apply the environment overrides of every section
    pub fn apply_env(&mut self) {
        self.metadata.apply_env();
        self.storage.apply_env();
        self.auth.apply_env();
    }
}
