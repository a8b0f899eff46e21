//! Configuration for catalog metadata backends

use crate::error::CatalogError;
use crate::metadata::{mock_store::MockCatalogStore, sqlite_store::SQLiteCatalogStore, CatalogStore};
use log::{info, warn};
use serde::Deserialize;
use std::env;
use std::sync::Arc;

/// Available metadata storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum MetadataBackend {
    #[default]
    SQLite,
    Mock,
}

impl std::str::FromStr for MetadataBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(MetadataBackend::SQLite),
            "mock" => Ok(MetadataBackend::Mock),
            _ => Err(format!("Unknown metadata backend: {}", s)),
        }
    }
}

impl TryFrom<String> for MetadataBackend {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Configuration for catalog metadata storage
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub backend: MetadataBackend,
    /// SQLite database file, or `:memory:`
    pub db_path: String,
    pub wal_mode: bool,
    pub busy_timeout_ms: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::default(),
            db_path: "catalog.sqlite".to_string(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }
}

impl MetadataConfig {
    /// Apply `METADATA_BACKEND` and `DB_FILE` overrides
    pub fn apply_env(&mut self) {
        if let Ok(backend_str) = env::var("METADATA_BACKEND") {
            match backend_str.parse::<MetadataBackend>() {
                Ok(backend) => {
                    info!("Using metadata backend from environment: {:?}", backend);
                    self.backend = backend;
                }
                Err(e) => {
                    warn!("Invalid metadata backend in environment: {}. Keeping {:?}.", e, self.backend);
                }
            }
        }
        if let Ok(db_path) = env::var("DB_FILE") {
            info!("Using catalog database from environment: {}", db_path);
            self.db_path = db_path;
        }
    }

    /// Create a catalog store instance based on the configuration
    pub fn create_store(&self) -> Result<Arc<dyn CatalogStore>, CatalogError> {
        match self.backend {
            MetadataBackend::SQLite => {
                info!("Creating SQLite catalog store");
                Ok(Arc::new(SQLiteCatalogStore::open(self)?))
            }
            MetadataBackend::Mock => {
                info!("Creating mock catalog store");
                Ok(Arc::new(MockCatalogStore::new()))
            }
        }
    }
}
