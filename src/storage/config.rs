//! Configuration for resource file storage backends

use crate::error::CatalogError;
use crate::storage::{local_store::LocalResourceStore, mock_store::MockResourceStore, ResourceStorage};
use log::{info, warn};
use serde::Deserialize;
use std::env;
use std::sync::Arc;

/// Available resource storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum StorageBackend {
    #[default]
    Local,
    Mock,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "filesystem" | "fs" => Ok(StorageBackend::Local),
            "mock" => Ok(StorageBackend::Mock),
            _ => Err(format!("Unknown storage backend: {}", s)),
        }
    }
}

impl TryFrom<String> for StorageBackend {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Configuration for resource file storage
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory holding `<entity_type>/<entity_id>/<filename>` trees
    pub resource_root: String,
    /// URL prefix the resource root is served under
    pub url_prefix: String,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            resource_root: "resources".to_string(),
            url_prefix: "/resources".to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl StorageConfig {
    /// Apply `STORAGE_BACKEND` and `RESOURCE_ROOT` overrides
    pub fn apply_env(&mut self) {
        if let Ok(backend_str) = env::var("STORAGE_BACKEND") {
            match backend_str.parse::<StorageBackend>() {
                Ok(backend) => {
                    info!("Using storage backend from environment: {:?}", backend);
                    self.backend = backend;
                }
                Err(e) => {
                    warn!("Invalid storage backend in environment: {}. Keeping {:?}.", e, self.backend);
                }
            }
        }
        if let Ok(root) = env::var("RESOURCE_ROOT") {
            info!("Using resource root from environment: {}", root);
            self.resource_root = root;
        }
    }

    /// Create a storage instance based on the configuration
    pub fn create_store(&self) -> Result<Arc<dyn ResourceStorage>, CatalogError> {
        match self.backend {
            StorageBackend::Local => {
                info!("Creating local resource store at {}", self.resource_root);
                Ok(Arc::new(LocalResourceStore::new(&self.resource_root)?))
            }
            StorageBackend::Mock => {
                info!("Creating mock resource store");
                Ok(Arc::new(MockResourceStore::new()))
            }
        }
    }
}
