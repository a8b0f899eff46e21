//! Application State Management
//!
//! This module provides the application state that contains all services
//! and their dependencies, following the dependency injection pattern.

use std::sync::Arc;
use log::info;

use crate::auth::TokenIntrospector;
use crate::config::AppConfig;
use crate::error::CatalogError;
use crate::metadata::CatalogStore;
use crate::service::metadata_service::MetadataService;
use crate::service::storage_service::StorageService;
use crate::storage::ResourceStorage;

/// Application state containing all services and their dependencies
#[derive(Clone)]
pub struct AppState {
    pub metadata_service: Arc<MetadataService>,
    pub storage_service: Arc<StorageService>,
    pub introspector: Arc<dyn TokenIntrospector>,
    pub config: AppConfig,
}

impl AppState {
    /// Create application state from configuration
    pub fn from_config(config: AppConfig) -> Result<Self, CatalogError> {
        info!("Initializing application state with configuration");

        let store = config.metadata.create_store()?;
        let storage = config.storage.create_store()?;
        let introspector = config.auth.create_introspector()?;

        let state = Self::with_backends(config, store, storage, introspector);
        info!("Application state initialized successfully");
        Ok(state)
    }

    /// Wire services around already constructed backends
    pub fn with_backends(
        config: AppConfig,
        store: Arc<dyn CatalogStore>,
        storage: Arc<dyn ResourceStorage>,
        introspector: Arc<dyn TokenIntrospector>,
    ) -> Self {
        Self {
            metadata_service: Arc::new(MetadataService::new(store, storage.clone())),
            storage_service: Arc::new(StorageService::new(storage)),
            introspector,
            config,
        }
    }
}
